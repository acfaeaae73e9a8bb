//! How a file is cut into chunks, and what travels with each one.

use serde::Serialize;

/// A contiguous byte range of the source file. `index` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

/// Fixed-size partition of a file of `total_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkPlan {
    /// Returns `None` for an empty file, a zero chunk size, or a plan that
    /// would need more than `u32::MAX` chunks.
    pub fn new(total_size: u64, chunk_size: u64) -> Option<Self> {
        if total_size == 0 || chunk_size == 0 {
            return None;
        }
        let total_chunks = u32::try_from(total_size.div_ceil(chunk_size)).ok()?;
        Some(Self {
            total_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Range for chunk `index`, or `None` outside `1..=total_chunks`.
    pub fn chunk(&self, index: u32) -> Option<ChunkSpec> {
        if index == 0 || index > self.total_chunks {
            return None;
        }
        let offset = u64::from(index - 1) * self.chunk_size;
        let end = (offset + self.chunk_size).min(self.total_size);
        Some(ChunkSpec {
            index,
            offset,
            len: end - offset,
        })
    }

    pub fn chunks(&self) -> impl Iterator<Item = ChunkSpec> + '_ {
        (1..=self.total_chunks).filter_map(|index| self.chunk(index))
    }
}

/// Metadata the uploader endpoint needs to place a chunk.
///
/// Field names follow the flow.js protocol the server speaks. The same set
/// goes out as form fields on upload and as the query string on a probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub flow_chunk_number: u32,
    pub flow_chunk_size: u64,
    pub flow_current_chunk_size: u64,
    pub flow_total_size: u64,
    pub flow_identifier: String,
    pub flow_filename: String,
    pub flow_relative_path: String,
    pub flow_total_chunks: u32,
}

impl ChunkHeader {
    pub fn new(session_id: &str, original_name: &str, plan: &ChunkPlan, spec: &ChunkSpec) -> Self {
        Self {
            flow_chunk_number: spec.index,
            flow_chunk_size: plan.chunk_size(),
            flow_current_chunk_size: spec.len,
            flow_total_size: plan.total_size(),
            flow_identifier: session_id.to_string(),
            flow_filename: original_name.to_string(),
            flow_relative_path: original_name.to_string(),
            flow_total_chunks: plan.total_chunks(),
        }
    }

    /// Name/value pairs for a multipart form.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("flowChunkNumber", self.flow_chunk_number.to_string()),
            ("flowChunkSize", self.flow_chunk_size.to_string()),
            ("flowCurrentChunkSize", self.flow_current_chunk_size.to_string()),
            ("flowTotalSize", self.flow_total_size.to_string()),
            ("flowIdentifier", self.flow_identifier.clone()),
            ("flowFilename", self.flow_filename.clone()),
            ("flowRelativePath", self.flow_relative_path.clone()),
            ("flowTotalChunks", self.flow_total_chunks.to_string()),
        ]
    }
}
