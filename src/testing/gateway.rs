use async_trait::async_trait;
use reqwest::StatusCode;
use std::{collections::HashMap, sync::Mutex};

use crate::{errors::GatewayError, models::upload::UploadRecord, services::gateway::RecordGateway};

/// Record store whose `get` can be scripted to lag behind or fail.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    records: HashMap<String, UploadRecord>,
    hidden: HashMap<String, (UploadRecord, u32)>,
    finalize: HashMap<String, (String, u32)>,
    failures: HashMap<String, (u16, u32)>,
    get_calls: HashMap<String, u32>,
    next_id: u32,
}

impl MemoryGateway {
    pub fn insert(&self, record: UploadRecord) {
        let id = record.id().to_string();
        self.state.lock().unwrap().records.insert(id, record);
    }

    /// The record shows up after `misses` gets answered with `NotFound`.
    pub fn insert_after(&self, record: UploadRecord, misses: u32) {
        let id = record.id().to_string();
        self.state.lock().unwrap().hidden.insert(id, (record, misses));
    }

    /// After `polls` more gets, the record is finalized with `md5`.
    pub fn finalize_after(&self, id: &str, md5: &str, polls: u32) {
        self.state
            .lock()
            .unwrap()
            .finalize
            .insert(id.to_string(), (md5.to_string(), polls));
    }

    pub fn fail_with(&self, id: &str, status: u16) {
        self.fail_times(id, status, u32::MAX);
    }

    pub fn fail_times(&self, id: &str, status: u16, times: u32) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(id.to_string(), (status, times));
    }

    pub fn get_calls(&self, id: &str) -> u32 {
        self.state.lock().unwrap().get_calls.get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RecordGateway for MemoryGateway {
    async fn list(&self) -> Result<Vec<UploadRecord>, GatewayError> {
        Ok(self.state.lock().unwrap().records.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<UploadRecord, GatewayError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        *state.get_calls.entry(id.to_string()).or_default() += 1;

        if let Some((status, left)) = state.failures.get_mut(id)
            && *left > 0
        {
            *left -= 1;
            let status = StatusCode::from_u16(*status).unwrap();
            return Err(GatewayError::from_status(status, id, "scripted".into()));
        }

        if let Some((_, misses)) = state.hidden.get_mut(id) {
            if *misses > 0 {
                *misses -= 1;
                return Err(GatewayError::NotFound(id.to_string()));
            }
            if let Some((record, _)) = state.hidden.remove(id) {
                state.records.insert(id.to_string(), record);
            }
        }

        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        if let Some((md5, polls)) = state.finalize.get_mut(id) {
            if *polls > 0 {
                *polls -= 1;
            } else {
                record.upload_complete = true;
                record.md5sum = Some(md5.clone());
                record.completed_at = Some(chrono::Local::now().date_naive());
                state.finalize.remove(id);
            }
        }
        Ok(record.clone())
    }

    async fn create(&self, record: &UploadRecord) -> Result<String, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        let mut stored = record.clone();
        stored.id = Some(id.clone());
        state.records.insert(id.clone(), stored);
        Ok(id)
    }

    async fn update(&self, record: &UploadRecord) -> Result<UploadRecord, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .records
            .get_mut(record.id())
            .ok_or_else(|| GatewayError::NotFound(record.id().to_string()))?;
        *slot = record.clone();
        Ok(record.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), GatewayError> {
        self.state
            .lock()
            .unwrap()
            .records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }
}
