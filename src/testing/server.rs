//! In-process mock of the upload API, served by axum on an ephemeral port.
//!
//! Keeps records and chunk bytes in memory. When the last chunk of an
//! identifier arrives, the record is finalized with the MD5 of the
//! reassembled content, the way the real server does it.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt,
    net::SocketAddr,
    str::FromStr,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, task::JoinHandle};

use crate::{
    models::{cloud::CloudInfo, upload::UploadRecord},
    routes::routes,
};

/// Per-chunk received flags kept on the record, as the real server does.
const CHUNK_BITMAP: &str = "chunks";

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    fn bad_request(msg: impl fmt::Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg.to_string())
    }

    fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));
        (self.status, body).into_response()
    }
}

#[derive(Default)]
struct Store {
    records: BTreeMap<String, UploadRecord>,
    chunks: HashMap<String, BTreeMap<u32, Bytes>>,
    accepted_posts: HashMap<String, u32>,
    csrf_queries: Vec<String>,
    header_tokens: Vec<String>,
    chunk_failures: VecDeque<StatusCode>,
    account_calls: Vec<(String, String)>,
    next_id: u64,
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Store>>);

impl Shared {
    fn with<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        f(&mut self.0.lock().unwrap())
    }
}

pub struct MockApi {
    addr: SocketAddr,
    shared: Shared,
    server: JoinHandle<()>,
}

impl MockApi {
    pub async fn spawn() -> Self {
        let shared = Shared::default();
        let app = Router::new()
            .route("/api/uploads", get(list).post(create).put(update))
            .route("/api/uploads/{id}", get(fetch).delete(remove))
            .route("/api/uploader", get(probe).post(upload_chunk))
            .route("/api/account/change_password", post(change_password))
            .route("/api/account/reset_password/init", post(reset_password_init))
            .route("/api/account/reset_password/finish", post(reset_password_finish))
            .route("/api/cloudinfo", get(cloud_info))
            .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
            .layer(middleware::from_fn_with_state(shared.clone(), record_csrf_header))
            .with_state(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            shared,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Chunk posts the server accepted for `id`.
    pub fn chunk_posts(&self, id: &str) -> u32 {
        self.shared
            .with(|store| store.accepted_posts.get(id).copied().unwrap_or(0))
    }

    /// Distinct `_csrf` query values seen on uploader requests.
    pub fn csrf_seen(&self) -> Vec<String> {
        self.shared.with(|store| store.csrf_queries.clone())
    }

    /// `x-csrf-token` header of every request, in arrival order.
    pub fn header_tokens(&self) -> Vec<String> {
        self.shared.with(|store| store.header_tokens.clone())
    }

    pub fn chunk(&self, id: &str, index: u32) -> Option<Bytes> {
        self.shared
            .with(|store| store.chunks.get(id).and_then(|parts| parts.get(&index)).cloned())
    }

    pub fn record(&self, id: &str) -> Option<UploadRecord> {
        self.shared.with(|store| store.records.get(id).cloned())
    }

    /// The next `count` chunk posts are answered with `status`.
    pub fn fail_next_chunk_posts(&self, count: usize, status: StatusCode) {
        self.shared
            .with(|store| store.chunk_failures.extend(std::iter::repeat_n(status, count)));
    }

    /// `(route, raw body)` of every account call.
    pub fn account_calls(&self) -> Vec<(String, String)> {
        self.shared.with(|store| store.account_calls.clone())
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

async fn record_csrf_header(
    State(shared): State<Shared>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request
        .headers()
        .get(routes::CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        shared.with(|store| store.header_tokens.push(token.to_string()));
    }
    next.run(request).await
}

// --- api/uploads ---

async fn list(State(shared): State<Shared>) -> Json<Vec<UploadRecord>> {
    Json(shared.with(|store| store.records.values().cloned().collect()))
}

async fn fetch(
    State(shared): State<Shared>,
    Path(id): Path<String>,
) -> Result<Json<UploadRecord>, AppError> {
    shared
        .with(|store| store.records.get(&id).cloned())
        .map(Json)
        .ok_or_else(|| AppError::not_found(id))
}

async fn create(
    State(shared): State<Shared>,
    Json(mut record): Json<UploadRecord>,
) -> Result<impl IntoResponse, AppError> {
    if record.id.is_some() {
        return Err(AppError::bad_request("a new upload cannot already have an id"));
    }
    let id = shared.with(|store| {
        store.next_id += 1;
        let id = format!("rec-{}", store.next_id);
        record.id = Some(id.clone());
        record.uploaded_at.get_or_insert_with(today);
        store.records.insert(id.clone(), record);
        id
    });
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/{}", routes::upload(&id)))],
    ))
}

async fn update(
    State(shared): State<Shared>,
    Json(record): Json<UploadRecord>,
) -> Result<Json<UploadRecord>, AppError> {
    let Some(id) = record.id.clone() else {
        return Err(AppError::bad_request("id is required"));
    };
    if record.original_name.is_none() {
        return Err(AppError::bad_request("originalName is required"));
    }
    shared.with(|store| match store.records.get_mut(&id) {
        Some(slot) => {
            *slot = record.clone();
            Ok(Json(record))
        }
        None => Err(AppError::not_found(id)),
    })
}

async fn remove(
    State(shared): State<Shared>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    shared
        .with(|store| {
            store.chunks.remove(&id);
            store.records.remove(&id)
        })
        .map(|_| StatusCode::OK)
        .ok_or_else(|| AppError::not_found(id))
}

// --- api/uploader ---

struct FlowChunk {
    number: u32,
    total_chunks: u32,
    current_size: u64,
    total_size: u64,
    identifier: String,
    filename: String,
}

impl FlowChunk {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, AppError> {
        Ok(Self {
            number: field(fields, "flowChunkNumber")?,
            total_chunks: field(fields, "flowTotalChunks")?,
            current_size: field(fields, "flowCurrentChunkSize")?,
            total_size: field(fields, "flowTotalSize")?,
            identifier: field(fields, "flowIdentifier")?,
            filename: field(fields, "flowFilename")?,
        })
    }

    fn new_record(&self) -> UploadRecord {
        let mut record = UploadRecord {
            id: Some(self.identifier.clone()),
            original_name: Some(self.filename.clone()),
            uploaded_at: Some(today()),
            total_chunks: Some(self.total_chunks),
            total_size: Some(self.total_size),
            ..UploadRecord::default()
        };
        let bitmap = vec![Value::Bool(false); self.total_chunks as usize];
        record.extra.insert(CHUNK_BITMAP.into(), Value::Array(bitmap));
        record
    }
}

fn field<T: FromStr>(fields: &HashMap<String, String>, name: &str) -> Result<T, AppError> {
    fields
        .get(name)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| AppError::bad_request(format!("missing or malformed {name}")))
}

fn note_csrf_query(shared: &Shared, query: &HashMap<String, String>) {
    if let Some(token) = query.get(routes::CSRF_QUERY_PARAM) {
        shared.with(|store| {
            if !store.csrf_queries.contains(token) {
                store.csrf_queries.push(token.clone());
            }
        });
    }
}

async fn probe(
    State(shared): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<StatusCode, AppError> {
    note_csrf_query(&shared, &query);
    let chunk = FlowChunk::from_fields(&query)?;
    let present = shared.with(|store| {
        let record = store
            .records
            .entry(chunk.identifier.clone())
            .or_insert_with(|| chunk.new_record());
        chunk_flag(record, chunk.number)
    })?;
    // The real server answers "not yet received" with 502.
    Ok(if present {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    })
}

async fn upload_chunk(
    State(shared): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<StatusCode, AppError> {
    note_csrf_query(&shared, &query);

    let mut fields = HashMap::new();
    let mut data = None;
    while let Some(part) = multipart.next_field().await.map_err(AppError::bad_request)? {
        let name = part.name().unwrap_or_default().to_string();
        if name == "file" {
            data = Some(part.bytes().await.map_err(AppError::bad_request)?);
        } else {
            fields.insert(name, part.text().await.map_err(AppError::bad_request)?);
        }
    }

    if let Some(status) = shared.with(|store| store.chunk_failures.pop_front()) {
        return Err(AppError::new(status, "injected failure"));
    }

    let chunk = FlowChunk::from_fields(&fields)?;
    let data = data.ok_or_else(|| AppError::bad_request("missing file part"))?;
    if data.len() as u64 != chunk.current_size {
        return Err(AppError::bad_request("chunk length does not match flowCurrentChunkSize"));
    }

    // Only a chunk check creates the record; a post cannot.
    shared.with(|store| -> Result<StatusCode, AppError> {
        let record = store
            .records
            .get_mut(&chunk.identifier)
            .ok_or_else(|| AppError::internal("Upload record does not exist"))?;
        mark_chunk(record, chunk.number)?;
        let parts = store.chunks.entry(chunk.identifier.clone()).or_default();
        parts.insert(chunk.number, data);
        *store.accepted_posts.entry(chunk.identifier.clone()).or_default() += 1;

        if parts.len() as u32 == chunk.total_chunks && !record.upload_complete {
            let mut digest = md5::Context::new();
            for part in parts.values() {
                digest.consume(part);
            }
            record.md5sum = Some(format!("{:x}", digest.compute()));
            record.upload_complete = true;
            record.completed_at = Some(today());
        }
        Ok(StatusCode::OK)
    })
}

fn chunk_slot(record: &mut UploadRecord, number: u32) -> Result<&mut Value, AppError> {
    record
        .extra
        .get_mut(CHUNK_BITMAP)
        .and_then(Value::as_array_mut)
        .and_then(|bitmap| bitmap.get_mut(number.checked_sub(1)? as usize))
        .ok_or_else(|| AppError::internal("upload record has no chunk bitmap"))
}

fn chunk_flag(record: &mut UploadRecord, number: u32) -> Result<bool, AppError> {
    Ok(chunk_slot(record, number)?.as_bool().unwrap_or(false))
}

fn mark_chunk(record: &mut UploadRecord, number: u32) -> Result<(), AppError> {
    *chunk_slot(record, number)? = Value::Bool(true);
    Ok(())
}

// --- api/account, api/cloudinfo ---

async fn change_password(State(shared): State<Shared>, body: String) -> StatusCode {
    shared.with(|store| {
        store
            .account_calls
            .push((routes::CHANGE_PASSWORD.to_string(), body))
    });
    StatusCode::OK
}

async fn reset_password_init(
    State(shared): State<Shared>,
    body: String,
) -> Result<StatusCode, AppError> {
    if body.is_empty() {
        return Err(AppError::bad_request("e-mail address not registered"));
    }
    shared.with(|store| {
        store
            .account_calls
            .push((routes::RESET_PASSWORD_INIT.to_string(), body))
    });
    Ok(StatusCode::OK)
}

async fn reset_password_finish(State(shared): State<Shared>, body: String) -> StatusCode {
    shared.with(|store| {
        store
            .account_calls
            .push((routes::RESET_PASSWORD_FINISH.to_string(), body))
    });
    StatusCode::OK
}

async fn cloud_info() -> Json<CloudInfo> {
    Json(CloudInfo {
        service_name: Some("local".into()),
        container_name: Some("local".into()),
    })
}
