mod chunks;

pub(crate) use chunks::{encode_content, DEFAULT_CHUNK_MAX_BYTES};

use crate::config::SyncConfig;
use crate::models::ContentRecord;
use chunks::{decode_chunks, ContentChunk, EncodedContent};
use leptos::logging::{error, warn};
use serde::{Deserialize, Serialize};

/// Classification of a remote failure, spelled the way the backend spells its codes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum StoreErrorKind {
    /// Quota or rate limit. Never retried; callers stop writing for the session.
    ResourceExhausted,
    Unavailable,
    DeadlineExceeded,
    Internal,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    Network,
    Malformed,
    /// The request can never succeed as built, e.g. content that cannot be chunked.
    InvalidArgument,
    /// The local queue was reset before the write was attempted.
    Cancelled,
    Unknown,
}

impl StoreErrorKind {
    pub fn from_code(code: &str) -> Self {
        code.trim().parse().unwrap_or(Self::Unknown)
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            429 => Self::ResourceExhausted,
            503 => Self::Unavailable,
            504 => Self::DeadlineExceeded,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }

    /// Quota exhaustion, rejected requests and local cancellation fail the same way every
    /// time; everything else is worth another try.
    pub fn is_retryable(self) -> bool {
        !matches!(
            self,
            Self::ResourceExhausted | Self::InvalidArgument | Self::Cancelled
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::from_code(code), message)
    }

    pub(crate) fn network(e: reqwest::Error) -> Self {
        Self::new(StoreErrorKind::Network, e.to_string())
    }

    pub(crate) fn malformed(e: impl std::fmt::Display) -> Self {
        Self::new(StoreErrorKind::Malformed, e.to_string())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidArgument, message)
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(StoreErrorKind::Cancelled, "write discarded before it was sent")
    }

    /// A `{"code": "..."}` body wins over the status mapping.
    pub(crate) fn http(status: u16, body: &str, ctx: &str) -> Self {
        let kind = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.code)
            .map(|code| StoreErrorKind::from_code(&code))
            .filter(|kind| *kind != StoreErrorKind::Unknown)
            .unwrap_or_else(|| StoreErrorKind::from_status(status));
        Self::new(kind, format!("{ctx} ({status}): {body}"))
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.kind == StoreErrorKind::ResourceExhausted
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
}

/// Remote document store holding one content record per node id.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn load_all(&self) -> StoreResult<Vec<ContentRecord>>;
    async fn save(&self, id: &str, content: Option<&[String]>) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Header document of one slide. Chunked bodies keep `content` null and store the JSON
/// text in numbered chunk documents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SlideDocument {
    pub id: String,
    #[serde(default)]
    pub content: Option<Vec<String>>,
    #[serde(default)]
    pub content_chunked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_chunk_count: Option<usize>,
}

/// HTTP implementation of [`RemoteStore`].
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
    chunk_max_bytes: usize,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            chunk_max_bytes: DEFAULT_CHUNK_MAX_BYTES,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        let mut client = Self::new(config.api_url.clone());
        client.chunk_max_bytes = config.chunk_max_bytes.max(1);
        client
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn get_auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    fn slide_url(&self, id: &str) -> String {
        format!("{}/slides/{}", self.base_url, urlencoding::encode(id))
    }

    fn chunks_url(&self, id: &str) -> String {
        format!("{}/chunks", self.slide_url(id))
    }

    fn with_auth_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(header) = self.get_auth_header() {
            req = req.header("Authorization", header);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, ctx: &str) -> StoreResult<reqwest::Response> {
        let res = self
            .with_auth_headers(req)
            .send()
            .await
            .map_err(StoreError::network)?;

        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            Err(StoreError::http(status, &body, ctx))
        }
    }

    async fn load_chunks(&self, doc: &SlideDocument) -> StoreResult<Vec<ContentChunk>> {
        let res = self
            .send(self.http.get(self.chunks_url(&doc.id)), "Load chunks failed")
            .await?;
        res.json().await.map_err(StoreError::malformed)
    }
}

/// Content of a chunked document. Chunks that cannot be fetched or joined leave the
/// content null instead of failing the whole listing.
fn chunked_record(doc: SlideDocument, chunks: StoreResult<Vec<ContentChunk>>) -> ContentRecord {
    let content = match chunks.and_then(|c| decode_chunks(c, doc.content_chunk_count)) {
        Ok(content) => content,
        Err(e) => {
            error!("chunked content for {} is unreadable: {e}", doc.id);
            None
        }
    };
    ContentRecord::new(doc.id, content)
}

impl RemoteStore for ApiClient {
    async fn load_all(&self) -> StoreResult<Vec<ContentRecord>> {
        let url = format!("{}/slides", self.base_url);
        let res = self.send(self.http.get(url), "Load slides failed").await?;
        let docs: Vec<SlideDocument> = res.json().await.map_err(StoreError::malformed)?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            if !doc.content_chunked {
                records.push(ContentRecord::new(doc.id, doc.content));
                continue;
            }

            let chunks = self.load_chunks(&doc).await;
            records.push(chunked_record(doc, chunks));
        }

        Ok(records)
    }

    async fn save(&self, id: &str, content: Option<&[String]>) -> StoreResult<()> {
        match encode_content(content, self.chunk_max_bytes)? {
            EncodedContent::Inline(content) => {
                let doc = SlideDocument {
                    id: id.to_string(),
                    content,
                    content_chunked: false,
                    content_chunk_count: None,
                };
                self.send(self.http.put(self.slide_url(id)).json(&doc), "Save slide failed")
                    .await?;
            }
            EncodedContent::Chunked(parts) => {
                let doc = SlideDocument {
                    id: id.to_string(),
                    content: None,
                    content_chunked: true,
                    content_chunk_count: Some(parts.len()),
                };
                self.send(self.http.put(self.slide_url(id)).json(&doc), "Save slide failed")
                    .await?;

                for (index, data) in parts.into_iter().enumerate() {
                    let chunk = ContentChunk { index, data };
                    let url = format!("{}/{}", self.chunks_url(id), index);
                    self.send(self.http.put(url).json(&chunk), "Save chunk failed")
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        if let Err(e) = self
            .send(self.http.delete(self.chunks_url(id)), "Delete chunks failed")
            .await
        {
            warn!("deleting chunks of {id} failed, continuing: {e}");
        }

        self.send(self.http.delete(self.slide_url(id)), "Delete slide failed")
            .await?;
        Ok(())
    }
}
