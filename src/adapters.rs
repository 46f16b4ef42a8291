use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use time::OffsetDateTime;

pub mod gcs;
pub mod mock;

/// Everything a provider failure is reduced to before classification.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("object does not exist")]
    ObjectNotExist,
    #[error("status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("{0}")]
    Transport(String),
}

/// Streaming body of an open object. Dropping it releases the connection.
pub type ObjectReader = BoxStream<'static, Result<Bytes, ProviderError>>;

/// Keys produced by a listing, pages fetched lazily.
pub type ObjectKeys = BoxStream<'static, Result<String, ProviderError>>;

/// Pending upload. Nothing is visible in the bucket until `close` succeeds.
#[async_trait]
pub trait ObjectWriter: Send {
    async fn write(&mut self, buf: &[u8]) -> Result<(), ProviderError>;

    async fn close(self: Box<Self>) -> Result<(), ProviderError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignMethod {
    Get,
    Put,
}

impl SignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignMethod::Get => "GET",
            SignMethod::Put => "PUT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignUrlOptions {
    pub method: SignMethod,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub name: String,
    pub size: i64,
    pub content_type: Option<String>,
}

/// Per-bucket object operations of an authenticated provider client.
///
/// Implementations must be safe to share between concurrent calls; the
/// adapter never mutates a client after construction.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader, ProviderError>;

    fn open_write(&self, bucket: &str, key: &str, content_type: &str) -> Box<dyn ObjectWriter>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), ProviderError>;

    async fn attributes(&self, bucket: &str, key: &str)
        -> Result<ObjectAttributes, ProviderError>;

    fn list(&self, bucket: &str, prefix: &str) -> ObjectKeys;

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        opts: &SignUrlOptions,
    ) -> Result<String, ProviderError>;
}
