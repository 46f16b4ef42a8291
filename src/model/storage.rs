use std::time::Duration;

use bytes::Bytes;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub bucket_name: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadResponse {
    pub body: Bytes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteRequest {
    pub bucket_name: String,
    pub key: String,
    pub body: Bytes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteResponse {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub bucket_name: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteResponse {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExistsRequest {
    pub bucket_name: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListBlobsRequest {
    pub bucket_name: String,
    /// Empty lists the whole bucket.
    pub prefix: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    pub key: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListBlobsResponse {
    /// Provider order, not stable across calls.
    pub blobs: Vec<Blob>,
}

/// Access a presigned URL grants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresignOperation {
    #[default]
    Read,
    Write,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreSignUrlRequest {
    pub bucket_name: String,
    pub key: String,
    pub operation: PresignOperation,
    /// Falls back to [`DEFAULT_PRESIGN_EXPIRY`] when unset.
    pub expiry: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreSignUrlResponse {
    pub url: String,
}

pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);
