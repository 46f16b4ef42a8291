const SCHEME: &str = "gs://";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("failed to parse scheme of: {0}, expected gs://")]
    Scheme(String),
    #[error("failed to parse bucket of: {0}")]
    Bucket(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectUri {
    pub bucket: String,
    /// Empty when the URI names the bucket only.
    pub key: String,
}

pub fn parse_object_uri(uri: &str) -> Result<ObjectUri, UriError> {
    let rest = uri
        .strip_prefix(SCHEME)
        .ok_or_else(|| UriError::Scheme(uri.to_string()))?;

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(UriError::Bucket(uri.to_string()));
    }

    Ok(ObjectUri {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}
