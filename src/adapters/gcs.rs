use async_trait::async_trait;
use bytes::BytesMut;
use futures::{stream, StreamExt, TryStreamExt};
use google_cloud_storage::{
    client::Client,
    http::{
        self,
        objects::{
            delete::DeleteObjectRequest,
            download::Range,
            get::GetObjectRequest,
            list::ListObjectsRequest,
            upload::{Media, UploadObjectRequest, UploadType},
        },
    },
    sign::{SignedURLError, SignedURLMethod, SignedURLOptions},
};
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

use crate::adapters::{
    self, ObjectAttributes, ObjectKeys, ObjectReader, ObjectWriter, ProviderError, SignMethod,
    SignUrlOptions,
};

/// Chunks buffered ahead of the reader.
const READ_AHEAD: usize = 4;

/// Aborts the download task once the reader is dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// GCS answers 404 for a missing bucket as well as a missing object, so the
/// "object does not exist" sentinel is only produced for object-level calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Object,
    Bucket,
}

fn from_status(code: u16, message: String, scope: Scope) -> ProviderError {
    match (code, scope) {
        (404, Scope::Object) => ProviderError::ObjectNotExist,
        _ => ProviderError::Status { code, message },
    }
}

fn from_http(err: http::Error, scope: Scope) -> ProviderError {
    match err {
        http::Error::Response(resp) => from_status(resp.code, resp.to_string(), scope),
        err => ProviderError::Transport(err.to_string()),
    }
}

fn from_sign(err: SignedURLError) -> ProviderError {
    match err {
        SignedURLError::SignBlob(err) => from_http(err, Scope::Bucket),
        err => ProviderError::Transport(err.to_string()),
    }
}

fn prefix_filter(prefix: String) -> Option<String> {
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Next walker state after a page: `None` once the provider stops handing
/// out tokens.
fn next_state(next_page_token: Option<String>) -> Option<Option<String>> {
    next_page_token.map(Some)
}

/// Time left until `expires_at`, zero when it already passed.
fn time_to_live(expires_at: OffsetDateTime, now: OffsetDateTime) -> std::time::Duration {
    std::time::Duration::try_from(expires_at - now).unwrap_or_default()
}

async fn list_page(
    client: Client,
    bucket: String,
    prefix: String,
    page_token: Option<String>,
) -> Result<(Vec<String>, Option<String>), ProviderError> {
    let req = ListObjectsRequest {
        bucket,
        prefix: prefix_filter(prefix),
        page_token,
        ..Default::default()
    };

    let page = client
        .list_objects(&req)
        .await
        .map_err(|err| from_http(err, Scope::Bucket))?;

    let keys = page
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|obj| obj.name)
        .collect();

    Ok((keys, page.next_page_token))
}

/// Buffers the body and commits it with a single upload on `close`, so a
/// rejected upload surfaces at commit time just like a resumable session.
pub struct GcsObjectWriter {
    client: Client,
    bucket: String,
    key: String,
    content_type: String,
    buffer: BytesMut,
}

#[async_trait]
impl ObjectWriter for GcsObjectWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<(), ProviderError> {
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ProviderError> {
        let GcsObjectWriter {
            client,
            bucket,
            key,
            content_type,
            buffer,
        } = *self;

        debug!(bucket = %bucket, key = %key, content_type = %content_type, size = buffer.len(), "upload");

        let req = UploadObjectRequest {
            bucket,
            ..Default::default()
        };

        let mut media = Media::new(key);
        media.content_type = content_type.into();
        media.content_length = Some(buffer.len() as u64);

        client
            .upload_object(&req, buffer.freeze(), &UploadType::Simple(media))
            .await
            .map_err(|err| from_http(err, Scope::Bucket))?;

        Ok(())
    }
}

#[async_trait]
impl adapters::ObjectClient for Client {
    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader, ProviderError> {
        let client = self.clone();
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(READ_AHEAD);

        // the download stream borrows its request, so both live in the task
        let task = tokio::spawn(async move {
            let range = Range::default();
            let body = match client.download_streamed_object(&req, &range).await {
                Ok(body) => body,
                Err(err) => {
                    let _ = opened_tx.send(Err(from_http(err, Scope::Object)));
                    return;
                }
            };
            if opened_tx.send(Ok(())).is_err() {
                return;
            }

            let mut body = Box::pin(body);
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|err| from_http(err, Scope::Object));
                if chunk_tx.send(chunk).await.is_err() {
                    return;
                }
            }
        });
        let guard = AbortOnDrop(task);

        match opened_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(ProviderError::Transport(
                    "download task ended before the object was opened".to_string(),
                ))
            }
        }

        Ok(stream::unfold((chunk_rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|chunk| (chunk, (rx, guard)))
        })
        .boxed())
    }

    fn open_write(&self, bucket: &str, key: &str, content_type: &str) -> Box<dyn ObjectWriter> {
        Box::new(GcsObjectWriter {
            client: self.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            buffer: BytesMut::new(),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), ProviderError> {
        let req = DeleteObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        self.delete_object(&req)
            .await
            .map_err(|err| from_http(err, Scope::Object))
    }

    async fn attributes(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectAttributes, ProviderError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        let obj = self
            .get_object(&req)
            .await
            .map_err(|err| from_http(err, Scope::Object))?;

        Ok(ObjectAttributes {
            name: obj.name,
            size: obj.size,
            content_type: obj.content_type,
        })
    }

    fn list(&self, bucket: &str, prefix: &str) -> ObjectKeys {
        let client = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        // state: Some(token) while pages remain, the first page has no token
        stream::try_unfold(Some(None), move |state: Option<Option<String>>| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                match state {
                    None => Ok(None),
                    Some(page_token) => list_page(client, bucket, prefix, page_token)
                        .await
                        .map(|(keys, next)| Some((keys, next_state(next)))),
                }
            }
        })
        .map_ok(|keys: Vec<String>| stream::iter(keys.into_iter().map(Ok::<_, ProviderError>)))
        .try_flatten()
        .boxed()
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        opts: &SignUrlOptions,
    ) -> Result<String, ProviderError> {
        let ttl = time_to_live(opts.expires_at, OffsetDateTime::now_utc());

        let method = match opts.method {
            SignMethod::Get => SignedURLMethod::GET,
            SignMethod::Put => SignedURLMethod::PUT,
        };

        let options = SignedURLOptions {
            method,
            expires: ttl,
            ..Default::default()
        };

        Client::signed_url(self, bucket, key, None, None, options)
            .await
            .map_err(from_sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        let cases = vec![
            (404, Scope::Object, ProviderError::ObjectNotExist),
            (
                404,
                Scope::Bucket,
                ProviderError::Status {
                    code: 404,
                    message: "msg".to_string(),
                },
            ),
            (
                403,
                Scope::Object,
                ProviderError::Status {
                    code: 403,
                    message: "msg".to_string(),
                },
            ),
            (
                500,
                Scope::Bucket,
                ProviderError::Status {
                    code: 500,
                    message: "msg".to_string(),
                },
            ),
        ];

        for (code, scope, expected) in cases {
            let result = from_status(code, "msg".to_string(), scope);
            assert_eq!(result, expected, "failed for case: {} {:?}", code, scope);
        }
    }

    #[test]
    fn test_from_http() {
        let cases = vec![
            (
                http::Error::InvalidRangeHeader("bytes=x".to_string()),
                Scope::Object,
                ProviderError::Transport("invalid range header, received: bytes=x".to_string()),
            ),
            (
                http::Error::TokenSource("expired".into()),
                Scope::Bucket,
                ProviderError::Transport("token source failed: expired".to_string()),
            ),
        ];

        for (err, scope, expected) in cases {
            let result = from_http(err, scope);
            assert_eq!(result, expected, "failed for case: {:?}", scope);
        }
    }

    #[test]
    fn test_from_sign() {
        let cases = vec![
            (
                SignedURLError::InvalidOption("expires should be lower than 604801"),
                ProviderError::Transport(
                    "invalid option expires should be lower than 604801".to_string(),
                ),
            ),
            (
                SignedURLError::CertError("no private key".to_string()),
                ProviderError::Transport("cert error by: no private key".to_string()),
            ),
            (
                SignedURLError::SignBlob(http::Error::InvalidRangeHeader("r".to_string())),
                ProviderError::Transport("invalid range header, received: r".to_string()),
            ),
        ];

        for (err, expected) in cases {
            let name = err.to_string();
            assert_eq!(from_sign(err), expected, "failed for case: {}", name);
        }
    }

    #[test]
    fn test_next_state() {
        let cases = vec![
            (Some("tok".to_string()), Some(Some("tok".to_string()))),
            (None, None),
        ];

        for (token, expected) in cases {
            assert_eq!(next_state(token.clone()), expected, "failed for case: {:?}", token);
        }
    }

    #[test]
    fn test_prefix_filter() {
        let cases = vec![("", None), ("a/", Some("a/".to_string()))];

        for (prefix, expected) in cases {
            assert_eq!(
                prefix_filter(prefix.to_string()),
                expected,
                "failed for case: {}",
                prefix
            );
        }
    }

    #[test]
    fn test_time_to_live() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let cases = vec![
            (
                "future",
                now + time::Duration::minutes(15),
                std::time::Duration::from_secs(15 * 60),
            ),
            ("now", now, std::time::Duration::ZERO),
            ("past", now - time::Duration::seconds(5), std::time::Duration::ZERO),
        ];

        for (name, expires_at, expected) in cases {
            assert_eq!(time_to_live(expires_at, now), expected, "failed for case: {}", name);
        }
    }
}
