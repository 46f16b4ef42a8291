use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use time::OffsetDateTime;
use tracing::{error, info, span, warn, Instrument, Level};

use crate::{
    adapters::{ObjectClient, ProviderError, SignMethod, SignUrlOptions},
    model::{
        error::{Code, StorageError},
        storage::{
            Blob, DeleteRequest, DeleteResponse, ExistsRequest, ExistsResponse, ListBlobsRequest,
            ListBlobsResponse, PreSignUrlRequest, PreSignUrlResponse, PresignOperation,
            ReadRequest, ReadResponse, WriteRequest, WriteResponse, DEFAULT_PRESIGN_EXPIRY,
        },
    },
    util::{
        classify::{classify, to_storage_error},
        content_type,
    },
};

const READING: &str = "reading object";
const WRITING: &str = "writing object";
const DELETING: &str = "deleting object";
const CHECKING: &str = "checking object existence";
const LISTING: &str = "listing objects";
const SIGNING: &str = "generating signed URL";

/// Object storage operations as exposed over RPC.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, req: ReadRequest) -> Result<ReadResponse, StorageError>;

    async fn write(&self, req: WriteRequest) -> Result<WriteResponse, StorageError>;

    async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse, StorageError>;

    async fn exists(&self, req: ExistsRequest) -> Result<ExistsResponse, StorageError>;

    async fn list_blobs(&self, req: ListBlobsRequest) -> Result<ListBlobsResponse, StorageError>;

    async fn pre_sign_url(
        &self,
        req: PreSignUrlRequest,
    ) -> Result<PreSignUrlResponse, StorageError>;
}

fn fail(err: ProviderError, action: &str, key: &str) -> StorageError {
    let status = to_storage_error(&err, action, key);
    error!(error_message=%err, error_code=%status.code(), error_group=action);
    status
}

/// Storage adapter over a single provider client.
///
/// Stateless apart from the shared client: every call is one translation
/// from request to provider calls, and every provider failure is classified
/// exactly once before it is returned. Dropping a call's future cancels the
/// provider call and releases any open read or write handle.
pub struct BucketStorage<C> {
    client: Arc<C>,
    project_id: Option<String>,
    deadline: Option<Duration>,
}

impl<C> Clone for BucketStorage<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            project_id: self.project_id.clone(),
            deadline: self.deadline,
        }
    }
}

impl<C: ObjectClient> BucketStorage<C> {
    pub fn new(client: C, project_id: Option<String>) -> Self {
        Self {
            client: Arc::new(client),
            project_id,
            deadline: None,
        }
    }

    /// Bounds every call; on expiry the provider call is dropped and the
    /// caller sees an unknown error.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn bounded<T, F>(&self, action: &str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let Some(deadline) = self.deadline else {
            return fut.await;
        };

        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(error_message="deadline exceeded", deadline=?deadline, error_group=action);
                Err(StorageError::Unknown(format!("deadline exceeded {}", action)))
            }
        }
    }
}

#[async_trait]
impl<C: ObjectClient + 'static> Storage for BucketStorage<C> {
    async fn read(&self, req: ReadRequest) -> Result<ReadResponse, StorageError> {
        let span = span!(Level::INFO, "read", context="read", bucket=%req.bucket_name, key=%req.key);

        self.bounded(READING, async {
            info!("called");

            let mut reader = self
                .client
                .open_read(&req.bucket_name, &req.key)
                .await
                .map_err(|err| fail(err, READING, &req.key))?;

            let mut body = BytesMut::new();
            while let Some(chunk) = reader.try_next().await.map_err(|err| {
                error!(error_message=%err, error_group="drain");
                StorageError::Unknown(format!("error reading object content: {}", err))
            })? {
                body.extend_from_slice(&chunk);
            }

            Ok::<_, StorageError>(ReadResponse {
                body: body.freeze(),
            })
        })
        .instrument(span)
        .await
    }

    async fn write(&self, req: WriteRequest) -> Result<WriteResponse, StorageError> {
        let span = span!(Level::INFO, "write", context="write", bucket=%req.bucket_name, key=%req.key);

        self.bounded(WRITING, async {
            let content_type = content_type::detect(&req.key, &req.body);
            info!(content_type=%content_type, size=req.body.len(), "called");

            let mut writer = self
                .client
                .open_write(&req.bucket_name, &req.key, &content_type);

            if let Err(err) = writer.write(&req.body).await {
                if let Err(close_err) = writer.close().await {
                    warn!(error_message=%close_err, error_group="close_after_failed_write");
                }
                return Err(fail(err, WRITING, &req.key));
            }

            writer
                .close()
                .await
                .map_err(|err| fail(err, WRITING, &req.key))?;

            Ok::<_, StorageError>(WriteResponse {})
        })
        .instrument(span)
        .await
    }

    async fn delete(&self, req: DeleteRequest) -> Result<DeleteResponse, StorageError> {
        let span = span!(Level::INFO, "delete", context="delete", bucket=%req.bucket_name, key=%req.key);

        self.bounded(DELETING, async {
            info!("called");

            self.client
                .delete(&req.bucket_name, &req.key)
                .await
                .map_err(|err| fail(err, DELETING, &req.key))?;

            Ok::<_, StorageError>(DeleteResponse {})
        })
        .instrument(span)
        .await
    }

    async fn exists(&self, req: ExistsRequest) -> Result<ExistsResponse, StorageError> {
        let span = span!(Level::INFO, "exists", context="exists", bucket=%req.bucket_name, key=%req.key);

        self.bounded(CHECKING, async {
            info!("called");

            match self.client.attributes(&req.bucket_name, &req.key).await {
                Ok(attrs) => {
                    info!(name=%attrs.name, size=attrs.size, content_type=?attrs.content_type, "found");
                    Ok(ExistsResponse { exists: true })
                }
                Err(err) if classify(&err) == Code::NotFound => Ok(ExistsResponse { exists: false }),
                Err(err) => Err(fail(err, CHECKING, &req.key)),
            }
        })
        .instrument(span)
        .await
    }

    async fn list_blobs(&self, req: ListBlobsRequest) -> Result<ListBlobsResponse, StorageError> {
        let span = span!(Level::INFO, "list_blobs", context="list_blobs", bucket=%req.bucket_name, prefix=%req.prefix);

        self.bounded(LISTING, async {
            info!("called");

            let keys: Vec<String> = self
                .client
                .list(&req.bucket_name, &req.prefix)
                .try_collect()
                .await
                .map_err(|err| fail(err, LISTING, &req.prefix))?;

            info!(count = keys.len(), "listed");

            Ok::<_, StorageError>(ListBlobsResponse {
                blobs: keys.into_iter().map(|key| Blob { key }).collect(),
            })
        })
        .instrument(span)
        .await
    }

    async fn pre_sign_url(
        &self,
        req: PreSignUrlRequest,
    ) -> Result<PreSignUrlResponse, StorageError> {
        let span = span!(Level::INFO, "pre_sign_url", context="pre_sign_url", bucket=%req.bucket_name, key=%req.key);

        self.bounded(SIGNING, async {
            info!(operation=?req.operation, expiry=?req.expiry, "called");

            let expiry = req.expiry.unwrap_or(DEFAULT_PRESIGN_EXPIRY);
            let expires_at = time::Duration::try_from(expiry)
                .ok()
                .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
                .ok_or_else(|| {
                    StorageError::Unknown(format!("error {}: expiry out of range", SIGNING))
                })?;

            let method = match req.operation {
                PresignOperation::Write => SignMethod::Put,
                PresignOperation::Read => SignMethod::Get,
            };

            let url = self
                .client
                .signed_url(
                    &req.bucket_name,
                    &req.key,
                    &SignUrlOptions { method, expires_at },
                )
                .await
                .map_err(|err| fail(err, SIGNING, &req.key))?;

            Ok::<_, StorageError>(PreSignUrlResponse { url })
        })
        .instrument(span)
        .await
    }
}
