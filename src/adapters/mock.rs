use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream, StreamExt};

use crate::adapters::{
    ObjectAttributes, ObjectClient, ObjectKeys, ObjectReader, ObjectWriter, ProviderError,
    SignUrlOptions,
};

const DEFAULT_PAGE_SIZE: usize = 2;
const CHUNK_SIZE: usize = 3;

/// Provider capability a fault or stall can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    OpenRead,
    Drain,
    Write,
    Close,
    Delete,
    Attributes,
    List,
    Sign,
}

struct MockObject {
    body: Bytes,
    content_type: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), MockObject>,
    faults: HashMap<MockOp, ProviderError>,
    stalls: HashSet<MockOp>,
}

enum Injected {
    Pass,
    Fault(ProviderError),
    Stall,
}

fn injected(state: &Mutex<State>, op: MockOp) -> Injected {
    let state = state.lock().expect("failed to acquire `state` guard");
    if state.stalls.contains(&op) {
        return Injected::Stall;
    }
    match state.faults.get(&op) {
        Some(err) => Injected::Fault(err.clone()),
        None => Injected::Pass,
    }
}

async fn gate(state: &Mutex<State>, op: MockOp) -> Result<(), ProviderError> {
    match injected(state, op) {
        Injected::Pass => Ok(()),
        Injected::Fault(err) => Err(err),
        Injected::Stall => future::pending().await,
    }
}

/// Counts a reader as open until its stream is dropped.
struct ReaderGuard(Arc<AtomicUsize>);

impl ReaderGuard {
    fn new(open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self(open)
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory object store with fault and stall injection.
#[derive(Clone)]
pub struct MockClient {
    state: Arc<Mutex<State>>,
    open_readers: Arc<AtomicUsize>,
    closed_writers: Arc<AtomicUsize>,
    page_size: usize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            open_readers: Arc::new(AtomicUsize::new(0)),
            closed_writers: Arc::new(AtomicUsize::new(0)),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        let mut state = self.state.lock().expect("failed to acquire `state` guard");
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            MockObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Every later call of `op` fails with `err`.
    pub fn fail(&self, op: MockOp, err: ProviderError) {
        let mut state = self.state.lock().expect("failed to acquire `state` guard");
        state.faults.insert(op, err);
    }

    /// Every later call of `op` never completes.
    pub fn stall(&self, op: MockOp) {
        let mut state = self.state.lock().expect("failed to acquire `state` guard");
        state.stalls.insert(op);
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let state = self.state.lock().expect("failed to acquire `state` guard");
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| obj.content_type.clone())
    }

    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    pub fn closed_writers(&self) -> usize {
        self.closed_writers.load(Ordering::SeqCst)
    }
}

pub struct MockWriter {
    state: Arc<Mutex<State>>,
    closed_writers: Arc<AtomicUsize>,
    bucket: String,
    key: String,
    content_type: String,
    buffer: Vec<u8>,
    failed: Option<ProviderError>,
}

#[async_trait]
impl ObjectWriter for MockWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<(), ProviderError> {
        if let Err(err) = gate(&self.state, MockOp::Write).await {
            self.failed = Some(err.clone());
            return Err(err);
        }
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    /// A writer that saw a failed write reports that failure and commits
    /// nothing.
    async fn close(self: Box<Self>) -> Result<(), ProviderError> {
        self.closed_writers.fetch_add(1, Ordering::SeqCst);
        gate(&self.state, MockOp::Close).await?;

        let MockWriter {
            state,
            bucket,
            key,
            content_type,
            buffer,
            failed,
            ..
        } = *self;

        if let Some(err) = failed {
            return Err(err);
        }

        let mut state = state.lock().expect("failed to acquire `state` guard");
        state.objects.insert(
            (bucket, key),
            MockObject {
                body: Bytes::from(buffer),
                content_type,
            },
        );

        Ok(())
    }
}

#[async_trait]
impl ObjectClient for MockClient {
    async fn open_read(&self, bucket: &str, key: &str) -> Result<ObjectReader, ProviderError> {
        gate(&self.state, MockOp::OpenRead).await?;

        let body = {
            let state = self.state.lock().expect("failed to acquire `state` guard");
            match state.objects.get(&(bucket.to_string(), key.to_string())) {
                Some(obj) => obj.body.clone(),
                None => return Err(ProviderError::ObjectNotExist),
            }
        };

        let chunks: Vec<Result<Bytes, ProviderError>> = body
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        // the drain fault or stall lands after the first chunk
        let (head, tail): (Vec<Result<Bytes, ProviderError>>, ObjectReader) =
            match injected(&self.state, MockOp::Drain) {
                Injected::Pass => (chunks, stream::empty().boxed()),
                Injected::Fault(err) => (
                    chunks.into_iter().take(1).collect(),
                    stream::once(future::ready(Err(err))).boxed(),
                ),
                Injected::Stall => (
                    chunks.into_iter().take(1).collect(),
                    stream::pending().boxed(),
                ),
            };

        let guard = ReaderGuard::new(self.open_readers.clone());
        Ok(stream::iter(head)
            .chain(tail)
            .map(move |item| {
                let _guard = &guard;
                item
            })
            .boxed())
    }

    fn open_write(&self, bucket: &str, key: &str, content_type: &str) -> Box<dyn ObjectWriter> {
        Box::new(MockWriter {
            state: self.state.clone(),
            closed_writers: self.closed_writers.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            buffer: Vec::new(),
            failed: None,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), ProviderError> {
        gate(&self.state, MockOp::Delete).await?;

        let mut state = self.state.lock().expect("failed to acquire `state` guard");
        match state.objects.remove(&(bucket.to_string(), key.to_string())) {
            Some(_) => Ok(()),
            None => Err(ProviderError::ObjectNotExist),
        }
    }

    async fn attributes(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectAttributes, ProviderError> {
        gate(&self.state, MockOp::Attributes).await?;

        let state = self.state.lock().expect("failed to acquire `state` guard");
        match state.objects.get(&(bucket.to_string(), key.to_string())) {
            Some(obj) => Ok(ObjectAttributes {
                name: key.to_string(),
                size: obj.body.len() as i64,
                content_type: Some(obj.content_type.clone()),
            }),
            None => Err(ProviderError::ObjectNotExist),
        }
    }

    fn list(&self, bucket: &str, prefix: &str) -> ObjectKeys {
        let keys: Vec<String> = {
            let state = self.state.lock().expect("failed to acquire `state` guard");
            state
                .objects
                .keys()
                .filter(|(b, k)| b == bucket && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect()
        };

        let mut pages = keys.chunks(self.page_size).map(|page| page.to_vec());
        let first = pages.next().unwrap_or_default();
        let rest: Vec<String> = pages.flatten().collect();

        // a list fault or stall lands on the second page fetch
        let tail: ObjectKeys = match injected(&self.state, MockOp::List) {
            Injected::Pass => stream::iter(rest.into_iter().map(Ok)).boxed(),
            Injected::Fault(err) => stream::once(future::ready(Err(err))).boxed(),
            Injected::Stall => stream::pending().boxed(),
        };

        stream::iter(first.into_iter().map(Ok)).chain(tail).boxed()
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &str,
        opts: &SignUrlOptions,
    ) -> Result<String, ProviderError> {
        gate(&self.state, MockOp::Sign).await?;

        Ok(format!(
            "https://storage.mock/{}/{}?method={}&expires={}",
            bucket,
            key,
            opts.method.as_str(),
            opts.expires_at.unix_timestamp()
        ))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    #[tokio::test]
    async fn test_list_pages() {
        let client = MockClient::new().with_page_size(1);
        for key in ["a/1", "a/2", "b/1"] {
            client.put("bucket", key, "x");
        }
        client.put("other", "a/3", "x");

        let keys: Vec<String> = client.list("bucket", "a/").try_collect().await.unwrap();
        assert_eq!(keys, vec!["a/1".to_string(), "a/2".to_string()]);
    }

    #[tokio::test]
    async fn test_reader_guard() {
        let client = MockClient::new();
        client.put("bucket", "key", "hello world");

        let reader = client.open_read("bucket", "key").await.unwrap();
        assert_eq!(client.open_readers(), 1);

        drop(reader);
        assert_eq!(client.open_readers(), 0);
    }
}
