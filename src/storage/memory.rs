//! In-memory blob store
//!
//! Used by tests and local development. Supports failure injection and exposes
//! counters so saga and cascade behaviour can be asserted deterministically.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BlobError, BlobResult, BlobStore, ByteRange, ByteStream, ObjectStat, PutResult};
use crate::constants::STREAM_CHUNK_BYTES;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    etag: String,
}

type ObjectKey = (String, String);

/// Blob store that keeps objects in process memory
pub struct MemoryBlobStore {
    buckets: RwLock<HashSet<String>>,
    objects: RwLock<HashMap<ObjectKey, StoredObject>>,
    chunk_size: usize,
    failing_deletes: RwLock<HashSet<String>>,
    fail_all_deletes: AtomicBool,
    fail_puts: AtomicBool,
    unavailable: AtomicBool,
    delete_attempts: AtomicUsize,
    open_reads: Arc<AtomicUsize>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_chunk_size(STREAM_CHUNK_BYTES)
    }

    /// Create a store that yields reads in chunks of `chunk_size` bytes
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buckets: RwLock::new(HashSet::new()),
            objects: RwLock::new(HashMap::new()),
            chunk_size: chunk_size.max(1),
            failing_deletes: RwLock::new(HashSet::new()),
            fail_all_deletes: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
            delete_attempts: AtomicUsize::new(0),
            open_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every later delete of `key` fail as if the store were unreachable
    pub async fn fail_delete_for(&self, key: &str) {
        self.failing_deletes.write().await.insert(key.to_string());
    }

    /// Make every later delete fail, whatever the key
    pub fn fail_all_deletes(&self, fail: bool) {
        self.fail_all_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make every later put fail
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every operation fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of delete calls received, successful or not
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }

    /// Number of read streams that have been opened and not yet dropped
    pub fn open_reads(&self) -> usize {
        self.open_reads.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    fn check_available(&self) -> BlobResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("memory blob store offline".to_string()));
        }
        Ok(())
    }

    async fn find(&self, bucket: &str, key: &str) -> BlobResult<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BlobError::not_found(bucket, key))
    }
}

/// Held by an open read stream; releases the read slot when the stream is dropped
struct ReadHandle {
    open_reads: Arc<AtomicUsize>,
}

impl ReadHandle {
    fn acquire(open_reads: &Arc<AtomicUsize>) -> Self {
        open_reads.fetch_add(1, Ordering::SeqCst);
        Self {
            open_reads: open_reads.clone(),
        }
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        self.open_reads.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_bucket(&self, bucket: &str) -> BlobResult<()> {
        self.check_available()?;
        self.buckets.write().await.insert(bucket.to_string());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> BlobResult<PutResult> {
        self.check_available()?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable(format!("put of {} rejected", key)));
        }
        if !self.buckets.read().await.contains(bucket) {
            return Err(BlobError::Invalid(format!("Bucket does not exist: {}", bucket)));
        }

        let etag = hex::encode(Sha256::digest(&data));
        let size = data.len() as u64;
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
            },
        );

        Ok(PutResult {
            etag: Some(etag),
            size,
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> BlobResult<ObjectStat> {
        self.check_available()?;
        let object = self.find(bucket, key).await?;

        Ok(ObjectStat {
            size: object.data.len() as u64,
            content_type: object.content_type,
            etag: Some(object.etag),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream> {
        self.check_available()?;
        let object = self.find(bucket, key).await?;
        let len = object.data.len() as u64;

        let data = match range {
            None => object.data,
            Some(r) if r.start <= r.end && r.end < len => {
                object.data.slice(r.start as usize..=r.end as usize)
            }
            Some(r) => {
                return Err(BlobError::Invalid(format!(
                    "Range {}-{} not satisfiable for {} bytes",
                    r.start, r.end, len
                )))
            }
        };

        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|offset| data.slice(offset..(offset + self.chunk_size).min(data.len())))
            .collect();

        let handle = ReadHandle::acquire(&self.open_reads);
        let stream = stream::iter(chunks).map(move |chunk| {
            let _held = &handle;
            Ok::<_, std::io::Error>(chunk)
        });

        Ok(Box::pin(stream))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.fail_all_deletes.load(Ordering::SeqCst)
            || self.failing_deletes.read().await.contains(key)
        {
            return Err(BlobError::Unavailable(format!("delete of {} rejected", key)));
        }

        // S3 deletes are idempotent; this store reports the miss so callers can see it
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| BlobError::not_found(bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(key: &str, data: &[u8]) -> MemoryBlobStore {
        let store = MemoryBlobStore::with_chunk_size(16);
        store.ensure_bucket("b").await.unwrap();
        store
            .put_object("b", key, Some("video/webm"), Bytes::copy_from_slice(data))
            .await
            .unwrap();
        store
    }

    async fn collect(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<_> = stream.collect().await;
        chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect()
    }

    #[tokio::test]
    async fn test_put_requires_bucket() {
        let store = MemoryBlobStore::new();
        let err = store
            .put_object("missing", "k", None, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_stat_reports_size_type_and_etag() {
        let store = store_with("k", b"hello").await;
        let stat = store.stat_object("b", "k").await.unwrap();

        assert_eq!(stat.size, 5);
        assert_eq!(stat.content_type.as_deref(), Some("video/webm"));
        assert_eq!(stat.etag, Some(hex::encode(Sha256::digest(b"hello"))));
    }

    #[tokio::test]
    async fn test_get_full_and_ranged() {
        let data: Vec<u8> = (0..100u8).collect();
        let store = store_with("k", &data).await;

        let full = store.get_object("b", "k", None).await.unwrap();
        assert_eq!(collect(full).await, data);

        let part = store
            .get_object("b", "k", Some(ByteRange::new(10, 39)))
            .await
            .unwrap();
        assert_eq!(collect(part).await, data[10..40].to_vec());
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_is_invalid() {
        let store = store_with("k", b"0123456789").await;

        for range in [ByteRange::new(5, 10), ByteRange::new(6, 5)] {
            let err = store.get_object("b", "k", Some(range)).await.err().unwrap();
            assert!(matches!(err, BlobError::Invalid(_)));
        }
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.stat_object("b", "nope").await,
            Err(BlobError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_object("b", "nope", None).await.err(),
            Some(BlobError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_object("b", "nope").await,
            Err(BlobError::NotFound { .. })
        ));
        assert_eq!(store.delete_attempts(), 1);
    }

    #[tokio::test]
    async fn test_read_handle_released_on_drop() {
        let store = store_with("k", &[7u8; 64]).await;

        let mut stream = store.get_object("b", "k", None).await.unwrap();
        assert_eq!(store.open_reads(), 1);

        // Consume one chunk then abandon the stream
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 16);
        assert_eq!(store.open_reads(), 1);

        drop(stream);
        assert_eq!(store.open_reads(), 0);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let store = store_with("k", b"x").await;
        store.fail_delete_for("k").await;

        assert!(matches!(
            store.delete_object("b", "k").await,
            Err(BlobError::Unavailable(_))
        ));
        assert!(store.contains("b", "k").await);
        assert_eq!(store.delete_attempts(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = store_with("k", b"x").await;
        store.set_unavailable(true);

        assert!(matches!(
            store.stat_object("b", "k").await,
            Err(BlobError::Unavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.stat_object("b", "k").await.is_ok());
    }
}
