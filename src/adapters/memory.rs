use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use tracing::warn;

use crate::{
    adapters,
    model::error::BackendError,
    progress::{Direction, Progress},
};

/// Bytes reported to the progress observer per step.
const CHUNK_SIZE: usize = 8 * 1024;

type Buckets = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// An in-process object store with S3 semantics: flat keys per bucket,
/// missing buckets and keys are errors.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: Mutex<Buckets>,
    failing_keys: Mutex<BTreeSet<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`create_bucket`](Self::create_bucket). Owning `self`
    /// means no guard can be held elsewhere, so a poisoned map is recovered.
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        let buckets = match self.buckets.get_mut() {
            Ok(buckets) => buckets,
            Err(poisoned) => {
                warn!(bucket = bucket, "recovering poisoned bucket map");
                poisoned.into_inner()
            }
        };
        buckets.entry(bucket.to_string()).or_default();
        self
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.lock()?.entry(bucket.to_string()).or_default();
        Ok(())
    }

    pub fn put_bytes(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), BackendError> {
        let mut buckets = self.lock()?;
        let objects = bucket_mut(&mut buckets, bucket)?;
        objects.insert(key.to_string(), body.to_vec());
        Ok(())
    }

    pub fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError> {
        let buckets = self.lock()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket("get_object", bucket))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| no_such_key("get_object", key))
    }

    /// Makes every later backend call touching `key` fail.
    pub fn fail_on(&self, key: &str) -> Result<(), BackendError> {
        self.failing_keys
            .lock()
            .map_err(|err| BackendError::new(format!("failed to acquire guard: {}", err)))?
            .insert(key.to_string());
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Buckets>, BackendError> {
        self.buckets
            .lock()
            .map_err(|err| BackendError::new(format!("failed to acquire guard: {}", err)))
    }

    fn check_failure(&self, operation: &str, key: &str) -> Result<(), BackendError> {
        let failing = self
            .failing_keys
            .lock()
            .map_err(|err| BackendError::new(format!("failed to acquire guard: {}", err)))?;
        if failing.contains(key) {
            return Err(BackendError::new(format!(
                "failed to {} at: {}, injected failure",
                operation, key
            )));
        }
        Ok(())
    }
}

fn bucket_mut<'a>(
    buckets: &'a mut Buckets,
    bucket: &str,
) -> Result<&'a mut BTreeMap<String, Vec<u8>>, BackendError> {
    buckets
        .get_mut(bucket)
        .ok_or_else(|| no_such_bucket("access", bucket))
}

fn no_such_bucket(operation: &str, bucket: &str) -> BackendError {
    BackendError::new(format!(
        "failed to {} at: {}, NoSuchBucket: the specified bucket does not exist",
        operation, bucket
    ))
}

fn no_such_key(operation: &str, key: &str) -> BackendError {
    BackendError::new(format!(
        "failed to {} at: {}, NoSuchKey: the specified key does not exist",
        operation, key
    ))
}

fn report_chunks(progress: &mut Progress<'_>, len: usize) {
    let mut sent = 0;
    while sent < len {
        let step = CHUNK_SIZE.min(len - sent);
        progress.advance(step as u64);
        sent += step;
    }
}

impl adapters::ObjectBackend for MemoryBackend {
    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        progress: &mut Progress<'_>,
    ) -> Result<(), BackendError> {
        self.check_failure("put_object", key)?;

        let body = fs::read(source).map_err(|err| {
            BackendError::new(format!("failed to put_object at: {}, {}", key, err))
        })?;
        progress.start(Direction::Upload, bucket, key, body.len() as u64);

        let len = body.len();
        self.put_bytes(bucket, key, &body)?;
        report_chunks(progress, len);

        Ok(())
    }

    fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: &mut Progress<'_>,
    ) -> Result<(), BackendError> {
        self.check_failure("get_object", key)?;

        let body = self.get_bytes(bucket, key)?;
        progress.start(Direction::Download, bucket, key, body.len() as u64);

        fs::write(dest, &body).map_err(|err| {
            BackendError::new(format!("failed to get_object at: {}, {}", key, err))
        })?;
        report_chunks(progress, body.len());

        Ok(())
    }

    fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, BackendError> {
        let buckets = self.lock()?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket("list_objects", bucket))?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        self.check_failure("delete_object", key)?;

        let mut buckets = self.lock()?;
        bucket_mut(&mut buckets, bucket)?.remove(key);

        Ok(())
    }

    fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<(), BackendError> {
        self.check_failure("copy_object", source_key)?;

        let body = self.get_bytes(source_bucket, source_key)?;
        self.put_bytes(dest_bucket, dest_key, &body)
    }
}
