use std::path::Path;

use crate::{model::error::BackendError, progress::Progress};

pub mod memory;
pub mod s3;

/// The storage primitives everything else is built on.
///
/// Implementations block until the call completes and report failures as an
/// opaque [`BackendError`]; nothing above this trait retries.
pub trait ObjectBackend: Send + Sync {
    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        progress: &mut Progress<'_>,
    ) -> Result<(), BackendError>;

    fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: &mut Progress<'_>,
    ) -> Result<(), BackendError>;

    /// Every key starting with `prefix`, across all result pages.
    fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, BackendError>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError>;

    fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<(), BackendError>;
}
