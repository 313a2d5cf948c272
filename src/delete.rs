use tracing::{info, warn};

use crate::{
    adapters::ObjectBackend,
    listing,
    model::error::{Error, Result, UnsafeOperation},
    util::path::{self, Strictness},
};

/// Deletes every key starting with `path` and returns the deleted keys.
///
/// Refuses an empty path outright, and refuses to delete more than one key
/// unless `recursive` is set. Deletes are issued one at a time with no
/// rollback: if one fails, the keys before it stay deleted.
pub fn delete(
    backend: &dyn ObjectBackend,
    bucket: &str,
    path: &str,
    recursive: bool,
) -> Result<Vec<String>> {
    let (bucket, path) = path::normalize(bucket, path, Strictness::Lenient)?;
    if path.is_empty() {
        return Err(Error::UnsafeOperation(UnsafeOperation::EmptyPath));
    }

    let keys = listing::list_objects(backend, &bucket, &path, true, true)?;
    if keys.is_empty() {
        info!(bucket = bucket, key = path, "no matching objects to delete");
        return Ok(keys);
    }

    if keys.len() > 1 && !recursive {
        return Err(Error::UnsafeOperation(UnsafeOperation::AmbiguousDelete {
            path,
            matches: keys.len(),
        }));
    }

    for (deleted, key) in keys.iter().enumerate() {
        if let Err(err) = backend.delete_object(&bucket, key) {
            warn!(
                bucket = bucket,
                key = key,
                deleted = deleted,
                remaining = keys.len() - deleted,
                error_message = %err,
                error_group = "delete_object",
                "delete aborted part way"
            );
            return Err(err.into());
        }
        info!(bucket = bucket, key = key, "deleted");
    }

    Ok(keys)
}
