use std::collections::BTreeSet;

use tracing::info;

use crate::{
    adapters::ObjectBackend,
    model::error::Result,
    util::path::{self, Strictness},
};

/// Lists keys under `prefix`, sorted and without duplicates.
///
/// Unless `recursive`, keys below the next `/` after the prefix collapse into
/// a single `folder/` entry. Unless `include_prefix`, entries are given
/// relative to the prefix's folder (everything up through its last `/`).
pub fn list_objects(
    backend: &dyn ObjectBackend,
    bucket: &str,
    prefix: &str,
    include_prefix: bool,
    recursive: bool,
) -> Result<Vec<String>> {
    let (bucket, prefix) = path::normalize(bucket, prefix, Strictness::Lenient)?;

    let keys = backend.list_keys(&bucket, &prefix)?;
    if keys.is_empty() {
        info!(bucket = bucket, prefix = prefix, "no objects found");
    }

    Ok(collapse(&prefix, keys, include_prefix, recursive))
}

fn collapse(
    prefix: &str,
    keys: Vec<String>,
    include_prefix: bool,
    recursive: bool,
) -> Vec<String> {
    let folder_len = path::parent_prefix(prefix).len();

    let entries: BTreeSet<String> = keys
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .map(|key| {
            if recursive {
                return key;
            }
            match key[prefix.len()..].find('/') {
                Some(pos) => key[..prefix.len() + pos + 1].to_string(),
                None => key,
            }
        })
        .map(|entry| {
            if include_prefix {
                entry
            } else {
                entry[folder_len..].to_string()
            }
        })
        .filter(|entry| !entry.is_empty())
        .collect();

    entries.into_iter().collect()
}

/// True only when an object with exactly this key exists.
pub fn exists(backend: &dyn ObjectBackend, bucket: &str, key: &str) -> Result<bool> {
    let (bucket, key) = path::normalize(bucket, key, Strictness::Lenient)?;
    let keys = list_objects(backend, &bucket, &key, true, true)?;
    Ok(keys.binary_search(&key).is_ok())
}
