use tracing::info;

use crate::{
    adapters::ObjectBackend,
    model::error::Result,
    util::path::{self, Strictness},
};

/// Server-side copy of one object; nothing is staged locally.
///
/// A destination ending in `/` is a folder: the source's file name is kept.
/// Returns the destination as `bucket/key`.
pub fn copy(
    backend: &dyn ObjectBackend,
    source_bucket: &str,
    source_path: &str,
    dest_bucket: &str,
    dest_path: &str,
) -> Result<String> {
    let (source_bucket, source_path) =
        path::normalize(source_bucket, source_path, Strictness::Strict)?;

    let dest_path = if dest_path.is_empty() || dest_path.ends_with('/') {
        path::join(dest_path, path::file_name(&source_path))
    } else {
        dest_path.to_string()
    };
    let (dest_bucket, dest_path) = path::normalize(dest_bucket, &dest_path, Strictness::Strict)?;

    info!(
        "Copying s3://{}/{} to s3://{}/{}...",
        source_bucket, source_path, dest_bucket, dest_path
    );
    backend.copy_object(&source_bucket, &source_path, &dest_bucket, &dest_path)?;

    Ok(format!("{}/{}", dest_bucket, dest_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{adapters::memory::MemoryBackend, model::error::Error};

    #[test]
    fn test_copy() {
        let backend = MemoryBackend::new().with_bucket("src").with_bucket("dst");
        backend.put_bytes("src", "folder/a.csv", b"x\n1\n").unwrap();

        // (dest_bucket, dest_path, expected)
        let cases = vec![
            ("src", "folder/b.csv", "src/folder/b.csv"),
            ("dst", "folder/a.csv", "dst/folder/a.csv"),
            ("s3://dst", "archive/", "dst/archive/a.csv"),
            ("dst", "", "dst/a.csv"),
        ];

        for (dest_bucket, dest_path, expected) in cases {
            let result = copy(&backend, "s3://src", "folder/a.csv", dest_bucket, dest_path).unwrap();
            assert_eq!(result, expected, "failed for case: {}", dest_path);

            let (bucket, key) = expected.split_once('/').unwrap();
            assert_eq!(backend.get_bytes(bucket, key).unwrap(), b"x\n1\n");
        }

        assert_eq!(backend.get_bytes("src", "folder/a.csv").unwrap(), b"x\n1\n");
    }

    #[test]
    fn test_copy_invalid_paths() {
        let backend = MemoryBackend::new().with_bucket("src");
        backend.put_bytes("src", "a.csv", b"").unwrap();

        let cases = vec![
            ("a//b.csv", "b.csv"),
            ("a.csv", "b//c.csv"),
            ("a.csv", "../b.csv"),
            ("a.csv", "noext"),
        ];

        for (source, dest) in cases {
            let result = copy(&backend, "src", source, "src", dest);
            assert!(
                matches!(result, Err(Error::InvalidPath { .. })),
                "failed for case: {} -> {}",
                source,
                dest
            );
        }
    }

    #[test]
    fn test_copy_missing_source() {
        let backend = MemoryBackend::new().with_bucket("src");
        let result = copy(&backend, "src", "missing.csv", "src", "b.csv");
        assert!(matches!(result, Err(Error::Backend(_))));
    }
}
