//! Bucket and key normalization.
//!
//! Every key that reaches the backend passes through here first. Strict mode
//! additionally requires the object to be self-describing through its file
//! extension, which is what the format registry dispatches on.

use crate::model::error::{Error, Result};

const S3_SCHEME: &str = "s3://";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strictness {
    /// Rejects `//`, `..`, missing or misplaced extensions.
    Strict,
    /// Rejects `//` and `..` only; used for prefixes and raw transfers.
    Lenient,
}

pub fn normalize_bucket(bucket: &str) -> String {
    bucket.strip_prefix(S3_SCHEME).unwrap_or(bucket).to_string()
}

pub fn normalize_path(path: &str, strictness: Strictness) -> Result<String> {
    if path.contains("//") {
        return Err(Error::invalid_path(
            path,
            "double forward slashes ('//') are not permitted; use `read_unsafe` if reading such an object is necessary",
        ));
    }

    if path.contains("..") {
        return Err(Error::invalid_path(path, "'..' is not permitted"));
    }

    if strictness == Strictness::Strict {
        let (folder, filename) = match path.rfind('/') {
            Some(pos) => (&path[..pos], &path[pos + 1..]),
            None => ("", path),
        };

        if folder.contains('.') {
            return Err(Error::invalid_path(
                path,
                "periods are only permitted in the file extension",
            ));
        }

        match filename.rfind('.') {
            None => {
                return Err(Error::invalid_path(path, "missing file extension"));
            }
            Some(pos) if pos + 1 == filename.len() => {
                return Err(Error::invalid_path(path, "empty file extension"));
            }
            Some(_) => {}
        }
    }

    Ok(path.to_string())
}

pub fn normalize(bucket: &str, path: &str, strictness: Strictness) -> Result<(String, String)> {
    let path = normalize_path(path, strictness)?;
    Ok((normalize_bucket(bucket), path))
}

/// Joins a folder and a filename, adding the separating `/` when missing.
pub fn join(folder: &str, filename: &str) -> String {
    if folder.is_empty() || folder.ends_with('/') {
        format!("{}{}", folder, filename)
    } else {
        format!("{}/{}", folder, filename)
    }
}

/// Lower-cased extension of the final path segment.
pub fn extension(path: &str) -> Option<String> {
    let filename = file_name(path);
    match filename.rfind('.') {
        Some(pos) if pos + 1 < filename.len() => Some(filename[pos + 1..].to_lowercase()),
        _ => None,
    }
}

pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Everything up to and including the last `/`, or `""` for top-level keys.
pub fn parent_prefix(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..=pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bucket() {
        let cases = vec![
            ("s3://bucket", "bucket"),
            ("bucket", "bucket"),
            ("s3://", ""),
            ("gs://bucket", "gs://bucket"),
            ("bucket/s3://", "bucket/s3://"),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_bucket(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_normalize_path_strict() {
        let cases = vec![
            ("file.csv", true),
            ("folder/file.csv", true),
            ("folder/sub/file.tar.gz", true),
            ("folder//file.csv", false),
            ("//file.csv", false),
            ("folder/../file.csv", false),
            ("file..csv", false),
            ("folder/file", false),
            ("file", false),
            ("file.", false),
            ("folder.v1/file.csv", false),
            ("folder/", false),
            ("", false),
        ];

        for (input, ok) in cases {
            let result = normalize_path(input, Strictness::Strict);
            assert_eq!(result.is_ok(), ok, "failed for case: {}", input);
            if let Err(err) = result {
                assert!(
                    matches!(err, Error::InvalidPath { .. }),
                    "unexpected error for case: {}",
                    input
                );
            }
        }
    }

    #[test]
    fn test_normalize_path_lenient() {
        let cases = vec![
            ("", true),
            ("folder/", true),
            ("folder/file", true),
            ("folder.v1/file", true),
            ("folder//file", false),
            ("../file.csv", false),
        ];

        for (input, ok) in cases {
            let result = normalize_path(input, Strictness::Lenient);
            assert_eq!(result.is_ok(), ok, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_normalize() {
        let (bucket, path) = normalize("s3://bucket", "folder/file.pq", Strictness::Strict).unwrap();
        assert_eq!(bucket, "bucket");
        assert_eq!(path, "folder/file.pq");

        assert!(normalize("s3://bucket", "folder//file.pq", Strictness::Strict).is_err());
    }

    #[test]
    fn test_join() {
        let cases = vec![
            ("", "file.csv", "file.csv"),
            ("folder", "file.csv", "folder/file.csv"),
            ("folder/", "file.csv", "folder/file.csv"),
            ("folder/sub", "file.csv", "folder/sub/file.csv"),
        ];

        for (folder, filename, expected) in cases {
            assert_eq!(join(folder, filename), expected, "failed for case: {}", folder);
        }
    }

    #[test]
    fn test_extension() {
        let cases = vec![
            ("file.csv", Some("csv".to_string())),
            ("folder/FILE.PQ", Some("pq".to_string())),
            ("folder/archive.tar.gz", Some("gz".to_string())),
            ("folder.v1/file", None),
            ("file.", None),
            ("file", None),
        ];

        for (input, expected) in cases {
            assert_eq!(extension(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_parent_prefix() {
        let cases = vec![
            ("folder/file.csv", "folder/"),
            ("folder/sub/file.csv", "folder/sub/"),
            ("file.csv", ""),
            ("folder/", "folder/"),
        ];

        for (input, expected) in cases {
            assert_eq!(parent_prefix(input), expected, "failed for case: {}", input);
            assert_eq!(
                format!("{}{}", parent_prefix(input), file_name(input)),
                input,
                "failed to rebuild case: {}",
                input
            );
        }
    }
}
