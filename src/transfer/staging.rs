use std::{fs, path::Path};

use tempfile::TempPath;
use tracing::debug;

use crate::model::error::Result;

/// A local temporary file between the backend and a codec.
///
/// No handle is kept open: the backend and the codec each open the file by
/// path. The file is removed when the value is dropped, whichever way the
/// operation ends.
#[derive(Debug)]
pub struct StagingFile {
    path: TempPath,
}

impl StagingFile {
    pub fn new(extension: &str) -> Result<Self> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        };

        let path = tempfile::Builder::new()
            .prefix("river-")
            .suffix(&suffix)
            .tempfile()?
            .into_temp_path();
        debug!(path = %path.display(), "created staging file");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let staging = StagingFile::new("csv").unwrap();
        let path = staging.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(staging.len().unwrap(), 0);
        assert_eq!(path.extension().unwrap(), "csv");

        fs::write(&path, b"a,b\n").unwrap();
        assert_eq!(staging.len().unwrap(), 4);

        drop(staging);
        assert!(!path.exists());
    }

    #[test]
    fn test_without_extension() {
        let staging = StagingFile::new("").unwrap();
        assert!(staging.path().extension().is_none());
    }
}
