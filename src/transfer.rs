//! Staging-file roundtrips between codecs and the backend.

use std::{path::Path, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    adapters::ObjectBackend,
    formats::{Codec, FormatOptions, FormatRegistry},
    model::{
        error::{Error, Result},
        object::Object,
    },
    progress::{Progress, ProgressObserver},
    util::path::{self, Strictness},
};

pub mod staging;

use self::staging::StagingFile;

pub struct TransferOrchestrator<'a> {
    backend: &'a dyn ObjectBackend,
    registry: &'a FormatRegistry,
    observer: Option<&'a dyn ProgressObserver>,
}

impl<'a> TransferOrchestrator<'a> {
    pub fn new(backend: &'a dyn ObjectBackend, registry: &'a FormatRegistry) -> Self {
        Self {
            backend,
            registry,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Encodes `object` by the key's extension and uploads it.
    ///
    /// Returns `bucket/path`, without any scheme.
    pub fn write(
        &self,
        object: &Object,
        bucket: &str,
        path: &str,
        options: &FormatOptions,
    ) -> Result<String> {
        let (bucket, path) = path::normalize(bucket, path, Strictness::Strict)?;
        let codec = self.registry.resolve_path(&path)?;
        let staging = StagingFile::new(&path::extension(&path).unwrap_or_default())?;

        info!("Writing object to staging file...");
        codec.encode(object, staging.path(), options)?;

        info!(bytes = staging.len()?, "Uploading to s3://{}/{}...", bucket, path);
        let mut progress = Progress::new(self.observer);
        self.backend
            .put_file(&bucket, &path, staging.path(), &mut progress)?;
        log_done(&progress);

        Ok(format!("{}/{}", bucket, path))
    }

    pub fn read(&self, bucket: &str, path: &str, options: &FormatOptions) -> Result<Object> {
        let (bucket, path) = path::normalize(bucket, path, Strictness::Strict)?;
        let codec = self.registry.resolve_path(&path)?;
        let token = path::extension(&path).unwrap_or_default();

        self.fetch(&bucket, &path, codec, &token, options)
    }

    /// Reads keys that break the naming rules: no path validation, and the
    /// format may be given explicitly instead of coming from the extension.
    pub fn read_unsafe(
        &self,
        bucket: &str,
        path: &str,
        format: Option<&str>,
        options: &FormatOptions,
    ) -> Result<Object> {
        warn!(
            key = path,
            "reading with the unsafe entry point, which allows inadvisable object keys; \
             use `read` so that good naming practices are followed"
        );

        let bucket = path::normalize_bucket(bucket);
        let token = match format {
            Some(format) => format.to_lowercase(),
            None => path::extension(path).unwrap_or_default(),
        };
        let codec = self.registry.resolve(&token)?;

        self.fetch(&bucket, path, codec, &token, options)
    }

    fn fetch(
        &self,
        bucket: &str,
        path: &str,
        codec: Arc<dyn Codec>,
        token: &str,
        options: &FormatOptions,
    ) -> Result<Object> {
        let staging = StagingFile::new(token)?;

        info!("Downloading from s3://{}/{}...", bucket, path);
        let mut progress = Progress::new(self.observer);
        self.backend
            .get_to_file(bucket, path, staging.path(), &mut progress)?;
        log_done(&progress);

        info!("Reading object from staging file...");
        codec.decode(staging.path(), options)
    }

    /// Copies the object's bytes to `local_file_path` without decoding them.
    pub fn download_file(&self, bucket: &str, path: &str, local_file_path: &Path) -> Result<()> {
        if local_file_path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "a local file path must be provided".to_string(),
            ));
        }
        let (bucket, path) = path::normalize(bucket, path, Strictness::Lenient)?;

        info!("Downloading from s3://{}/{}...", bucket, path);
        let mut progress = Progress::new(self.observer);
        self.backend
            .get_to_file(&bucket, &path, local_file_path, &mut progress)?;
        log_done(&progress);

        Ok(())
    }

    /// Uploads the bytes of `local_file_path` as-is.
    pub fn upload_file(&self, local_file_path: &Path, bucket: &str, path: &str) -> Result<()> {
        if local_file_path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "a local file location must be provided".to_string(),
            ));
        }
        let (bucket, path) = path::normalize(bucket, path, Strictness::Lenient)?;

        info!("Uploading to s3://{}/{}...", bucket, path);
        let mut progress = Progress::new(self.observer);
        self.backend
            .put_file(&bucket, &path, local_file_path, &mut progress)?;
        log_done(&progress);

        Ok(())
    }
}

fn log_done(progress: &Progress<'_>) {
    debug!(
        transferred_bytes = progress.transferred(),
        total_bytes = progress.total(),
        "transfer complete"
    );
}
