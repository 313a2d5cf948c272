use std::{path::Path, sync::Arc};

use arrow::record_batch::RecordBatch;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, span, Level};

use crate::{
    adapters::{s3::S3Backend, ObjectBackend},
    config::Config,
    copy,
    delete,
    formats::{FormatOptions, FormatRegistry},
    listing,
    model::{
        error::{Error, Result},
        object::Object,
    },
    progress::ProgressObserver,
    transfer::TransferOrchestrator,
};

/// Entry point: path-safe reads, writes, listings, copies and deletes against
/// one storage backend.
///
/// Every operation taking `bucket: Option<&str>` falls back to
/// [`Config::default_bucket`] when it is `None`.
pub struct River {
    backend: Arc<dyn ObjectBackend>,
    config: Config,
    registry: FormatRegistry,
    options: FormatOptions,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl River {
    pub fn new(backend: Arc<dyn ObjectBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            registry: FormatRegistry::builtin(),
            options: FormatOptions::default(),
            observer: None,
        }
    }

    /// Connects to S3 (or the configured S3-compatible endpoint).
    pub fn from_config(config: Config) -> Result<Self> {
        let backend = S3Backend::from_config(&config)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Codec defaults used by [`read`](Self::read) and [`write`](Self::write).
    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supported_formats(&self) -> Vec<String> {
        self.registry.tokens()
    }

    fn transfer(&self) -> TransferOrchestrator<'_> {
        TransferOrchestrator::new(self.backend.as_ref(), &self.registry)
            .with_observer(self.observer.as_deref())
    }

    pub fn read(&self, path: &str, bucket: Option<&str>) -> Result<Object> {
        self.read_with(path, bucket, &self.options)
    }

    pub fn read_with(
        &self,
        path: &str,
        bucket: Option<&str>,
        options: &FormatOptions,
    ) -> Result<Object> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, "called");

        self.transfer().read(&bucket, path, options)
    }

    /// Reads a tabular object; a stored serde value is a type mismatch.
    pub fn read_table(&self, path: &str, bucket: Option<&str>) -> Result<RecordBatch> {
        match self.read(path, bucket)? {
            Object::Table(batch) => Ok(batch),
            Object::Value(_) => Err(Error::TypeMismatch {
                format: "table".to_string(),
            }),
        }
    }

    pub fn read_value<T: DeserializeOwned>(&self, path: &str, bucket: Option<&str>) -> Result<T> {
        self.read(path, bucket)?.into_value()
    }

    /// Reads an object whose key breaks the naming rules.
    ///
    /// Skips path validation; `format` replaces the extension lookup when
    /// given. Meant for data produced by others, not for new keys.
    pub fn read_unsafe(
        &self,
        path: &str,
        bucket: Option<&str>,
        format: Option<&str>,
        options: Option<&FormatOptions>,
    ) -> Result<Object> {
        let span = span!(Level::INFO, "read_unsafe", context = "read_unsafe");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, format = format, "called");

        self.transfer()
            .read_unsafe(&bucket, path, format, options.unwrap_or(&self.options))
    }

    /// Stores `object` under `path`, encoded by its extension.
    /// Returns `bucket/path`.
    pub fn write(&self, object: &Object, path: &str, bucket: Option<&str>) -> Result<String> {
        self.write_with(object, path, bucket, &self.options)
    }

    pub fn write_with(
        &self,
        object: &Object,
        path: &str,
        bucket: Option<&str>,
        options: &FormatOptions,
    ) -> Result<String> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, kind = object.kind(), "called");

        self.transfer().write(object, &bucket, path, options)
    }

    pub fn write_value<T: Serialize>(
        &self,
        value: &T,
        path: &str,
        bucket: Option<&str>,
    ) -> Result<String> {
        self.write(&Object::from_value(value)?, path, bucket)
    }

    pub fn download_file(
        &self,
        path: &str,
        bucket: Option<&str>,
        local_file_path: &Path,
    ) -> Result<()> {
        let span = span!(Level::INFO, "download_file", context = "download_file");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, local = %local_file_path.display(), "called");

        self.transfer().download_file(&bucket, path, local_file_path)
    }

    pub fn upload_file(
        &self,
        local_file_path: &Path,
        path: &str,
        bucket: Option<&str>,
    ) -> Result<()> {
        let span = span!(Level::INFO, "upload_file", context = "upload_file");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, local = %local_file_path.display(), "called");

        self.transfer().upload_file(local_file_path, &bucket, path)
    }

    pub fn list_objects(
        &self,
        prefix: &str,
        bucket: Option<&str>,
        include_prefix: bool,
        recursive: bool,
    ) -> Result<Vec<String>> {
        let span = span!(Level::INFO, "list_objects", context = "list_objects");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(
            bucket = bucket,
            prefix = prefix,
            include_prefix = include_prefix,
            recursive = recursive,
            "called"
        );

        listing::list_objects(
            self.backend.as_ref(),
            &bucket,
            prefix,
            include_prefix,
            recursive,
        )
    }

    pub fn exists(&self, path: &str, bucket: Option<&str>) -> Result<bool> {
        let span = span!(Level::INFO, "exists", context = "exists");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, "called");

        listing::exists(self.backend.as_ref(), &bucket, path)
    }

    /// Copies one object server-side. Returns the destination as `bucket/key`.
    pub fn copy(
        &self,
        source_path: &str,
        dest_path: &str,
        source_bucket: Option<&str>,
        dest_bucket: Option<&str>,
    ) -> Result<String> {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();

        let source_bucket = self.config.resolve_bucket(source_bucket)?;
        let dest_bucket = self.config.resolve_bucket(dest_bucket)?;
        info!(
            source_bucket = source_bucket,
            source_key = source_path,
            dest_bucket = dest_bucket,
            dest_key = dest_path,
            "called"
        );

        copy::copy(
            self.backend.as_ref(),
            &source_bucket,
            source_path,
            &dest_bucket,
            dest_path,
        )
    }

    pub fn delete(&self, path: &str, bucket: Option<&str>, recursive: bool) -> Result<Vec<String>> {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();

        let bucket = self.config.resolve_bucket(bucket)?;
        info!(bucket = bucket, key = path, recursive = recursive, "called");

        delete::delete(self.backend.as_ref(), &bucket, path, recursive)
    }
}
