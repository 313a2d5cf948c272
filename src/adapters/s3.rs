use std::path::Path;

use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::{fs::File, io::AsyncWriteExt, runtime::Runtime};
use tracing::debug;

use crate::{
    adapters,
    config::Config,
    model::error::{BackendError, Result},
    progress::{Direction, Progress},
    util,
};

/// Characters left as-is in the `x-amz-copy-source` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Blocking adapter over the AWS SDK client.
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    runtime: Runtime,
}

impl S3Backend {
    pub fn new(client: aws_sdk_s3::Client, runtime: Runtime) -> Self {
        Self { client, runtime }
    }

    /// Loads credentials and region through the standard AWS provider chain,
    /// then applies the endpoint overrides from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let runtime = util::poll::new_runtime()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = util::poll::poll_until_ready(&runtime, loader.load());

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Ok(Self::new(client, runtime))
    }
}

fn backend_error<E>(operation: &str, key: &str, err: E) -> BackendError
where
    E: std::error::Error + 'static,
{
    BackendError::new(format!(
        "failed to {} at: {}, {}",
        operation,
        key,
        DisplayErrorContext(&err)
    ))
}

impl adapters::ObjectBackend for S3Backend {
    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        progress: &mut Progress<'_>,
    ) -> std::result::Result<(), BackendError> {
        let size = std::fs::metadata(source)
            .map_err(|err| backend_error("put_object", key, err))?
            .len();
        progress.start(Direction::Upload, bucket, key, size);

        util::poll::poll_until_ready(&self.runtime, async {
            let body = ByteStream::from_path(source)
                .await
                .map_err(|err| backend_error("put_object", key, err))?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_length(size as i64)
                .body(body)
                .send()
                .await
                .map_err(|err| backend_error("put_object", key, err))?;

            Ok::<(), BackendError>(())
        })?;

        progress.advance(size);
        debug!(bucket = bucket, key = key, bytes = size, "put_object");

        Ok(())
    }

    fn get_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        progress: &mut Progress<'_>,
    ) -> std::result::Result<(), BackendError> {
        util::poll::poll_until_ready(&self.runtime, async {
            let mut output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| backend_error("get_object", key, err))?;

            let total = output.content_length().unwrap_or(0).max(0) as u64;
            progress.start(Direction::Download, bucket, key, total);

            let mut file = File::create(dest)
                .await
                .map_err(|err| backend_error("get_object", key, err))?;

            while let Some(chunk) = output
                .body
                .try_next()
                .await
                .map_err(|err| backend_error("collect body", key, err))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|err| backend_error("get_object", key, err))?;
                progress.advance(chunk.len() as u64);
            }

            file.flush()
                .await
                .map_err(|err| backend_error("get_object", key, err))?;

            Ok(())
        })
    }

    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> std::result::Result<Vec<String>, BackendError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);

            if let Some(tok) = continuation_token {
                req = req.continuation_token(tok);
            }

            let lo = util::poll::poll_until_ready(&self.runtime, req.send())
                .map_err(|err| backend_error("list_objects", prefix, err))?;

            keys.extend(
                lo.contents()
                    .iter()
                    .filter_map(|o| o.key())
                    .map(|key| key.to_string()),
            );

            continuation_token = lo.next_continuation_token().map(|tok| tok.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> std::result::Result<(), BackendError> {
        let req = self.client.delete_object().bucket(bucket).key(key);

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| backend_error("delete_object", key, err))?;

        Ok(())
    }

    fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> std::result::Result<(), BackendError> {
        let copy_source = format!(
            "{}/{}",
            source_bucket,
            utf8_percent_encode(source_key, COPY_SOURCE)
        );
        let req = self
            .client
            .copy_object()
            .copy_source(copy_source)
            .bucket(dest_bucket)
            .key(dest_key);

        util::poll::poll_until_ready(&self.runtime, req.send())
            .map_err(|err| backend_error("copy_object", source_key, err))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encoding() {
        let cases = vec![
            ("folder/file.csv", "folder/file.csv"),
            ("folder/my file.csv", "folder/my%20file.csv"),
            ("a+b/c~d_e-f.pq", "a%2Bb/c~d_e-f.pq"),
        ];

        for (input, expected) in cases {
            let result = utf8_percent_encode(input, COPY_SOURCE).to_string();
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_backend_error_message() {
        let err = backend_error(
            "get_object",
            "folder/file.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.message.starts_with("failed to get_object at: folder/file.csv, "));
        assert!(err.message.contains("missing"));
    }
}
