use std::env;

use crate::{
    model::error::{Error, Result},
    util::path,
};

pub const DEFAULT_BUCKET_VAR: &str = "RV_DEFAULT_S3_BUCKET";
pub const ENDPOINT_URL_VAR: &str = "RV_S3_ENDPOINT_URL";
pub const REGION_VAR: &str = "RV_S3_REGION";
pub const FORCE_PATH_STYLE_VAR: &str = "RV_S3_FORCE_PATH_STYLE";

/// Process configuration, read once and injected into [`River`](crate::River).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub default_bucket: Option<String>,
    /// Endpoint of an S3-compatible service (MinIO, LocalStack, ...).
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    pub force_path_style: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let force_path_style = match non_empty(FORCE_PATH_STYLE_VAR) {
            None => false,
            Some(value) => parse_bool(&value).ok_or_else(|| {
                Error::Config(format!(
                    "{} must be a boolean, got `{}`",
                    FORCE_PATH_STYLE_VAR, value
                ))
            })?,
        };

        Ok(Self {
            default_bucket: non_empty(DEFAULT_BUCKET_VAR),
            endpoint_url: non_empty(ENDPOINT_URL_VAR),
            region: non_empty(REGION_VAR),
            force_path_style,
        })
    }

    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// The caller's bucket if given, otherwise the configured default, without any `s3://`.
    pub fn resolve_bucket(&self, bucket: Option<&str>) -> Result<String> {
        match bucket.or(self.default_bucket.as_deref()) {
            Some(bucket) => Ok(path::normalize_bucket(bucket)),
            None => Err(Error::InvalidArgument(format!(
                "no bucket provided and {} is not set",
                DEFAULT_BUCKET_VAR
            ))),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            (DEFAULT_BUCKET_VAR, "s3://data-lake"),
            (ENDPOINT_URL_VAR, "http://localhost:9000"),
            (FORCE_PATH_STYLE_VAR, "true"),
        ]))
        .unwrap();

        assert_eq!(config.default_bucket.as_deref(), Some("s3://data-lake"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region, None);
        assert!(config.force_path_style);
    }

    #[test]
    fn test_from_lookup_empty() {
        let config = Config::from_lookup(lookup(&[(DEFAULT_BUCKET_VAR, "  ")])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_lookup_bad_bool() {
        let result = Config::from_lookup(lookup(&[(FORCE_PATH_STYLE_VAR, "maybe")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_bucket() {
        let config = Config::default().with_default_bucket("s3://default");

        let cases = vec![
            (None, "default"),
            (Some("other"), "other"),
            (Some("s3://other"), "other"),
        ];

        for (input, expected) in cases {
            assert_eq!(
                config.resolve_bucket(input).unwrap(),
                expected,
                "failed for case: {:?}",
                input
            );
        }

        assert!(matches!(
            Config::default().resolve_bucket(None),
            Err(Error::InvalidArgument(_))
        ));
    }
}
