//! Path-safe object storage access with extension-driven encoding.
//!
//! ```no_run
//! use river::{Config, Object, River};
//!
//! # fn main() -> river::Result<()> {
//! let river = River::from_config(Config::from_env()?)?;
//! let table = river.read_table("reports/2024.parquet", None)?;
//! river.write(&Object::Table(table), "reports/2024.csv", None)?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod client;
pub mod config;
pub mod copy;
pub mod delete;
pub mod formats;
pub mod listing;
pub mod model;
pub mod progress;
pub mod transfer;
pub mod util;

pub use crate::{
    adapters::{memory::MemoryBackend, s3::S3Backend, ObjectBackend},
    client::River,
    config::Config,
    formats::{Codec, FormatOptions, FormatRegistry},
    model::{
        error::{BackendError, Error, Result, UnsafeOperation},
        object::Object,
    },
    progress::{ProgressObserver, TracingObserver},
};
