//! Extension-keyed codecs.
//!
//! A codec never sees network bytes: it encodes into, or decodes from, a
//! staged local file that it opens itself by path. Formats whose readers need
//! a fully written and closed file (the blob and avro formats) rely on this.

use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use crate::{
    model::{
        error::{Error, Result},
        object::Object,
    },
    util::path,
};

pub mod avro;
pub mod blob;
pub mod csv;
pub mod parquet;

pub use self::{
    avro::{AvroCodec, AvroOptions},
    blob::{BlobCodec, BlobOptions},
    csv::{CsvCodec, CsvOptions},
    parquet::{ParquetCodec, ParquetOptions},
};

/// Per-call overrides of each codec's defaults.
#[derive(Clone, Debug, Default)]
pub struct FormatOptions {
    pub csv: CsvOptions,
    pub parquet: ParquetOptions,
    pub avro: AvroOptions,
    pub blob: BlobOptions,
}

pub trait Codec: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &'static str;

    fn decode(&self, path: &Path, options: &FormatOptions) -> Result<Object>;

    fn encode(&self, object: &Object, path: &Path, options: &FormatOptions) -> Result<()>;
}

/// Immutable mapping from extension token to codec.
#[derive(Clone)]
pub struct FormatRegistry {
    codecs: BTreeMap<String, Arc<dyn Codec>>,
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let csv: Arc<dyn Codec> = Arc::new(CsvCodec);
        let blob: Arc<dyn Codec> = Arc::new(BlobCodec);
        let parquet: Arc<dyn Codec> = Arc::new(ParquetCodec);
        let avro: Arc<dyn Codec> = Arc::new(AvroCodec);

        Self::empty()
            .with_codec("avro", avro)
            .with_codec("csv", csv)
            .with_codec("pickle", blob.clone())
            .with_codec("pkl", blob)
            .with_codec("pq", parquet.clone())
            .with_codec("parquet", parquet)
    }

    /// Registers `codec` under `token`, replacing any previous entry.
    pub fn with_codec(mut self, token: &str, codec: Arc<dyn Codec>) -> Self {
        self.codecs.insert(token.to_lowercase(), codec);
        self
    }

    pub fn resolve(&self, token: &str) -> Result<Arc<dyn Codec>> {
        self.codecs
            .get(&token.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnsupportedFormat(token.to_string()))
    }

    /// Resolves the codec for a key from its file extension.
    pub fn resolve_path(&self, key: &str) -> Result<Arc<dyn Codec>> {
        match path::extension(key) {
            Some(token) => self.resolve(&token),
            None => Err(Error::UnsupportedFormat(String::new())),
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.codecs.keys().cloned().collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.codecs.iter().map(|(token, codec)| (token, codec.name())))
            .finish()
    }
}

/// Borrows the table out of `object`, or fails with a type mismatch naming `format`.
pub(crate) fn require_table<'a>(
    object: &'a Object,
    format: &str,
) -> Result<&'a arrow::record_batch::RecordBatch> {
    object.as_table().ok_or_else(|| Error::TypeMismatch {
        format: format.to_string(),
    })
}

/// Prepends an unnamed row-number column, the way a dataframe index is written out.
pub(crate) fn with_index_column(
    batch: &arrow::record_batch::RecordBatch,
) -> Result<arrow::record_batch::RecordBatch> {
    use arrow::{
        array::{ArrayRef, Int64Array},
        datatypes::{DataType, Field, Schema},
        record_batch::RecordBatch,
    };

    let index: ArrayRef = Arc::new(Int64Array::from_iter_values(0..batch.num_rows() as i64));

    let mut fields = vec![Arc::new(Field::new("", DataType::Int64, false))];
    fields.extend(batch.schema().fields().iter().cloned());
    let schema = Schema::new_with_metadata(fields, batch.schema().metadata().clone());

    let mut columns = vec![index];
    columns.extend(batch.columns().iter().cloned());

    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}
