use std::{fs::File, path::Path};

use arrow::compute::concat_batches;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use tracing::debug;

use crate::{
    formats::{require_table, with_index_column, Codec, FormatOptions},
    model::{error::Result, object::Object},
};

#[derive(Clone, Debug)]
pub struct ParquetOptions {
    pub compression: Compression,
    /// Write a leading row-number column.
    pub index: bool,
    pub max_row_group_size: usize,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            index: false,
            max_row_group_size: 1024 * 1024,
        }
    }
}

/// Columnar binary tables through the Arrow bridge of the `parquet` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParquetCodec;

impl Codec for ParquetCodec {
    fn name(&self) -> &'static str {
        "parquet"
    }

    fn decode(&self, path: &Path, _options: &FormatOptions) -> Result<Object> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let metadata = builder.metadata();
        debug!(
            row_groups = metadata.num_row_groups(),
            rows = metadata.file_metadata().num_rows(),
            "reading parquet"
        );

        let schema = builder.schema().clone();
        let reader = builder.build()?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Object::Table(concat_batches(&schema, &batches)?))
    }

    fn encode(&self, object: &Object, path: &Path, options: &FormatOptions) -> Result<()> {
        let batch = require_table(object, self.name())?;
        let options = &options.parquet;

        let batch = if options.index {
            with_index_column(batch)?
        } else {
            batch.clone()
        };

        let properties = WriterProperties::builder()
            .set_compression(options.compression)
            .set_max_row_group_size(options.max_row_group_size)
            .build();

        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(properties))?;
        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }
}
