use std::{
    fs::File,
    io::{BufWriter, Seek, Write},
    path::Path,
    sync::Arc,
};

use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder, WriterBuilder},
    datatypes::SchemaRef,
};
use tracing::debug;

use crate::{
    formats::{require_table, with_index_column, Codec, FormatOptions},
    model::{error::Result, object::Object},
};

#[derive(Clone, Debug)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    /// Write a leading row-number column.
    pub index: bool,
    /// Rows sampled for type inference; `None` scans the whole file.
    pub infer_max_records: Option<usize>,
    /// Skips inference and parses with this schema.
    pub schema: Option<SchemaRef>,
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            index: false,
            infer_max_records: None,
            schema: None,
            batch_size: 8192,
        }
    }
}

/// Delimited text with inferred column types.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvCodec;

impl Codec for CsvCodec {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn decode(&self, path: &Path, options: &FormatOptions) -> Result<Object> {
        let options = &options.csv;
        let format = Format::default()
            .with_header(options.has_header)
            .with_delimiter(options.delimiter);

        let mut file = File::open(path)?;
        let schema = match &options.schema {
            Some(schema) => schema.clone(),
            None => {
                let (schema, records) =
                    format.infer_schema(&mut file, options.infer_max_records)?;
                debug!(records = records, schema = ?schema, "inferred csv schema");
                file.rewind()?;
                Arc::new(schema)
            }
        };

        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(options.batch_size)
            .build(file)?;

        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = concat_batches(&schema, &batches)?;

        Ok(Object::Table(batch))
    }

    fn encode(&self, object: &Object, path: &Path, options: &FormatOptions) -> Result<()> {
        let batch = require_table(object, self.name())?;
        let options = &options.csv;

        let batch = if options.index {
            with_index_column(batch)?
        } else {
            batch.clone()
        };

        let mut file = BufWriter::new(File::create(path)?);
        {
            let mut writer = WriterBuilder::new()
                .with_header(options.has_header)
                .with_delimiter(options.delimiter)
                .build(&mut file);
            writer.write(&batch)?;
        }
        file.flush()?;

        Ok(())
    }
}
