use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use apache_avro::{types::Value, Reader, Schema as AvroSchema, Writer};
use arrow::{
    array::{
        Array, ArrayRef, AsArray, BinaryBuilder, BooleanBuilder, Date32Builder, Float32Builder,
        Float64Builder, Int32Builder, Int64Builder, StringBuilder, TimestampMicrosecondBuilder,
        TimestampMillisecondBuilder,
    },
    datatypes::{
        DataType, Date32Type, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
        Int8Type, Schema, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
        UInt16Type, UInt32Type, UInt8Type,
    },
    record_batch::{RecordBatch, RecordBatchOptions},
};
use serde_json::json;

use crate::{
    formats::{require_table, Codec, FormatOptions},
    model::{
        error::{Error, Result},
        object::Object,
    },
};

/// Field attribute carrying the column name when it is not a valid avro name.
const COLUMN_NAME_ATTR: &str = "arrowColumnName";

#[derive(Clone, Debug)]
pub struct AvroOptions {
    /// Name of the top-level record in the written schema.
    pub record_name: String,
}

impl Default for AvroOptions {
    fn default() -> Self {
        Self {
            record_name: "Root".to_string(),
        }
    }
}

/// Avro object container files holding one record per table row.
///
/// Timestamps keep their instant but lose any time zone on the way back:
/// zoned columns are written as UTC `timestamp-*` and every timestamp column
/// decodes zone-naive. Column names that are not avro identifiers (spaces,
/// leading digits, empty) are written under a sanitized field name and
/// restored from a field attribute on decode.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvroCodec;

impl Codec for AvroCodec {
    fn name(&self) -> &'static str {
        "avro"
    }

    fn decode(&self, path: &Path, _options: &FormatOptions) -> Result<Object> {
        let reader = Reader::new(BufReader::new(File::open(path)?))?;

        let fields = match reader.writer_schema() {
            AvroSchema::Record(record) => record
                .fields
                .iter()
                .map(|field| {
                    let (data_type, nullable) = arrow_type(&field.name, &field.schema)?;
                    let name = field
                        .custom_attributes
                        .get(COLUMN_NAME_ATTR)
                        .and_then(|name| name.as_str())
                        .unwrap_or(field.name.as_str());
                    Ok(Field::new(name, data_type, nullable))
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(Error::Serialization(format!(
                    "avro schema must be a record, got {:?}",
                    other
                )));
            }
        };

        let mut builders = fields
            .iter()
            .map(|field| ColumnBuilder::new(field.data_type()))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = 0;
        for value in reader {
            let record = match value? {
                Value::Record(record) => record,
                other => {
                    return Err(Error::Serialization(format!(
                        "expected an avro record, got {:?}",
                        other
                    )));
                }
            };

            if record.len() != builders.len() {
                return Err(Error::Serialization(format!(
                    "avro record has {} fields, schema has {}",
                    record.len(),
                    builders.len()
                )));
            }

            for ((name, value), builder) in record.iter().zip(builders.iter_mut()) {
                builder.append(name, value)?;
            }
            rows += 1;
        }

        let columns: Vec<ArrayRef> = builders.iter_mut().map(ColumnBuilder::finish).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(rows));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)?;

        Ok(Object::Table(batch))
    }

    fn encode(&self, object: &Object, path: &Path, options: &FormatOptions) -> Result<()> {
        let batch = require_table(object, self.name())?;
        let schema_ref = batch.schema();
        let names = avro_field_names(&schema_ref);
        let schema = avro_schema(&schema_ref, &names, &options.avro.record_name)?;

        let mut writer = Writer::new(&schema, BufWriter::new(File::create(path)?));
        for row in 0..batch.num_rows() {
            let mut record = Vec::with_capacity(batch.num_columns());
            let columns = schema_ref.fields().iter().zip(batch.columns());
            for ((field, column), name) in columns.zip(&names) {
                record.push((name.clone(), avro_value(field, column, row)?));
            }
            writer.append(Value::Record(record))?;
        }

        let mut file = writer.into_inner()?;
        file.flush()?;

        Ok(())
    }
}

fn unsupported(column: &str, data_type: &DataType) -> Error {
    Error::Serialization(format!(
        "column `{}` of type {} cannot be stored as avro",
        column, data_type
    ))
}

/// `[A-Za-z_][A-Za-z0-9_]*`, with other characters replaced by `_`.
fn avro_name(column: &str) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// One unique avro field name per column.
fn avro_field_names(schema: &Schema) -> Vec<String> {
    let mut used = BTreeSet::new();
    schema
        .fields()
        .iter()
        .map(|field| {
            let base = avro_name(field.name());
            let mut name = base.clone();
            let mut suffix = 1;
            while !used.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn avro_schema(schema: &Schema, names: &[String], record_name: &str) -> Result<AvroSchema> {
    let fields = schema
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| {
            let logical = |name: &str, base: &str| json!({"type": base, "logicalType": name});

            let ty = match field.data_type() {
                DataType::Boolean => json!("boolean"),
                DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::UInt8
                | DataType::UInt16 => json!("int"),
                DataType::Int64 | DataType::UInt32 => json!("long"),
                DataType::Float32 => json!("float"),
                DataType::Float64 => json!("double"),
                DataType::Utf8 | DataType::LargeUtf8 => json!("string"),
                DataType::Binary | DataType::LargeBinary => json!("bytes"),
                DataType::Date32 => logical("date", "int"),
                DataType::Timestamp(TimeUnit::Millisecond, Some(_)) => {
                    logical("timestamp-millis", "long")
                }
                DataType::Timestamp(TimeUnit::Millisecond, None) => {
                    logical("local-timestamp-millis", "long")
                }
                DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => {
                    logical("timestamp-micros", "long")
                }
                DataType::Timestamp(TimeUnit::Microsecond, None) => {
                    logical("local-timestamp-micros", "long")
                }
                other => return Err(unsupported(field.name(), other)),
            };

            let ty = if field.is_nullable() {
                json!(["null", ty])
            } else {
                ty
            };
            let mut raw = json!({"name": name, "type": ty});
            if name != field.name() {
                raw[COLUMN_NAME_ATTR] = json!(field.name());
            }
            Ok(raw)
        })
        .collect::<Result<Vec<_>>>()?;

    let raw = json!({
        "type": "record",
        "name": record_name,
        "fields": fields,
    });

    Ok(AvroSchema::parse(&raw)?)
}

fn avro_value(field: &Field, column: &ArrayRef, row: usize) -> Result<Value> {
    if column.is_null(row) {
        return Ok(Value::Union(0, Box::new(Value::Null)));
    }

    let value = match column.data_type() {
        DataType::Boolean => Value::Boolean(column.as_boolean().value(row)),
        DataType::Int8 => Value::Int(column.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Value::Int(column.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Value::Int(column.as_primitive::<Int32Type>().value(row)),
        DataType::UInt8 => Value::Int(column.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Value::Int(column.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Value::Long(column.as_primitive::<UInt32Type>().value(row).into()),
        DataType::Int64 => Value::Long(column.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(column.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Double(column.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::String(column.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(column.as_string::<i64>().value(row).to_string()),
        DataType::Binary => Value::Bytes(column.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Bytes(column.as_binary::<i64>().value(row).to_vec()),
        DataType::Date32 => Value::Date(column.as_primitive::<Date32Type>().value(row)),
        DataType::Timestamp(TimeUnit::Millisecond, tz) => {
            let v = column.as_primitive::<TimestampMillisecondType>().value(row);
            if tz.is_some() {
                Value::TimestampMillis(v)
            } else {
                Value::LocalTimestampMillis(v)
            }
        }
        DataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let v = column.as_primitive::<TimestampMicrosecondType>().value(row);
            if tz.is_some() {
                Value::TimestampMicros(v)
            } else {
                Value::LocalTimestampMicros(v)
            }
        }
        other => return Err(unsupported(field.name(), other)),
    };

    if field.is_nullable() {
        Ok(Value::Union(1, Box::new(value)))
    } else {
        Ok(value)
    }
}

/// Arrow type and nullability for an avro field schema.
fn arrow_type(column: &str, schema: &AvroSchema) -> Result<(DataType, bool)> {
    let data_type = match schema {
        AvroSchema::Union(union) => {
            let variants = union.variants();
            let inner: Vec<&AvroSchema> = variants
                .iter()
                .filter(|variant| !matches!(variant, AvroSchema::Null))
                .collect();

            return match inner.as_slice() {
                [single] if variants.len() == 2 => Ok((arrow_type(column, single)?.0, true)),
                _ => Err(Error::Serialization(format!(
                    "column `{}` has an unsupported union type",
                    column
                ))),
            };
        }
        AvroSchema::Boolean => DataType::Boolean,
        AvroSchema::Int => DataType::Int32,
        AvroSchema::Long => DataType::Int64,
        AvroSchema::Float => DataType::Float32,
        AvroSchema::Double => DataType::Float64,
        AvroSchema::String => DataType::Utf8,
        AvroSchema::Bytes => DataType::Binary,
        AvroSchema::Date => DataType::Date32,
        AvroSchema::TimestampMillis | AvroSchema::LocalTimestampMillis => {
            DataType::Timestamp(TimeUnit::Millisecond, None)
        }
        AvroSchema::TimestampMicros | AvroSchema::LocalTimestampMicros => {
            DataType::Timestamp(TimeUnit::Microsecond, None)
        }
        other => {
            return Err(Error::Serialization(format!(
                "column `{}` has unsupported avro type {:?}",
                column, other
            )));
        }
    };

    Ok((data_type, false))
}

enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int(Int32Builder),
    Long(Int64Builder),
    Float(Float32Builder),
    Double(Float64Builder),
    String(StringBuilder),
    Bytes(BinaryBuilder),
    Date(Date32Builder),
    TimestampMillis(TimestampMillisecondBuilder),
    TimestampMicros(TimestampMicrosecondBuilder),
}

impl ColumnBuilder {
    fn new(data_type: &DataType) -> Result<Self> {
        let builder = match data_type {
            DataType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::new()),
            DataType::Int32 => ColumnBuilder::Int(Int32Builder::new()),
            DataType::Int64 => ColumnBuilder::Long(Int64Builder::new()),
            DataType::Float32 => ColumnBuilder::Float(Float32Builder::new()),
            DataType::Float64 => ColumnBuilder::Double(Float64Builder::new()),
            DataType::Utf8 => ColumnBuilder::String(StringBuilder::new()),
            DataType::Binary => ColumnBuilder::Bytes(BinaryBuilder::new()),
            DataType::Date32 => ColumnBuilder::Date(Date32Builder::new()),
            DataType::Timestamp(TimeUnit::Millisecond, None) => {
                ColumnBuilder::TimestampMillis(TimestampMillisecondBuilder::new())
            }
            DataType::Timestamp(TimeUnit::Microsecond, None) => {
                ColumnBuilder::TimestampMicros(TimestampMicrosecondBuilder::new())
            }
            other => return Err(unsupported("<decoded>", other)),
        };
        Ok(builder)
    }

    fn append(&mut self, column: &str, value: &Value) -> Result<()> {
        let value = match value {
            Value::Union(_, inner) => inner.as_ref(),
            value => value,
        };

        if let Value::Null = value {
            self.append_null();
            return Ok(());
        }

        match (self, value) {
            (ColumnBuilder::Boolean(b), Value::Boolean(v)) => b.append_value(*v),
            (ColumnBuilder::Int(b), Value::Int(v)) => b.append_value(*v),
            (ColumnBuilder::Long(b), Value::Long(v)) => b.append_value(*v),
            (ColumnBuilder::Float(b), Value::Float(v)) => b.append_value(*v),
            (ColumnBuilder::Double(b), Value::Double(v)) => b.append_value(*v),
            (ColumnBuilder::String(b), Value::String(v)) => b.append_value(v),
            (ColumnBuilder::Bytes(b), Value::Bytes(v)) => b.append_value(v),
            (ColumnBuilder::Date(b), Value::Date(v)) => b.append_value(*v),
            (
                ColumnBuilder::TimestampMillis(b),
                Value::TimestampMillis(v) | Value::LocalTimestampMillis(v),
            ) => b.append_value(*v),
            (
                ColumnBuilder::TimestampMicros(b),
                Value::TimestampMicros(v) | Value::LocalTimestampMicros(v),
            ) => b.append_value(*v),
            (_, other) => {
                return Err(Error::Serialization(format!(
                    "unexpected avro value {:?} in column `{}`",
                    other, column
                )));
            }
        }

        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::Int(b) => b.append_null(),
            ColumnBuilder::Long(b) => b.append_null(),
            ColumnBuilder::Float(b) => b.append_null(),
            ColumnBuilder::Double(b) => b.append_null(),
            ColumnBuilder::String(b) => b.append_null(),
            ColumnBuilder::Bytes(b) => b.append_null(),
            ColumnBuilder::Date(b) => b.append_null(),
            ColumnBuilder::TimestampMillis(b) => b.append_null(),
            ColumnBuilder::TimestampMicros(b) => b.append_null(),
        }
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::Int(b) => Arc::new(b.finish()),
            ColumnBuilder::Long(b) => Arc::new(b.finish()),
            ColumnBuilder::Float(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
            ColumnBuilder::String(b) => Arc::new(b.finish()),
            ColumnBuilder::Bytes(b) => Arc::new(b.finish()),
            ColumnBuilder::Date(b) => Arc::new(b.finish()),
            ColumnBuilder::TimestampMillis(b) => Arc::new(b.finish()),
            ColumnBuilder::TimestampMicros(b) => Arc::new(b.finish()),
        }
    }
}
