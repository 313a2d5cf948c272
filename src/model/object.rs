use arrow::record_batch::RecordBatch;
use serde::{de::DeserializeOwned, Serialize};

use crate::model::error::{Error, Result};

/// An in-memory value moving in or out of the object store.
///
/// Tabular formats (csv, parquet, avro) only accept [`Object::Table`];
/// the blob format accepts either variant and hands back the one it stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    Table(RecordBatch),
    Value(serde_json::Value),
}

impl Object {
    /// Serializes any value into an [`Object::Value`].
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Object::Value(serde_json::to_value(value)?))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Object::Table(_) => "table",
            Object::Value(_) => "value",
        }
    }

    pub fn as_table(&self) -> Option<&RecordBatch> {
        match self {
            Object::Table(batch) => Some(batch),
            Object::Value(_) => None,
        }
    }

    pub fn into_table(self) -> Option<RecordBatch> {
        match self {
            Object::Table(batch) => Some(batch),
            Object::Value(_) => None,
        }
    }

    /// Deserializes the stored value into `T`.
    ///
    /// Tables are not serde values and fail with [`Error::Serialization`].
    pub fn into_value<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Object::Value(value) => Ok(serde_json::from_value(value)?),
            Object::Table(_) => Err(Error::Serialization(
                "object holds a table, not a serialized value".to_string(),
            )),
        }
    }
}

impl From<RecordBatch> for Object {
    fn from(batch: RecordBatch) -> Self {
        Object::Table(batch)
    }
}

impl From<serde_json::Value> for Object {
    fn from(value: serde_json::Value) -> Self {
        Object::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use arrow::{
        array::Int64Array,
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    #[test]
    fn test_value_roundtrip() {
        let mut scores = BTreeMap::new();
        scores.insert("alice".to_string(), 3_u32);
        scores.insert("bob".to_string(), 5_u32);

        let object = Object::from_value(&scores).unwrap();
        assert_eq!(object.kind(), "value");

        let result: BTreeMap<String, u32> = object.into_value().unwrap();
        assert_eq!(result, scores);
    }

    #[test]
    fn test_table_accessors() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();

        let object = Object::from(batch.clone());
        assert_eq!(object.kind(), "table");
        assert_eq!(object.as_table(), Some(&batch));
        assert!(object.clone().into_value::<u32>().is_err());
        assert_eq!(object.into_table(), Some(batch));
    }
}
