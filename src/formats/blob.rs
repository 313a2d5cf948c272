//! Opaque serialized objects (`.pkl` / `.pickle` keys).
//!
//! Layout: `RVPK` magic, protocol byte, kind byte, payload. Values are CBOR,
//! tables an Arrow IPC stream. Protocol 1 can only hold values.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use arrow::{
    compute::concat_batches,
    ipc::{reader::StreamReader, writer::StreamWriter},
};

use crate::{
    formats::{Codec, FormatOptions},
    model::{
        error::{Error, Result},
        object::Object,
    },
};

const MAGIC: &[u8; 4] = b"RVPK";
pub const HIGHEST_PROTOCOL: u8 = 2;

const KIND_VALUE: u8 = 0;
const KIND_TABLE: u8 = 1;

#[derive(Clone, Debug)]
pub struct BlobOptions {
    pub protocol: u8,
}

impl Default for BlobOptions {
    fn default() -> Self {
        Self {
            protocol: HIGHEST_PROTOCOL,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BlobCodec;

impl Codec for BlobCodec {
    fn name(&self) -> &'static str {
        "pickle"
    }

    fn decode(&self, path: &Path, _options: &FormatOptions) -> Result<Object> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0_u8; 6];
        reader.read_exact(&mut header).map_err(|err| {
            Error::Serialization(format!("truncated blob header: {}", err))
        })?;
        if &header[..4] != MAGIC {
            return Err(Error::Serialization(
                "not a serialized object (bad magic)".to_string(),
            ));
        }

        let protocol = header[4];
        if protocol == 0 || protocol > HIGHEST_PROTOCOL {
            return Err(Error::Serialization(format!(
                "unsupported blob protocol {}",
                protocol
            )));
        }

        match header[5] {
            KIND_VALUE => Ok(Object::Value(ciborium::from_reader(reader)?)),
            KIND_TABLE if protocol >= 2 => {
                let stream = StreamReader::try_new(reader, None)?;
                let schema = stream.schema();
                let batches = stream.collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Object::Table(concat_batches(&schema, &batches)?))
            }
            kind => Err(Error::Serialization(format!(
                "unknown object kind {} for protocol {}",
                kind, protocol
            ))),
        }
    }

    fn encode(&self, object: &Object, path: &Path, options: &FormatOptions) -> Result<()> {
        let protocol = options.blob.protocol;
        if protocol == 0 || protocol > HIGHEST_PROTOCOL {
            return Err(Error::InvalidArgument(format!(
                "blob protocol must be between 1 and {}, got {}",
                HIGHEST_PROTOCOL, protocol
            )));
        }

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;

        match object {
            Object::Value(value) => {
                writer.write_all(&[protocol, KIND_VALUE])?;
                ciborium::into_writer(value, &mut writer)?;
            }
            Object::Table(batch) => {
                if protocol < 2 {
                    return Err(Error::InvalidArgument(format!(
                        "blob protocol {} cannot store tables",
                        protocol
                    )));
                }
                writer.write_all(&[protocol, KIND_TABLE])?;
                let mut stream = StreamWriter::try_new(&mut writer, &batch.schema())?;
                stream.write(batch)?;
                stream.finish()?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::formats::tests::sample_table;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let cases = vec![
            ("value", Object::Value(serde_json::json!({"a": [1, 2.5, "x"], "b": null}))),
            ("scalar", Object::Value(serde_json::json!(-7))),
            ("table", Object::Table(sample_table())),
        ];

        for (name, object) in cases {
            let path = dir.path().join(format!("{}.pkl", name));
            BlobCodec
                .encode(&object, &path, &FormatOptions::default())
                .unwrap();
            let result = BlobCodec.decode(&path, &FormatOptions::default()).unwrap();
            assert_eq!(result, object, "failed for case: {}", name);
        }
    }

    #[test]
    fn test_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obj.pkl");

        let mut options = FormatOptions::default();
        options.blob.protocol = 1;

        let value = Object::Value(serde_json::json!(["x"]));
        BlobCodec.encode(&value, &path, &options).unwrap();
        assert_eq!(fs::read(&path).unwrap()[4], 1);
        assert_eq!(BlobCodec.decode(&path, &options).unwrap(), value);

        let table = Object::Table(sample_table());
        assert!(matches!(
            BlobCodec.encode(&table, &path, &options),
            Err(Error::InvalidArgument(_))
        ));

        options.blob.protocol = HIGHEST_PROTOCOL + 1;
        assert!(matches!(
            BlobCodec.encode(&value, &path, &options),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_decode_rejects_foreign_bytes() {
        let dir = tempfile::tempdir().unwrap();

        let cases = vec![
            ("empty", b"".to_vec()),
            ("magic", b"PK\x03\x04zz".to_vec()),
            ("protocol", b"RVPK\x09\x00".to_vec()),
            ("kind", b"RVPK\x02\x07".to_vec()),
        ];

        for (name, bytes) in cases {
            let path = dir.path().join(format!("{}.pkl", name));
            fs::write(&path, bytes).unwrap();
            let result = BlobCodec.decode(&path, &FormatOptions::default());
            assert!(
                matches!(result, Err(Error::Serialization(_))),
                "failed for case: {}",
                name
            );
        }
    }
}
