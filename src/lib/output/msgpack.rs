use crate::error::Error;
use crate::filter::FieldValue;
use crate::output::Output;
use crate::record::AssembledRecord;
use rmp::encode::buffer::ByteBuf;
use rmp::encode::{write_f64, write_map_len, write_sint, write_str, write_uint, ValueWriteError};
use std::collections::BTreeMap;
use std::convert::Infallible;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// MessagePack output, one map per record
pub struct MessagePack;

impl Output for MessagePack {
    async fn write<T: AsyncWrite + Unpin>(
        &self,
        writer: &mut T,
        records: &[AssembledRecord],
    ) -> Result<(), Error> {
        let mut buffer = ByteBuf::with_capacity(4096);

        for record in records {
            write_record(&mut buffer, record)?;
        }

        writer.write_all(buffer.as_slice()).await?;
        Ok(())
    }
}

impl From<ValueWriteError<Infallible>> for Error {
    fn from(_value: ValueWriteError<Infallible>) -> Self {
        Error::OutputError
    }
}

fn map_len(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| Error::OutputError)
}

fn write_record(buffer: &mut ByteBuf, record: &AssembledRecord) -> Result<(), Error> {
    write_map_len(buffer, 4)?;
    write_str(buffer, "measurement")?;
    write_str(buffer, &record.measurement)?;

    write_str(buffer, "tags")?;
    write_map_len(buffer, map_len(record.tags.len())?)?;
    for (key, value) in &record.tags {
        write_str(buffer, key)?;
        write_str(buffer, value)?;
    }

    write_str(buffer, "fields")?;
    write_fields(buffer, &record.fields)?;

    write_str(buffer, "timestamp")?;
    write_uint(buffer, record.timestamp as u64)?;
    Ok(())
}

fn write_fields(buffer: &mut ByteBuf, fields: &BTreeMap<String, FieldValue>) -> Result<(), Error> {
    write_map_len(buffer, map_len(fields.len())?)?;

    for (key, value) in fields {
        write_str(buffer, key)?;

        match value {
            FieldValue::Int(value) => {
                write_sint(buffer, *value)?;
            }
            FieldValue::UInt(value) => {
                write_uint(buffer, *value)?;
            }
            FieldValue::Float(value) => write_f64(buffer, *value)?,
            FieldValue::String(value) => write_str(buffer, value)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, PartialEq)]
    struct ExpectedValue(Vec<u8>);

    impl ExpectedValue {
        fn new(value: &'static [u8]) -> Self {
            Self(value.into())
        }
    }

    impl From<Vec<u8>> for ExpectedValue {
        fn from(value: Vec<u8>) -> Self {
            Self(value)
        }
    }

    fn record(fields: impl IntoIterator<Item = (&'static str, FieldValue)>) -> AssembledRecord {
        AssembledRecord {
            measurement: "users".into(),
            tags: BTreeMap::from([("id".into(), "7".into())]),
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
            timestamp: 10,
        }
    }

    #[tokio::test]
    async fn encodes_record_with_integer_field() {
        output_test!(
            MessagePack,
            &[record([("balance", FieldValue::Int(100))])],
            ExpectedValue::new(
                b"\x84\xabmeasurement\xa5users\xa4tags\x81\xa2id\xa17\xa6fields\x81\xa7balance\x64\xa9timestamp\x0a"
            )
        );
    }

    #[tokio::test]
    async fn encodes_negative_unsigned_and_string_fields() {
        output_test!(
            MessagePack,
            &[record([
                ("a", FieldValue::Int(-1)),
                ("b", FieldValue::UInt(200)),
                ("c", FieldValue::from("x")),
            ])],
            ExpectedValue::new(
                b"\x84\xabmeasurement\xa5users\xa4tags\x81\xa2id\xa17\xa6fields\x83\xa1a\xff\xa1b\xcc\xc8\xa1c\xa1x\xa9timestamp\x0a"
            )
        );
    }

    #[tokio::test]
    async fn encodes_float_field_as_double() {
        output_test!(
            MessagePack,
            &[record([("rate", FieldValue::Float(0.5))])],
            ExpectedValue::new(
                b"\x84\xabmeasurement\xa5users\xa4tags\x81\xa2id\xa17\xa6fields\x81\xa4rate\xcb\x3f\xe0\x00\x00\x00\x00\x00\x00\xa9timestamp\x0a"
            )
        );
    }
}
