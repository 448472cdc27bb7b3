use crate::error::Error;
use crate::output::Output;
use crate::record::AssembledRecord;

use serde_json::to_vec;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// JSON output, one record object per line
pub struct JsonOutput;

impl Output for JsonOutput {
    async fn write<T: AsyncWrite + Unpin>(
        &self,
        writer: &mut T,
        records: &[AssembledRecord],
    ) -> Result<(), Error> {
        let mut buffer = Vec::with_capacity(records.len() * 128);

        for record in records {
            buffer.extend(to_vec(record).map_err(Error::Json)?);
            buffer.push(b'\n');
        }

        writer.write_all(&buffer).await.map_err(Error::Io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldValue;
    use serde_json::{json, Deserializer, Value};
    use std::collections::BTreeMap;
    use std::io::Cursor;

    #[derive(Debug, PartialEq)]
    struct ExpectedValue(Vec<Value>);

    impl From<Vec<u8>> for ExpectedValue {
        fn from(value: Vec<u8>) -> Self {
            Self(
                Deserializer::from_slice(&value)
                    .into_iter::<Value>()
                    .map(Result::unwrap)
                    .collect(),
            )
        }
    }

    #[tokio::test]
    async fn outputs_nothing_for_empty_batch() {
        output_test!(JsonOutput, &[], ExpectedValue(vec![]));
    }

    #[tokio::test]
    async fn outputs_record_per_line() {
        output_test!(
            JsonOutput,
            &[
                AssembledRecord {
                    measurement: "users".into(),
                    tags: BTreeMap::from([("id".into(), "7".into())]),
                    fields: BTreeMap::from([
                        ("balance".into(), FieldValue::Int(100)),
                        ("rate".into(), FieldValue::Float(0.5)),
                    ]),
                    timestamp: 10,
                },
                AssembledRecord {
                    measurement: "orders".into(),
                    tags: BTreeMap::new(),
                    fields: BTreeMap::from([("status".into(), FieldValue::from("paid"))]),
                    timestamp: 11,
                }
            ],
            ExpectedValue(vec![
                json!({
                    "measurement": "users",
                    "tags": {"id": "7"},
                    "fields": {"balance": 100, "rate": 0.5},
                    "timestamp": 10
                }),
                json!({
                    "measurement": "orders",
                    "tags": {},
                    "fields": {"status": "paid"},
                    "timestamp": 11
                })
            ])
        );
    }
}
