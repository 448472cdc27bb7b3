use crate::error::Error;
use crate::filter::FieldValue;
use crate::output::Output;
use crate::record::AssembledRecord;
use std::fmt::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Influx line protocol output with second precision timestamps
pub struct LineProtocol;

impl Output for LineProtocol {
    async fn write<T: AsyncWrite + Unpin>(
        &self,
        writer: &mut T,
        records: &[AssembledRecord],
    ) -> Result<(), Error> {
        let mut buffer = String::with_capacity(records.len() * 128);

        for record in records {
            if record.fields.is_empty() {
                debug!(measurement = %record.measurement, "Skipping record without fields");
                continue;
            }

            write_line(&mut buffer, record).map_err(|_| Error::OutputError)?;
        }

        writer.write_all(buffer.as_bytes()).await?;

        Ok(())
    }
}

fn write_line(buffer: &mut String, record: &AssembledRecord) -> std::fmt::Result {
    escape(buffer, &record.measurement, &[',', ' ']);

    for (key, value) in record.tags.iter().filter(|(_, value)| !value.is_empty()) {
        buffer.push(',');
        escape(buffer, key, &[',', '=', ' ']);
        buffer.push('=');
        escape(buffer, value, &[',', '=', ' ']);
    }

    for (index, (key, value)) in record.fields.iter().enumerate() {
        buffer.push(if index == 0 { ' ' } else { ',' });
        escape(buffer, key, &[',', '=', ' ']);
        buffer.push('=');

        match value {
            FieldValue::Int(value) => write!(buffer, "{value}i")?,
            FieldValue::UInt(value) => write!(buffer, "{value}u")?,
            FieldValue::Float(value) => write!(buffer, "{value}")?,
            FieldValue::String(value) => {
                buffer.push('"');
                escape(buffer, value, &['"', '\\']);
                buffer.push('"');
            }
        }
    }

    writeln!(buffer, " {}", record.timestamp)
}

fn escape(buffer: &mut String, value: &str, special: &[char]) {
    for char in value.chars() {
        match char {
            '\n' => buffer.push_str("\\n"),
            char if special.contains(&char) => {
                buffer.push('\\');
                buffer.push(char);
            }
            char => buffer.push(char),
        }
    }
}
