use crate::schema::{Column, ColumnType};
use chrono::{DateTime, NaiveDate};
use mysql_common::binlog::value::BinlogValue;
use mysql_common::value::Value;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Value of a single record field or tag after coercion.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

/// Coercion switches of one source.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueOptions {
    pub use_decimal: bool,
    pub parse_time: bool,
    pub null_int: i64,
    pub null_float: f64,
    pub null_string: String,
}

impl Default for ValueOptions {
    fn default() -> Self {
        Self {
            use_decimal: false,
            parse_time: false,
            null_int: 0,
            null_float: 0.0,
            null_string: String::new(),
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::UInt(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl ValueOptions {
    /// Default emitted for NULL or absent column values.
    pub fn null_value(&self, column: &Column) -> FieldValue {
        match column.column_type {
            ColumnType::Float => FieldValue::Float(self.null_float),
            ColumnType::Decimal if !self.use_decimal => FieldValue::Float(self.null_float),
            column_type if column_type.is_numeric() => FieldValue::Int(self.null_int),
            _ => FieldValue::String(self.null_string.clone()),
        }
    }

    pub fn coerce(&self, column: &Column, value: Option<&BinlogValue<'static>>) -> FieldValue {
        let value = match value {
            None | Some(BinlogValue::Value(Value::NULL)) => return self.null_value(column),
            Some(BinlogValue::Jsonb(value)) => {
                return match serde_json::Value::try_from(value.clone()) {
                    Ok(json) => FieldValue::String(json.to_string()),
                    Err(_) => self.null_value(column),
                }
            }
            Some(BinlogValue::JsonDiff(_)) => return self.null_value(column),
            Some(BinlogValue::Value(value)) => value,
        };

        match column.column_type {
            ColumnType::Number | ColumnType::MediumInt => integer_value(column, value)
                .unwrap_or_else(|| FieldValue::String(text_value(value))),
            ColumnType::Float => float_value(value)
                .map(FieldValue::Float)
                .unwrap_or_else(|| self.null_value(column)),
            ColumnType::Decimal if self.use_decimal => FieldValue::String(text_value(value)),
            ColumnType::Decimal => float_value(value)
                .map(FieldValue::Float)
                .unwrap_or_else(|| FieldValue::String(text_value(value))),
            ColumnType::Enum => FieldValue::String(enum_label(column, value)),
            ColumnType::Set => FieldValue::String(set_labels(column, value)),
            ColumnType::Bit => bit_value(value)
                .map(FieldValue::UInt)
                .unwrap_or_else(|| self.null_value(column)),
            ColumnType::Date | ColumnType::Datetime | ColumnType::Timestamp => {
                self.time_value(column.column_type, value)
            }
            ColumnType::Time => FieldValue::String(text_value(value)),
            ColumnType::Point => match value {
                Value::Bytes(bytes) => FieldValue::String(hex::encode(bytes)),
                other => FieldValue::String(text_value(other)),
            },
            ColumnType::Json | ColumnType::String | ColumnType::Binary => {
                FieldValue::String(text_value(value))
            }
        }
    }

    fn time_value(&self, column_type: ColumnType, value: &Value) -> FieldValue {
        match value {
            Value::Date(year, month, day, hour, minute, second, micros) => {
                let timestamp = NaiveDate::from_ymd_opt(*year as i32, *month as u32, *day as u32)
                    .and_then(|date| {
                        date.and_hms_micro_opt(
                            *hour as u32,
                            *minute as u32,
                            *second as u32,
                            *micros,
                        )
                    })
                    .map(|time| time.and_utc().timestamp());

                match timestamp {
                    Some(timestamp) if self.parse_time => FieldValue::Int(timestamp),
                    _ if column_type == ColumnType::Date => {
                        FieldValue::String(format!("{year:04}-{month:02}-{day:02}"))
                    }
                    _ => FieldValue::String(text_value(value)),
                }
            }
            Value::Int(seconds) if self.parse_time => FieldValue::Int(*seconds),
            Value::Int(seconds) => FieldValue::String(
                DateTime::from_timestamp(*seconds, 0)
                    .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| seconds.to_string()),
            ),
            Value::Bytes(bytes) if self.parse_time => {
                let text = String::from_utf8_lossy(bytes);
                match text.trim().parse::<f64>() {
                    Ok(seconds) => FieldValue::Int(seconds.trunc() as i64),
                    Err(_) => FieldValue::String(text.into_owned()),
                }
            }
            other => FieldValue::String(text_value(other)),
        }
    }
}

const INTEGER_WIDTHS: &[(&str, u32)] = &[
    ("tinyint", 8),
    ("smallint", 16),
    ("mediumint", 24),
    ("bigint", 64),
    ("int", 32),
];

fn integer_width(declared_type: &str) -> u32 {
    let declared_type = declared_type.to_ascii_lowercase();

    INTEGER_WIDTHS
        .iter()
        .find(|(prefix, _)| declared_type.starts_with(prefix))
        .map(|(_, width)| *width)
        .unwrap_or(64)
}

fn integer_value(column: &Column, value: &Value) -> Option<FieldValue> {
    match value {
        Value::Int(value) if column.is_unsigned && *value < 0 => {
            let width = integer_width(&column.declared_type);
            let unsigned = if width == 64 {
                *value as u64
            } else {
                (*value as u64) & ((1u64 << width) - 1)
            };
            Some(FieldValue::UInt(unsigned))
        }
        Value::Int(value) => Some(FieldValue::Int(*value)),
        Value::UInt(value) => match i64::try_from(*value) {
            Ok(value) if !column.is_unsigned => Some(FieldValue::Int(value)),
            _ => Some(FieldValue::UInt(*value)),
        },
        Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            text.trim()
                .parse::<i64>()
                .map(FieldValue::Int)
                .ok()
                .or_else(|| text.trim().parse::<u64>().map(FieldValue::UInt).ok())
        }
        _ => None,
    }
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Float(value) => Some(*value as f64),
        Value::Double(value) => Some(*value),
        Value::Int(value) => Some(*value as f64),
        Value::UInt(value) => Some(*value as f64),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).trim().parse().ok(),
        _ => None,
    }
}

fn unsigned_value(value: &Value) -> Option<u64> {
    match value {
        Value::Int(value) => Some(*value as u64),
        Value::UInt(value) => Some(*value),
        _ => None,
    }
}

fn bit_value(value: &Value) -> Option<u64> {
    match value {
        Value::Bytes(bytes) => Some(
            bytes
                .iter()
                .fold(0u64, |result, byte| (result << 8) | *byte as u64),
        ),
        other => unsigned_value(other),
    }
}

fn enum_label(column: &Column, value: &Value) -> String {
    match unsigned_value(value) {
        Some(0) => String::new(),
        Some(index) => column
            .values
            .get(index as usize - 1)
            .cloned()
            .unwrap_or_default(),
        None => text_value(value),
    }
}

fn set_labels(column: &Column, value: &Value) -> String {
    let Some(mask) = unsigned_value(value) else {
        return text_value(value);
    };

    column
        .values
        .iter()
        .enumerate()
        .filter(|(index, _)| *index < 64 && mask & (1u64 << index) != 0)
        .map(|(_, label)| label.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn text_value(value: &Value) -> String {
    match value {
        Value::NULL => String::new(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Int(value) => value.to_string(),
        Value::UInt(value) => value.to_string(),
        Value::Float(value) => value.to_string(),
        Value::Double(value) => value.to_string(),
        Value::Date(year, month, day, hour, minute, second, 0) => {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
        }
        Value::Date(year, month, day, hour, minute, second, micros) => format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
        ),
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = *days as u64 * 24 + *hours as u64;
            if *micros == 0 {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
            } else {
                format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
            }
        }
    }
}
