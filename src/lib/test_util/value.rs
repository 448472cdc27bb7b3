use mysql_common::binlog::value::BinlogValue;
use mysql_common::value::Value;

#[doc(hidden)]
pub struct NullValue;

#[doc(hidden)]
pub struct NoneValue;

pub trait IntoBinlogValue {
    fn into_binlog_value(self) -> Option<BinlogValue<'static>>;
}

impl IntoBinlogValue for NullValue {
    fn into_binlog_value(self) -> Option<BinlogValue<'static>> {
        Some(BinlogValue::Value(Value::NULL))
    }
}

impl IntoBinlogValue for NoneValue {
    fn into_binlog_value(self) -> Option<BinlogValue<'static>> {
        None
    }
}

impl IntoBinlogValue for Value {
    fn into_binlog_value(self) -> Option<BinlogValue<'static>> {
        Some(BinlogValue::Value(self))
    }
}

macro_rules! impl_into_binlog {
    ($T:ty) => {
        impl IntoBinlogValue for $T {
            fn into_binlog_value(self) -> Option<BinlogValue<'static>> {
                Some(BinlogValue::Value(self.into()))
            }
        }
    };
}

impl_into_binlog!(u32);
impl_into_binlog!(i32);
impl_into_binlog!(u64);
impl_into_binlog!(i64);
impl_into_binlog!(f64);
impl_into_binlog!(&str);
