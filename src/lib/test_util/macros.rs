#[macro_export]
macro_rules! binlog_null {
    () => {
        ($crate::test_util::NullValue)
    };
}

#[macro_export]
macro_rules! binlog_none {
    () => {
        ($crate::test_util::NoneValue)
    };
}

#[macro_export]
macro_rules! binlog_row {
    ($($value:expr),*) => {
        ($crate::replication::BinaryRow::new(&[$($crate::test_util::IntoBinlogValue::into_binlog_value($value)),*]))
    };
}

#[macro_export]
macro_rules! output_test {
    ($formatter:expr, $records:expr, $expected:expr) => {
        let mut buffer = Cursor::new(Vec::new());
        $crate::output::Output::write(&$formatter, &mut buffer, $records)
            .await
            .unwrap();

        assert_eq!($expected, buffer.into_inner().into())
    };
}
