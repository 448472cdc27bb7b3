use crate::replication::BUFFER_STACK_SIZE;
use mysql_common::binlog::row::BinlogRow;
use mysql_common::binlog::value::BinlogValue;
use mysql_common::value::Value;
use smallvec::SmallVec;

/// Column values of a single row image, `None` marks a column absent from the image.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryRow {
    values: SmallVec<[Option<BinlogValue<'static>>; BUFFER_STACK_SIZE]>,
}

impl From<BinlogRow> for BinaryRow {
    fn from(mut row: BinlogRow) -> Self {
        let values = (0..row.len())
            .map(|index| row.take(index).map(BinlogValue::into_owned))
            .collect();

        Self { values }
    }
}

impl BinaryRow {
    pub fn new(values: &[Option<BinlogValue<'static>>]) -> Self {
        Self {
            values: values.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn take(&mut self, index: usize) -> Option<BinlogValue<'static>> {
        match self.values.get_mut(index) {
            Some(value) => value.take(),
            None => None,
        }
    }

    pub fn get(&self, index: usize) -> Option<&BinlogValue<'static>> {
        match self.values.get(index) {
            Some(Some(value)) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.get(index), None | Some(BinlogValue::Value(Value::NULL)))
    }
}

#[cfg(test)]
mod tests {
    use mysql_common::binlog::value::BinlogValue;

    #[test]
    fn allows_to_get_value_by_index() {
        let row = binlog_row!(1, "Name 1", "sku1", "10.00");

        assert_eq!(
            vec![row.get(0), row.get(1), row.get(4)],
            vec![
                Some(&BinlogValue::Value(1.into())),
                Some(&BinlogValue::Value("Name 1".into())),
                None
            ]
        )
    }

    #[test]
    fn treats_null_and_absent_values_as_null() {
        let row = binlog_row!(1, binlog_null!(), binlog_none!());

        assert_eq!(
            vec![row.is_null(0), row.is_null(1), row.is_null(2), row.is_null(3)],
            vec![false, true, true, true]
        );
    }
}
