//! Captured rows events of an `entity(entity_id, name, description, price)` table
//! and of a five integer column `entity_int` table.

use mysql_common::binlog::consts::{BinlogVersion, EventType};
use mysql_common::binlog::events::{
    BinlogEventHeader, FormatDescriptionEvent, RowsEventData, TableMapEvent,
};
use mysql_common::binlog::BinlogCtx;
use mysql_common::io::ParseBuf;
use phf::phf_map;
use phf::Map;

static TABLE_DEFINITION_ENTITY: &[u8] = &[
    24, 1, 0, 0, 0, 0, 1, 0, 8, 116, 101, 115, 116, 95, 100, 98, 48, 0, 6, 101, 110, 116, 105, 116,
    121, 0, 4, 3, 15, 252, 246, 5, 252, 3, 2, 12, 4, 14, 1, 1, 128, 2, 3, 252, 255, 0,
];

static TABLE_DEFINITION_ENTITY_WITH_NULL: &[u8] = &[
    129, 0, 0, 0, 0, 0, 1, 0, 7, 116, 101, 115, 116, 95, 100, 98, 0, 6, 101, 110, 116, 105, 116,
    121, 0, 4, 3, 15, 252, 246, 5, 255, 0, 2, 12, 4, 14,
];

static TABLE_DEFINITION_INT: &[u8] = &[
    90, 0, 0, 0, 0, 0, 1, 0, 7, 116, 101, 115, 116, 95, 100, 98, 0, 10, 101, 110, 116, 105, 116,
    121, 95, 105, 110, 116, 0, 5, 3, 3, 3, 3, 3, 0, 16, 1, 1, 240,
];

static WRITE_ENTITY: &[u8] = &[
    110, 1, 0, 0, 0, 0, 1, 0, 2, 0, 4, 255, 0, 1, 0, 0, 0, 9, 0, 80, 114, 111, 100, 117, 99, 116,
    32, 49, 21, 0, 80, 114, 111, 100, 117, 99, 116, 32, 49, 32, 100, 101, 115, 99, 114, 105, 112,
    116, 105, 111, 110, 128, 0, 0, 9, 38, 172, 0, 2, 0, 0, 0, 9, 0, 80, 114, 111, 100, 117, 99,
    116, 32, 50, 21, 0, 80, 114, 111, 100, 117, 99, 116, 32, 50, 32, 100, 101, 115, 99, 114, 105,
    112, 116, 105, 111, 110, 128, 0, 0, 99, 38, 172,
];

static WRITE_ENTITY_WITH_NULL: &[u8] = &[
    127, 0, 0, 0, 0, 0, 1, 0, 2, 0, 4, 255, 244, 1, 0, 0, 0, 9, 80, 114, 111, 100, 117, 99, 116,
    32, 49, 128, 0, 0, 9, 38, 172, 244, 2, 0, 0, 0, 9, 80, 114, 111, 100, 117, 99, 116, 32, 50,
    128, 0, 0, 99, 38, 172,
];

static DELETE_ENTITY_INT: &[u8] = &[
    111, 0, 0, 0, 0, 0, 1, 0, 2, 0, 5, 255, 224, 2, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0,
    0, 0, 0,
];
static UPDATE_ROWS_ENTITY: &[u8] = &[
    71, 1, 0, 0, 0, 0, 1, 0, 2, 0, 4, 255, 255, 0, 2, 0, 0, 0, 9, 0, 80, 114, 111, 100, 117, 99,
    116, 32, 50, 21, 0, 80, 114, 111, 100, 117, 99, 116, 32, 50, 32, 100, 101, 115, 99, 114, 105,
    112, 116, 105, 111, 110, 128, 0, 0, 99, 38, 172, 0, 2, 0, 0, 0, 17, 0, 65, 119, 101, 115, 111,
    109, 101, 32, 80, 114, 111, 100, 117, 99, 116, 32, 50, 21, 0, 80, 114, 111, 100, 117, 99, 116,
    32, 50, 32, 100, 101, 115, 99, 114, 105, 112, 116, 105, 111, 110, 128, 0, 0, 99, 38, 172,
];

static ROWS_EVENTS: Map<&'static str, (&[u8], EventType, &[u8])> = phf_map! {
    "write_entity" => (TABLE_DEFINITION_ENTITY, EventType::WRITE_ROWS_EVENT, WRITE_ENTITY),
    "write_entity_with_null" => (TABLE_DEFINITION_ENTITY_WITH_NULL, EventType::WRITE_ROWS_EVENT, WRITE_ENTITY_WITH_NULL),
    "delete_entity_int" => (TABLE_DEFINITION_INT, EventType::DELETE_ROWS_EVENT, DELETE_ENTITY_INT),
    "update_entity" => (TABLE_DEFINITION_ENTITY, EventType::UPDATE_ROWS_EVENT, UPDATE_ROWS_ENTITY),
};

pub(crate) struct Fixture {
    fde: FormatDescriptionEvent<'static>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            fde: FormatDescriptionEvent::new(BinlogVersion::Version4),
        }
    }
}

impl Fixture {
    pub fn row_event(&self, name: &'static str) -> (TableMapEvent<'_>, RowsEventData<'_>) {
        let (table_data, event_type, rows_data) = ROWS_EVENTS.get(name).unwrap();

        let rows_buffer = &mut ParseBuf(rows_data);
        let ctx = BinlogCtx::new(BinlogEventHeader::LEN + rows_data.len(), &self.fde);

        let rows = match event_type {
            EventType::WRITE_ROWS_EVENT => {
                RowsEventData::WriteRowsEvent(rows_buffer.parse(ctx).unwrap())
            }
            EventType::UPDATE_ROWS_EVENT => {
                RowsEventData::UpdateRowsEvent(rows_buffer.parse(ctx).unwrap())
            }
            EventType::DELETE_ROWS_EVENT => {
                RowsEventData::DeleteRowsEvent(rows_buffer.parse(ctx).unwrap())
            }
            _ => unreachable!(),
        };

        let table_buffer = &mut ParseBuf(table_data);
        let ctx = BinlogCtx::new(BinlogEventHeader::LEN + table_data.len(), &self.fde);

        (table_buffer.parse(ctx).unwrap(), rows)
    }
}
