use crate::error::Error;
use crate::replication::event::{BinlogEvent, EventHeader, RowEvent, RowsEvent};
use crate::replication::gtid::Gtid;
use crate::replication::BinaryRow;
use mysql_common::binlog::consts::{EventType, UnknownEventType};
use mysql_common::binlog::events::{
    Event, EventData, GtidEvent, QueryEvent, RotateEvent, RowsEventData, TableMapEvent,
};
use std::collections::HashMap;

const MARIADB_GTID_EVENT: u8 = 162;

/// Turns raw binlog events into [`BinlogEvent`], resolving rows against preceding table maps.
#[derive(Default)]
pub struct EventDecoder {
    tables: HashMap<u64, TableMapEvent<'static>>,
}

impl EventDecoder {
    /// Returns `None` for events without a dispatcher transition, like table maps or heartbeats.
    pub fn decode(&mut self, event: &Event) -> Result<Option<(EventHeader, BinlogEvent)>, Error> {
        let header = EventHeader::new(event.header().timestamp(), event.header().log_pos());

        let decoded = match event.header().event_type() {
            Ok(EventType::ROTATE_EVENT) => {
                let rotate: RotateEvent = event.read_event()?;

                Some(BinlogEvent::Rotate {
                    next_file: rotate.name().into_owned(),
                    position: rotate.position(),
                })
            }
            Ok(EventType::TABLE_MAP_EVENT) => {
                let table: TableMapEvent = event.read_event()?;
                self.tables.insert(table.table_id(), table.into_owned());
                None
            }
            Ok(
                EventType::WRITE_ROWS_EVENT_V1
                | EventType::WRITE_ROWS_EVENT
                | EventType::UPDATE_ROWS_EVENT_V1
                | EventType::UPDATE_ROWS_EVENT
                | EventType::PARTIAL_UPDATE_ROWS_EVENT
                | EventType::DELETE_ROWS_EVENT_V1
                | EventType::DELETE_ROWS_EVENT,
            ) => match event.read_data()? {
                Some(EventData::RowsEvent(rows)) => {
                    let table = self
                        .tables
                        .get(&rows.table_id())
                        .ok_or(Error::UnknownTableId(rows.table_id()))?;

                    Some(BinlogEvent::Rows(RowsEvent::new(
                        table.database_name(),
                        table.table_name(),
                        row_events(&rows, table)?,
                    )))
                }
                _ => None,
            },
            Ok(EventType::XID_EVENT) => Some(BinlogEvent::Xid),
            Ok(EventType::GTID_EVENT) => {
                let gtid: GtidEvent = event.read_event()?;

                Some(BinlogEvent::Gtid(Gtid::MySQL {
                    sid: gtid.sid(),
                    gno: gtid.gno(),
                }))
            }
            Ok(EventType::QUERY_EVENT) => {
                let query: QueryEvent = event.read_event()?;

                Some(BinlogEvent::Query {
                    schema: query.schema().into_owned(),
                    query: query.query().into_owned(),
                })
            }
            Err(UnknownEventType(MARIADB_GTID_EVENT)) => Some(BinlogEvent::Gtid(
                parse_mariadb_gtid(event.data(), event.header().server_id())?,
            )),
            _ => None,
        };

        Ok(decoded.map(|event| (header, event)))
    }
}

/// Classifies each row image pair of a rows event.
pub fn row_events(rows: &RowsEventData<'_>, table: &TableMapEvent<'_>) -> Result<Vec<RowEvent>, Error> {
    let mut events = Vec::new();

    for row in rows.rows(table) {
        let event = match row? {
            (None, Some(after)) => RowEvent::InsertRow(BinaryRow::from(after)),
            (Some(before), None) => RowEvent::DeleteRow(BinaryRow::from(before)),
            (Some(_), Some(after)) => RowEvent::UpdateRow(BinaryRow::from(after)),
            (None, None) => continue,
        };

        events.push(event);
    }

    Ok(events)
}

/// MariaDB GTID event body: sequence number, domain id, flags.
fn parse_mariadb_gtid(data: &[u8], server_id: u32) -> Result<Gtid, Error> {
    let invalid = || Error::InvalidGtidSet(hex::encode(data));

    let sequence = data
        .get(0..8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(invalid)?;
    let domain_id = data
        .get(8..12)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(invalid)?;

    Ok(Gtid::MariaDB {
        domain_id,
        server_id,
        sequence,
    })
}
