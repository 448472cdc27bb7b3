use binlog_collector::{binlog_null, binlog_row};
use binlog_collector::error::Error;
use binlog_collector::filter::{DatabaseRule, FieldValue, TableFilter, TableRule, ValueOptions};
use binlog_collector::position::MasterPosition;
use binlog_collector::record::AssembledRecord;
use binlog_collector::replication::event::{
    BinlogEvent, BinlogPosition, EventHeader, EventKind, RowEvent, RowsEvent,
};
use binlog_collector::replication::{Dispatcher, Transition};
use binlog_collector::schema::{TableCache, HEALTH_CHECK_SCHEMA, HEALTH_CHECK_TABLE};
use binlog_collector::test_util::{
    FakeMetadataSource, Journal, JournalEntry, MemoryPositionStore, RecordingSink,
};
use std::collections::BTreeMap;
use std::time::Duration;

type TestDispatcher = Dispatcher<FakeMetadataSource, MemoryPositionStore, RecordingSink>;

const TIMESTAMP: u32 = 1700000000;

fn users_filter(exclude_events: Vec<EventKind>) -> TableFilter {
    TableFilter::new(vec![
        DatabaseRule {
            database: "app".into(),
            exclude_tables: vec![],
            tables: vec![TableRule {
                name: "users".into(),
                measurement: None,
                tags: vec!["id".into()],
                fields: vec!["balance".into()],
                exclude_events,
            }],
        },
        DatabaseRule {
            database: HEALTH_CHECK_SCHEMA.into(),
            ..DatabaseRule::default()
        },
    ])
}

fn users_source() -> FakeMetadataSource {
    FakeMetadataSource::default().with_table(
        "app",
        "users",
        &[("id", "int(11)"), ("balance", "int(11)")],
    )
}

fn dispatcher(source: FakeMetadataSource, filter: TableFilter) -> (TestDispatcher, Journal) {
    let journal = Journal::default();

    let mut dispatcher = Dispatcher::new(
        TableCache::new(source, filter).with_discard_no_meta(true),
        MemoryPositionStore::new(journal.clone()),
        RecordingSink::new(journal.clone()),
        ValueOptions::default(),
    );

    dispatcher.resume(MasterPosition::new(BinlogPosition::new(
        "mysql-bin.000001",
        4,
    )));

    (dispatcher, journal)
}

fn header(log_position: u32) -> EventHeader {
    EventHeader::new(TIMESTAMP, log_position)
}

fn users_rows(rows: Vec<RowEvent>) -> BinlogEvent {
    BinlogEvent::Rows(RowsEvent::new("app", "users", rows))
}

fn users_record(id: &str, balance: i64) -> AssembledRecord {
    AssembledRecord {
        measurement: "users".into(),
        tags: BTreeMap::from([("id".into(), id.into())]),
        fields: BTreeMap::from([("balance".into(), FieldValue::Int(balance))]),
        timestamp: TIMESTAMP,
    }
}

fn records(journal: &Journal) -> Vec<AssembledRecord> {
    journal
        .entries()
        .into_iter()
        .filter_map(|entry| match entry {
            JournalEntry::Record(record) => Some(record),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn inserted_row_becomes_record_with_configured_tags_and_fields() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(users_source(), users_filter(vec![]));

    dispatcher
        .handle(header(200), users_rows(vec![RowEvent::InsertRow(binlog_row!(7, 100))]))
        .await?;

    assert_eq!(records(&journal), vec![users_record("7", 100)]);

    Ok(())
}

#[tokio::test]
async fn updated_row_emits_new_values() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(users_source(), users_filter(vec![]));

    dispatcher
        .handle(
            header(200),
            users_rows(vec![RowEvent::UpdateRow(binlog_row!(7, 150))]),
        )
        .await?;

    assert_eq!(records(&journal), vec![users_record("7", 150)]);

    Ok(())
}

#[tokio::test]
async fn excluded_delete_emits_nothing() -> Result<(), Error> {
    let (mut dispatcher, journal) =
        dispatcher(users_source(), users_filter(vec![EventKind::Delete]));

    dispatcher
        .handle(header(200), users_rows(vec![RowEvent::DeleteRow(binlog_row!(7, 100))]))
        .await?;

    assert!(records(&journal).is_empty());

    Ok(())
}

#[tokio::test]
async fn null_values_keep_every_configured_key() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(users_source(), users_filter(vec![]));

    dispatcher
        .handle(
            header(200),
            users_rows(vec![
                RowEvent::InsertRow(binlog_row!(7, binlog_null!())),
                RowEvent::InsertRow(binlog_row!(8)),
            ]),
        )
        .await?;

    assert_eq!(
        records(&journal),
        vec![users_record("7", 0), users_record("8", 0)]
    );

    Ok(())
}

#[tokio::test]
async fn checkpoint_follows_forwarded_rows_of_every_transaction() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(users_source(), users_filter(vec![]));

    let events = vec![
        (
            header(120),
            BinlogEvent::Rotate {
                next_file: "mysql-bin.000002".into(),
                position: 4,
            },
        ),
        (header(300), users_rows(vec![RowEvent::InsertRow(binlog_row!(1, 10))])),
        (header(350), users_rows(vec![RowEvent::InsertRow(binlog_row!(2, 20))])),
        (header(381), BinlogEvent::Xid),
        (header(500), users_rows(vec![RowEvent::InsertRow(binlog_row!(3, 30))])),
        (header(531), BinlogEvent::Xid),
    ];

    for (header, event) in events {
        dispatcher.handle(header, event).await?;
    }

    assert_eq!(
        journal.entries(),
        vec![
            JournalEntry::Saved(BinlogPosition::new("mysql-bin.000002", 4)),
            JournalEntry::Flushed,
            JournalEntry::Record(users_record("1", 10)),
            JournalEntry::Record(users_record("2", 20)),
            JournalEntry::Saved(BinlogPosition::new("mysql-bin.000002", 381)),
            JournalEntry::Record(users_record("3", 30)),
            JournalEntry::Saved(BinlogPosition::new("mysql-bin.000002", 531)),
        ]
    );
    assert_eq!(
        dispatcher.store().last().map(|position| position.binlog),
        Some(BinlogPosition::new("mysql-bin.000002", 531))
    );

    Ok(())
}

#[tokio::test]
async fn repeated_rows_events_reuse_cached_metadata() -> Result<(), Error> {
    let (mut dispatcher, _) = dispatcher(users_source(), users_filter(vec![]));

    for position in [200, 300] {
        dispatcher
            .handle(
                header(position),
                users_rows(vec![RowEvent::InsertRow(binlog_row!(7, 100))]),
            )
            .await?;
    }

    assert_eq!(dispatcher.cache().source().fetches("app", "users"), 1);

    Ok(())
}

#[tokio::test]
async fn alter_table_invalidates_metadata_and_forces_checkpoint() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(users_source(), users_filter(vec![]));

    dispatcher
        .handle(header(200), users_rows(vec![RowEvent::InsertRow(binlog_row!(7, 100))]))
        .await?;

    let transition = dispatcher
        .handle(
            header(400),
            BinlogEvent::Query {
                schema: "app".into(),
                query: "ALTER TABLE `users` ADD COLUMN `note` TEXT".into(),
            },
        )
        .await?;

    assert_eq!(transition, Transition::TablesChanged(1));
    assert!(!dispatcher.cache().is_cached("app", "users"));
    assert_eq!(
        journal.entries()[1..],
        [
            JournalEntry::Saved(BinlogPosition::new("mysql-bin.000001", 400)),
            JournalEntry::Flushed,
        ]
    );

    dispatcher
        .handle(header(500), users_rows(vec![RowEvent::InsertRow(binlog_row!(8, 1))]))
        .await?;

    assert_eq!(dispatcher.cache().source().fetches("app", "users"), 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_metadata_is_not_refetched_within_retry_window() -> Result<(), Error> {
    let (mut dispatcher, journal) =
        dispatcher(users_source().failing_fetch(), users_filter(vec![]));

    for _ in 0..3 {
        assert_eq!(
            dispatcher
                .handle(header(200), users_rows(vec![RowEvent::InsertRow(binlog_row!(7, 1))]))
                .await?,
            Transition::RowsSkipped
        );
    }

    assert_eq!(dispatcher.cache().source().fetches("app", "users"), 1);

    tokio::time::advance(Duration::from_secs(11)).await;

    dispatcher
        .handle(header(300), users_rows(vec![RowEvent::InsertRow(binlog_row!(7, 1))]))
        .await?;

    assert_eq!(dispatcher.cache().source().fetches("app", "users"), 2);
    assert!(records(&journal).is_empty());

    Ok(())
}

#[tokio::test]
async fn health_check_table_rows_are_captured_without_metadata_queries() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(
        FakeMetadataSource::default().failing_fetch(),
        users_filter(vec![]),
    );

    let transition = dispatcher
        .handle(
            header(200),
            BinlogEvent::Rows(RowsEvent::new(
                HEALTH_CHECK_SCHEMA,
                HEALTH_CHECK_TABLE,
                vec![RowEvent::InsertRow(binlog_row!(1, "h"))],
            )),
        )
        .await?;

    assert_eq!(transition, Transition::RowsHandled(1));
    assert_eq!(
        records(&journal),
        vec![AssembledRecord {
            measurement: HEALTH_CHECK_TABLE.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::from([
                ("id".into(), FieldValue::Int(1)),
                ("type".into(), FieldValue::from("h")),
            ]),
            timestamp: TIMESTAMP,
        }]
    );
    assert_eq!(
        dispatcher
            .cache()
            .source()
            .fetches(HEALTH_CHECK_SCHEMA, HEALTH_CHECK_TABLE),
        0
    );

    Ok(())
}

#[tokio::test]
async fn rows_of_dropped_table_are_skipped() -> Result<(), Error> {
    let (mut dispatcher, journal) = dispatcher(
        users_source(),
        TableFilter::new(vec![DatabaseRule {
            database: "app".into(),
            ..DatabaseRule::default()
        }]),
    );

    let transition = dispatcher
        .handle(
            header(200),
            BinlogEvent::Rows(RowsEvent::new(
                "app",
                "orders",
                vec![RowEvent::InsertRow(binlog_row!(1))],
            )),
        )
        .await?;

    assert_eq!(transition, Transition::RowsSkipped);
    assert!(journal.entries().is_empty());

    Ok(())
}
