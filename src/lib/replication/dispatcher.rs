use crate::error::Error;
use crate::filter::ValueOptions;
use crate::position::{MasterPosition, PositionStore};
use crate::record::RecordSink;
use crate::replication::ddl::parse_ddl;
use crate::replication::event::{BinlogEvent, BinlogPosition, EventHeader, RowsEvent};
use crate::replication::gtid::Gtid;
use crate::schema::{MetadataSource, TableCache};
use tracing::{debug, info, warn};

/// Outcome of a single dispatched event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Artificial rotate naming the file the stream continues in.
    FakeRotate,
    Rotated,
    /// Number of records forwarded to the sink.
    RowsHandled(usize),
    /// Rows event of a table that is excluded or has no metadata.
    RowsSkipped,
    Committed,
    GtidReceived,
    /// Number of captured tables with invalidated metadata.
    TablesChanged(usize),
    Ignored,
}

/// Sequential event state machine of one source.
pub struct Dispatcher<M, P, S> {
    cache: TableCache<M>,
    store: P,
    sink: S,
    options: ValueOptions,
    position: MasterPosition,
    pending_gtid: Option<Gtid>,
    fake_rotate: Option<String>,
}

impl<M, P, S> Dispatcher<M, P, S>
where
    M: MetadataSource,
    P: PositionStore,
    S: RecordSink,
{
    pub fn new(cache: TableCache<M>, store: P, sink: S, options: ValueOptions) -> Self {
        Self {
            cache,
            store,
            sink,
            options,
            position: MasterPosition::default(),
            pending_gtid: None,
            fake_rotate: None,
        }
    }

    pub fn resume(&mut self, position: MasterPosition) {
        self.position = position;
        self.pending_gtid = None;
        self.fake_rotate = None;
    }

    /// Last committed position, the one that is persisted.
    pub fn position(&self) -> &MasterPosition {
        &self.position
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn cache(&self) -> &TableCache<M> {
        &self.cache
    }

    pub async fn handle(&mut self, header: EventHeader, event: BinlogEvent) -> Result<Transition, Error> {
        if header.log_position() == 0 {
            if let BinlogEvent::Rotate { next_file, .. } = event {
                debug!(file = %next_file, "Received artificial rotate event");
                self.fake_rotate = Some(next_file);
                return Ok(Transition::FakeRotate);
            }

            return Ok(Transition::Ignored);
        }

        match event {
            BinlogEvent::Rotate {
                next_file,
                position,
            } => {
                info!(file = %next_file, position, "Binlog rotated");

                self.position.binlog = BinlogPosition::new(
                    next_file,
                    u32::try_from(position).map_err(|_| Error::BinlogPositionMissing)?,
                );
                self.fake_rotate = None;
                self.save(&header, true).await?;

                Ok(Transition::Rotated)
            }
            BinlogEvent::Rows(rows) => self.handle_rows(&header, rows).await,
            BinlogEvent::Xid => {
                self.commit(&header);
                self.save(&header, false).await?;

                Ok(Transition::Committed)
            }
            BinlogEvent::Gtid(gtid) => {
                self.pending_gtid = Some(gtid);

                Ok(Transition::GtidReceived)
            }
            BinlogEvent::Query { schema, query } => self.handle_query(&header, &schema, &query).await,
        }
    }

    async fn handle_rows(&mut self, header: &EventHeader, rows: RowsEvent) -> Result<Transition, Error> {
        let (table, rule) = match self.cache.get_table(&rows.schema, &rows.table).await {
            Ok(found) => found,
            Err(error @ Error::ExcludedTable(..)) => {
                debug!(schema = %rows.schema, table = %rows.table, "{error}");
                return Ok(Transition::RowsSkipped);
            }
            Err(error) if error.is_skippable() => {
                warn!(
                    schema = %rows.schema,
                    table = %rows.table,
                    file = self.position.binlog.file(),
                    position = header.log_position(),
                    "Skipping rows event: {error}"
                );
                return Ok(Transition::RowsSkipped);
            }
            Err(error) => return Err(error),
        };

        let mut records = 0;

        for row in rows.rows.iter().filter(|row| !rule.excludes(row.kind())) {
            self.sink
                .send(rule.assemble(&table, row.projected_row(), header.timestamp(), &self.options))
                .await?;
            records += 1;
        }

        Ok(Transition::RowsHandled(records))
    }

    async fn handle_query(
        &mut self,
        header: &EventHeader,
        schema: &str,
        query: &str,
    ) -> Result<Transition, Error> {
        let mut tables = Vec::new();

        for statement in parse_ddl(query) {
            match statement {
                Ok(statement) => tables.extend(statement),
                Err(error) => warn!(schema, "Skipping DDL statement: {error}"),
            }
        }

        if tables.is_empty() {
            return Ok(Transition::Ignored);
        }

        let mut changed = 0;

        for table in tables {
            let schema = table.schema.as_deref().unwrap_or(schema);

            if self.cache.filter().match_table(schema, &table.table).is_none() {
                continue;
            }

            self.cache.clear_table_cache(schema, &table.table);
            changed += 1;

            info!(schema, table = %table.table, "Table definition changed");
        }

        self.commit(header);
        self.save(header, true).await?;

        Ok(Transition::TablesChanged(changed))
    }

    fn commit(&mut self, header: &EventHeader) {
        let file = match self.fake_rotate.as_deref() {
            Some(file) => file.to_owned(),
            None => self.position.binlog.file().to_owned(),
        };

        self.position.binlog = BinlogPosition::new(file, header.log_position());

        if let (Some(gtid), Some(gtid_set)) = (self.pending_gtid.take(), &mut self.position.gtid_set) {
            if !gtid_set.update(&gtid) {
                warn!(gtid = ?gtid, "GTID cannot be added to tracked GTID set");
            }
        }
    }

    async fn save(&mut self, header: &EventHeader, force: bool) -> Result<(), Error> {
        self.position.timestamp = header.timestamp();
        self.store.save(&self.position).await?;

        if force {
            self.sink.flush().await?;
        }

        self.fake_rotate = None;

        Ok(())
    }

    /// Stores the last committed position and flushes the sink, used on shutdown.
    pub async fn persist(&mut self) -> Result<(), Error> {
        self.store.save(&self.position).await?;
        self.sink.flush().await
    }
}
