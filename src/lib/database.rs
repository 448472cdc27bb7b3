use crate::error::Error;
use crate::position::MasterPosition;
use crate::replication::event::BinlogPosition;
use crate::replication::gtid::{Flavor, GtidSet};
use std::cmp::max;
use std::future::Future;
use std::time::Duration;

use mysql_async::prelude::Queryable;
use mysql_async::{BinlogStream, Conn, Opts, Params};
use mysql_common::packets::binlog_request::BinlogRequest;
use mysql_common::packets::{BinlogDumpFlags, GnoInterval, Sid};
use mysql_common::row::Row;
use mysql_common::value::convert::FromValue;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const MAX_QUERY_ATTEMPTS: usize = 3;

/// Query connection of one source plus the factory of its replication streams.
#[derive(Debug)]
pub struct Database {
    opts: Opts,
    connection: Mutex<Option<Conn>>,
    dump_options: BinlogDumpFlags,
}

/// Server settings inspected before streaming starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerVariables {
    pub binlog_format: String,
    pub binlog_row_image: Option<String>,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StreamSettings {
    pub server_id: Option<u32>,
    pub heartbeat_period: Duration,
    pub use_gtid: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            server_id: None,
            heartbeat_period: Duration::from_secs(60),
            use_gtid: false,
        }
    }
}

/// Connection the query retry loop runs statements on.
pub(crate) trait QueryConnection: Sized {
    async fn query_rows(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, Error>;

    async fn shutdown(self) -> Result<(), Error>;
}

impl QueryConnection for Conn {
    async fn query_rows(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, Error> {
        let rows: Vec<Row> = match params {
            Params::Empty => self.query(sql).await?,
            params => self.exec(sql, params.clone()).await?,
        };

        Ok(rows)
    }

    async fn shutdown(self) -> Result<(), Error> {
        Ok(self.disconnect().await?)
    }
}

/// Broken connections are dropped and reopened up to `MAX_QUERY_ATTEMPTS` times,
/// any other error is returned right away and keeps the connection.
async fn execute_with_retry<C, F, Fut>(
    slot: &mut Option<C>,
    mut connect: F,
    sql: &str,
    params: &Params,
) -> Result<Vec<Row>, Error>
where
    C: QueryConnection,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<C, Error>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => connect().await?,
        };

        match connection.query_rows(sql, params).await {
            Ok(rows) => {
                slot.replace(connection);
                return Ok(rows);
            }
            Err(error) if error.is_bad_connection() => {
                if let Err(close_error) = connection.shutdown().await {
                    debug!(error = %close_error, "Broken query connection was not closed cleanly");
                }

                if attempt >= MAX_QUERY_ATTEMPTS {
                    return Err(error);
                }

                warn!(attempt, error = %error, "Query connection is broken, reconnecting");
            }
            Err(error) => {
                slot.replace(connection);
                return Err(error);
            }
        }
    }
}

pub(crate) fn row_value<T: FromValue>(row: &Row, index: usize) -> Option<T> {
    row.get_opt::<T, usize>(index).and_then(Result::ok)
}

impl ServerVariables {
    /// Detects server flavor, failing when the binlog cannot be replicated row by row.
    pub fn verify(&self) -> Result<Flavor, Error> {
        if !self.binlog_format.eq_ignore_ascii_case("ROW") {
            return Err(Error::BinlogFormat(self.binlog_format.clone()));
        }

        let flavor = Flavor::from_version(&self.version);

        if let (Flavor::MySQL, Some(image)) = (flavor, &self.binlog_row_image) {
            if !image.eq_ignore_ascii_case("FULL") {
                return Err(Error::BinlogRowImage(image.clone()));
            }
        }

        Ok(flavor)
    }
}

impl Database {
    pub fn new<O>(opts: O) -> Self
    where
        Opts: From<O>,
    {
        Self {
            opts: Opts::from(opts),
            connection: Mutex::new(None),
            dump_options: BinlogDumpFlags::empty(),
        }
    }

    pub fn with_dump_options(self, options: BinlogDumpFlags) -> Self {
        Self {
            dump_options: options,
            ..self
        }
    }

    /// Streams opened with `BINLOG_DUMP_NON_BLOCK` end at the last event instead of waiting.
    pub fn is_non_blocking(&self) -> bool {
        self.dump_options
            .contains(BinlogDumpFlags::BINLOG_DUMP_NON_BLOCK)
    }

    pub fn address(&self) -> String {
        match self.opts.socket() {
            Some(socket) => socket.to_owned(),
            None => format!("{}:{}", self.opts.ip_or_hostname(), self.opts.tcp_port()),
        }
    }

    /// Runs a statement on the shared query connection, reconnecting on broken connections.
    pub async fn execute(&self, sql: &str, params: Params) -> Result<Vec<Row>, Error> {
        let mut guard = self.connection.lock().await;

        execute_with_retry(
            &mut *guard,
            || async { Conn::new(self.opts.clone()).await.map_err(Error::from) },
            sql,
            &params,
        )
        .await
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        if let Some(connection) = self.connection.lock().await.take() {
            connection.disconnect().await?;
        }

        Ok(())
    }

    async fn global_variable(&self, name: &str) -> Result<Option<String>, Error> {
        let rows = self
            .execute(&format!("SHOW GLOBAL VARIABLES LIKE '{name}'"), Params::Empty)
            .await?;

        Ok(rows.first().and_then(|row| row_value(row, 1)))
    }

    pub async fn server_variables(&self) -> Result<ServerVariables, Error> {
        let binlog_format = self
            .global_variable("binlog_format")
            .await?
            .unwrap_or_default();
        let binlog_row_image = self.global_variable("binlog_row_image").await?;
        let version = self
            .execute("SELECT version()", Params::Empty)
            .await?
            .first()
            .and_then(|row| row_value(row, 0))
            .unwrap_or_default();

        Ok(ServerVariables {
            binlog_format,
            binlog_row_image,
            version,
        })
    }

    /// Current position of the server from `SHOW MASTER STATUS`.
    pub async fn master_position(&self, flavor: Flavor) -> Result<MasterPosition, Error> {
        let rows = self.execute("SHOW MASTER STATUS", Params::Empty).await?;
        let row = rows.first().ok_or(Error::BinlogPositionMissing)?;

        let file: String = row_value(row, 0).ok_or(Error::BinlogPositionMissing)?;
        let position: u64 = row_value(row, 1).ok_or(Error::BinlogPositionMissing)?;
        let position = u32::try_from(position).map_err(|_| Error::BinlogPositionMissing)?;

        let gtid_set = match flavor {
            Flavor::MySQL => row_value::<String>(row, 4),
            Flavor::MariaDB => self
                .execute("SELECT @@GLOBAL.gtid_current_pos", Params::Empty)
                .await?
                .first()
                .and_then(|row| row_value::<String>(row, 0)),
        };

        let position = MasterPosition::new(BinlogPosition::new(file, position));

        match gtid_set {
            Some(gtid_set) if !gtid_set.trim().is_empty() => {
                Ok(position.with_gtid_set(GtidSet::parse(flavor, &gtid_set)?))
            }
            _ => Ok(position),
        }
    }

    async fn server_id(&self, connection: &mut Conn) -> Result<u32, Error> {
        let server_id = connection
            .query_first::<u32, _>("SELECT @@server_id")
            .await?
            .unwrap_or(1);

        let server_id = connection
            .query_fold("SHOW SLAVE HOSTS", server_id, |current, row: Row| {
                max(current, row_value::<u32>(&row, 0).unwrap_or(0))
            })
            .await?;

        Ok(server_id + 1)
    }

    /// Opens a dedicated streaming connection starting at the GTID set when enabled, or at the file position.
    pub async fn binlog_stream(
        &self,
        settings: &StreamSettings,
        position: &MasterPosition,
    ) -> Result<BinlogStream, Error> {
        let mut connection = Conn::new(self.opts.clone()).await?;

        let server_id = match settings.server_id {
            Some(server_id) => server_id,
            None => self.server_id(&mut connection).await?,
        };

        connection
            .query_drop(format!(
                "SET @master_heartbeat_period = {}",
                settings.heartbeat_period.as_nanos()
            ))
            .await?;

        let request = BinlogRequest::new(server_id).with_flags(self.dump_options);

        let request = match (&position.gtid_set, settings.use_gtid) {
            (Some(GtidSet::MySQL(gtid_set)), true) => {
                let sids = gtid_set
                    .intervals()
                    .map(|(sid, intervals)| {
                        intervals.iter().fold(Sid::new(*sid), |sid, (start, end)| {
                            sid.with_interval(GnoInterval::new(*start, *end))
                        })
                    })
                    .collect::<Vec<_>>();

                debug!(gtid_set = %gtid_set, server_id, "Starting binlog stream from GTID set");

                request.with_use_gtid(true).with_sids(sids)
            }
            (Some(GtidSet::MariaDB(gtid_set)), true) => {
                connection
                    .query_drop("SET @mariadb_slave_capability = 4")
                    .await?;
                connection
                    .exec_drop("SET @slave_connect_state = ?", (gtid_set.to_string(),))
                    .await?;
                connection
                    .query_drop("SET @slave_gtid_strict_mode = 0")
                    .await?;
                connection
                    .query_drop("SET @slave_gtid_ignore_duplicates = 0")
                    .await?;

                debug!(gtid_set = %gtid_set, server_id, "Starting binlog stream from GTID state");

                request.with_filename(&b""[..]).with_pos(4u64)
            }
            _ => {
                debug!(
                    file = position.binlog.file(),
                    position = position.binlog.position(),
                    server_id,
                    "Starting binlog stream from file position"
                );

                request
                    .with_filename(position.binlog.file().as_bytes())
                    .with_pos(position.binlog.position())
            }
        };

        Ok(connection.get_binlog_stream(request).await?)
    }
}
