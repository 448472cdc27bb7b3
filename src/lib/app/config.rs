use crate::database::{Database, StreamSettings};
use crate::error::Error as CollectorError;
use crate::filter::{DatabaseRule, TableFilter, ValueOptions};
use crate::replication::SessionSettings;

use mysql_async::{Opts, OptsBuilder};
use serde::de::{Error, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt::Formatter;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(PartialEq, Debug, Clone)]
pub struct ConnectionOpts(Opts);

#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct ApplicationConfig {
    #[serde(default = "ApplicationConfig::default_checkpoint_dir")]
    checkpoint_dir: PathBuf,
    #[serde(default = "ApplicationConfig::default_restart_backoff")]
    restart_backoff: u64,
    #[serde(default = "ApplicationConfig::default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    null_int: i64,
    #[serde(default)]
    null_float: f64,
    #[serde(default)]
    null_string: String,
    sources: Vec<SourceConfig>,
}

/// Connection, stream and capture settings of one MySQL source.
#[derive(Deserialize, PartialEq, Debug, Clone)]
pub struct SourceConfig {
    connection: ConnectionOpts,
    #[serde(default)]
    server_id: Option<u32>,
    #[serde(default = "SourceConfig::default_heartbeat_period")]
    heartbeat_period: u64,
    #[serde(default = "SourceConfig::default_read_timeout")]
    read_timeout: u64,
    #[serde(default)]
    discard_no_meta_row_event: bool,
    #[serde(default)]
    use_decimal: bool,
    #[serde(default)]
    parse_time: bool,
    #[serde(default)]
    use_gtid: bool,
    #[serde(default)]
    measurement_prefix: Option<String>,
    #[serde(default)]
    databases: Vec<DatabaseRule>,
}

impl ApplicationConfig {
    fn default_checkpoint_dir() -> PathBuf {
        PathBuf::from("./binlog-checkpoints")
    }

    fn default_restart_backoff() -> u64 {
        5
    }

    fn default_batch_size() -> usize {
        1000
    }

    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self {
            checkpoint_dir: Self::default_checkpoint_dir(),
            restart_backoff: Self::default_restart_backoff(),
            batch_size: Self::default_batch_size(),
            null_int: 0,
            null_float: 0.0,
            null_string: String::new(),
            sources,
        }
    }

    pub fn with_checkpoint_dir(self, checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.sources.is_empty() {
            return Err(CollectorError::Config("at least one source is required".into()));
        }

        if self.batch_size == 0 {
            return Err(CollectorError::Config("batch_size must be positive".into()));
        }

        for source in &self.sources {
            source.validate()?;
        }

        Ok(())
    }

    pub fn checkpoint_dir(&self) -> &Path {
        self.checkpoint_dir.as_path()
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn value_options(&self, source: &SourceConfig) -> ValueOptions {
        ValueOptions {
            use_decimal: source.use_decimal,
            parse_time: source.parse_time,
            null_int: self.null_int,
            null_float: self.null_float,
            null_string: self.null_string.clone(),
        }
    }
}

impl SourceConfig {
    fn default_heartbeat_period() -> u64 {
        60
    }

    fn default_read_timeout() -> u64 {
        90
    }

    pub fn new(connection: impl Into<ConnectionOpts>, databases: Vec<DatabaseRule>) -> Self {
        Self {
            connection: connection.into(),
            server_id: None,
            heartbeat_period: Self::default_heartbeat_period(),
            read_timeout: Self::default_read_timeout(),
            discard_no_meta_row_event: false,
            use_decimal: false,
            parse_time: false,
            use_gtid: false,
            measurement_prefix: None,
            databases,
        }
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.read_timeout <= self.heartbeat_period {
            return Err(CollectorError::Config(format!(
                "read_timeout ({}s) of {} must exceed heartbeat_period ({}s)",
                self.read_timeout,
                self.address(),
                self.heartbeat_period
            )));
        }

        for database in &self.databases {
            database.validate()?;
        }

        Ok(())
    }

    pub fn create_database(&self) -> Database {
        Database::new(self.connection.0.clone())
    }

    pub fn address(&self) -> String {
        self.create_database().address()
    }

    pub fn discard_no_meta_row_event(&self) -> bool {
        self.discard_no_meta_row_event
    }

    pub fn table_filter(&self) -> TableFilter {
        let filter = TableFilter::new(self.databases.clone());

        match &self.measurement_prefix {
            Some(prefix) => filter.with_measurement_prefix(prefix),
            None => filter,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            stream: StreamSettings {
                server_id: self.server_id,
                heartbeat_period: Duration::from_secs(self.heartbeat_period),
                use_gtid: self.use_gtid,
            },
            read_timeout: Duration::from_secs(self.read_timeout),
        }
    }
}

impl<'de> Deserialize<'de> for ConnectionOpts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConnectionVisitor;

        enum ConnectionKey {
            Socket,
            User,
            Pass,
            Host,
            Port,
            StmtCacheSize,
            MaxAllowedPacket,
        }

        impl<'de> Deserialize<'de> for ConnectionKey {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                struct ConnectionKeyVisitor;
                impl<'de> Visitor<'de> for ConnectionKeyVisitor {
                    type Value = ConnectionKey;

                    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
                        formatter.write_str("a connection option name")
                    }

                    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                    where
                        E: Error,
                    {
                        Ok(match value {
                            "socket" => ConnectionKey::Socket,
                            "user" => ConnectionKey::User,
                            "pass" | "password" => ConnectionKey::Pass,
                            "host" => ConnectionKey::Host,
                            "port" => ConnectionKey::Port,
                            "stmt_cache_size" => ConnectionKey::StmtCacheSize,
                            "max_allowed_packet" => ConnectionKey::MaxAllowedPacket,
                            other => {
                                return Err(E::custom(format!(
                                    "unknown connection key \"{other}\""
                                )))
                            }
                        })
                    }
                }

                deserializer.deserialize_identifier(ConnectionKeyVisitor)
            }
        }

        impl<'de> Visitor<'de> for ConnectionVisitor {
            type Value = ConnectionOpts;

            fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
                formatter.write_str("a valid URL or connection options for MySQL")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                match Opts::from_url(v) {
                    Ok(opts) => Ok(ConnectionOpts(opts)),
                    Err(err) => Err(E::custom(err.to_string())),
                }
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: Error,
            {
                self.visit_str(&v)
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut builder = OptsBuilder::default();

                while let Some(key) = map.next_key::<ConnectionKey>()? {
                    builder = match key {
                        ConnectionKey::Socket => builder.socket(Some(map.next_value::<String>()?)),
                        ConnectionKey::User => builder.user(Some(map.next_value::<String>()?)),
                        ConnectionKey::Pass => builder.pass(Some(map.next_value::<String>()?)),
                        ConnectionKey::Host => builder.ip_or_hostname(map.next_value::<String>()?),
                        ConnectionKey::Port => builder.tcp_port(map.next_value()?),
                        ConnectionKey::StmtCacheSize => {
                            builder.stmt_cache_size(Some(map.next_value()?))
                        }
                        ConnectionKey::MaxAllowedPacket => {
                            builder.max_allowed_packet(Some(map.next_value()?))
                        }
                    }
                }

                Ok(ConnectionOpts(builder.into()))
            }
        }

        deserializer.deserialize_any(ConnectionVisitor)
    }
}

impl From<Opts> for ConnectionOpts {
    fn from(value: Opts) -> Self {
        ConnectionOpts(value)
    }
}

impl From<OptsBuilder> for ConnectionOpts {
    fn from(value: OptsBuilder) -> Self {
        ConnectionOpts(value.into())
    }
}
