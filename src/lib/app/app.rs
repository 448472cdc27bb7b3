use crate::app::{ApplicationConfig, ApplicationOutput, SourceConfig};
use crate::error::Error;
use crate::output::Output;
use crate::position::{FilePositionStore, MasterPosition, PositionStore};
use crate::record::{AssembledRecord, RecordSink};
use crate::replication::{Dispatcher, Session, SessionOutcome};
use crate::schema::TableCache;

use mysql_common::packets::BinlogDumpFlags;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{stdout, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub enum ApplicationCommand {
    Position(ApplicationConfig),
    Run(ApplicationConfig, ApplicationOutput, bool),
    Reset(ApplicationConfig, String),
}

/// Messages consumed by the record writer task.
#[derive(Debug, PartialEq)]
pub enum SinkMessage {
    Record(AssembledRecord),
    Flush,
}

/// Record sink backed by the bounded channel of the writer task.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: Sender<SinkMessage>,
}

impl RecordSink for ChannelSink {
    async fn send(&self, record: AssembledRecord) -> Result<(), Error> {
        self.sender
            .send(SinkMessage::Record(record))
            .await
            .map_err(|_| Error::Synchronization)
    }

    async fn flush(&self) -> Result<(), Error> {
        self.sender
            .send(SinkMessage::Flush)
            .await
            .map_err(|_| Error::Synchronization)
    }
}

/// Writes whatever is queued, up to `batch_size` records at a time.
pub async fn write_records<W: AsyncWrite + Unpin>(
    output: ApplicationOutput,
    writer: &mut W,
    mut receiver: Receiver<SinkMessage>,
    batch_size: usize,
) -> Result<(), Error> {
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(message) = receiver.recv().await {
        let mut flush = push_message(&mut batch, message);

        while batch.len() < batch_size {
            match receiver.try_recv() {
                Ok(message) => flush |= push_message(&mut batch, message),
                Err(_) => break,
            }
        }

        if !batch.is_empty() {
            output.write(writer, &batch).await?;
            batch.clear();
        }

        if flush {
            writer.flush().await?;
        }
    }

    writer.flush().await?;

    Ok(())
}

fn push_message(batch: &mut Vec<AssembledRecord>, message: SinkMessage) -> bool {
    match message {
        SinkMessage::Record(record) => {
            batch.push(record);
            false
        }
        SinkMessage::Flush => true,
    }
}

fn create_writer(
    output: ApplicationOutput,
    batch_size: usize,
) -> (ChannelSink, JoinHandle<Result<(), Error>>) {
    let (sender, receiver) = channel(batch_size * 10);

    let handle = tokio::spawn(async move {
        write_records(output, &mut stdout(), receiver, batch_size).await
    });

    (ChannelSink { sender }, handle)
}

fn position_json(position: &MasterPosition) -> Value {
    json!({
        "file": position.binlog.file(),
        "position": position.binlog.position(),
        "gtid_set": position.gtid_set.as_ref().map(ToString::to_string),
    })
}

/// Runs sessions of one source until one ends cleanly, restarting failed ones after `backoff`.
///
/// A gone record writer stops every source through the shared token.
async fn supervise<F, Fut>(
    address: &str,
    backoff: Duration,
    cancel: &CancellationToken,
    mut session: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SessionOutcome, Error>>,
{
    loop {
        match session().await {
            Ok(SessionOutcome::Canceled) => {
                info!(source = %address, "Replication stopped");
                return;
            }
            Ok(SessionOutcome::Finished) => {
                info!(source = %address, "Reached end of binary log");
                return;
            }
            Err(Error::Synchronization) => {
                error!(source = %address, "Record writer stopped, shutting down replication");
                cancel.cancel();
                return;
            }
            Err(error) => {
                error!(
                    source = %address,
                    error = %error,
                    backoff = ?backoff,
                    "Replication session failed, restarting"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

async fn replicate_source(
    config: Arc<ApplicationConfig>,
    source: SourceConfig,
    sink: ChannelSink,
    dump_options: BinlogDumpFlags,
    cancel: CancellationToken,
) {
    let address = source.address();

    supervise(&address, config.restart_backoff(), &cancel, || {
        let database = Arc::new(source.create_database().with_dump_options(dump_options));

        let dispatcher = Dispatcher::new(
            TableCache::new(Arc::clone(&database), source.table_filter())
                .with_discard_no_meta(source.discard_no_meta_row_event()),
            FilePositionStore::new(config.checkpoint_dir(), &address),
            sink.clone(),
            config.value_options(&source),
        );

        let mut session = Session::new(Arc::clone(&database), dispatcher, source.session_settings());
        let address = address.clone();
        let cancel = cancel.clone();

        async move {
            let result = session.run(&cancel).await;

            if let Err(error) = database.disconnect().await {
                warn!(source = %address, error = %error, "Query connection was not closed cleanly");
            }

            result
        }
    })
    .await
}

/// Entry point of the collector binary.
#[derive(Default)]
pub struct Application {
    cancel: CancellationToken,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canceling this token stops every source gracefully.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn run_sources(
        &self,
        config: ApplicationConfig,
        output: ApplicationOutput,
        non_blocking: bool,
    ) -> Result<(), Error> {
        let config = Arc::new(config);
        let (sink, writer) = create_writer(output, config.batch_size());

        let dump_options = match non_blocking {
            true => BinlogDumpFlags::BINLOG_DUMP_NON_BLOCK,
            false => BinlogDumpFlags::empty(),
        };

        let workers = config
            .sources()
            .iter()
            .map(|source| {
                (
                    source.address(),
                    tokio::spawn(replicate_source(
                        Arc::clone(&config),
                        source.clone(),
                        sink.clone(),
                        dump_options,
                        self.cancel.clone(),
                    )),
                )
            })
            .collect::<Vec<_>>();

        drop(sink);

        let interrupt = {
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping replication");
                    cancel.cancel();
                }
            })
        };

        for (address, worker) in workers {
            if let Err(error) = worker.await {
                error!(source = %address, error = %error, "Replication worker stopped abnormally");
            }
        }

        interrupt.abort();

        writer.await.map_err(|_| Error::Synchronization)?
    }

    async fn print_positions(&self, config: ApplicationConfig) -> Result<(), Error> {
        let mut positions = Vec::new();

        for source in config.sources() {
            let database = source.create_database();
            let flavor = database.server_variables().await?.verify()?;
            let master = database.master_position(flavor).await?;
            let checkpoint = FilePositionStore::new(config.checkpoint_dir(), database.address())
                .load()
                .await?;

            database.disconnect().await?;

            positions.push(json!({
                "source": database.address(),
                "master": position_json(&master),
                "checkpoint": checkpoint.as_ref().map(position_json),
            }));
        }

        println!(
            "{}",
            serde_json::to_string_pretty(&positions).map_err(|_| Error::OutputError)?
        );

        Ok(())
    }

    async fn reset_source(&self, config: ApplicationConfig, address: String) -> Result<(), Error> {
        if !config.sources().iter().any(|source| source.address() == address) {
            return Err(Error::Config(format!("source {address} is not configured")));
        }

        let store = FilePositionStore::new(config.checkpoint_dir(), &address);

        match store.clear().await? {
            true => info!(source = %address, path = %store.path().display(), "Checkpoint removed"),
            false => info!(source = %address, "No checkpoint stored"),
        }

        Ok(())
    }

    pub async fn run(self, command: ApplicationCommand) -> Result<(), Error> {
        match command {
            ApplicationCommand::Position(config) => self.print_positions(config).await,
            ApplicationCommand::Run(config, output, non_blocking) => {
                self.run_sources(config, output, non_blocking).await
            }
            ApplicationCommand::Reset(config, address) => self.reset_source(config, address).await,
        }
    }
}
