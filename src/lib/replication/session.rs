use crate::database::{Database, StreamSettings};
use crate::error::Error;
use crate::position::PositionStore;
use crate::record::RecordSink;
use crate::replication::{Dispatcher, EventDecoder, Transition};
use crate::schema::MetadataSource;
use mysql_async::{BinlogStream, Error as MySQLError};
use mysql_common::binlog::events::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub stream: StreamSettings,
    /// Longest wait for the next event, heartbeats included.
    pub read_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stream: StreamSettings::default(),
            read_timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    Canceled,
    /// Non-blocking stream reached the end of the binlog.
    Finished,
}

/// Single replication run against one source, from pre-flight checks to stream end.
pub struct Session<P, S> {
    database: Arc<Database>,
    dispatcher: Dispatcher<Arc<Database>, P, S>,
    settings: SessionSettings,
}

impl<P, S> Session<P, S>
where
    P: PositionStore,
    S: RecordSink,
{
    pub fn new(
        database: Arc<Database>,
        dispatcher: Dispatcher<Arc<Database>, P, S>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            database,
            dispatcher,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<Arc<Database>, P, S> {
        &self.dispatcher
    }

    /// Streams events until canceled or failed, errors are fatal to the session.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SessionOutcome, Error> {
        let flavor = self.database.server_variables().await?.verify()?;

        let position = match self.dispatcher.store().load().await? {
            Some(position) => {
                info!(
                    source = %self.database.address(),
                    file = position.binlog.file(),
                    position = position.binlog.position(),
                    "Resuming from checkpoint"
                );
                position
            }
            None => {
                let position = self.database.master_position(flavor).await?;
                info!(
                    source = %self.database.address(),
                    file = position.binlog.file(),
                    position = position.binlog.position(),
                    "No checkpoint stored, starting from current master position"
                );
                position
            }
        };

        self.dispatcher.resume(position);

        if cancel.is_cancelled() {
            return Ok(SessionOutcome::Canceled);
        }

        let stream = self
            .database
            .binlog_stream(&self.settings.stream, self.dispatcher.position())
            .await?;

        self.read_events(stream, cancel).await
    }

    async fn read_events(
        &mut self,
        mut stream: BinlogStream,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, Error> {
        let outcome = dispatch_stream(
            &mut stream,
            &mut self.dispatcher,
            self.settings.read_timeout,
            self.database.is_non_blocking(),
            cancel,
        )
        .await;

        if let Ok(SessionOutcome::Canceled) = outcome {
            if let Err(error) = stream.close().await {
                debug!(error = %error, "Binlog stream was not closed cleanly");
            }
        }

        outcome
    }
}

/// Feeds decoded events to the dispatcher until canceled or the stream ends.
///
/// Cancellation and a finished non-blocking stream both persist the committed position.
async fn dispatch_stream<St, M, P, S>(
    stream: &mut St,
    dispatcher: &mut Dispatcher<M, P, S>,
    read_timeout: Duration,
    non_blocking: bool,
    cancel: &CancellationToken,
) -> Result<SessionOutcome, Error>
where
    St: Stream<Item = Result<Event, MySQLError>> + Unpin,
    M: MetadataSource,
    P: PositionStore,
    S: RecordSink,
{
    let mut decoder = EventDecoder::default();

    loop {
        let next_event = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next_event = timeout(read_timeout, stream.next()) => Some(next_event),
        };

        let event = match next_event {
            None => {
                dispatcher.persist().await?;
                return Ok(SessionOutcome::Canceled);
            }
            Some(Err(_)) => return Err(Error::ReadTimeout(read_timeout)),
            Some(Ok(None)) if non_blocking => {
                dispatcher.persist().await?;
                return Ok(SessionOutcome::Finished);
            }
            Some(Ok(None)) => return Err(Error::StreamClosed),
            Some(Ok(Some(event))) => event?,
        };

        let Some((header, event)) = decoder.decode(&event)? else {
            continue;
        };

        match dispatcher.handle(header, event).await? {
            Transition::Ignored | Transition::GtidReceived => {}
            transition => trace!(?transition, "Dispatched binlog event"),
        }
    }
}
