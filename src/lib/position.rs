use crate::error::Error;
use crate::replication::event::BinlogPosition;
use crate::replication::gtid::{Flavor, GtidSet};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Replicated position of one source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MasterPosition {
    pub binlog: BinlogPosition,
    pub gtid_set: Option<GtidSet>,
    pub timestamp: u32,
}

/// Durable checkpoint of a master position.
pub trait PositionStore {
    async fn load(&self) -> Result<Option<MasterPosition>, Error>;

    async fn save(&self, position: &MasterPosition) -> Result<(), Error>;
}

impl<T> PositionStore for Arc<T>
where
    T: PositionStore,
{
    async fn load(&self) -> Result<Option<MasterPosition>, Error> {
        self.as_ref().load().await
    }

    async fn save(&self, position: &MasterPosition) -> Result<(), Error> {
        self.as_ref().save(position).await
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Checkpoint {
    file: String,
    position: u32,
    #[serde(default)]
    gtid_set: Option<String>,
    #[serde(default)]
    flavor: Option<Flavor>,
    #[serde(default)]
    timestamp: u32,
}

impl MasterPosition {
    pub fn new(binlog: BinlogPosition) -> Self {
        Self {
            binlog,
            gtid_set: None,
            timestamp: 0,
        }
    }

    pub fn with_gtid_set(self, gtid_set: GtidSet) -> Self {
        Self {
            gtid_set: Some(gtid_set),
            ..self
        }
    }

    fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            file: self.binlog.file().to_owned(),
            position: self.binlog.position(),
            gtid_set: self.gtid_set.as_ref().map(ToString::to_string),
            flavor: self.gtid_set.as_ref().map(GtidSet::flavor),
            timestamp: self.timestamp,
        }
    }

    fn from_checkpoint(checkpoint: Checkpoint) -> Result<Self, Error> {
        let gtid_set = match (checkpoint.gtid_set, checkpoint.flavor) {
            (Some(gtid_set), Some(flavor)) => Some(GtidSet::parse(flavor, &gtid_set)?),
            _ => None,
        };

        Ok(Self {
            binlog: BinlogPosition::new(checkpoint.file, checkpoint.position),
            gtid_set,
            timestamp: checkpoint.timestamp,
        })
    }
}

/// Checkpoint file per source, named after the md5 of the source address.
#[derive(Clone, Debug)]
pub struct FilePositionStore {
    path: PathBuf,
}

impl FilePositionStore {
    pub fn new(directory: impl AsRef<Path>, address: impl AsRef<str>) -> Self {
        let name = hex::encode(Md5::digest(address.as_ref().as_bytes()));

        Self {
            path: directory.as_ref().join(format!("{name}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the checkpoint, returns false when there was none.
    pub async fn clear(&self) -> Result<bool, Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }
}

impl PositionStore for FilePositionStore {
    async fn load(&self) -> Result<Option<MasterPosition>, Error> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&content)?;

        MasterPosition::from_checkpoint(checkpoint).map(Some)
    }

    async fn save(&self, position: &MasterPosition) -> Result<(), Error> {
        if let Some(directory) = self.path.parent() {
            tokio::fs::create_dir_all(directory).await?;
        }

        let content = serde_json::to_vec(&position.to_checkpoint())?;
        let temporary = self.path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&temporary).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temporary, &self.path).await?;

        debug!(
            file = position.binlog.file(),
            position = position.binlog.position(),
            "Saved binlog checkpoint"
        );

        Ok(())
    }
}
