use crate::error::Error;
use crate::output::{JsonOutput, LineProtocol, MessagePack, Output};
use crate::record::AssembledRecord;
use tokio::io::AsyncWrite;

#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub enum ApplicationOutput {
    #[default]
    Json,
    Binary,
    Line,
}

impl Output for ApplicationOutput {
    async fn write<T: AsyncWrite + Unpin>(
        &self,
        writer: &mut T,
        records: &[AssembledRecord],
    ) -> Result<(), Error> {
        match self {
            Self::Json => JsonOutput.write(writer, records).await,
            Self::Binary => MessagePack.write(writer, records).await,
            Self::Line => LineProtocol.write(writer, records).await,
        }
    }
}
