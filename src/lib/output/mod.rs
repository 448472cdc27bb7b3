mod json;
mod line;
mod msgpack;

use crate::error::Error;
use crate::record::AssembledRecord;
pub use json::*;
pub use line::*;
pub use msgpack::*;

use tokio::io::AsyncWrite;

pub trait Output {
    async fn write<T: AsyncWrite + Unpin>(
        &self,
        writer: &mut T,
        records: &[AssembledRecord],
    ) -> Result<(), Error>;
}
