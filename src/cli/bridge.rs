use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{Result, WardenError};
use crate::lockdown::{EngineHandle, WireMessage, WireReply};

/// Line-delimited JSON bridge between a content front end and the
/// engine.
///
/// A front-end process that owns the rendering side speaks the surface
/// protocol over a byte stream: one JSON object per line in, one per
/// line out. Malformed lines are discarded with a warning; the engine
/// going away ends the bridge cleanly.
pub struct ProtocolBridge {
    handle: EngineHandle,
}

impl ProtocolBridge {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }

    /// Serve the protocol over this process's stdio until EOF.
    pub async fn run(self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve the protocol over arbitrary byte streams.
    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message: WireMessage = match serde_json::from_str(line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Discarding malformed protocol line");
                    continue;
                }
            };
            match self.dispatch(message, &mut writer).await {
                Ok(()) => {}
                Err(WardenError::EngineClosed) => {
                    debug!("Engine gone, closing protocol bridge");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Protocol stream closed");
        Ok(())
    }

    async fn dispatch<W>(&self, message: WireMessage, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match message {
            WireMessage::Unlock => self.handle.unlock(),
            WireMessage::ResetSession => self.handle.reset_session(),
            WireMessage::GetTasks => {
                let tasks = self.handle.get_tasks().await?;
                let mut payload = serde_json::to_string(&WireReply::TasksData { tasks })?;
                payload.push('\n');
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await?;
                Ok(())
            }
            WireMessage::SaveTasks { tasks } => self.handle.save_tasks(tasks),
        }
    }
}
