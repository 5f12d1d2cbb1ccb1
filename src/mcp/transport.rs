//! MCP transport layer.
//!
//! Newline-delimited JSON-RPC over a byte stream pair, stdin/stdout by default.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// A message that can be sent or received.
#[derive(Debug, Clone)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send {
    /// Start the transport, returning channels for messages.
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)>;

    /// Stop the transport once every outgoing sender has been dropped.
    async fn stop(&mut self) -> Result<()>;
}

/// Line-delimited JSON-RPC transport.
pub struct StdioTransport<R = Stdin, W = Stdout> {
    reader: Option<R>,
    writer: Option<W>,
    writer_task: Option<JoinHandle<()>>,
}

impl StdioTransport {
    /// Create a transport on the process's stdin and stdout.
    pub fn new() -> Self {
        Self::with_streams(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a transport on arbitrary streams.
    pub fn with_streams(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            writer_task: None,
        }
    }
}

fn parse_message(line: &str) -> Option<Message> {
    if let Ok(req) = serde_json::from_str::<JsonRpcRequest>(line) {
        Some(Message::Request(req))
    } else if let Ok(notif) = serde_json::from_str::<JsonRpcNotification>(line) {
        Some(Message::Notification(notif))
    } else {
        None
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
        let (Some(reader), Some(mut writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(Error::McpProtocol("transport already started".to_string()));
        };

        // Channel for incoming messages (from the reader)
        let (incoming_tx, incoming_rx) = mpsc::channel::<Message>(100);
        // Channel for outgoing messages (to the writer)
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(100);

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("EOF on input, stopping transport");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        trace!("Received: {}", trimmed);

                        match parse_message(trimmed) {
                            Some(msg) => {
                                if incoming_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            None => error!("Failed to parse message: {}", trimmed),
                        }
                    }
                    Err(e) => {
                        error!("Error reading input: {}", e);
                        break;
                    }
                }
            }
        });

        self.writer_task = Some(tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let json = match &msg {
                    Message::Request(req) => serde_json::to_string(req),
                    Message::Response(res) => serde_json::to_string(res),
                    Message::Notification(notif) => serde_json::to_string(notif),
                };

                let mut s = match json {
                    Ok(s) => s,
                    Err(e) => {
                        error!("Error serializing message: {}", e);
                        continue;
                    }
                };

                trace!("Sending: {}", s);
                s.push('\n');
                if let Err(e) = writer.write_all(s.as_bytes()).await {
                    error!("Error writing output: {}", e);
                    break;
                }
                if let Err(e) = writer.flush().await {
                    error!("Error flushing output: {}", e);
                    break;
                }
            }
        }));

        Ok((incoming_rx, outgoing_tx))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.writer_task.take() {
            task.await?;
        }
        Ok(())
    }
}
