//! Newline-delimited JSON peer transport over TCP
//!
//! Each message opens a connection, writes one JSON line and reads one JSON
//! line back: either `null` or a reply message.

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

use crate::sync::{ActivationState, ChannelError, Inbound, PeerChannel, SyncMessage};

#[derive(Debug)]
pub struct TcpPeerChannel {
    addr: String,
    activated: AtomicBool,
}

impl TcpPeerChannel {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            activated: AtomicBool::new(true),
        }
    }

    pub fn set_activated(&self, activated: bool) {
        self.activated.store(activated, Ordering::SeqCst);
    }
}

/// Connection-level failures are worth retrying; anything else is not
fn io_error(e: io::Error) -> ChannelError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::TimedOut => ChannelError::Unavailable(e.to_string()),
        _ => ChannelError::Transport(e.to_string()),
    }
}

fn codec_error(e: serde_json::Error) -> ChannelError {
    ChannelError::Codec(e.to_string())
}

fn encode_line<T: serde::Serialize>(value: &T) -> Result<String, ChannelError> {
    let mut line = serde_json::to_string(value).map_err(codec_error)?;
    line.push('\n');
    Ok(line)
}

#[async_trait]
impl PeerChannel for TcpPeerChannel {
    fn activation_state(&self) -> ActivationState {
        if self.activated.load(Ordering::SeqCst) {
            ActivationState::Activated
        } else {
            ActivationState::NotActivated
        }
    }

    async fn send_message(&self, message: &SyncMessage) -> Result<Option<SyncMessage>, ChannelError> {
        if self.activation_state() != ActivationState::Activated {
            return Err(ChannelError::NotActivated);
        }

        let stream = TcpStream::connect(&self.addr).await.map_err(io_error)?;
        let (read, mut write) = stream.into_split();
        write
            .write_all(encode_line(message)?.as_bytes())
            .await
            .map_err(io_error)?;

        let mut reply = String::new();
        let read_bytes = BufReader::new(read)
            .read_line(&mut reply)
            .await
            .map_err(io_error)?;
        if read_bytes == 0 {
            return Err(ChannelError::Disconnected);
        }
        serde_json::from_str(reply.trim()).map_err(codec_error)
    }
}

/// Accept peer connections and hand each message to `inbox`, writing the
/// reply back on the same connection.
pub async fn serve_peer(listener: TcpListener, inbox: mpsc::Sender<Inbound>) -> io::Result<()> {
    info!("Peer link listening on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Peer connection from {}", addr);
        let inbox = inbox.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, inbox).await {
                warn!("Peer connection from {} failed: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, inbox: mpsc::Sender<Inbound>) -> Result<(), ChannelError> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await.map_err(io_error)? {
        if line.trim().is_empty() {
            continue;
        }
        let message: SyncMessage = serde_json::from_str(&line).map_err(codec_error)?;
        let (inbound, reply_rx) = Inbound::new(message);
        inbox
            .send(inbound)
            .await
            .map_err(|_| ChannelError::Unavailable("inbound task stopped".to_string()))?;
        let reply = reply_rx.await.unwrap_or(None);
        write
            .write_all(encode_line(&reply)?.as_bytes())
            .await
            .map_err(io_error)?;
    }
    Ok(())
}
