//! Live session transport: one websocket connection per conversation.
//!
//! Delivery contract relied on by the rest of the client: `Opened` fires at
//! most once; inbound events arrive in server order; `Closed` and `Errored`
//! are terminal — nothing follows them. There is no automatic reconnect: a
//! transport failure ends the conversation attempt and the user re-enters.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::protocol::{AudioChunk, HelloMessage, InboundEvent, OutboundAudioMessage, ServerMessage};

#[derive(Debug)]
pub enum SessionEvent {
    Opened,
    Inbound(InboundEvent),
    Closed,
    Errored(String),
}

#[derive(Debug)]
pub enum SessionCommand {
    SendAudio(AudioChunk),
    Close,
}

pub struct LiveSession {
    config: SessionConfig,
    tx: mpsc::Sender<SessionEvent>,
    rx_cmd: mpsc::Receiver<SessionCommand>,
}

impl LiveSession {
    pub fn new(
        config: SessionConfig,
        tx: mpsc::Sender<SessionEvent>,
        rx_cmd: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self { config, tx, rx_cmd }
    }

    /// Drive the session to completion. Exactly one terminal event is
    /// emitted: `Closed` on clean shutdown, `Errored` otherwise.
    pub async fn run(mut self) {
        match self.connect_and_loop().await {
            Ok(()) => {
                let _ = self.tx.send(SessionEvent::Closed).await;
            }
            Err(e) => {
                let _ = self.tx.send(SessionEvent::Errored(format!("{:#}", e))).await;
            }
        }
    }

    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        let url = Url::parse(&self.config.ws_url)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(self.config.ws_url.as_str())
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Client-Id", Uuid::new_v4().to_string())
            .header("Protocol-Version", "1")
            .body(())?;

        log::info!("connecting to {}...", self.config.ws_url);
        let deadline = Duration::from_secs(self.config.connect_timeout_secs);
        let (ws_stream, _) = timeout(deadline, connect_async(request))
            .await
            .map_err(|_| TransportError::ConnectTimeout(self.config.connect_timeout_secs))?
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        log::info!("connected");

        let (mut write, mut read) = ws_stream.split();

        self.tx.send(SessionEvent::Opened).await?;

        let hello_json = serde_json::to_string(&HelloMessage::new())?;
        write.send(Message::Text(hello_json.into())).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(msg) => {
                                    if let Some(event) = msg.into_event() {
                                        self.tx.send(SessionEvent::Inbound(event)).await?;
                                    }
                                }
                                Err(e) => {
                                    log::warn!("unparseable server message: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("server closed session: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(TransportError::Session(e.to_string()).into());
                        }
                        None => {
                            return Err(TransportError::Session("connection lost".into()).into());
                        }
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(SessionCommand::SendAudio(chunk)) => {
                            let msg = OutboundAudioMessage {
                                msg_type: "audio",
                                format: &chunk.format,
                                data: &chunk.data,
                            };
                            write.send(Message::Text(serde_json::to_string(&msg)?.into())).await?;
                        }
                        Some(SessionCommand::Close) | None => {
                            // Command side gone or explicit close: shut the
                            // socket down cleanly.
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}
