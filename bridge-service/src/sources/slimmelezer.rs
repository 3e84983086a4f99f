use std::{collections::HashMap, pin::Pin, time::Duration};

use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use tokio::{net::TcpStream, sync::mpsc, time::timeout};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::{
    pipeline::{Envelope, PipelineError, Source},
    sources::SensorSample,
};

const MAX_LINE_BYTES: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport error: {0}")]
    Transport(#[from] LinesCodecError),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
    #[error("adapter refused the request: {0}")]
    Refused(String),
    #[error("unexpected message while waiting for {0}")]
    UnexpectedMessage(&'static str),
    #[error("adapter closed the connection")]
    ConnectionClosed,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request<'a> {
    Hello {
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<&'a str>,
    },
    ListEntities,
    Subscribe,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Message {
    HelloOk {
        #[serde(default)]
        server: Option<String>,
    },
    Error {
        message: String,
    },
    Entities {
        entities: Vec<EntityRecord>,
    },
    State {
        key: u32,
        #[serde(deserialize_with = "value_or_null")]
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    key: u32,
    name: String,
}

/// The adapter reports an unavailable sensor value as JSON null.
fn value_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

enum SessionEnd {
    ReceiverDropped,
    ConnectionLost(String),
}

/// One authenticated adapter session: newline-delimited JSON over TCP.
struct Session {
    framed: Framed<TcpStream, LinesCodec>,
}

impl Session {
    async fn connect(host: &str, port: u16, password: Option<&str>) -> Result<Self, AdapterError> {
        let stream = TcpStream::connect((host, port)).await?;
        let mut session =
            Self { framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES)) };
        session.send(&Request::Hello { password }).await?;
        match session.recv().await? {
            Message::HelloOk { server } => {
                tracing::debug!(server = server.as_deref().unwrap_or("unknown"), "adapter greeted us");
            }
            Message::Error { message } => return Err(AdapterError::AuthRejected(message)),
            _ => return Err(AdapterError::UnexpectedMessage("hello_ok")),
        }
        Ok(session)
    }

    /// Fetches the entity catalog and opens the state subscription.
    async fn subscribe(&mut self) -> Result<HashMap<u32, String>, AdapterError> {
        self.send(&Request::ListEntities).await?;
        let catalog = match self.recv().await? {
            Message::Entities { entities } => {
                entities.into_iter().map(|entity| (entity.key, entity.name)).collect()
            }
            Message::Error { message } => return Err(AdapterError::Refused(message)),
            _ => return Err(AdapterError::UnexpectedMessage("entities")),
        };
        self.send(&Request::Subscribe).await?;
        Ok(catalog)
    }

    async fn send(&mut self, request: &Request<'_>) -> Result<(), AdapterError> {
        self.framed.send(serde_json::to_string(request)?).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message, AdapterError> {
        match self.framed.next().await {
            Some(Ok(line)) => Ok(serde_json::from_str(&line)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(AdapterError::ConnectionClosed),
        }
    }

    /// Forwards state events into the channel until the session or the
    /// receiver goes away.
    async fn drain(
        &mut self,
        catalog: &HashMap<u32, String>,
        tx: &mpsc::Sender<Result<Envelope<SensorSample>, PipelineError>>,
    ) -> SessionEnd {
        loop {
            let line = match self.framed.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => return SessionEnd::ConnectionLost(e.to_string()),
                None => return SessionEnd::ConnectionLost("adapter closed the connection".to_string()),
            };
            let message: Message = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed adapter message");
                    metrics::counter!("adapter_malformed_messages_total").increment(1);
                    continue;
                }
            };
            let Message::State { key, value } = message else {
                continue;
            };
            let Some(name) = catalog.get(&key) else {
                tracing::trace!(key, "state for a key missing from the entity catalog");
                continue;
            };
            metrics::counter!("adapter_samples_total").increment(1);
            let envelope = Envelope {
                payload: SensorSample { entity: name.clone(), value },
                received_at: OffsetDateTime::now_utc(),
            };
            if tx.send(Ok(envelope)).await.is_err() {
                return SessionEnd::ReceiverDropped;
            }
        }
    }
}

/// Connection manager for the meter adapter.
///
/// Dials and authenticates under `attempt_timeout`; timeouts retry up to
/// `max_attempts`, anything else is fatal. A session that is later lost
/// counts against the same attempt budget. Exhausting the budget ends the
/// pipeline; supervision is expected to restart the whole process.
pub struct SlimmelezerSource {
    host: String,
    port: u16,
    password: Option<String>,
    attempt_timeout: Duration,
    subscribe_timeout: Duration,
    max_attempts: u32,
    channel_capacity: usize,
}

impl SlimmelezerSource {
    pub fn new(
        host: String,
        port: u16,
        password: Option<String>,
        attempt_timeout: Duration,
        subscribe_timeout: Duration,
        max_attempts: u32,
        channel_capacity: usize,
    ) -> Self {
        Self { host, port, password, attempt_timeout, subscribe_timeout, max_attempts, channel_capacity }
    }

    async fn run(
        &self,
        tx: mpsc::Sender<Result<Envelope<SensorSample>, PipelineError>>,
    ) -> Result<(), PipelineError> {
        let mut attempt: u32 = 0;
        while attempt < self.max_attempts {
            attempt += 1;
            tracing::info!(attempt, max_attempts = self.max_attempts, "connecting to meter adapter");

            let mut session = match timeout(
                self.attempt_timeout,
                Session::connect(&self.host, self.port, self.password.as_deref()),
            )
            .await
            {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "unrecoverable error while connecting to meter adapter");
                    return Err(PipelineError::Source(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(attempt, max_attempts = self.max_attempts, "connection attempt timed out");
                    continue;
                }
            };

            let catalog = match timeout(self.subscribe_timeout, session.subscribe()).await {
                Ok(Ok(catalog)) => catalog,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "unrecoverable error while subscribing to meter adapter");
                    return Err(PipelineError::Source(e.to_string()));
                }
                Err(_) => {
                    tracing::warn!(attempt, max_attempts = self.max_attempts, "subscription setup timed out");
                    continue;
                }
            };
            tracing::info!(n_entities = catalog.len(), "subscribed to meter adapter");

            match session.drain(&catalog, &tx).await {
                SessionEnd::ReceiverDropped => return Ok(()),
                SessionEnd::ConnectionLost(reason) => {
                    tracing::warn!(%reason, attempt, "lost connection to meter adapter, reconnecting");
                }
            }
        }

        tracing::error!(max_attempts = self.max_attempts, "maximum connection attempts reached, giving up");
        Err(PipelineError::Source(format!(
            "gave up after {} connection attempts",
            self.max_attempts
        )))
    }
}

#[async_trait::async_trait]
impl Source<SensorSample> for SlimmelezerSource {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<SensorSample>, PipelineError>> + Send>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let manager = Self::new(
            self.host.clone(),
            self.port,
            self.password.clone(),
            self.attempt_timeout,
            self.subscribe_timeout,
            self.max_attempts,
            self.channel_capacity,
        );
        tokio::spawn(async move {
            if let Err(e) = manager.run(tx.clone()).await {
                let _ = tx.send(Err(e)).await;
            }
        });
        Box::pin(ReceiverStream::new(rx))
    }
}
