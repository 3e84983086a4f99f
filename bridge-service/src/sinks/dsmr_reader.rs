use dsmr_client::{ApiClient, domain::DsmrReading};
use futures::StreamExt;
use time::OffsetDateTime;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Forwards each completed reading to the DSMR-reader datalogger.
///
/// Delivery is at-most-once: a transport failure drops that one record and
/// the stream moves on. No retry, no queue, no persistence.
pub struct DsmrReaderSink {
    client: ApiClient,
}

impl DsmrReaderSink {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Sink<DsmrReading> for DsmrReaderSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<DsmrReading>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        while let Some(item) = input.next().await {
            let envelope = match item {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::error!(error = %e, "upstream pipeline failed, shutting down");
                    return Err(e);
                }
            };
            let reading = envelope.payload;

            match self.client.post_reading(&reading).await {
                Ok(status) if status.is_success() => {
                    metrics::counter!("readings_forwarded_total").increment(1);
                    let elapsed = OffsetDateTime::now_utc() - envelope.received_at;
                    metrics::histogram!("forward_latency_seconds")
                        .record(elapsed.as_seconds_f64().max(0.0));
                    tracing::info!(timestamp = %reading.timestamp, status = %status, "reading forwarded");
                }
                Ok(status) => {
                    metrics::counter!("readings_rejected_total").increment(1);
                    tracing::warn!(timestamp = %reading.timestamp, status = %status, "datalogger did not accept the reading");
                }
                Err(e) => {
                    metrics::counter!("readings_dropped_total").increment(1);
                    tracing::error!(error = %e, timestamp = %reading.timestamp, "failed to forward reading, dropping it");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dsmr_client::domain::{Field, Reading};
    use time::macros::datetime;
    use tokio::net::TcpListener;

    use super::*;

    fn record() -> Envelope<DsmrReading> {
        let mut reading = Reading::new(datetime!(2024-01-01 12:00:00 UTC));
        for field in Field::MANDATORY {
            reading.set(field, 1.0);
        }
        Envelope {
            payload: reading.finalize().unwrap(),
            received_at: datetime!(2024-01-01 12:00:01 UTC),
        }
    }

    async fn unreachable_client() -> ApiClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        ApiClient::new(&format!("http://{addr}/api/v2/"), "key", Duration::from_secs(1), false)
            .unwrap()
    }

    #[tokio::test]
    async fn transport_failure_drops_the_record_and_continues() {
        let sink = DsmrReaderSink::new(unreachable_client().await);
        let input = futures::stream::iter(vec![Ok(record()), Ok(record())]);

        // Both posts fail; both records are dropped; the sink still drains
        // the stream to its end and reports success.
        sink.run(Box::pin(input)).await.unwrap();
    }

    #[tokio::test]
    async fn upstream_error_terminates_the_sink() {
        let sink = DsmrReaderSink::new(unreachable_client().await);
        let input = futures::stream::iter(vec![
            Ok(record()),
            Err(PipelineError::Source("subscription lost".to_string())),
        ]);

        let result = sink.run(Box::pin(input)).await;
        assert!(matches!(result, Err(PipelineError::Source(_))));
    }
}
