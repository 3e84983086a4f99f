use std::pin::Pin;

use futures::{Stream, StreamExt};
use time::OffsetDateTime;

/// A payload stamped with its arrival instant.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: OffsetDateTime,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("sink error: {0}")]
    Sink(String),
}

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;
}

/// Stateful many-to-fewer stage: folds every input, occasionally emitting an
/// output. Inputs it swallows are gone; there is no error path.
pub trait Aggregate<I, O>: Send {
    fn fold(&mut self, input: Envelope<I>) -> Option<Envelope<O>>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, A, K> {
    pub source: S,
    pub aggregate: A,
    pub sink: K,
}

impl<S, A, K> Pipeline<S, A, K> {
    pub async fn run<I, O>(self) -> Result<(), PipelineError>
    where
        S: Source<I>,
        A: Aggregate<I, O> + 'static,
        K: Sink<O>,
        I: Send + 'static,
        O: Send + 'static,
    {
        let stream = self.source.stream().await;

        // Upstream errors pass through untouched; payloads fold through the
        // aggregate, which emits at its own pace.
        let mut aggregate = self.aggregate;
        let stream = stream.filter_map(move |item| {
            futures::future::ready(match item {
                Ok(envelope) => aggregate.fold(envelope).map(Ok),
                Err(e) => Some(Err(e)),
            })
        });

        self.sink.run(Box::pin(stream)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use time::macros::datetime;

    use super::*;

    struct VecSource(Vec<u32>);

    #[async_trait::async_trait]
    impl Source<u32> for VecSource {
        async fn stream(
            &self,
        ) -> Pin<Box<dyn Stream<Item = Result<Envelope<u32>, PipelineError>> + Send>> {
            let items: Vec<_> = self
                .0
                .iter()
                .map(|&payload| {
                    Ok(Envelope { payload, received_at: datetime!(2024-01-01 00:00:00 UTC) })
                })
                .collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    /// Emits the sum of every pair of inputs.
    #[derive(Default)]
    struct PairSum(Option<u32>);

    impl Aggregate<u32, u32> for PairSum {
        fn fold(&mut self, input: Envelope<u32>) -> Option<Envelope<u32>> {
            match self.0.take() {
                Some(first) => Some(Envelope {
                    payload: first + input.payload,
                    received_at: input.received_at,
                }),
                None => {
                    self.0 = Some(input.payload);
                    None
                }
            }
        }
    }

    struct CollectSink(Arc<Mutex<Vec<u32>>>);

    #[async_trait::async_trait]
    impl Sink<u32> for CollectSink {
        async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
        where
            S: Stream<Item = Result<Envelope<u32>, PipelineError>> + Send + Unpin + 'static,
        {
            while let Some(item) = input.next().await {
                self.0.lock().unwrap().push(item?.payload);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn aggregate_stage_controls_emission() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline {
            source: VecSource(vec![1, 2, 3, 4, 5]),
            aggregate: PairSum::default(),
            sink: CollectSink(Arc::clone(&collected)),
        };
        pipeline.run().await.unwrap();
        // The trailing odd element never completes a pair.
        assert_eq!(*collected.lock().unwrap(), vec![3, 7]);
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl Source<u32> for FailingSource {
        async fn stream(
            &self,
        ) -> Pin<Box<dyn Stream<Item = Result<Envelope<u32>, PipelineError>> + Send>> {
            Box::pin(futures::stream::iter([Err(PipelineError::Source(
                "subscription lost".to_string(),
            ))]))
        }
    }

    #[tokio::test]
    async fn source_errors_reach_the_sink() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline {
            source: FailingSource,
            aggregate: PairSum::default(),
            sink: CollectSink(Arc::clone(&collected)),
        };
        let result = pipeline.run().await;
        assert!(matches!(result, Err(PipelineError::Source(_))));
        assert!(collected.lock().unwrap().is_empty());
    }
}
