//! Concurrent batch embedding with order-preserving reassembly.

use futures::stream::{self, StreamExt};

use crate::error::PipelineError;
use crate::models::PipelineConfig;
use crate::services::batch::split_by_size;
use crate::services::embedding::Embedder;
use crate::services::tokenizer::{TokenizedCorpus, Tokenizer};
use crate::utils::retry::{RetryConfig, RetryResult, with_retry};

/// Most endpoints cap the number of inputs per embeddings request.
const MAX_ITEMS_PER_REQUEST: usize = 2048;

/// Advisory pre-run numbers, printed before any network call so a human can
/// abort if the run looks too expensive. Never enforced.
#[derive(Debug, Clone, Copy)]
pub struct CorpusEstimate {
    pub documents: usize,
    pub total_tokens: usize,
    pub cost_usd: f64,
}

/// Turns an ordered corpus of texts into an equally ordered list of vectors.
///
/// Batches are dispatched concurrently up to the worker ceiling and may
/// complete in any order; each in-flight batch carries its origin offset and
/// results are written back at that offset, so the output always matches the
/// input order. Any batch that exhausts its retries aborts the whole run
/// without a partial result.
pub struct EmbeddingPipeline<'a> {
    embedder: &'a dyn Embedder,
    tokenizer: Tokenizer,
    batch_size: usize,
    workers: usize,
    cost_per_1k_tokens: f64,
    retry: RetryConfig,
}

impl<'a> EmbeddingPipeline<'a> {
    pub fn new(embedder: &'a dyn Embedder, tokenizer: Tokenizer, config: &PipelineConfig) -> Self {
        Self {
            embedder,
            tokenizer,
            batch_size: (config.batch_size as usize)
                .clamp(1, MAX_ITEMS_PER_REQUEST),
            workers: (config.workers as usize).max(1),
            cost_per_1k_tokens: config.cost_per_1k_tokens,
            retry: RetryConfig::new(config.max_attempts),
        }
    }

    /// Override the retry schedule, mainly to keep tests fast.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Tokenize and truncate every input, in order.
    pub fn tokenize(&self, texts: &[String]) -> TokenizedCorpus {
        self.tokenizer.tokenize_corpus(texts)
    }

    /// Cost estimate for a tokenized corpus.
    pub fn estimate(&self, corpus: &TokenizedCorpus) -> CorpusEstimate {
        CorpusEstimate {
            documents: corpus.len(),
            total_tokens: corpus.total_tokens,
            cost_usd: corpus.total_tokens as f64 / 1000.0 * self.cost_per_1k_tokens,
        }
    }

    /// Number of embedding requests a run over this corpus will issue.
    pub fn batch_count(&self, corpus: &TokenizedCorpus) -> usize {
        self.plan_jobs(&corpus.sequences).len()
    }

    /// Split the corpus into the batches that will actually be sent.
    ///
    /// The splitter keeps a slice whole when its rounded chunk count is at
    /// most one, which can hand back more items than one request may carry.
    /// Any such chunk is cut down here so no request exceeds
    /// `MAX_ITEMS_PER_REQUEST`.
    fn plan_jobs<'c>(&self, sequences: &'c [Vec<u32>]) -> Vec<(usize, &'c [Vec<u32>])> {
        let mut jobs = Vec::new();
        for (offset, chunk) in split_by_size(sequences, self.batch_size) {
            let mut start = offset;
            for part in chunk.chunks(MAX_ITEMS_PER_REQUEST) {
                jobs.push((start, part));
                start += part.len();
            }
        }
        jobs
    }

    /// Tokenize and embed, reporting `(completed_batches, total_batches)`
    /// after each batch finishes.
    pub async fn embed_corpus(
        &self,
        texts: &[String],
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let corpus = self.tokenize(texts);
        self.embed_tokenized(&corpus, progress).await
    }

    /// Embed an already tokenized corpus.
    pub async fn embed_tokenized(
        &self,
        corpus: &TokenizedCorpus,
        progress: Option<&(dyn Fn(usize, usize) + Sync)>,
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let total_inputs = corpus.len();
        if total_inputs == 0 {
            return Ok(Vec::new());
        }

        let jobs = self.plan_jobs(&corpus.sequences);
        let total_batches = jobs.len();

        let mut slots: Vec<Option<Vec<f32>>> = (0..total_inputs).map(|_| None).collect();
        let mut completed = 0usize;

        let mut in_flight = stream::iter(jobs.into_iter().map(|(offset, batch)| async move {
            let outcome = with_retry(&self.retry, || self.embedder.embed_tokens(batch.to_vec()))
                .await;
            let vectors = match outcome {
                RetryResult::Success(vectors) => vectors,
                RetryResult::Failed {
                    last_error,
                    attempts,
                } => {
                    return Err(PipelineError::BatchFailed {
                        offset,
                        attempts,
                        source: last_error,
                    });
                }
            };

            if vectors.len() != batch.len() {
                return Err(PipelineError::LengthMismatch {
                    sent: batch.len(),
                    received: vectors.len(),
                });
            }

            Ok((offset, vectors))
        }))
        .buffer_unordered(self.workers);

        while let Some(result) = in_flight.next().await {
            let (offset, vectors) = result?;
            for (i, vector) in vectors.into_iter().enumerate() {
                slots[offset + i] = Some(vector);
            }
            completed += 1;
            if let Some(report) = progress {
                report(completed, total_batches);
            }
        }
        drop(in_flight);

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or(PipelineError::MissingOutput(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::error::EmbeddingError;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts).with_initial_delay(Duration::from_millis(1))
    }

    fn config(batch_size: u32, workers: u32) -> PipelineConfig {
        PipelineConfig {
            batch_size,
            workers,
            max_tokens: 64,
            ..Default::default()
        }
    }

    /// Encodes each input's first token id into the vector so tests can
    /// verify which output slot a given input landed in.
    struct MarkerEmbedder {
        delay_first_batch: Option<Duration>,
        calls: AtomicUsize,
        largest_batch: AtomicUsize,
    }

    impl MarkerEmbedder {
        fn new() -> Self {
            Self {
                delay_first_batch: None,
                calls: AtomicUsize::new(0),
                largest_batch: AtomicUsize::new(0),
            }
        }

        fn delaying_first(delay: Duration) -> Self {
            Self {
                delay_first_batch: Some(delay),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Embedder for MarkerEmbedder {
        async fn embed_tokens(
            &self,
            batch: Vec<Vec<u32>>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest_batch.fetch_max(batch.len(), Ordering::SeqCst);
            if call == 0
                && let Some(delay) = self.delay_first_batch
            {
                tokio::time::sleep(delay).await;
            }
            Ok(batch
                .into_iter()
                .map(|tokens| vec![tokens.first().copied().unwrap_or(0) as f32])
                .collect())
        }
    }

    /// Fails with a transient error a fixed number of times, then succeeds.
    struct FlakyEmbedder {
        failures: AtomicUsize,
        fail_count: usize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        async fn embed_tokens(
            &self,
            batch: Vec<Vec<u32>>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if self.failures.fetch_add(1, Ordering::SeqCst) < self.fail_count {
                return Err(EmbeddingError::RateLimited("slow down".to_string()));
            }
            Ok(batch.into_iter().map(|_| vec![1.0]).collect())
        }
    }

    fn corpus_of(sequences: Vec<Vec<u32>>) -> TokenizedCorpus {
        let total_tokens = sequences.iter().map(Vec::len).sum();
        TokenizedCorpus {
            sequences,
            total_tokens,
        }
    }

    #[tokio::test]
    async fn test_output_matches_input_order() {
        let embedder = MarkerEmbedder::new();
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(2, 4));

        let corpus = corpus_of((0..10u32).map(|i| vec![i]).collect());
        let vectors = pipeline.embed_tokenized(&corpus, None).await.unwrap();

        assert_eq!(vectors.len(), 10);
        for (i, vector) in vectors.iter().enumerate() {
            assert_eq!(vector[0], i as f32);
        }
    }

    #[tokio::test]
    async fn test_order_survives_slow_first_batch() {
        // Two single-item batches, two workers; the first batch finishes
        // last, output order must not change.
        let embedder = MarkerEmbedder::delaying_first(Duration::from_millis(50));
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(1, 2));

        let corpus = corpus_of(vec![vec![10], vec![20]]);
        let vectors = pipeline.embed_tokenized(&corpus, None).await.unwrap();

        assert_eq!(vectors, vec![vec![10.0], vec![20.0]]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_recover() {
        let embedder = FlakyEmbedder {
            failures: AtomicUsize::new(0),
            fail_count: 2,
        };
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(10, 1))
                .with_retry_config(fast_retry(3));

        let corpus = corpus_of(vec![vec![1], vec![2]]);
        let vectors = pipeline.embed_tokenized(&corpus, None).await.unwrap();

        assert_eq!(vectors.len(), 2);
        // 2 failures + 1 success
        assert_eq!(embedder.failures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_abort_run() {
        let embedder = FlakyEmbedder {
            failures: AtomicUsize::new(0),
            fail_count: usize::MAX,
        };
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(10, 1))
                .with_retry_config(fast_retry(3));

        let corpus = corpus_of(vec![vec![1]]);
        let result = pipeline.embed_tokenized(&corpus, None).await;

        match result {
            Err(PipelineError::BatchFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected BatchFailed, got {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let embedder = MarkerEmbedder::new();
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(1, 4));

        let seen = Mutex::new(Vec::new());
        let report = |done: usize, total: usize| {
            seen.lock().unwrap().push((done, total));
        };

        let corpus = corpus_of((0..6u32).map(|i| vec![i]).collect());
        pipeline
            .embed_tokenized(&corpus, Some(&report))
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 6);
        for (i, (done, total)) in seen.iter().enumerate() {
            assert_eq!(*done, i + 1);
            assert_eq!(*total, 6);
        }
    }

    #[tokio::test]
    async fn test_collapsed_chunk_respects_request_cap() {
        // round(3000 / 2048) == 1: the splitter keeps the corpus whole,
        // but no dispatched request may carry more than the endpoint cap.
        let embedder = MarkerEmbedder::new();
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(2048, 2));

        let corpus = corpus_of((0..3000u32).map(|i| vec![i]).collect());
        assert_eq!(pipeline.batch_count(&corpus), 2);

        let vectors = pipeline.embed_tokenized(&corpus, None).await.unwrap();
        assert_eq!(vectors.len(), 3000);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert!(embedder.largest_batch.load(Ordering::SeqCst) <= MAX_ITEMS_PER_REQUEST);
        for (i, vector) in vectors.iter().enumerate() {
            assert_eq!(vector[0], i as f32);
        }
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let embedder = MarkerEmbedder::new();
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(10, 2));

        let vectors = pipeline.embed_corpus(&[], None).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_tokenize_and_embed() {
        let embedder = MarkerEmbedder::new();
        let pipeline =
            EmbeddingPipeline::new(&embedder, Tokenizer::new(64).unwrap(), &config(1, 2));

        let texts = vec![
            "April is a month.".to_string(),
            "August is a month.".to_string(),
        ];
        let corpus = pipeline.tokenize(&texts);
        let estimate = pipeline.estimate(&corpus);
        assert_eq!(estimate.documents, 2);
        assert!(estimate.total_tokens > 0);
        assert_eq!(pipeline.batch_count(&corpus), 2);

        let vectors = pipeline.embed_tokenized(&corpus, None).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0][0], corpus.sequences[0][0] as f32);
        assert_eq!(vectors[1][0], corpus.sequences[1][0] as f32);
    }
}
