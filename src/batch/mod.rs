pub mod input;
pub(crate) mod pool;

pub use input::{split_batch, split_flat, Sequence};
pub use pool::WorkerPool;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::bounded;
use ndarray::ArrayView3;

use crate::config::DecoderConfig;
use crate::decoder::{ctc_beam_search_decoder, Output};
use crate::error::DecodeError;

/// Decodes batches of independent sequences on a fixed worker pool.
///
/// Results come back in input order regardless of which worker finished
/// first. Batches of fewer than two sequences are decoded on the calling
/// thread.
pub struct BatchDecoder {
    config: DecoderConfig,
    pool: WorkerPool,
}

impl BatchDecoder {
    pub fn new(config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        let pool = WorkerPool::new(config.worker_count)?;
        log::info!(
            "Batch decoder ready (beam_size={}, workers={}, cutoff_prob={}, cutoff_top_n={}, blank_id={})",
            config.beam_size,
            config.worker_count,
            config.cutoff_prob,
            config.cutoff_top_n,
            config.blank_id
        );
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a `[batch, time, vocabulary]` block; see [`split_batch`] for
    /// how `seq_lens` is applied.
    pub fn decode(
        &self,
        probs: ArrayView3<f32>,
        seq_lens: Option<&[usize]>,
    ) -> Result<Vec<Vec<Output>>, DecodeError> {
        let sequences = split_batch(probs, seq_lens)?;
        self.decode_sequences(sequences)
    }

    pub fn decode_sequences(
        &self,
        sequences: Vec<Sequence>,
    ) -> Result<Vec<Vec<Output>>, DecodeError> {
        if sequences.len() < 2 {
            return decode_inline(&sequences, &self.config);
        }

        let start = Instant::now();
        let batch = sequences.len();
        let config = self.config.clone();
        let results = self.run_on_pool(sequences, move |sequence| {
            ctc_beam_search_decoder(sequence, &config)
        })?;

        log::debug!(
            "Decoded batch of {} sequences in {:?}",
            batch,
            start.elapsed()
        );
        Ok(results)
    }

    /// Runs `task` once per sequence on the pool and waits for every task,
    /// failed or not, before returning. The first failure in input order wins.
    fn run_on_pool<T, F>(&self, sequences: Vec<Sequence>, task: F) -> Result<Vec<T>, DecodeError>
    where
        T: Send + 'static,
        F: Fn(&Sequence) -> Result<T, DecodeError> + Send + Sync + 'static,
    {
        let batch = sequences.len();
        let task = Arc::new(task);
        let (done_tx, done_rx) = bounded(batch);

        let mut submitted = Ok(());
        for (index, sequence) in sequences.into_iter().enumerate() {
            let task = Arc::clone(&task);
            let done_tx = done_tx.clone();
            submitted = self.pool.execute(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| task(&sequence)))
                    .unwrap_or_else(|payload| Err(DecodeError::from_panic(index, payload)));
                let _ = done_tx.send((index, result));
            });
            if submitted.is_err() {
                break;
            }
        }
        drop(done_tx);

        // Ends once every submitted job has sent its result or been dropped.
        let mut slots: Vec<Option<Result<T, DecodeError>>> =
            std::iter::repeat_with(|| None).take(batch).collect();
        for (index, result) in done_rx.iter() {
            slots[index] = Some(result);
        }
        submitted?;

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| Err(DecodeError::TaskLost(index))))
            .collect()
    }

    /// Stops the worker pool; later decode calls on more than one sequence
    /// fail with [`DecodeError::PoolShutDown`].
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

fn decode_inline(
    sequences: &[Sequence],
    config: &DecoderConfig,
) -> Result<Vec<Vec<Output>>, DecodeError> {
    sequences
        .iter()
        .map(|sequence| ctc_beam_search_decoder(sequence, config))
        .collect()
}

/// Decodes `sequences` on a pool that lives for this call only. Batches of
/// fewer than two sequences never start one.
pub fn ctc_beam_search_decoder_batch(
    sequences: Vec<Sequence>,
    config: &DecoderConfig,
) -> Result<Vec<Vec<Output>>, DecodeError> {
    if sequences.len() < 2 {
        config.validate()?;
        return decode_inline(&sequences, config);
    }
    let decoder = BatchDecoder::new(config.clone())?;
    decoder.decode_sequences(sequences)
}
