use std::cmp::Ordering;
use std::time::Instant;

use ndarray::ArrayView2;

use crate::config::DecoderConfig;
use crate::error::DecodeError;

use super::output::Output;
use super::prune::{has_mass, prune_frame, NO_MASS};
use super::trie::{NodeId, PrefixTrie};

/// Streaming CTC prefix beam search over one sequence.
///
/// Frames are fed with [`DecoderState::next`] in as many chunks as needed;
/// [`DecoderState::decode`] ranks the current beam without disturbing it, so
/// partial transcriptions can be read between chunks.
#[derive(Debug, Clone)]
pub struct DecoderState {
    config: DecoderConfig,
    trie: PrefixTrie,
    beam: Vec<NodeId>,
    abs_timestep: usize,
    vocab_size: Option<usize>,
}

fn rank(trie: &PrefixTrie, a: NodeId, b: NodeId) -> Ordering {
    let (a, b) = (trie.node(a), trie.node(b));
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.last_symbol.cmp(&b.last_symbol))
}

impl DecoderState {
    pub fn new(config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate_search()?;
        Ok(Self {
            config,
            trie: PrefixTrie::new(),
            beam: vec![PrefixTrie::ROOT],
            abs_timestep: 0,
            vocab_size: None,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Number of frames consumed so far.
    pub fn timestep(&self) -> usize {
        self.abs_timestep
    }

    pub fn beam_len(&self) -> usize {
        self.beam.len()
    }

    pub fn trie(&self) -> &PrefixTrie {
        &self.trie
    }

    pub fn next<F: AsRef<[f32]>>(&mut self, frames: &[F]) -> Result<(), DecodeError> {
        let start = Instant::now();
        for frame in frames {
            self.step(frame.as_ref())?;
        }
        log::debug!(
            "Beam step over {} frames in {:?} (beam: {}, trie nodes: {})",
            frames.len(),
            start.elapsed(),
            self.beam.len(),
            self.trie.len()
        );
        Ok(())
    }

    /// Same as [`DecoderState::next`] for a `[time, vocabulary]` view.
    pub fn next_array(&mut self, frames: ArrayView2<f32>) -> Result<(), DecodeError> {
        for row in frames.rows() {
            match row.as_slice() {
                Some(frame) => self.step(frame)?,
                None => self.step(&row.to_vec())?,
            }
        }
        Ok(())
    }

    pub fn next_frame(&mut self, frame: &[f32]) -> Result<(), DecodeError> {
        self.step(frame)
    }

    fn check_frame(&mut self, frame: &[f32]) -> Result<(), DecodeError> {
        let expected = *self.vocab_size.get_or_insert(frame.len());
        if frame.len() != expected {
            return Err(DecodeError::FrameWidth {
                timestep: self.abs_timestep,
                expected,
                actual: frame.len(),
            });
        }
        if self.config.blank_id >= expected {
            return Err(DecodeError::BlankOutOfRange {
                blank_id: self.config.blank_id,
                vocab_size: expected,
            });
        }
        Ok(())
    }

    fn step(&mut self, frame: &[f32]) -> Result<(), DecodeError> {
        self.check_frame(frame)?;

        let DecoderConfig {
            beam_size,
            cutoff_prob,
            cutoff_top_n,
            blank_id,
            log_input,
            ..
        } = self.config;
        let timestep = self.abs_timestep;
        let candidates = prune_frame(frame, cutoff_prob, cutoff_top_n, log_input);
        let active = self.beam.len().min(beam_size);

        for &(symbol, log_prob) in &candidates {
            for &prefix in &self.beam[..active] {
                let node = self.trie.node(prefix);
                let (score, blank_prev, nonblank_prev) =
                    (node.score, node.blank.prev, node.nonblank.prev);
                let repeat = node.last_symbol == Some(symbol);

                if symbol == blank_id {
                    self.trie
                        .node_mut(prefix)
                        .blank
                        .accumulate(log_prob + score);
                    continue;
                }

                if repeat {
                    self.trie
                        .node_mut(prefix)
                        .nonblank
                        .accumulate(log_prob + nonblank_prev);
                }

                let extended = self.trie.extend_or_get(prefix, symbol, timestep, log_prob);
                let arrival = if !repeat {
                    log_prob + score
                } else if has_mass(blank_prev) {
                    log_prob + blank_prev
                } else {
                    NO_MASS
                };
                self.trie.node_mut(extended).nonblank.accumulate(arrival);
            }
        }

        let (mut beam, exhausted) = self.trie.flatten();
        for id in exhausted {
            self.trie.remove(id);
        }

        if beam.len() > beam_size {
            let trie = &self.trie;
            beam.select_nth_unstable_by(beam_size, |&a, &b| rank(trie, a, b));
            for &id in &beam[beam_size..] {
                self.trie.remove(id);
            }
            beam.truncate(beam_size);
        }

        self.beam = beam;
        self.abs_timestep += 1;
        Ok(())
    }

    /// Ranks the live hypotheses, best first.
    pub fn decode(&self) -> Vec<Output> {
        let mut ranked: Vec<(NodeId, f32)> = self
            .beam
            .iter()
            .take(self.config.beam_size)
            .map(|&id| (id, self.trie.node(id).score))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1).then_with(|| {
                self.trie
                    .node(a.0)
                    .last_symbol
                    .cmp(&self.trie.node(b.0).last_symbol)
            })
        });

        ranked
            .into_iter()
            .map(|(id, finalized_score)| {
                let (tokens, timesteps) = self.trie.reconstruct(id);
                Output::new(finalized_score, tokens, timesteps)
            })
            .collect()
    }

    pub fn best(&self) -> Option<Output> {
        self.decode().into_iter().next()
    }
}
