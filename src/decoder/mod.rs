pub(crate) mod greedy;
pub(crate) mod output;
pub mod prune;
pub mod trie;
pub(crate) mod state;

pub use greedy::greedy_decode;
pub use output::Output;
pub use prune::{log_sum_exp, prune_frame, NO_MASS};
pub use state::DecoderState;
pub use trie::{Mass, Node, NodeId, PrefixTrie};

use crate::config::DecoderConfig;
use crate::error::DecodeError;

/// Decodes one complete sequence and returns its ranked candidates.
pub fn ctc_beam_search_decoder<F: AsRef<[f32]>>(
    frames: &[F],
    config: &DecoderConfig,
) -> Result<Vec<Output>, DecodeError> {
    let mut state = DecoderState::new(config.clone())?;
    state.next(frames)?;
    Ok(state.decode())
}
