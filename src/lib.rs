//! CTC prefix beam-search decoding.
//!
//! [`DecoderState`] runs the beam search over one sequence and can be fed
//! frames incrementally. [`BatchDecoder`] decodes many sequences in parallel
//! on a fixed worker pool and returns their ranked candidates in input order.

pub mod batch;
pub mod config;
pub mod decoder;
pub mod error;
pub mod transcript;

pub use batch::{ctc_beam_search_decoder_batch, BatchDecoder, Sequence};
pub use config::DecoderConfig;
pub use decoder::{ctc_beam_search_decoder, greedy_decode, DecoderState, Output};
pub use error::DecodeError;
pub use transcript::Transcript;
