//! Conversion from a `[batch, time, vocabulary]` block to owned frame lists.

use ndarray::{s, ArrayView3};

use crate::error::DecodeError;

/// Owned frames of one sequence, `[time][vocabulary]`.
pub type Sequence = Vec<Vec<f32>>;

/// Splits `probs` into one owned frame list per batch element.
///
/// Each element keeps its first `seq_lens[b]` frames; a length past the time
/// extent is clamped to it. Without `seq_lens` every element uses the full
/// time extent.
pub fn split_batch(
    probs: ArrayView3<f32>,
    seq_lens: Option<&[usize]>,
) -> Result<Vec<Sequence>, DecodeError> {
    let (batch, max_time, _) = probs.dim();
    if let Some(lens) = seq_lens {
        if lens.len() != batch {
            return Err(DecodeError::LengthCount {
                batch,
                lengths: lens.len(),
            });
        }
    }

    let sequences: Vec<Sequence> = probs
        .outer_iter()
        .enumerate()
        .map(|(b, frames)| {
            let requested = seq_lens.map_or(max_time, |lens| lens[b]);
            let len = if requested > max_time {
                log::warn!(
                    "Sequence {} length {} exceeds time dimension {}; clamping",
                    b,
                    requested,
                    max_time
                );
                max_time
            } else {
                requested
            };
            frames
                .slice(s![..len, ..])
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect::<Sequence>()
        })
        .collect();

    Ok(sequences)
}

/// Same as [`split_batch`] for a row-major buffer of the given shape.
pub fn split_flat(
    data: &[f32],
    shape: (usize, usize, usize),
    seq_lens: Option<&[usize]>,
) -> Result<Vec<Sequence>, DecodeError> {
    let probs = ArrayView3::from_shape(shape, data)?;
    split_batch(probs, seq_lens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn lengths_select_leading_frames() {
        let probs = Array3::from_shape_fn((2, 3, 2), |(b, t, v)| (b * 100 + t * 10 + v) as f32);
        let out = split_batch(probs.view(), Some(&[1, 3])).unwrap();
        assert_eq!(out[0], vec![vec![0.0, 1.0]]);
        assert_eq!(out[1].len(), 3);
        assert_eq!(out[1][2], vec![120.0, 121.0]);
    }

    #[test]
    fn oversized_length_is_clamped() {
        let probs = Array3::<f32>::zeros((1, 2, 3));
        let out = split_batch(probs.view(), Some(&[10])).unwrap();
        assert_eq!(out[0].len(), 2);
    }

    #[test]
    fn missing_lengths_use_full_extent() {
        let probs = Array3::<f32>::zeros((3, 4, 2));
        let out = split_batch(probs.view(), None).unwrap();
        assert!(out.iter().all(|seq| seq.len() == 4));
    }

    #[test]
    fn length_count_mismatch_is_reported() {
        let probs = Array3::<f32>::zeros((2, 1, 1));
        assert!(matches!(
            split_batch(probs.view(), Some(&[1])),
            Err(DecodeError::LengthCount {
                batch: 2,
                lengths: 1
            })
        ));
    }

    #[test]
    fn flat_buffer_shape_is_checked() {
        let data = vec![0.0f32; 5];
        assert!(matches!(
            split_flat(&data, (1, 2, 3), None),
            Err(DecodeError::Shape(_))
        ));
    }
}
