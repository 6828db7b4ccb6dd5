use super::output::Output;

/// Best-path decoding: argmax per frame, then collapse repeats and drop blanks.
///
/// The score is the log-probability of the single argmax path, not the merged
/// mass of every path that collapses to the same tokens.
pub fn greedy_decode<F: AsRef<[f32]>>(frames: &[F], blank_id: usize, log_input: bool) -> Output {
    let mut tokens = Vec::with_capacity(std::cmp::max(1, frames.len() / 2));
    let mut timesteps = Vec::with_capacity(std::cmp::max(1, frames.len() / 2));
    let mut score = 0.0f32;
    let mut prev = blank_id;

    for (t, frame) in frames.iter().enumerate() {
        let mut best_idx = blank_id;
        let mut best_value = f32::NEG_INFINITY;
        for (idx, &value) in frame.as_ref().iter().enumerate() {
            if value > best_value {
                best_value = value;
                best_idx = idx;
            }
        }

        score += if log_input {
            best_value
        } else {
            best_value.max(f32::MIN_POSITIVE).ln()
        };

        if best_idx != blank_id && best_idx != prev {
            tokens.push(best_idx);
            timesteps.push(t);
        }
        prev = best_idx;
    }

    Output::new(score, tokens, timesteps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_repeats_and_blanks() {
        // a a _ a b b
        let frames = [
            [0.1f32, 0.8, 0.1],
            [0.1, 0.8, 0.1],
            [0.8, 0.1, 0.1],
            [0.1, 0.8, 0.1],
            [0.1, 0.1, 0.8],
            [0.1, 0.1, 0.8],
        ];
        let out = greedy_decode(&frames, 0, false);
        assert_eq!(out.tokens, vec![1, 1, 2]);
        assert_eq!(out.timesteps, vec![0, 3, 4]);
        assert!((out.score - 6.0 * 0.8f32.ln()).abs() < 1e-4);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let frames: [[f32; 2]; 0] = [];
        let out = greedy_decode(&frames, 0, true);
        assert!(out.is_empty());
        assert_eq!(out.score, 0.0);
    }
}
