//! Log-domain arithmetic and per-frame vocabulary pruning.

/// Log-probability carried by a hypothesis with no path mass.
pub const NO_MASS: f32 = f32::NEG_INFINITY;

/// Adds two log-domain values without leaving log space.
pub fn log_sum_exp(x: f32, y: f32) -> f32 {
    if x <= -f32::MAX {
        return y;
    }
    if y <= -f32::MAX {
        return x;
    }
    let max = x.max(y);
    ((x - max).exp() + (y - max).exp()).ln() + max
}

pub(crate) fn has_mass(log_prob: f32) -> bool {
    log_prob > -f32::MAX
}

fn to_log(value: f32, log_input: bool) -> f32 {
    if log_input {
        value
    } else {
        value.max(f32::MIN_POSITIVE).ln()
    }
}

fn to_prob(value: f32, log_input: bool) -> f32 {
    if log_input {
        value.exp()
    } else {
        value
    }
}

/// Returns the `(symbol, log_prob)` candidates worth expanding for one frame.
///
/// Without pruning every symbol is returned in vocabulary order. Otherwise the
/// symbols are ranked by probability and the best `cutoff_top_n` are kept, or
/// fewer when their cumulative mass reaches `cutoff_prob` first.
pub fn prune_frame(
    frame: &[f32],
    cutoff_prob: f32,
    cutoff_top_n: usize,
    log_input: bool,
) -> Vec<(usize, f32)> {
    if cutoff_prob >= 1.0 && cutoff_top_n >= frame.len() {
        return frame
            .iter()
            .enumerate()
            .map(|(idx, &v)| (idx, to_log(v, log_input)))
            .collect();
    }

    let mut ranked: Vec<(usize, f32)> = frame.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let cutoff_len = if cutoff_prob < 1.0 {
        let mut cumulative = 0.0f32;
        let mut taken = 0;
        for &(_, v) in &ranked {
            cumulative += to_prob(v, log_input);
            taken += 1;
            if cumulative >= cutoff_prob || taken >= cutoff_top_n {
                break;
            }
        }
        taken
    } else {
        cutoff_top_n.min(ranked.len())
    };

    ranked.truncate(cutoff_len);
    for candidate in &mut ranked {
        candidate.1 = to_log(candidate.1, log_input);
    }
    ranked
}
