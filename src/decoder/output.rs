use serde::Serialize;

/// One ranked decode candidate.
///
/// `score` is the natural-log probability of all raw paths collapsing to
/// `tokens`; `timesteps[i]` is the frame at which `tokens[i]` was emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub score: f32,
    pub tokens: Vec<usize>,
    pub timesteps: Vec<usize>,
}

impl Output {
    pub fn new(score: f32, tokens: Vec<usize>, timesteps: Vec<usize>) -> Self {
        Self {
            score,
            tokens,
            timesteps,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Probability of the candidate, `exp(score)`.
    pub fn probability(&self) -> f32 {
        self.score.exp()
    }
}
