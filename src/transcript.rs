use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::decoder::Output;

static DECODE_SPACE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\A\s|\s\B|(\s)\b"));

/// A decode candidate rendered through a label table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub text: String,
    pub tokens: Vec<String>,
    pub timestamps: Vec<f32>,
    pub score: f32,
}

impl Transcript {
    /// Maps token ids to `labels`, joins them and normalises whitespace.
    ///
    /// Ids outside `labels` are skipped. Timestamps are the emission frames
    /// scaled by `frame_duration_sec`.
    pub fn from_output<S: AsRef<str>>(
        output: &Output,
        labels: &[S],
        frame_duration_sec: f32,
    ) -> Self {
        let (tokens, timestamps): (Vec<String>, Vec<f32>) = output
            .tokens
            .iter()
            .zip(&output.timesteps)
            .filter_map(|(&id, &t)| {
                labels
                    .get(id)
                    .map(|label| (label.as_ref().to_string(), frame_duration_sec * t as f32))
            })
            .unzip();

        let joined = tokens.join("");
        let text = match &*DECODE_SPACE_RE {
            Ok(regex) => regex
                .replace_all(&joined, |caps: &regex::Captures| {
                    if caps.get(1).is_some() {
                        " "
                    } else {
                        ""
                    }
                })
                .to_string(),
            Err(_) => joined,
        };

        Self {
            text,
            tokens,
            timestamps,
            score: output.score,
        }
    }

    pub fn offset_timestamps(&mut self, offset_sec: f32) {
        if offset_sec.abs() < f32::EPSILON {
            return;
        }
        for timestamp in &mut self.timestamps {
            *timestamp += offset_sec;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_and_doubled_spaces_are_trimmed() {
        let labels = [" ", "a", "b"];
        let output = Output::new(-1.0, vec![0, 1, 0, 0, 2], vec![0, 1, 2, 3, 4]);
        let transcript = Transcript::from_output(&output, &labels, 0.08);
        assert_eq!(transcript.text, "a b");
        assert_eq!(transcript.tokens.len(), 5);
        assert!((transcript.timestamps[4] - 0.32).abs() < 1e-6);
    }
}
