use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Beam search settings shared by the streaming decoder and the batch driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub beam_size: usize,
    pub worker_count: usize,
    pub cutoff_prob: f32,
    pub cutoff_top_n: usize,
    pub blank_id: usize,
    pub log_input: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_size: 100,
            worker_count: 4,
            cutoff_prob: 1.0,
            cutoff_top_n: 40,
            blank_id: 0,
            log_input: false,
        }
    }
}

impl DecoderConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides("CTC_");
        config
    }

    pub fn with_beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size;
        self
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_cutoff(mut self, cutoff_prob: f32, cutoff_top_n: usize) -> Self {
        self.cutoff_prob = cutoff_prob;
        self.cutoff_top_n = cutoff_top_n;
        self
    }

    pub fn with_blank_id(mut self, blank_id: usize) -> Self {
        self.blank_id = blank_id;
        self
    }

    pub fn with_log_input(mut self, log_input: bool) -> Self {
        self.log_input = log_input;
        self
    }

    /// Checks every bound before any decoding work is started.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.worker_count == 0 {
            return Err(DecodeError::InvalidWorkerCount);
        }
        self.validate_search()
    }

    /// Checks the bounds a single-sequence decode depends on.
    pub fn validate_search(&self) -> Result<(), DecodeError> {
        if self.beam_size == 0 {
            return Err(DecodeError::InvalidBeamSize);
        }
        if !(self.cutoff_prob > 0.0 && self.cutoff_prob <= 1.0) {
            return Err(DecodeError::InvalidCutoffProb(self.cutoff_prob));
        }
        if self.cutoff_top_n == 0 {
            return Err(DecodeError::InvalidCutoffTopN);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self, prefix: &str) {
        let parse_env = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();
        let apply = |suffix: &str, target: &mut usize| {
            if let Some(v) = parse_env(suffix).and_then(|s| s.trim().parse().ok()) {
                *target = v;
            }
        };

        apply("BEAM_SIZE", &mut self.beam_size);
        apply("CUTOFF_TOP_N", &mut self.cutoff_top_n);
        apply("BLANK_ID", &mut self.blank_id);

        if let Some(v) = parse_env("CUTOFF_PROB").and_then(|s| s.trim().parse().ok()) {
            self.cutoff_prob = v;
        }
        if let Some(v) = parse_env("LOG_INPUT") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.log_input = true,
                "0" | "false" | "no" => self.log_input = false,
                other => log::warn!("Ignoring invalid {prefix}LOG_INPUT value '{other}'"),
            }
        }
        if let Some(v) = parse_env("WORKERS") {
            let v = v.trim();
            if v.eq_ignore_ascii_case("auto") {
                self.worker_count = num_cpus::get().max(1);
                log::info!(
                    "{prefix}WORKERS=auto; using {} worker threads",
                    self.worker_count
                );
            } else {
                match v.parse::<usize>() {
                    Ok(parsed) => self.worker_count = parsed,
                    Err(err) => log::warn!("Ignoring invalid {prefix}WORKERS value '{v}': {err}"),
                }
            }
        }
    }
}
