use thiserror::Error;

/// Errors surfaced by configuration, decoding and the batch worker pool.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("beam_size must be greater than zero")]
    InvalidBeamSize,

    #[error("worker_count must be greater than zero")]
    InvalidWorkerCount,

    #[error("cutoff_prob must be in (0, 1], got {0}")]
    InvalidCutoffProb(f32),

    #[error("cutoff_top_n must be greater than zero")]
    InvalidCutoffTopN,

    #[error("Frame width mismatch at timestep {timestep}: expected {expected}, got {actual}")]
    FrameWidth {
        timestep: usize,
        expected: usize,
        actual: usize,
    },

    #[error("blank_id {blank_id} is outside a vocabulary of {vocab_size} symbols")]
    BlankOutOfRange { blank_id: usize, vocab_size: usize },

    #[error("Batch has {batch} sequences but {lengths} lengths were given")]
    LengthCount { batch: usize, lengths: usize },

    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Failed to spawn decode worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker pool is shut down")]
    PoolShutDown,

    #[error("Decode task {index} panicked: {message}")]
    TaskPanicked { index: usize, message: String },

    #[error("Decode task {0} was lost before reporting a result")]
    TaskLost(usize),
}

impl DecodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidBeamSize
            | Self::InvalidWorkerCount
            | Self::InvalidCutoffProb(_)
            | Self::InvalidCutoffTopN => {
                "The decoder configuration is invalid. Check the beam, worker and cutoff settings."
            }
            Self::FrameWidth { .. } | Self::BlankOutOfRange { .. } => {
                "The probability frames do not match the decoder vocabulary."
            }
            Self::LengthCount { .. } | Self::Shape(_) => {
                "The probability batch has an unexpected shape."
            }
            Self::Spawn(_) | Self::PoolShutDown => {
                "The decoder worker pool is not available. Create a new decoder and try again."
            }
            Self::TaskPanicked { .. } | Self::TaskLost(_) => {
                "A decode task failed unexpectedly."
            }
        }
    }

    pub(crate) fn from_panic(index: usize, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::TaskPanicked { index, message }
    }
}
