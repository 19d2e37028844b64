/// Result alias that carries the custom [`MetronomeError`] type.
pub type Result<T> = std::result::Result<T, MetronomeError>;

/// Common error type for the core crate.
///
/// None of these are fatal. Callers recover locally: an out-of-range BPM keeps
/// the previous value, an unavailable sink only silences the ticks.
#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    /// A BPM value outside the configured range, or a non-positive BPM at
    /// engine start.
    #[error("bpm {value} is outside the valid range {min}..={max}")]
    InvalidBpm { value: i64, min: u32, max: u32 },
    /// The tick sink failed to initialise or is not ready.
    #[error("tick sink unavailable: {0}")]
    SinkUnavailable(String),
    /// A toggle arrived while the engine was still preparing its sink.
    #[error("toggle rejected while the engine is starting")]
    TogglePending,
    /// Commit or cancel without an active edit session.
    #[error("no edit session is active")]
    NoEditSession,
    /// Playback was toggled while the BPM editor is presented.
    #[error("playback cannot be toggled while editing the tempo")]
    EditInProgress,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl MetronomeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns true for errors the UI recovers from by keeping its previous
    /// value.
    pub fn is_invalid_bpm(&self) -> bool {
        matches!(self, Self::InvalidBpm { .. })
    }
}

impl From<&str> for MetronomeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MetronomeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
