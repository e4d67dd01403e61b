//! Engine error types.
//!
//! Only non-real-time entry points return these: prepare, handle queries and UI
//! edits. The audio-thread `process` paths never fail; they silence or clamp.

use thiserror::Error;

use crate::probe::{ListenerId, ProbeId, ProbeKind};
use crate::source::SourceId;

/// Errors reported by the engine's control and query surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Sample rate, block size or channel count unusable
    #[error("Invalid process spec: {0}")]
    InvalidSpec(String),

    /// FFT order outside the supported range
    #[error("FFT order {order} outside supported range {min}..={max}")]
    InvalidOrder { order: u32, min: u32, max: u32 },

    /// Query issued before the first prepare event completed
    #[error("Pipeline has not been prepared")]
    NotPrepared,

    /// Channel index beyond the prepared channel count
    #[error("Channel {channel} out of range (prepared for {channels})")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// Caller-provided frame buffer has the wrong length
    #[error("Frame length mismatch: expected {expected}, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    /// Probe handle belongs to a different analyser
    #[error("Probe {0:?} is not owned by this analyser")]
    ForeignProbe(ProbeId),

    /// Listener was registered with a different analyser
    #[error("Listener {0:?} is not registered with this analyser")]
    ForeignListener(ListenerId),

    /// Every listener slot of this probe kind is taken
    #[error("No free {kind:?} listener slot (capacity {capacity})")]
    ListenersFull { kind: ProbeKind, capacity: usize },

    /// Source identifier not present in the registry
    #[error("Unknown source: {0}")]
    UnknownSource(SourceId),

    /// Source has no paired peer to synchronise with
    #[error("Source {0} has no peer")]
    NoPeer(SourceId),

    /// Parameter command could not be queued for the audio thread
    #[error("Command queue for source {0} is full")]
    CommandQueueFull(SourceId),

    /// Configuration value rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
