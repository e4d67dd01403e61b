//! UI → audio command queue for one source.
//!
//! Every live edit is a small `Copy` value pushed into an `rtrb` ring buffer
//! allocated when the source is built. The source drains the queue at the start
//! of each `process` call and applies each command whole, so the audio thread
//! never sees half an edit. A synchronisation is one `SyncAndReset` command for
//! the same reason.

use crate::config::SweepConfig;
use crate::source::SourceMode;
use crate::synth::{Polarity, SyncSnapshot, Waveform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceCommand {
    // ---- Signal ----
    SetMode(SourceMode),
    SetWaveform(Waveform),
    SetFrequency(f64),
    SetPulseWidth(u32),
    SetPolarity(Polarity),
    SetPreDelayMs(f64),

    // ---- Sweep ----
    SetSweep(SweepConfig),
    SetSweepEnabled(bool),
    /// Restart from the first step without touching the phase
    ResetSweep,

    // ---- Output stage ----
    SetGainDb(f32),
    SetMuted(bool),
    SetInverted(bool),

    // ---- Audio input ----
    SetInputGainDb { channel: usize, gain_db: f32 },
    /// Output channels (bit per channel) that input `input` feeds
    SetRouting { input: usize, mask: u64 },

    // ---- Synchronisation ----
    /// Take over a peer's waveform, frequency and sweep, then zero phase and sweep position
    SyncAndReset(SyncSnapshot),
}

pub type CommandSender = rtrb::Producer<SourceCommand>;
pub type CommandReceiver = rtrb::Consumer<SourceCommand>;

/// Create a queue holding up to `capacity` pending commands.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    rtrb::RingBuffer::new(capacity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_arrive_in_order() {
        let (mut tx, mut rx) = command_channel(4);
        tx.push(SourceCommand::SetFrequency(440.0)).unwrap();
        tx.push(SourceCommand::ResetSweep).unwrap();
        assert_eq!(rx.pop().unwrap(), SourceCommand::SetFrequency(440.0));
        assert_eq!(rx.pop().unwrap(), SourceCommand::ResetSweep);
        assert!(rx.pop().is_err());
    }

    #[test]
    fn full_queue_rejects_push() {
        let (mut tx, _rx) = command_channel(1);
        tx.push(SourceCommand::SetMuted(true)).unwrap();
        assert!(tx.push(SourceCommand::SetMuted(false)).is_err());
    }

    #[test]
    fn command_stays_small() {
        // largest payload is the sync snapshot
        let size = std::mem::size_of::<SourceCommand>();
        assert!(size <= 64, "SourceCommand is {} bytes", size);
    }
}
