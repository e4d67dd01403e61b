//! Cross-thread frame probes.
//!
//! A `FrameProbe` moves fixed-length `f32` frames from the audio thread (single
//! writer) to any number of consumer threads. It is a sequence lock over atomic
//! `f32` bit patterns:
//!
//! - writer: `seq` goes odd, the frame is stored, `seq` goes even again
//! - reader: read `seq`, copy, read `seq` again; retry if it was odd or moved
//!
//! The writer never waits and never allocates. A reader only ever returns a frame
//! that was complete between its two sequence reads, so a copy is always one
//! whole published frame. The generation of a frame is `seq / 2`; a probe that
//! was never written reads as zeros with generation 0.
//!
//! Notifications do not run consumer code on the audio thread either. Each hub
//! has a fixed table of listener slots; a publish stores the packed
//! `(generation, channel)` into every active slot's `pending` word, overwriting
//! whatever was there, so the backlog per listener is at most one and it is
//! always the newest frame. Consumers take the word on their own schedule.

use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;

use crate::buffer::MAX_CHANNELS;
use crate::error::{EngineError, Result};

/// Which analyser output a probe carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Normalised magnitude spectrum
    Frequency,
    /// Phase spectrum
    Phase,
    /// The raw fixed block, before windowing
    Waveform,
}

impl ProbeKind {
    pub const COUNT: usize = 3;
    pub const ALL: [ProbeKind; Self::COUNT] = [ProbeKind::Frequency, ProbeKind::Phase, ProbeKind::Waveform];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            ProbeKind::Frequency => 0,
            ProbeKind::Phase => 1,
            ProbeKind::Waveform => 2,
        }
    }
}

/// Identity of a probe: owning analyser, channel and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId {
    pub owner: u64,
    pub channel: usize,
    pub kind: ProbeKind,
}

/// Single-writer, multi-reader frame slot.
#[derive(Debug)]
pub struct FrameProbe {
    id: ProbeId,
    seq: AtomicU64,
    data: Box<[AtomicU32]>,
}

impl FrameProbe {
    pub fn new(id: ProbeId, len: usize) -> Self {
        Self {
            id,
            seq: AtomicU64::new(0),
            data: (0..len).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    #[inline] pub fn id(&self) -> ProbeId { self.id }
    #[inline] pub fn len(&self) -> usize { self.data.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Number of completed writes.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.seq.load(Ordering::Acquire) / 2
    }

    /// Publish `frame`. Only the owning analyser calls this, from one thread.
    /// Extra input is ignored; a short frame leaves the tail as it was.
    pub(crate) fn write_frame(&self, frame: &[f32]) -> u64 {
        let s = self.seq.load(Ordering::Relaxed);
        self.seq.store(s.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, v) in self.data.iter().zip(frame) {
            slot.store(v.to_bits(), Ordering::Relaxed);
        }
        let next = s.wrapping_add(2);
        self.seq.store(next, Ordering::Release);
        next / 2
    }

    /// Copy the latest complete frame into `dest` and return its generation.
    pub fn copy_frame(&self, dest: &mut [f32]) -> Result<u64> {
        if dest.len() != self.data.len() {
            return Err(EngineError::FrameLength { expected: self.data.len(), actual: dest.len() });
        }
        let backoff = Backoff::new();
        loop {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 == 1 {
                backoff.snooze();
                continue;
            }
            for (d, slot) in dest.iter_mut().zip(self.data.iter()) {
                *d = f32::from_bits(slot.load(Ordering::Relaxed));
            }
            fence(Ordering::Acquire);
            let s2 = self.seq.load(Ordering::Relaxed);
            if s1 == s2 {
                return Ok(s1 / 2);
            }
            backoff.snooze();
        }
    }
}

/// All probes of one analyser for one prepare cycle.
#[derive(Debug)]
pub struct ProbeBank {
    owner: u64,
    frame_len: usize,
    /// `[kind][channel]`
    probes: [Box<[FrameProbe]>; ProbeKind::COUNT],
}

impl ProbeBank {
    pub fn new(owner: u64, channels: usize, frame_len: usize) -> Self {
        let probes = ProbeKind::ALL.map(|kind| -> Box<[FrameProbe]> {
            (0..channels).map(|channel| FrameProbe::new(ProbeId { owner, channel, kind }, frame_len)).collect()
        });
        Self { owner, frame_len, probes }
    }

    #[inline] pub fn owner(&self) -> u64 { self.owner }
    #[inline] pub fn frame_len(&self) -> usize { self.frame_len }
    #[inline] pub fn num_channels(&self) -> usize { self.probes[0].len() }

    #[inline]
    pub fn get(&self, kind: ProbeKind, channel: usize) -> Option<&FrameProbe> {
        self.probes[kind.index()].get(channel)
    }

    /// Look up a probe by identity, rejecting probes of another analyser.
    pub fn resolve(&self, id: ProbeId) -> Result<&FrameProbe> {
        if id.owner != self.owner {
            return Err(EngineError::ForeignProbe(id));
        }
        self.get(id.kind, id.channel)
            .ok_or(EngineError::ChannelOutOfRange { channel: id.channel, channels: self.num_channels() })
    }
}

// ---- Notifications ----

/// Listener slots per probe kind and analyser.
pub const MAX_LISTENERS: usize = 16;

const CHANNEL_BITS: u32 = 8;
const CHANNEL_MASK: u64 = (1 << CHANNEL_BITS) - 1;
const _: () = assert!(MAX_CHANNELS as u64 <= CHANNEL_MASK + 1);

const SLOT_FREE: u8 = 0;
const SLOT_CLAIMED: u8 = 1;
const SLOT_ACTIVE: u8 = 2;

/// Consumer-side sleep between polls once spinning has backed off.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Notification that a probe published a new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReady {
    pub probe: ProbeId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct ListenerSlot {
    state: AtomicU8,
    id: AtomicU64,
    /// `generation << CHANNEL_BITS | channel`; 0 when nothing is pending.
    pending: AtomicU64,
}

impl ListenerSlot {
    fn free() -> Self {
        Self { state: AtomicU8::new(SLOT_FREE), id: AtomicU64::new(0), pending: AtomicU64::new(0) }
    }
}

/// Listener registrations for one probe kind. Survives re-prepare.
#[derive(Debug)]
pub(crate) struct NotifyHub {
    owner: u64,
    kind: ProbeKind,
    next_id: AtomicU64,
    slots: Box<[ListenerSlot]>,
}

impl NotifyHub {
    pub(crate) fn new(owner: u64, kind: ProbeKind) -> Self {
        Self {
            owner,
            kind,
            next_id: AtomicU64::new(1),
            slots: (0..MAX_LISTENERS).map(|_| ListenerSlot::free()).collect(),
        }
    }

    pub(crate) fn register(self: &Arc<Self>) -> Result<FrameListener> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.state.compare_exchange(SLOT_FREE, SLOT_CLAIMED, Ordering::AcqRel, Ordering::Relaxed).is_err() {
                continue;
            }
            let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
            slot.id.store(id.0, Ordering::Relaxed);
            slot.pending.store(0, Ordering::Relaxed);
            slot.state.store(SLOT_ACTIVE, Ordering::Release);
            log::debug!("listener {:?} registered on {:?} probes of analyser {}", id, self.kind, self.owner);
            return Ok(FrameListener { id, owner: self.owner, kind: self.kind, slot: index, hub: Arc::downgrade(self) });
        }
        Err(EngineError::ListenersFull { kind: self.kind, capacity: self.slots.len() })
    }

    pub(crate) fn unregister(&self, id: ListenerId) -> bool {
        self.slots.iter().any(|slot| {
            slot.state.load(Ordering::Acquire) == SLOT_ACTIVE
                && slot.id.load(Ordering::Relaxed) == id.0
                && slot
                    .state
                    .compare_exchange(SLOT_ACTIVE, SLOT_FREE, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.state.load(Ordering::Acquire) == SLOT_ACTIVE).count()
    }

    /// Audio-thread side: plain atomic loads and stores, no lock, no wakeup.
    #[inline]
    pub(crate) fn notify(&self, ready: FrameReady) {
        let packed = (ready.generation << CHANNEL_BITS) | (ready.probe.channel as u64 & CHANNEL_MASK);
        for slot in self.slots.iter() {
            if slot.state.load(Ordering::Acquire) == SLOT_ACTIVE {
                slot.pending.store(packed, Ordering::Release);
            }
        }
    }

    fn take(&self, slot: usize) -> Option<FrameReady> {
        let packed = self.slots.get(slot)?.pending.swap(0, Ordering::Acquire);
        if packed == 0 {
            return None;
        }
        let channel = (packed & CHANNEL_MASK) as usize;
        Some(FrameReady {
            probe: ProbeId { owner: self.owner, channel, kind: self.kind },
            generation: packed >> CHANNEL_BITS,
        })
    }
}

/// Consumer end of a frame-ready registration. Dropping it unregisters.
#[derive(Debug)]
pub struct FrameListener {
    id: ListenerId,
    owner: u64,
    kind: ProbeKind,
    slot: usize,
    hub: Weak<NotifyHub>,
}

impl FrameListener {
    #[inline] pub fn id(&self) -> ListenerId { self.id }
    #[inline] pub fn owner(&self) -> u64 { self.owner }
    #[inline] pub fn kind(&self) -> ProbeKind { self.kind }

    /// Take the pending notification, if any.
    pub fn try_recv(&self) -> Option<FrameReady> {
        self.hub.upgrade()?.take(self.slot)
    }

    /// Poll until a notification arrives; `None` once the analyser is gone.
    pub fn wait(&self) -> Option<FrameReady> {
        let backoff = Backoff::new();
        loop {
            let hub = self.hub.upgrade()?;
            if let Some(r) = hub.take(self.slot) {
                return Some(r);
            }
            drop(hub);
            if backoff.is_completed() {
                thread::sleep(POLL_INTERVAL);
            } else {
                backoff.snooze();
            }
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<FrameReady> {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        loop {
            let hub = self.hub.upgrade()?;
            if let Some(r) = hub.take(self.slot) {
                return Some(r);
            }
            drop(hub);
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if backoff.is_completed() {
                thread::sleep(POLL_INTERVAL.min(deadline - now));
            } else {
                backoff.snooze();
            }
        }
    }
}

impl Drop for FrameListener {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
    }
}
