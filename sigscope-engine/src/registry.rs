//! Source registry and the synchronisation trigger.
//!
//! The hosting context owns the registry. Sources refer to each other only by
//! [`SourceId`]; a pairing is two map entries, never a pair of references.
//!
//! `synchronise(from, to)` reads the sender's shadow settings and pushes one
//! `SyncAndReset` command to the target. The target's audio thread applies
//! waveform, frequency and sweep and zeroes phase, sweep index and control
//! counter in a single command, so no block ever sees a partial sync.

use std::collections::{BTreeMap, HashMap};

use crate::error::{EngineError, Result};
use crate::source::{SourceHandle, SourceId};

#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceId, SourceHandle>,
    peers: HashMap<SourceId, SourceId>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle, replacing any handle with the same id.
    pub fn insert(&mut self, handle: SourceHandle) {
        self.sources.insert(handle.id(), handle);
    }

    /// Remove a source and any pairing it was part of.
    pub fn remove(&mut self, id: SourceId) -> Option<SourceHandle> {
        self.unpair(id);
        self.sources.remove(&id)
    }

    #[inline] pub fn len(&self) -> usize { self.sources.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.sources.is_empty() }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.keys().copied()
    }

    pub fn get(&self, id: SourceId) -> Result<&SourceHandle> {
        self.sources.get(&id).ok_or(EngineError::UnknownSource(id))
    }

    pub fn get_mut(&mut self, id: SourceId) -> Result<&mut SourceHandle> {
        self.sources.get_mut(&id).ok_or(EngineError::UnknownSource(id))
    }

    /// Look a source up by its configured name.
    pub fn find(&self, name: &str) -> Option<SourceId> {
        self.sources.values().find(|h| h.name() == name).map(SourceHandle::id)
    }

    /// Make `a` and `b` each other's peer. Earlier pairings of either are dissolved.
    pub fn pair(&mut self, a: SourceId, b: SourceId) -> Result<()> {
        self.get(a)?;
        self.get(b)?;
        if a == b {
            return Err(EngineError::InvalidConfig(format!("source {} cannot be its own peer", a)));
        }
        self.unpair(a);
        self.unpair(b);
        self.peers.insert(a, b);
        self.peers.insert(b, a);
        log::info!("paired sources {} and {}", a, b);
        Ok(())
    }

    pub fn unpair(&mut self, id: SourceId) {
        if let Some(peer) = self.peers.remove(&id) {
            self.peers.remove(&peer);
        }
    }

    pub fn peer(&self, id: SourceId) -> Option<SourceId> {
        self.peers.get(&id).copied()
    }

    /// Copy waveform, frequency and sweep from `from` to `to` and restart `to`.
    pub fn synchronise(&mut self, from: SourceId, to: SourceId) -> Result<()> {
        let snap = self.get(from)?.sync_snapshot();
        self.get_mut(to)?.sync_from(snap)?;
        log::info!(
            "synchronised {} -> {}: {:?} at {:.2} Hz, sweep {}",
            from,
            to,
            snap.waveform,
            snap.frequency_hz,
            if snap.sweep.enabled { "on" } else { "off" }
        );
        Ok(())
    }

    /// Synchronise `id`'s peer to `id`. Returns the peer.
    pub fn synchronise_with_peer(&mut self, id: SourceId) -> Result<SourceId> {
        self.get(id)?;
        let peer = self.peer(id).ok_or(EngineError::NoPeer(id))?;
        self.synchronise(id, peer)?;
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SweepConfig};
    use crate::source::Source;
    use crate::synth::Waveform;

    fn registry(n: u32) -> (SourceRegistry, Vec<Source>) {
        let mut reg = SourceRegistry::new();
        let mut sources = Vec::new();
        for i in 0..n {
            let cfg = SourceConfig { name: format!("s{}", i), ..SourceConfig::default() };
            let (s, h) = Source::new(SourceId(i), &cfg, 8);
            reg.insert(h);
            sources.push(s);
        }
        (reg, sources)
    }

    #[test]
    fn pairing_is_symmetric_and_exclusive() {
        let (mut reg, _s) = registry(3);
        reg.pair(SourceId(0), SourceId(1)).unwrap();
        assert_eq!(reg.peer(SourceId(1)), Some(SourceId(0)));
        reg.pair(SourceId(1), SourceId(2)).unwrap();
        assert_eq!(reg.peer(SourceId(0)), None);
        assert_eq!(reg.peer(SourceId(2)), Some(SourceId(1)));
        assert!(reg.pair(SourceId(2), SourceId(2)).is_err());
        assert_eq!(reg.pair(SourceId(0), SourceId(9)), Err(EngineError::UnknownSource(SourceId(9))));
    }

    #[test]
    fn synchronise_copies_shadow_settings() {
        let (mut reg, _s) = registry(2);
        {
            let a = reg.get_mut(SourceId(0)).unwrap();
            a.set_waveform(Waveform::Square).unwrap();
            a.set_frequency(440.0).unwrap();
            a.set_sweep(SweepConfig { start_hz: 50.0, end_hz: 5000.0, enabled: true, ..SweepConfig::default() })
                .unwrap();
            a.set_gain_db(-3.0).unwrap();
        }
        reg.synchronise(SourceId(0), SourceId(1)).unwrap();
        let b = reg.get(SourceId(1)).unwrap().config();
        assert_eq!(b.synth.waveform, Waveform::Square);
        assert_eq!(b.synth.frequency_hz, 440.0);
        assert_eq!(b.synth.sweep.end_hz, 5000.0);
        assert!(b.synth.sweep.enabled);
        // output stage is not part of the sync
        assert_eq!(b.gain_db, SourceConfig::default().gain_db);
    }

    #[test]
    fn synchronise_with_peer_requires_pairing() {
        let (mut reg, _s) = registry(2);
        assert_eq!(reg.synchronise_with_peer(SourceId(0)), Err(EngineError::NoPeer(SourceId(0))));
        reg.pair(SourceId(0), SourceId(1)).unwrap();
        assert_eq!(reg.synchronise_with_peer(SourceId(1)), Ok(SourceId(0)));
        assert_eq!(reg.find("s1"), Some(SourceId(1)));
    }

    #[test]
    fn removing_a_source_dissolves_its_pair() {
        let (mut reg, _s) = registry(2);
        reg.pair(SourceId(0), SourceId(1)).unwrap();
        assert!(reg.remove(SourceId(0)).is_some());
        assert_eq!(reg.peer(SourceId(1)), None);
        assert_eq!(reg.len(), 1);
    }
}
