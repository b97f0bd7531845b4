use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::{decode_frame, encode_frame};
use crate::error::{BusError, CodecError};
use crate::players::ParticipantId;
use crate::protocol::Envelope;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub seq: u64,
    pub at_ms: u64,
    pub frame: Vec<u8>,
}

/// In-process broadcast channel: one append-only log, one read cursor per
/// subscriber. Every subscriber sees every frame, its own included, in log
/// order. Late subscribers replay from the start.
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    log: Vec<Delivery>,
    cursors: BTreeMap<ParticipantId, usize>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, participant: ParticipantId) {
        self.cursors.entry(participant).or_insert(0);
    }

    pub fn publish(&mut self, frame: Vec<u8>, at_ms: u64) -> u64 {
        let seq = self.log.len() as u64;
        self.log.push(Delivery { seq, at_ms, frame });
        seq
    }

    pub fn publish_envelope(&mut self, envelope: &Envelope, at_ms: u64) -> Result<u64, CodecError> {
        Ok(self.publish(encode_frame(envelope)?, at_ms))
    }

    /// Frames `participant` has not seen yet.
    pub fn poll(&mut self, participant: ParticipantId) -> Vec<Delivery> {
        let Some(cursor) = self.cursors.get_mut(&participant) else {
            return Vec::new();
        };
        let pending = self.log[*cursor..].to_vec();
        *cursor = self.log.len();
        pending
    }

    pub fn log(&self) -> &[Delivery] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Publishes every session's outbox and delivers until nobody has
    /// anything left to say. Returns how many frames were published.
    pub fn pump(&mut self, sessions: &mut [Session], at_ms: u64) -> Result<usize, BusError> {
        let mut published = 0;
        loop {
            let before = self.log.len();
            for session in sessions.iter_mut() {
                self.subscribe(session.local());
                for envelope in session.drain_outbox() {
                    self.publish_envelope(&envelope, at_ms)?;
                }
            }
            let fresh = self.log.len() - before;
            let behind = sessions
                .iter()
                .any(|session| self.cursors.get(&session.local()) != Some(&self.log.len()));
            if fresh == 0 && !behind {
                break;
            }
            published += fresh;
            for session in sessions.iter_mut() {
                for delivery in self.poll(session.local()) {
                    let envelope = decode_frame(&delivery.frame)?;
                    session.ingest(&envelope, delivery.at_ms)?;
                }
            }
        }
        debug!("bus quiescent (frames={} published={})", self.log.len(), published);
        Ok(published)
    }

    /// Fires hold expiry on every session at the same point of the stream.
    pub fn tick(&mut self, sessions: &mut [Session], at_ms: u64) -> Result<usize, BusError> {
        self.pump(sessions, at_ms)?;
        let mut expired = 0;
        for session in sessions.iter_mut() {
            expired += session.tick(at_ms)?;
        }
        self.pump(sessions, at_ms)?;
        Ok(expired)
    }
}
