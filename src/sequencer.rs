//! Playback sequencer: ordered autoplay across one group's native units.
//!
//! An explicit finite-state machine per group: `Idle` until a play-all
//! request, then `Playing(index)` advancing only on the current unit's
//! natural-completion signal. Restart is an external transition back to
//! index zero after a reset of every unit. A unit that errors never advances
//! the sequence; there is no skip-on-error.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::classifier::FamilyTag;
use crate::protocol::{Message, PlaybackMessage, SurfaceMessage};
use crate::render::DisplayUnit;
use crate::surface::ContainerState;

/// One in-flight play-all invocation. The unit order is captured at start
/// and stays fixed even if the group re-renders mid-sequence.
struct ActiveSequence {
    unit_ids: Vec<String>,
    index: usize,
}

impl ActiveSequence {
    fn current(&self) -> Option<&str> {
        self.unit_ids.get(self.index).map(String::as_str)
    }
}

pub struct PlaybackSequencer {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    /// Native-audio unit ids of each group's current render, document order.
    native_units: BTreeMap<FamilyTag, Vec<String>>,
    sequences: BTreeMap<FamilyTag, ActiveSequence>,
}

impl PlaybackSequencer {
    pub fn new(bus_consumer: Receiver<Message>, bus_producer: Sender<Message>) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            native_units: BTreeMap::new(),
            sequences: BTreeMap::new(),
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("PlaybackSequencer: Lagged behind bus by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("PlaybackSequencer: Bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Surface(SurfaceMessage::ContainerReplaced { family, state }) => {
                self.native_units
                    .insert(family, native_audio_ids(&state));
            }
            Message::Playback(PlaybackMessage::PlayAll { family }) => {
                self.play_all(family);
            }
            Message::Playback(PlaybackMessage::UnitFinished { unit_id }) => {
                self.advance(&unit_id);
            }
            Message::Playback(PlaybackMessage::UnitError { unit_id, reason }) => {
                let stalled = self
                    .sequences
                    .values()
                    .any(|sequence| sequence.current() == Some(unit_id.as_str()));
                if stalled {
                    warn!(
                        "PlaybackSequencer: Unit {} failed ({}), sequence will not advance",
                        unit_id, reason
                    );
                }
            }
            _ => {}
        }
    }

    /// Starts (or restarts) the group's sequence. A play-all with no native
    /// audio on the surface is a no-op.
    fn play_all(&mut self, family: FamilyTag) {
        let unit_ids = self
            .native_units
            .get(&family)
            .cloned()
            .unwrap_or_default();
        if unit_ids.is_empty() {
            debug!(
                "PlaybackSequencer: Play-all for {} with no native units",
                family.key()
            );
            return;
        }

        info!(
            "PlaybackSequencer: Playing {} units of {} from the top",
            unit_ids.len(),
            family.key()
        );
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::ResetUnits { family }));
        let first = unit_ids[0].clone();
        self.sequences
            .insert(family, ActiveSequence { unit_ids, index: 0 });
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::PlayUnit { unit_id: first }));
    }

    /// Advances the owning sequence when the finished unit is the one it was
    /// waiting on; stale or foreign completion signals are ignored.
    fn advance(&mut self, unit_id: &str) {
        let Some((family, sequence)) = self
            .sequences
            .iter_mut()
            .find(|(_, sequence)| sequence.current() == Some(unit_id))
            .map(|(family, sequence)| (*family, sequence))
        else {
            return;
        };

        sequence.index += 1;
        let next = sequence.current().map(str::to_string);
        match next {
            Some(unit_id) => {
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::PlayUnit { unit_id }));
            }
            None => {
                debug!(
                    "PlaybackSequencer: Sequence for {} ran to completion",
                    family.key()
                );
                self.sequences.remove(&family);
            }
        }
    }
}

fn native_audio_ids(state: &ContainerState) -> Vec<String> {
    match state {
        ContainerState::Rendered(units) => units
            .iter()
            .filter(|unit: &&DisplayUnit| unit.surface.is_native_audio())
            .map(|unit| unit.id.clone())
            .collect(),
        _ => Vec::new(),
    }
}
