//! Native media element host.
//!
//! Stands in for the surface's native players: it owns one element per
//! rendered native unit, addressed by unit id, and is the only component
//! that flips their play/pause/rewind state. Completion and failure signals
//! originate outside the pipeline (the element actually finishing or
//! erroring) and arrive as group-addressed messages; the host resolves them
//! to the unit it is currently playing and re-emits them by unit id.

use std::collections::BTreeMap;

use log::{debug, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::classifier::FamilyTag;
use crate::protocol::{Message, PlaybackMessage, SurfaceMessage};
use crate::render::MediaSurface;
use crate::surface::ContainerState;

struct MediaElement {
    unit_id: String,
    playing: bool,
    /// True while the element sits at position zero; cleared when playback
    /// runs to completion, restored by a reset.
    rewound: bool,
}

pub struct MediaHost {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    elements: BTreeMap<FamilyTag, Vec<MediaElement>>,
}

impl MediaHost {
    pub fn new(bus_consumer: Receiver<Message>, bus_producer: Sender<Message>) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            elements: BTreeMap::new(),
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("MediaHost: Lagged behind bus by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("MediaHost: Bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Surface(SurfaceMessage::ContainerReplaced { family, state }) => {
                self.rebuild_elements(family, &state);
            }
            Message::Playback(PlaybackMessage::PlayUnit { unit_id }) => {
                self.play_unit(&unit_id);
            }
            Message::Playback(PlaybackMessage::ResetUnits { family }) => {
                let count = self
                    .elements
                    .get_mut(&family)
                    .map(|elements| {
                        for element in elements.iter_mut() {
                            element.playing = false;
                            element.rewound = true;
                        }
                        elements.len()
                    })
                    .unwrap_or(0);
                debug!("MediaHost: Reset {} {} elements", count, family.key());
            }
            Message::Playback(PlaybackMessage::ElementCompleted { family }) => {
                if let Some(element) = self.playing_element(family) {
                    element.playing = false;
                    element.rewound = false;
                    let unit_id = element.unit_id.clone();
                    let _ = self
                        .bus_producer
                        .send(Message::Playback(PlaybackMessage::UnitFinished { unit_id }));
                } else {
                    debug!(
                        "MediaHost: Completion signal for {} with nothing playing",
                        family.key()
                    );
                }
            }
            Message::Playback(PlaybackMessage::ElementFailed { family, reason }) => {
                if let Some(element) = self.playing_element(family) {
                    element.playing = false;
                    let unit_id = element.unit_id.clone();
                    let _ = self
                        .bus_producer
                        .send(Message::Playback(PlaybackMessage::UnitError {
                            unit_id,
                            reason,
                        }));
                }
            }
            _ => {}
        }
    }

    /// Replaces a container's elements with the native units of its new
    /// render. Placeholder states carry no playable elements.
    fn rebuild_elements(&mut self, family: FamilyTag, state: &ContainerState) {
        let elements = match state {
            ContainerState::Rendered(units) => units
                .iter()
                .filter(|unit| {
                    matches!(
                        unit.surface,
                        MediaSurface::NativeAudio { .. } | MediaSurface::NativeVideo { .. }
                    )
                })
                .map(|unit| MediaElement {
                    unit_id: unit.id.clone(),
                    playing: false,
                    rewound: true,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.elements.insert(family, elements);
    }

    fn play_unit(&mut self, unit_id: &str) {
        for elements in self.elements.values_mut() {
            if let Some(element) = elements
                .iter_mut()
                .find(|element| element.unit_id == unit_id)
            {
                if !element.rewound {
                    debug!("MediaHost: Unit {} not at position zero, rewinding", unit_id);
                    element.rewound = true;
                }
                element.playing = true;
                let _ = self
                    .bus_producer
                    .send(Message::Playback(PlaybackMessage::UnitStarted {
                        unit_id: unit_id.to_string(),
                    }));
                return;
            }
        }
        warn!("MediaHost: Asked to play unknown unit {}", unit_id);
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::UnitError {
                unit_id: unit_id.to_string(),
                reason: "unit is not on the surface".to_string(),
            }));
    }

    fn playing_element(&mut self, family: FamilyTag) -> Option<&mut MediaElement> {
        self.elements
            .get_mut(&family)?
            .iter_mut()
            .find(|element| element.playing)
    }
}
