//! Surface manager: applies container replacements and operator affordances.
//!
//! Owns the [`Surface`] and the adjacent sources panel. Container writes
//! arrive from the filter controller; unit failures swap the affected unit
//! in place; paper links are injected once per catalog load.

use log::{debug, info, warn};
use tokio::sync::broadcast::Receiver;

use crate::catalog_store::CatalogStore;
use crate::classifier::FamilyTag;
use crate::protocol::{CatalogMessage, Message, PlaybackMessage, SurfaceMessage};
use crate::sources::{bibliography_report, format_report, SourcesPanel};
use crate::surface::Surface;

pub struct SurfaceManager {
    bus_consumer: Receiver<Message>,
    store: CatalogStore,
    surface: Surface,
    sources: SourcesPanel,
}

impl SurfaceManager {
    pub fn new(bus_consumer: Receiver<Message>, store: CatalogStore) -> Self {
        Self {
            bus_consumer,
            store,
            surface: Surface::new(),
            sources: SourcesPanel::new(),
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("SurfaceManager: Lagged behind bus by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("SurfaceManager: Bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Surface(SurfaceMessage::ContainerReplaced { family, state }) => {
                self.surface.replace(family, state);
                match self.surface.container_text(family) {
                    Some(text) => print!("{}", text),
                    None => debug!("SurfaceManager: Container {} hidden", family.key()),
                }
            }
            Message::Surface(SurfaceMessage::OpenUnitLink { family, index }) => {
                self.open_unit_link(family, index);
            }
            Message::Surface(SurfaceMessage::SnapshotRequested) => {
                print!("{}", self.surface.snapshot_text());
                let models = self.store.snapshot().models;
                if !models.is_empty() {
                    println!("models:");
                    for model in &models {
                        println!(
                            "  [{}] {} ({}) {}",
                            model.family.key(),
                            model.name,
                            model.year.as_deref().unwrap_or("?"),
                            model.description.as_deref().unwrap_or("")
                        );
                    }
                }
                if !self.sources.links().is_empty() {
                    println!("sources:");
                    for link in self.sources.links() {
                        println!("  {} ({})", link.label, link.url);
                    }
                }
            }
            Message::Playback(PlaybackMessage::UnitStarted { unit_id }) => {
                debug!("SurfaceManager: Unit {} started", unit_id);
            }
            Message::Playback(PlaybackMessage::UnitError { unit_id, reason }) => {
                if self.surface.mark_unit_unavailable(&unit_id) {
                    info!(
                        "SurfaceManager: Unit {} unavailable ({}), swapped for external link",
                        unit_id, reason
                    );
                }
            }
            Message::Catalog(CatalogMessage::SnapshotPublished { generation }) => {
                if generation != self.store.published_generation() {
                    debug!(
                        "SurfaceManager: Skipping stale publish notification {}",
                        generation
                    );
                    return;
                }
                let models = self.store.snapshot().models;
                let added = self.sources.inject_model_papers(&models);
                if added > 0 {
                    info!(
                        "SurfaceManager: Injected {} paper links from load {} ({} total)",
                        added,
                        generation,
                        self.sources.links().len()
                    );
                }
            }
            Message::Catalog(CatalogMessage::LoadFailed { generation, reason }) => {
                warn!(
                    "SurfaceManager: Load {} left containers unavailable: {}",
                    generation, reason
                );
            }
            Message::Catalog(CatalogMessage::DiagnosticsRequested) => {
                let models = self.store.snapshot().models;
                print!("{}", format_report(&bibliography_report(&models)));
            }
            _ => {}
        }
    }

    fn open_unit_link(&self, family: FamilyTag, index: usize) {
        let Some(unit) = self.surface.unit_at(family, index) else {
            warn!(
                "SurfaceManager: No unit {} in container {}",
                index,
                family.key()
            );
            return;
        };
        let Some(url) = unit.surface.media_url() else {
            info!("SurfaceManager: Unit {} has no media to open", index);
            return;
        };
        if let Err(err) = webbrowser::open(url) {
            warn!("SurfaceManager: Failed to open {}: {}", url, err);
        }
    }
}
