//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the catalog
//! loader, filter controllers, media element host, playback sequencer, and
//! the surface writer.

use crate::classifier::FamilyTag;
use crate::surface::ContainerState;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Catalog(CatalogMessage),
    Filter(FilterMessage),
    Playback(PlaybackMessage),
    Surface(SurfaceMessage),
}

/// Catalog-load commands and notifications.
#[derive(Debug, Clone)]
pub enum CatalogMessage {
    /// Fetch the configured feed and rebuild the catalog snapshot.
    Reload,
    /// A load finished and its snapshot became the authoritative one.
    /// Readers must re-read the store and drop any derived state.
    SnapshotPublished { generation: u64 },
    /// A load failed terminally after retries. The store already carries the
    /// feed-unavailable snapshot for the affected containers.
    LoadFailed { generation: u64, reason: String },
    /// Operator asked for the bibliography diagnostics report.
    DiagnosticsRequested,
}

/// Per-group filter control changes.
///
/// `None` / empty text clears the predicate. Every variant triggers a full
/// synchronous recompute of the group's visible subset.
#[derive(Debug, Clone)]
pub enum FilterMessage {
    SetYear {
        family: FamilyTag,
        value: Option<String>,
    },
    SetPlatform {
        family: FamilyTag,
        value: Option<String>,
    },
    SetSearch {
        family: FamilyTag,
        text: String,
    },
}

/// Playback commands and media-element signals.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    /// Start sequential playback over the group's native units.
    PlayAll { family: FamilyTag },
    /// Sequencer asks the element host to start one unit from position zero.
    PlayUnit { unit_id: String },
    /// Sequencer asks the element host to pause every element in the group
    /// and rewind it to position zero.
    ResetUnits { family: FamilyTag },
    /// Element host confirms a unit began playing.
    UnitStarted { unit_id: String },
    /// Natural-completion signal of a playing unit. The only event that
    /// advances a sequence.
    UnitFinished { unit_id: String },
    /// Runtime failure of a native unit. Never advances a sequence.
    UnitError { unit_id: String, reason: String },
    /// Surface-side completion signal addressed by group; the element host
    /// resolves it to the unit it is currently playing.
    ElementCompleted { family: FamilyTag },
    /// Surface-side failure signal addressed by group.
    ElementFailed { family: FamilyTag, reason: String },
}

/// Surface updates and operator affordances.
#[derive(Debug, Clone)]
pub enum SurfaceMessage {
    /// Full replacement of one family container's content.
    ContainerReplaced {
        family: FamilyTag,
        state: ContainerState,
    },
    /// Open the link-out affordance of one rendered unit externally.
    OpenUnitLink { family: FamilyTag, index: usize },
    /// Operator asked for a full reprint of the visible surface.
    SnapshotRequested,
}
