//! Visual surface model: per-family containers of rendered units.
//!
//! The surface holds one container per family, identified by the family
//! attribute. Writes replace a container's entire content; the only mutation
//! below container granularity is the in-place swap of a unit whose native
//! playback failed.

use std::collections::BTreeMap;

use crate::classifier::FamilyTag;
use crate::render::{DisplayUnit, LinkKind, MediaSurface};

/// Placeholder shown when a feed fails terminally.
pub const FEED_UNAVAILABLE_TEXT: &str =
    "No se pudo cargar el catálogo de medios. Coloca el archivo en la raíz del sitio.";

/// Placeholder shown when the active filters narrow a group to zero.
pub const NO_RESULTS_TEXT: &str = "Ningún resultado coincide con los filtros.";

/// Text shown in a rendered container that has no units at all.
pub const EMPTY_GROUP_TEXT: &str =
    "No hay ejemplos disponibles para esta familia en el dataset actual.";

/// Content of one family container.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerState {
    /// Rendered display units, possibly zero of them.
    Rendered(Vec<DisplayUnit>),
    /// The feed behind this container failed terminally.
    FeedUnavailable,
    /// The current filters matched nothing. Recoverable by changing filters.
    NoResults,
    /// The feed carries nothing for this family; the container is removed
    /// from the surface entirely.
    Hidden,
}

/// All family containers, iterated in family declaration order.
pub struct Surface {
    containers: BTreeMap<FamilyTag, ContainerState>,
}

impl Surface {
    pub fn new() -> Surface {
        let mut containers = BTreeMap::new();
        for family in FamilyTag::ALL {
            containers.insert(family, ContainerState::Hidden);
        }
        Surface { containers }
    }

    /// Full replacement of one container's content. Writing the same state
    /// twice leaves the surface identical.
    pub fn replace(&mut self, family: FamilyTag, state: ContainerState) {
        self.containers.insert(family, state);
    }

    pub fn container(&self, family: FamilyTag) -> &ContainerState {
        self.containers
            .get(&family)
            .unwrap_or(&ContainerState::Hidden)
    }

    /// Swaps one failed native unit for an open-externally affordance,
    /// leaving its siblings untouched. Returns false when the unit is not on
    /// the surface (e.g. it was re-rendered away before the error arrived).
    pub fn mark_unit_unavailable(&mut self, unit_id: &str) -> bool {
        for state in self.containers.values_mut() {
            let ContainerState::Rendered(units) = state else {
                continue;
            };
            for unit in units.iter_mut() {
                if unit.id != unit_id {
                    continue;
                }
                let url = match &unit.surface {
                    MediaSurface::NativeAudio { url, .. } => url.clone(),
                    MediaSurface::NativeVideo { url, .. } => url.clone(),
                    _ => return false,
                };
                unit.surface = MediaSurface::LinkOut {
                    url,
                    kind: LinkKind::OpenExternally,
                };
                return true;
            }
        }
        false
    }

    /// Unit at a rendered position, for operator affordances.
    pub fn unit_at(&self, family: FamilyTag, index: usize) -> Option<&DisplayUnit> {
        match self.container(family) {
            ContainerState::Rendered(units) => units.get(index),
            _ => None,
        }
    }

    /// Textual projection of one container, `None` while it is hidden.
    pub fn container_text(&self, family: FamilyTag) -> Option<String> {
        let heading = format!("[{}] {}\n", family.key(), family.display_name());
        match self.container(family) {
            ContainerState::Hidden => None,
            ContainerState::FeedUnavailable => {
                Some(format!("{}  {}\n", heading, FEED_UNAVAILABLE_TEXT))
            }
            ContainerState::NoResults => Some(format!("{}  {}\n", heading, NO_RESULTS_TEXT)),
            ContainerState::Rendered(units) => {
                if units.is_empty() {
                    return Some(format!("{}  {}\n", heading, EMPTY_GROUP_TEXT));
                }
                let mut out = heading;
                for (index, unit) in units.iter().enumerate() {
                    out.push_str(&format!(
                        "  {}. {} [{}]\n     {}\n     {}\n",
                        index,
                        unit.title,
                        unit.badge.badge_class(),
                        unit.meta_line,
                        surface_text(&unit.surface)
                    ));
                }
                Some(out)
            }
        }
    }

    /// Textual projection of the whole surface, one block per visible
    /// container.
    pub fn snapshot_text(&self) -> String {
        let mut out = String::new();
        for family in FamilyTag::ALL {
            if let Some(text) = self.container_text(family) {
                out.push_str(&text);
            }
        }
        out
    }
}

impl Default for Surface {
    fn default() -> Surface {
        Surface::new()
    }
}

fn surface_text(surface: &MediaSurface) -> String {
    match surface {
        MediaSurface::NativeAudio { url, mime } => format!("audio ({}) {}", mime, url),
        MediaSurface::NativeVideo { url, mime } => format!("video ({}) {}", mime, url),
        MediaSurface::LinkOut { url, kind } => format!("{} {}", kind.label(), url),
        MediaSurface::MetadataOnly => "sin reproductor".to_string(),
    }
}
