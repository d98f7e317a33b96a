//! Normalized catalog data model.
//!
//! The loader normalizes both feed shapes into [`CatalogItem`]s, partitions
//! them into [`FamilyGroup`]s, and snapshots the result. Items are immutable
//! once constructed; the family tag is recomputed on every load and never
//! cached across reloads.

use std::collections::BTreeMap;

use crate::classifier::FamilyTag;

/// Source-asserted confidence that an item really demonstrates the model it
/// is attributed to. Unrecognized or absent values normalize to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn parse(value: &str) -> Confidence {
        match value.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    /// Fixed visual class for the badge on a rendered unit.
    pub fn badge_class(&self) -> &'static str {
        match self {
            Confidence::Low => "badge-low",
            Confidence::Medium => "badge-medium",
            Confidence::High => "badge-high",
        }
    }
}

/// Media references attached to one item. At least one of `direct_url` /
/// `embed_url` is present on every retained item; rows with neither are
/// dropped at normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRef {
    pub direct_url: Option<String>,
    pub embed_url: Option<String>,
    /// Landing page, used only by the SoundCloud link-out rule.
    pub page_url: Option<String>,
}

impl MediaRef {
    pub fn is_eligible(&self) -> bool {
        self.direct_url.is_some() || self.embed_url.is_some()
    }

    /// URL used for title derivation: direct wins over embed.
    pub fn chosen_url(&self) -> &str {
        self.direct_url
            .as_deref()
            .or(self.embed_url.as_deref())
            .unwrap_or("")
    }
}

/// One normalized catalog item. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    /// Addressing id for playback units, assigned at normalization.
    pub id: String,
    pub title: Option<String>,
    pub model_name: Option<String>,
    pub family: Option<FamilyTag>,
    pub year: Option<String>,
    pub platform: Option<String>,
    pub context_note: Option<String>,
    pub confidence: Confidence,
    pub media: MediaRef,
}

impl CatalogItem {
    pub fn new(media: MediaRef) -> CatalogItem {
        CatalogItem {
            id: uuid::Uuid::new_v4().to_string(),
            title: None,
            model_name: None,
            family: None,
            year: None,
            platform: None,
            context_note: None,
            confidence: Confidence::Low,
            media,
        }
    }
}

/// Distinct facet values available for filtering within one group.
///
/// Computed once per load, sorted ascending, and never mutated by filtering:
/// the filter menus keep every option even while the visible subset narrows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    pub years: Vec<String>,
    pub platforms: Vec<String>,
}

impl Facets {
    pub fn collect(items: &[CatalogItem]) -> Facets {
        Facets {
            years: distinct_sorted(items.iter().filter_map(|item| item.year.as_deref())),
            platforms: distinct_sorted(items.iter().filter_map(|item| item.platform.as_deref())),
        }
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::new();
    for value in values {
        if value.is_empty() {
            continue;
        }
        if !distinct.iter().any(|existing| existing == value) {
            distinct.push(value.to_string());
        }
    }
    distinct.sort();
    distinct
}

/// One family's items, in feed order, plus the facet snapshot derived from
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyGroup {
    pub items: Vec<CatalogItem>,
    pub facets: Facets,
}

impl FamilyGroup {
    pub fn new(items: Vec<CatalogItem>) -> FamilyGroup {
        let facets = Facets::collect(&items);
        FamilyGroup { items, facets }
    }
}

/// Load outcome for one family container.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupState {
    /// Full item list available (possibly empty).
    Loaded(FamilyGroup),
    /// The feed for this container failed terminally.
    Unavailable,
    /// The feed carries nothing at all for this family; the container is
    /// removed from the surface entirely. Distinct from a zero-result filter.
    Hidden,
}

/// Static (non-playable) model metadata from the nested feed, feeding the
/// sources panel and the bibliography diagnostics report.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub family: FamilyTag,
    pub name: String,
    pub year: Option<String>,
    pub description: Option<String>,
    pub paper_url: Option<String>,
    pub paper_cite: Option<String>,
}

/// One complete, atomically published catalog load.
///
/// A load either publishes a family's full item list or marks the group
/// unavailable; partial groups are never published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    /// Per-family load outcome, iterated in family declaration order.
    pub families: BTreeMap<FamilyTag, GroupState>,
    /// Model metadata from the nested feed; empty for the tabular feed.
    pub models: Vec<ModelEntry>,
}

impl CatalogSnapshot {
    /// Snapshot shown before any load completes: nothing on the surface.
    pub fn empty() -> CatalogSnapshot {
        let mut families = BTreeMap::new();
        for family in FamilyTag::ALL {
            families.insert(family, GroupState::Hidden);
        }
        CatalogSnapshot {
            families,
            models: Vec::new(),
        }
    }

    /// Snapshot published when a feed fails terminally: every container
    /// renders the feed-unavailable placeholder.
    pub fn all_unavailable() -> CatalogSnapshot {
        let mut families = BTreeMap::new();
        for family in FamilyTag::ALL {
            families.insert(family, GroupState::Unavailable);
        }
        CatalogSnapshot {
            families,
            models: Vec::new(),
        }
    }

    pub fn group(&self, family: FamilyTag) -> Option<&FamilyGroup> {
        match self.families.get(&family) {
            Some(GroupState::Loaded(group)) => Some(group),
            _ => None,
        }
    }
}
