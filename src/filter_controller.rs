//! Per-group filter state and visible-subset recomputation.
//!
//! One controller owns the filter state of every family group. Each control
//! change recomputes that group's visible subset synchronously and replaces
//! the container through the render engine. Facet menus are populated from
//! the load-time snapshot and are never narrowed by filtering.

use std::collections::BTreeMap;

use log::{debug, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::catalog::{CatalogItem, FamilyGroup, GroupState};
use crate::catalog_store::CatalogStore;
use crate::classifier::FamilyTag;
use crate::protocol::{CatalogMessage, FilterMessage, Message, SurfaceMessage};
use crate::render;
use crate::surface::ContainerState;

/// Facet and search selection for one group. Lives for the process, resets
/// on every catalog reload, and is never shared across groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub year: Option<String>,
    pub platform: Option<String>,
    pub search: String,
}

impl FilterState {
    /// Logical AND across the active predicates; unset predicates pass
    /// everything.
    pub fn matches(&self, item: &CatalogItem) -> bool {
        if let Some(year) = &self.year {
            if item.year.as_deref() != Some(year.as_str()) {
                return false;
            }
        }
        if let Some(platform) = &self.platform {
            if item.platform.as_deref() != Some(platform.as_str()) {
                return false;
            }
        }
        let search = self.search.to_lowercase();
        let search = search.trim();
        if !search.is_empty() {
            let haystacks = [
                item.title.as_deref().unwrap_or(""),
                item.model_name.as_deref().unwrap_or(""),
                item.context_note.as_deref().unwrap_or(""),
                item.media.direct_url.as_deref().unwrap_or(""),
            ];
            if !haystacks
                .iter()
                .any(|field| field.to_lowercase().contains(search))
            {
                return false;
            }
        }
        true
    }
}

pub struct FilterController {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    store: CatalogStore,
    states: BTreeMap<FamilyTag, FilterState>,
}

impl FilterController {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        store: CatalogStore,
    ) -> Self {
        let mut states = BTreeMap::new();
        for family in FamilyTag::ALL {
            states.insert(family, FilterState::default());
        }
        Self {
            bus_consumer,
            bus_producer,
            store,
            states,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("FilterController: Lagged behind bus by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("FilterController: Bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Catalog(CatalogMessage::SnapshotPublished { generation }) => {
                debug!(
                    "FilterController: Snapshot {} published, resetting filters",
                    generation
                );
                for state in self.states.values_mut() {
                    *state = FilterState::default();
                }
                for family in FamilyTag::ALL {
                    self.recompute(family);
                }
            }
            Message::Filter(FilterMessage::SetYear { family, value }) => {
                if let Some(state) = self.states.get_mut(&family) {
                    state.year = value.filter(|value| !value.is_empty());
                }
                self.recompute(family);
            }
            Message::Filter(FilterMessage::SetPlatform { family, value }) => {
                if let Some(state) = self.states.get_mut(&family) {
                    state.platform = value.filter(|value| !value.is_empty());
                }
                self.recompute(family);
            }
            Message::Filter(FilterMessage::SetSearch { family, text }) => {
                if let Some(state) = self.states.get_mut(&family) {
                    state.search = text.trim().to_string();
                }
                self.recompute(family);
            }
            _ => {}
        }
    }

    /// Recomputes one group's container from the current snapshot and filter
    /// state, then replaces it on the surface.
    fn recompute(&mut self, family: FamilyTag) {
        let snapshot = self.store.snapshot();
        let state = self
            .states
            .get(&family)
            .cloned()
            .unwrap_or_default();

        let container = match snapshot.families.get(&family) {
            Some(GroupState::Loaded(group)) => Self::visible_container(group, &state),
            Some(GroupState::Unavailable) => ContainerState::FeedUnavailable,
            Some(GroupState::Hidden) | None => ContainerState::Hidden,
        };

        let _ = self
            .bus_producer
            .send(Message::Surface(SurfaceMessage::ContainerReplaced {
                family,
                state: container,
            }));
    }

    fn visible_container(group: &FamilyGroup, state: &FilterState) -> ContainerState {
        if group.items.is_empty() {
            return ContainerState::Rendered(Vec::new());
        }
        let visible: Vec<CatalogItem> = group
            .items
            .iter()
            .filter(|item| state.matches(item))
            .cloned()
            .collect();
        if visible.is_empty() {
            // Zero matches never reach the render engine; the container gets
            // the distinct no-results placeholder instead.
            return ContainerState::NoResults;
        }
        ContainerState::Rendered(render::render(&visible))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver, Sender};

    use super::{FilterController, FilterState};
    use crate::catalog::{CatalogItem, CatalogSnapshot, FamilyGroup, GroupState, MediaRef};
    use crate::catalog_store::CatalogStore;
    use crate::classifier::FamilyTag;
    use crate::protocol::{CatalogMessage, FilterMessage, Message, SurfaceMessage};
    use crate::surface::ContainerState;

    fn wait_for_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) -> Option<Message>
    where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                return None;
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        return Some(message);
                    }
                }
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn item(
        model: &str,
        year: &str,
        platform: &str,
        context: &str,
        url: &str,
    ) -> CatalogItem {
        let mut item = CatalogItem::new(MediaRef {
            direct_url: Some(url.to_string()),
            ..MediaRef::default()
        });
        item.model_name = Some(model.to_string());
        item.family = Some(FamilyTag::Ar);
        item.year = Some(year.to_string());
        item.platform = Some(platform.to_string());
        item.context_note = Some(context.to_string());
        item
    }

    fn ar_items() -> Vec<CatalogItem> {
        vec![
            item(
                "WaveNet demo",
                "2016",
                "DeepMind blog",
                "First public samples",
                "https://example.org/piano.mp3",
            ),
            item(
                "Jukebox",
                "2020",
                "OpenAI blog",
                "Raw audio, full songs",
                "https://example.org/jukebox.mp3",
            ),
            item(
                "MusicGen",
                "2023",
                "Hugging Face",
                "Text conditioned",
                "https://example.org/musicgen.mp3",
            ),
        ]
    }

    fn snapshot_with_ar(items: Vec<CatalogItem>) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::empty();
        snapshot
            .families
            .insert(FamilyTag::Ar, GroupState::Loaded(FamilyGroup::new(items)));
        snapshot
    }

    struct ControllerHarness {
        bus_sender: Sender<Message>,
        receiver: Receiver<Message>,
        store: CatalogStore,
    }

    impl ControllerHarness {
        fn new(snapshot: CatalogSnapshot) -> Self {
            let (bus_sender, _) = broadcast::channel(4096);
            let store = CatalogStore::new();
            let generation = store.begin_load();
            assert!(store.publish(generation, snapshot));

            let controller_receiver = bus_sender.subscribe();
            let controller_sender = bus_sender.clone();
            let controller_store = store.clone();
            thread::spawn(move || {
                let mut controller = FilterController::new(
                    controller_receiver,
                    controller_sender,
                    controller_store,
                );
                controller.run();
            });

            let receiver = bus_sender.subscribe();
            let mut harness = Self {
                bus_sender,
                receiver,
                store,
            };
            harness.publish_notification(generation);
            harness
        }

        fn publish_notification(&mut self, generation: u64) {
            self.send(Message::Catalog(CatalogMessage::SnapshotPublished {
                generation,
            }));
            // Wait until all three containers were replaced for this pass.
            for _ in FamilyTag::ALL {
                assert!(self.next_replacement().is_some());
            }
        }

        fn send(&self, message: Message) {
            let _ = self.bus_sender.send(message);
        }

        fn next_replacement(&mut self) -> Option<(FamilyTag, ContainerState)> {
            wait_for_message(&mut self.receiver, Duration::from_secs(1), |message| {
                matches!(
                    message,
                    Message::Surface(SurfaceMessage::ContainerReplaced { .. })
                )
            })
            .map(|message| match message {
                Message::Surface(SurfaceMessage::ContainerReplaced { family, state }) => {
                    (family, state)
                }
                _ => unreachable!(),
            })
        }

        fn replacement_for(&mut self, family: FamilyTag) -> ContainerState {
            loop {
                let (replaced, state) = self
                    .next_replacement()
                    .expect("expected a container replacement");
                if replaced == family {
                    return state;
                }
            }
        }
    }

    #[test]
    fn test_filter_state_and_composition_matches_individual_predicates() {
        let items = ar_items();
        let state = FilterState {
            year: Some("2016".to_string()),
            platform: None,
            search: "samples".to_string(),
        };
        let year_only = FilterState {
            year: Some("2016".to_string()),
            ..FilterState::default()
        };
        let search_only = FilterState {
            search: "samples".to_string(),
            ..FilterState::default()
        };
        for item in &items {
            assert_eq!(
                state.matches(item),
                year_only.matches(item) && search_only.matches(item)
            );
        }
    }

    #[test]
    fn test_search_matches_direct_url_case_insensitively() {
        let items = ar_items();
        let state = FilterState {
            search: "JUKEBOX.MP3".to_string(),
            ..FilterState::default()
        };
        let matching: Vec<_> = items.iter().filter(|item| state.matches(item)).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].model_name.as_deref(), Some("Jukebox"));
    }

    #[test]
    fn test_year_filter_narrows_visible_subset() {
        let mut harness = ControllerHarness::new(snapshot_with_ar(ar_items()));
        harness.send(Message::Filter(FilterMessage::SetYear {
            family: FamilyTag::Ar,
            value: Some("2020".to_string()),
        }));
        let ContainerState::Rendered(units) = harness.replacement_for(FamilyTag::Ar) else {
            panic!("expected rendered units");
        };
        assert_eq!(units.len(), 1);
        assert!(units[0].meta_line.starts_with("Jukebox · 2020"));
    }

    #[test]
    fn test_zero_matches_render_no_results_and_keep_facets() {
        let mut harness = ControllerHarness::new(snapshot_with_ar(ar_items()));
        harness.send(Message::Filter(FilterMessage::SetYear {
            family: FamilyTag::Ar,
            value: Some("1999".to_string()),
        }));
        assert_eq!(
            harness.replacement_for(FamilyTag::Ar),
            ContainerState::NoResults
        );

        // The facet snapshot in the store is untouched by filtering.
        let snapshot = harness.store.snapshot();
        let group = snapshot.group(FamilyTag::Ar).expect("ar group");
        assert_eq!(group.facets.years, vec!["2016", "2020", "2023"]);
    }

    #[test]
    fn test_clearing_year_restores_full_group() {
        let mut harness = ControllerHarness::new(snapshot_with_ar(ar_items()));
        harness.send(Message::Filter(FilterMessage::SetYear {
            family: FamilyTag::Ar,
            value: Some("2020".to_string()),
        }));
        let _ = harness.replacement_for(FamilyTag::Ar);

        harness.send(Message::Filter(FilterMessage::SetYear {
            family: FamilyTag::Ar,
            value: None,
        }));
        let ContainerState::Rendered(units) = harness.replacement_for(FamilyTag::Ar) else {
            panic!("expected rendered units");
        };
        assert_eq!(units.len(), 3);
    }

    #[test]
    fn test_reload_resets_filter_state() {
        let mut harness = ControllerHarness::new(snapshot_with_ar(ar_items()));
        harness.send(Message::Filter(FilterMessage::SetSearch {
            family: FamilyTag::Ar,
            text: "wavenet".to_string(),
        }));
        let ContainerState::Rendered(units) = harness.replacement_for(FamilyTag::Ar) else {
            panic!("expected rendered units");
        };
        assert_eq!(units.len(), 1);

        // A new load arrives; filters must reset and the full group returns.
        let generation = harness.store.begin_load();
        assert!(harness
            .store
            .publish(generation, snapshot_with_ar(ar_items())));
        harness.send(Message::Catalog(CatalogMessage::SnapshotPublished {
            generation,
        }));
        loop {
            let state = harness.replacement_for(FamilyTag::Ar);
            if let ContainerState::Rendered(units) = state {
                assert_eq!(units.len(), 3);
                break;
            }
        }
    }

    #[test]
    fn test_unavailable_and_hidden_groups_pass_through() {
        let mut snapshot = CatalogSnapshot::empty();
        snapshot
            .families
            .insert(FamilyTag::Ar, GroupState::Unavailable);
        let mut harness = ControllerHarness::new(snapshot);
        harness.send(Message::Filter(FilterMessage::SetSearch {
            family: FamilyTag::Ar,
            text: "anything".to_string(),
        }));
        assert_eq!(
            harness.replacement_for(FamilyTag::Ar),
            ContainerState::FeedUnavailable
        );

        harness.send(Message::Filter(FilterMessage::SetSearch {
            family: FamilyTag::Gan,
            text: "anything".to_string(),
        }));
        assert_eq!(
            harness.replacement_for(FamilyTag::Gan),
            ContainerState::Hidden
        );
    }

    #[test]
    fn test_empty_group_renders_empty_not_no_results() {
        let mut harness = ControllerHarness::new(snapshot_with_ar(Vec::new()));
        harness.send(Message::Filter(FilterMessage::SetYear {
            family: FamilyTag::Ar,
            value: Some("2016".to_string()),
        }));
        assert_eq!(
            harness.replacement_for(FamilyTag::Ar),
            ContainerState::Rendered(Vec::new())
        );
    }
}
