//! Catalog loader: fetches a feed, normalizes it, and publishes snapshots.
//!
//! Two interchangeable strategies exist, selected by the configured feed
//! shape. Both produce one complete [`CatalogSnapshot`]; a family is either
//! fully loaded, unavailable, or hidden, never partially published. The
//! loader is the store's single writer.

use std::collections::BTreeMap;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::catalog::{CatalogItem, CatalogSnapshot, Confidence, FamilyGroup, GroupState, MediaRef, ModelEntry};
use crate::catalog_store::CatalogStore;
use crate::classifier::{classify, FamilyTag};
use crate::config::{Config, FeedShape};
use crate::feed::{self, NestedDocument, NestedExample, TabularRecord};
use crate::protocol::{CatalogMessage, Message};

pub struct CatalogLoader {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    store: CatalogStore,
    config: Config,
    http_client: ureq::Agent,
}

impl CatalogLoader {
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        store: CatalogStore,
        config: Config,
    ) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(config.network.connect_timeout_ms))
            .timeout_read(Duration::from_millis(config.network.read_timeout_ms))
            .build();
        Self {
            bus_consumer,
            bus_producer,
            store,
            config,
            http_client,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Catalog(CatalogMessage::Reload)) => self.reload(),
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("CatalogLoader: Lagged behind bus by {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    debug!("CatalogLoader: Bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn reload(&mut self) {
        let generation = self.store.begin_load();
        info!(
            "CatalogLoader: Loading {:?} feed (generation {})",
            self.config.feed.shape, generation
        );

        let result = match self.config.feed.shape {
            FeedShape::Tabular => self.load_tabular(),
            FeedShape::Nested => self.load_nested(),
        };

        match result {
            Ok(snapshot) => {
                if self.store.publish(generation, snapshot) {
                    let _ = self.bus_producer.send(Message::Catalog(
                        CatalogMessage::SnapshotPublished { generation },
                    ));
                } else {
                    info!(
                        "CatalogLoader: Discarding load {} superseded by a newer one",
                        generation
                    );
                }
            }
            Err(reason) => {
                warn!("CatalogLoader: Load {} failed: {}", generation, reason);
                if self.store.publish(generation, CatalogSnapshot::all_unavailable()) {
                    let _ = self.bus_producer.send(Message::Catalog(
                        CatalogMessage::SnapshotPublished { generation },
                    ));
                    let _ = self
                        .bus_producer
                        .send(Message::Catalog(CatalogMessage::LoadFailed {
                            generation,
                            reason,
                        }));
                }
            }
        }
    }

    fn load_tabular(&self) -> Result<CatalogSnapshot, String> {
        let source = self.config.feed.tabular_source.clone();
        let attempts = self.config.network.feed_retry_limit.max(1);
        let backoff = Duration::from_millis(self.config.network.feed_retry_backoff_ms);
        let records = fetch_tabular_with_retry(
            &mut || self.fetch_text(&source).and_then(|text| feed::parse_tabular(&text)),
            attempts,
            backoff,
        )?;
        Ok(normalize_tabular(records))
    }

    fn load_nested(&self) -> Result<CatalogSnapshot, String> {
        let text = self.fetch_text(&self.config.feed.nested_source)?;
        let document = feed::parse_nested(&text)?;
        Ok(normalize_nested(document))
    }

    /// Reads a feed body from an http(s) URL or a local path.
    fn fetch_text(&self, source: &str) -> Result<String, String> {
        if source.is_empty() {
            return Err("no feed source configured".to_string());
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .http_client
                .get(source)
                .call()
                .map_err(|err| format!("fetch {} failed: {}", source, err))?;
            response
                .into_string()
                .map_err(|err| format!("read {} failed: {}", source, err))
        } else {
            std::fs::read_to_string(source)
                .map_err(|err| format!("read {} failed: {}", source, err))
        }
    }
}

/// Bounded fixed-backoff retry around one fetch+parse attempt of the tabular
/// feed. Attempts are capped so a feed that never materializes cannot spin
/// the loader forever.
fn fetch_tabular_with_retry(
    attempt: &mut dyn FnMut() -> Result<Vec<TabularRecord>, String>,
    attempts: u64,
    backoff: Duration,
) -> Result<Vec<TabularRecord>, String> {
    let mut last_error = String::new();
    for round in 1..=attempts {
        match attempt() {
            Ok(records) => return Ok(records),
            Err(err) => {
                last_error = err;
                if round < attempts {
                    warn!(
                        "CatalogLoader: Tabular feed not ready ({}), retry {}/{} in {}ms",
                        last_error,
                        round,
                        attempts,
                        backoff.as_millis()
                    );
                    std::thread::sleep(backoff);
                }
            }
        }
    }
    Err(format!(
        "tabular feed unavailable after {} attempts: {}",
        attempts, last_error
    ))
}

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Normalizes tabular records into a snapshot. Rows with neither media URL
/// are dropped; the family is recomputed from the model name on every load.
fn normalize_tabular(records: Vec<TabularRecord>) -> CatalogSnapshot {
    let total = records.len();
    let mut per_family: BTreeMap<FamilyTag, Vec<CatalogItem>> = BTreeMap::new();
    for family in FamilyTag::ALL {
        per_family.insert(family, Vec::new());
    }

    let mut dropped = 0usize;
    let mut unclassified = 0usize;
    for record in records {
        let media = MediaRef {
            direct_url: optional(record.direct_media_url),
            embed_url: optional(record.embed_url),
            page_url: optional(record.page_url),
        };
        if !media.is_eligible() {
            dropped += 1;
            continue;
        }
        let family = classify(&record.model_name);
        let mut item = CatalogItem::new(media);
        item.title = optional(record.title);
        item.model_name = optional(record.model_name);
        item.family = family;
        item.year = optional(record.year);
        item.platform = optional(record.platform);
        item.context_note = optional(record.context_note);
        item.confidence = Confidence::parse(&record.confidence);

        match family.and_then(|family| per_family.get_mut(&family)) {
            Some(items) => items.push(item),
            None => unclassified += 1,
        }
    }
    debug!(
        "CatalogLoader: Normalized {} tabular rows ({} without media, {} unclassified)",
        total, dropped, unclassified
    );

    let families = per_family
        .into_iter()
        .map(|(family, items)| (family, GroupState::Loaded(FamilyGroup::new(items))))
        .collect();
    CatalogSnapshot {
        families,
        models: Vec::new(),
    }
}

/// Normalizes the nested document. Examples come pre-tagged with their
/// family; a family key with neither models nor examples hides its
/// container.
fn normalize_nested(document: NestedDocument) -> CatalogSnapshot {
    let mut families = BTreeMap::new();
    let mut models = Vec::new();

    for family in FamilyTag::ALL {
        let Some(entry) = document.get(family.key()) else {
            families.insert(family, GroupState::Hidden);
            continue;
        };
        if entry.models.is_none() && entry.examples.is_none() {
            families.insert(family, GroupState::Hidden);
            continue;
        }

        for model in entry.models.as_deref().unwrap_or_default() {
            models.push(ModelEntry {
                family,
                name: model.name.clone(),
                year: model.year.clone(),
                description: model.description.clone(),
                paper_url: model.paper.as_ref().and_then(|paper| paper.url.clone()),
                paper_cite: model.paper.as_ref().and_then(|paper| paper.cite.clone()),
            });
        }

        let mut items = Vec::new();
        let mut dropped = 0usize;
        for example in entry.examples.as_deref().unwrap_or_default() {
            match normalize_example(family, example) {
                Some(item) => items.push(item),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(
                "CatalogLoader: Dropped {} {} examples without media",
                dropped,
                family.key()
            );
        }
        families.insert(family, GroupState::Loaded(FamilyGroup::new(items)));
    }

    CatalogSnapshot { families, models }
}

fn normalize_example(family: FamilyTag, example: &NestedExample) -> Option<CatalogItem> {
    let media = if example.kind == "embed" {
        MediaRef {
            embed_url: optional(example.url.clone()),
            ..MediaRef::default()
        }
    } else {
        MediaRef {
            direct_url: optional(example.url.clone()),
            ..MediaRef::default()
        }
    };
    if !media.is_eligible() {
        return None;
    }
    let mut item = CatalogItem::new(media);
    item.title = optional(example.title.clone());
    item.model_name = optional(example.model.clone());
    item.family = Some(family);
    item.year = example.year.clone();
    item.context_note = optional(example.context.clone());
    Some(item)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{fetch_tabular_with_retry, normalize_nested, normalize_tabular};
    use crate::catalog::GroupState;
    use crate::classifier::FamilyTag;
    use crate::feed::{parse_nested, parse_tabular};

    fn tabular_fixture() -> &'static str {
        "title,model_name,year,platform,context_note,confidence,direct_media_url,embed_url,page_url\n\
         ,WaveNet demo,2016,DeepMind blog,First public samples,high,https://example.org/clip.mp3,,\n\
         GANSynth strings,GANSynth,2019,YouTube,,medium,,https://www.youtube.com/watch?v=abc,\n\
         Missing media,Riffusion,2022,,,low,,,\n\
         Unknown model,Totally Novel,2023,,,low,https://example.org/novel.mp3,,\n"
    }

    #[test]
    fn test_normalize_tabular_groups_by_classified_family() {
        let records = parse_tabular(tabular_fixture()).unwrap();
        let snapshot = normalize_tabular(records);

        let GroupState::Loaded(ar) = &snapshot.families[&FamilyTag::Ar] else {
            panic!("ar group must load");
        };
        assert_eq!(ar.items.len(), 1);
        assert_eq!(ar.items[0].model_name.as_deref(), Some("WaveNet demo"));
        assert_eq!(ar.items[0].family, Some(FamilyTag::Ar));
        assert_eq!(ar.facets.years, vec!["2016"]);

        let GroupState::Loaded(gan) = &snapshot.families[&FamilyTag::Gan] else {
            panic!("gan group must load");
        };
        assert_eq!(gan.items.len(), 1);
        assert_eq!(gan.items[0].title.as_deref(), Some("GANSynth strings"));
    }

    #[test]
    fn test_rows_without_media_are_dropped_from_every_group() {
        let records = parse_tabular(tabular_fixture()).unwrap();
        let snapshot = normalize_tabular(records);
        for state in snapshot.families.values() {
            let GroupState::Loaded(group) = state else {
                panic!("tabular families always load");
            };
            assert!(group
                .items
                .iter()
                .all(|item| item.model_name.as_deref() != Some("Riffusion")));
        }
    }

    #[test]
    fn test_unclassified_rows_are_excluded_from_every_group() {
        let records = parse_tabular(tabular_fixture()).unwrap();
        let snapshot = normalize_tabular(records);
        for state in snapshot.families.values() {
            let GroupState::Loaded(group) = state else {
                panic!("tabular families always load");
            };
            assert!(group
                .items
                .iter()
                .all(|item| item.model_name.as_deref() != Some("Totally Novel")));
        }
    }

    #[test]
    fn test_normalize_nested_hides_absent_and_empty_families() {
        let document = parse_nested(
            r#"{
                "ar": {
                    "models": [{"name": "WaveNet", "year": 2016,
                                "paper": {"url": "https://arxiv.org/abs/1609.03499", "cite": "van den Oord et al. 2016"}}],
                    "examples": [
                        {"title": "", "model": "WaveNet", "year": 2016,
                         "context": "Raw piano", "url": "https://example.org/piano.mp3", "type": "audio"},
                        {"title": "Broken row", "model": "WaveNet", "url": "", "type": "audio"}
                    ]
                },
                "gan": {}
            }"#,
        )
        .unwrap();
        let snapshot = normalize_nested(document);

        let GroupState::Loaded(ar) = &snapshot.families[&FamilyTag::Ar] else {
            panic!("ar group must load");
        };
        assert_eq!(ar.items.len(), 1);
        assert_eq!(ar.items[0].family, Some(FamilyTag::Ar));
        assert_eq!(ar.items[0].year.as_deref(), Some("2016"));
        assert_eq!(ar.items[0].context_note.as_deref(), Some("Raw piano"));

        // Key present but with neither models nor examples: hidden.
        assert_eq!(snapshot.families[&FamilyTag::Gan], GroupState::Hidden);
        // Key absent entirely: hidden as well.
        assert_eq!(snapshot.families[&FamilyTag::Diffusion], GroupState::Hidden);

        assert_eq!(snapshot.models.len(), 1);
        assert_eq!(snapshot.models[0].name, "WaveNet");
        assert_eq!(
            snapshot.models[0].paper_cite.as_deref(),
            Some("van den Oord et al. 2016")
        );
    }

    #[test]
    fn test_nested_embed_examples_map_to_embed_url() {
        let document = parse_nested(
            r#"{"gan": {"examples": [
                {"title": "Strings", "model": "GANSynth", "year": "2019",
                 "url": "https://www.youtube.com/watch?v=abc", "type": "embed"}
            ]}}"#,
        )
        .unwrap();
        let snapshot = normalize_nested(document);
        let GroupState::Loaded(gan) = &snapshot.families[&FamilyTag::Gan] else {
            panic!("gan group must load");
        };
        assert_eq!(
            gan.items[0].media.embed_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(gan.items[0].media.direct_url, None);
    }

    #[test]
    fn test_retry_is_bounded_and_counts_attempts() {
        let mut calls = 0u64;
        let result = fetch_tabular_with_retry(
            &mut || {
                calls += 1;
                Err("parser not ready".to_string())
            },
            3,
            Duration::from_millis(1),
        );
        assert_eq!(calls, 3);
        let err = result.unwrap_err();
        assert!(err.contains("after 3 attempts"), "unexpected error: {}", err);
    }

    #[test]
    fn test_retry_stops_on_first_success() {
        let mut calls = 0u64;
        let result = fetch_tabular_with_retry(
            &mut || {
                calls += 1;
                if calls < 2 {
                    Err("parser not ready".to_string())
                } else {
                    Ok(Vec::new())
                }
            },
            5,
            Duration::from_millis(1),
        );
        assert!(result.is_ok());
        assert_eq!(calls, 2);
    }
}
