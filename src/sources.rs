//! Sources panel and bibliography diagnostics.
//!
//! The nested feed's model entries carry paper metadata. Their links are
//! injected into the adjacent sources list, keyed by paper URL so repeated
//! loads never duplicate an entry. The diagnostics report is operator-facing
//! output, separate from the placeholder UI.

use crate::catalog::ModelEntry;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLink {
    pub url: String,
    pub label: String,
}

/// The adjacent "sources" list. Injection is idempotent per URL.
#[derive(Debug, Default)]
pub struct SourcesPanel {
    links: Vec<SourceLink>,
}

impl SourcesPanel {
    pub fn new() -> SourcesPanel {
        SourcesPanel { links: Vec::new() }
    }

    /// Adds a link unless its URL is already present. Returns whether the
    /// panel changed.
    pub fn inject(&mut self, url: &str, label: &str) -> bool {
        if url.is_empty() || self.links.iter().any(|link| link.url == url) {
            return false;
        }
        self.links.push(SourceLink {
            url: url.to_string(),
            label: label.to_string(),
        });
        true
    }

    /// Injects the paper link of every model entry that has one. The label
    /// prefers the citation over the bare model name.
    pub fn inject_model_papers(&mut self, models: &[ModelEntry]) -> usize {
        let mut added = 0;
        for model in models {
            let Some(url) = model.paper_url.as_deref() else {
                continue;
            };
            let label = model
                .paper_cite
                .as_deref()
                .unwrap_or(model.name.as_str());
            if self.inject(url, label) {
                added += 1;
            }
        }
        added
    }

    pub fn links(&self) -> &[SourceLink] {
        &self.links
    }
}

/// One catalog entry with incomplete bibliography.
#[derive(Debug, Clone, PartialEq)]
pub struct BibliographyGap {
    pub family: String,
    pub name: String,
    pub missing_url: bool,
    pub missing_cite: bool,
}

/// Enumerates model entries missing their paper URL or citation.
pub fn bibliography_report(models: &[ModelEntry]) -> Vec<BibliographyGap> {
    models
        .iter()
        .filter_map(|model| {
            let missing_url = model.paper_url.as_deref().unwrap_or("").is_empty();
            let missing_cite = model.paper_cite.as_deref().unwrap_or("").is_empty();
            if !missing_url && !missing_cite {
                return None;
            }
            Some(BibliographyGap {
                family: model.family.key().to_string(),
                name: model.name.clone(),
                missing_url,
                missing_cite,
            })
        })
        .collect()
}

pub fn format_report(gaps: &[BibliographyGap]) -> String {
    if gaps.is_empty() {
        return "Bibliography complete: every model entry has a paper URL and citation.\n"
            .to_string();
    }
    let mut out = format!("{} model entries with incomplete bibliography:\n", gaps.len());
    for gap in gaps {
        let mut missing = Vec::new();
        if gap.missing_url {
            missing.push("url");
        }
        if gap.missing_cite {
            missing.push("cite");
        }
        out.push_str(&format!(
            "  [{}] {}: missing {}\n",
            gap.family,
            gap.name,
            missing.join(", ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{bibliography_report, SourcesPanel};
    use crate::catalog::ModelEntry;
    use crate::classifier::FamilyTag;

    fn model(
        name: &str,
        paper_url: Option<&str>,
        paper_cite: Option<&str>,
    ) -> ModelEntry {
        ModelEntry {
            family: FamilyTag::Ar,
            name: name.to_string(),
            year: None,
            description: None,
            paper_url: paper_url.map(str::to_string),
            paper_cite: paper_cite.map(str::to_string),
        }
    }

    #[test]
    fn test_inject_is_idempotent_per_url() {
        let mut panel = SourcesPanel::new();
        assert!(panel.inject("https://arxiv.org/abs/1609.03499", "WaveNet"));
        assert!(!panel.inject("https://arxiv.org/abs/1609.03499", "WaveNet again"));
        assert_eq!(panel.links().len(), 1);
        assert_eq!(panel.links()[0].label, "WaveNet");
    }

    #[test]
    fn test_inject_model_papers_skips_entries_without_url() {
        let mut panel = SourcesPanel::new();
        let models = vec![
            model(
                "WaveNet",
                Some("https://arxiv.org/abs/1609.03499"),
                Some("van den Oord et al. 2016"),
            ),
            model("GANSynth", None, Some("Engel et al. 2019")),
            model("WaveNet dup", Some("https://arxiv.org/abs/1609.03499"), None),
        ];
        assert_eq!(panel.inject_model_papers(&models), 1);
        assert_eq!(panel.links().len(), 1);
        assert_eq!(panel.links()[0].label, "van den Oord et al. 2016");

        // Re-injecting the same catalog adds nothing.
        assert_eq!(panel.inject_model_papers(&models), 0);
    }

    #[test]
    fn test_report_lists_exactly_the_incomplete_entries() {
        let models = vec![
            model(
                "WaveNet",
                Some("https://arxiv.org/abs/1609.03499"),
                Some("van den Oord et al. 2016"),
            ),
            model("GANSynth", None, Some("Engel et al. 2019")),
            model("Riffusion", Some("https://example.org/riffusion"), None),
            model("DDSP", None, None),
        ];
        let gaps = bibliography_report(&models);
        assert_eq!(gaps.len(), 3);
        assert!(gaps[0].missing_url && !gaps[0].missing_cite);
        assert!(!gaps[1].missing_url && gaps[1].missing_cite);
        assert!(gaps[2].missing_url && gaps[2].missing_cite);
    }
}
