//! Render engine: turns catalog items into display units.
//!
//! Rendering is deterministic and total: the same item list always produces
//! the same units, and every render pass recomputes everything from scratch.
//! Catalog groups are small, so there is no diffing layer; a container is
//! replaced wholesale on every pass.

use crate::catalog::{CatalogItem, Confidence, MediaRef};

/// Free-text limit for the context column of the meta line.
const CONTEXT_CHAR_LIMIT: usize = 60;

/// Title used when the media URL yields no usable path segment.
const FALLBACK_TITLE: &str = "Audio clip";

/// Direct-URL extensions accepted by the native audio surface.
const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "m4a"];

/// Direct-URL extensions accepted by the native video surface.
const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

/// Host path whose direct URLs are never playable (help-center pages that
/// happen to end in a media extension).
const NON_PLAYABLE_HOST_PATH: &str = "soundcloud.com/hc";

/// Destination of a link-out surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    YouTube,
    SoundCloud,
    OpenMedia,
    /// Replacement affordance for a native unit that failed at runtime.
    OpenExternally,
}

impl LinkKind {
    pub fn label(&self) -> &'static str {
        match self {
            LinkKind::YouTube => "▶ Ver en YouTube",
            LinkKind::SoundCloud => "▶ Ver en SoundCloud",
            LinkKind::OpenMedia => "▶ Abrir media",
            LinkKind::OpenExternally => "No disponible · abrir externamente",
        }
    }
}

/// Playback/link affordance chosen for one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSurface {
    NativeAudio { url: String, mime: String },
    NativeVideo { url: String, mime: String },
    LinkOut { url: String, kind: LinkKind },
    /// No playable affordance; the unit shows metadata only.
    MetadataOnly,
}

impl MediaSurface {
    pub fn is_native_audio(&self) -> bool {
        matches!(self, MediaSurface::NativeAudio { .. })
    }

    /// URL behind the unit's affordance, if it carries any media at all.
    pub fn media_url(&self) -> Option<&str> {
        match self {
            MediaSurface::NativeAudio { url, .. }
            | MediaSurface::NativeVideo { url, .. }
            | MediaSurface::LinkOut { url, .. } => Some(url),
            MediaSurface::MetadataOnly => None,
        }
    }
}

/// Rendered representation of one catalog item for one render pass.
/// Ephemeral: recomputed on every pass, never diffed or cached.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUnit {
    pub id: String,
    pub title: String,
    pub meta_line: String,
    pub surface: MediaSurface,
    pub badge: Confidence,
}

/// Renders an ordered item list into an ordered unit list.
pub fn render(items: &[CatalogItem]) -> Vec<DisplayUnit> {
    items.iter().map(render_unit).collect()
}

fn render_unit(item: &CatalogItem) -> DisplayUnit {
    let title = match item.title.as_deref() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => derive_title(&item.media),
    };
    DisplayUnit {
        id: item.id.clone(),
        title,
        meta_line: meta_line(item),
        surface: select_surface(&item.media),
        badge: item.confidence,
    }
}

/// Derives a display title from the chosen URL's final path segment:
/// percent-decoded, trailing extension stripped, separators spaced out.
fn derive_title(media: &MediaRef) -> String {
    let url = media.chosen_url();
    let segment = url.rsplit('/').next().unwrap_or("");
    if segment.is_empty() {
        return FALLBACK_TITLE.to_string();
    }
    let decoded = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    };
    let title = strip_trailing_extension(&decoded).replace(['-', '_'], " ");
    if title.trim().is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// Removes a trailing `.ext` where `ext` is one or more word characters.
fn strip_trailing_extension(segment: &str) -> &str {
    match segment.rfind('.') {
        Some(dot) => {
            let extension = &segment[dot + 1..];
            let word_like = !extension.is_empty()
                && extension
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            if word_like {
                &segment[..dot]
            } else {
                segment
            }
        }
        None => segment,
    }
}

/// Ordered first-match surface selection. The declared order is the only
/// thing standing in for real format detection and must not be reordered.
fn select_surface(media: &MediaRef) -> MediaSurface {
    let direct = media.direct_url.as_deref().unwrap_or("");
    let embed = media.embed_url.as_deref().unwrap_or("");

    if !direct.is_empty()
        && !direct.contains(NON_PLAYABLE_HOST_PATH)
        && has_extension(direct, &AUDIO_EXTENSIONS)
    {
        return MediaSurface::NativeAudio {
            url: direct.to_string(),
            mime: format!("audio/{}", url_extension(direct)),
        };
    }
    if !direct.is_empty() && has_extension(direct, &VIDEO_EXTENSIONS) {
        return MediaSurface::NativeVideo {
            url: direct.to_string(),
            mime: format!("video/{}", url_extension(direct)),
        };
    }
    if !embed.is_empty() && embed.contains("youtube.com") {
        return MediaSurface::LinkOut {
            url: embed.to_string(),
            kind: LinkKind::YouTube,
        };
    }
    if !embed.is_empty() && embed.contains("soundcloud.com") {
        let url = media.page_url.as_deref().unwrap_or(embed);
        return MediaSurface::LinkOut {
            url: url.to_string(),
            kind: LinkKind::SoundCloud,
        };
    }
    if !direct.is_empty() {
        return MediaSurface::LinkOut {
            url: direct.to_string(),
            kind: LinkKind::OpenMedia,
        };
    }
    MediaSurface::MetadataOnly
}

fn has_extension(url: &str, extensions: &[&str]) -> bool {
    extensions
        .iter()
        .any(|extension| url.ends_with(&format!(".{}", extension)))
}

fn url_extension(url: &str) -> &str {
    url.rsplit('.').next().unwrap_or("")
}

/// `model · year-or-"?" · truncated context`.
fn meta_line(item: &CatalogItem) -> String {
    let model = item.model_name.as_deref().unwrap_or("");
    let year = match item.year.as_deref() {
        Some(year) if !year.is_empty() => year,
        _ => "?",
    };
    let context = item.context_note.as_deref().unwrap_or("");
    format!("{} · {} · {}", model, year, truncate_context(context))
}

fn truncate_context(context: &str) -> String {
    if context.chars().count() > CONTEXT_CHAR_LIMIT {
        let truncated: String = context.chars().take(CONTEXT_CHAR_LIMIT).collect();
        format!("{}…", truncated)
    } else {
        context.to_string()
    }
}
