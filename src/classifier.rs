//! Model-name classification into family tags.
//!
//! Matching is a case-insensitive substring test against an ordered keyword
//! table. The first family whose list contains a hit wins, in declaration
//! order; there is no deduplication or ambiguity resolution beyond that.

/// One of the fixed model-family tags used to group catalog items.
///
/// Variant order is declaration order and doubles as the tie-break order for
/// classification and the container order on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FamilyTag {
    /// Autoregressive and sequence models.
    Ar,
    /// Adversarial (GAN) models.
    Gan,
    /// Diffusion and score-based models.
    Diffusion,
}

impl FamilyTag {
    /// All family tags in declaration order.
    pub const ALL: [FamilyTag; 3] = [FamilyTag::Ar, FamilyTag::Gan, FamilyTag::Diffusion];

    /// Stable wire/attribute name, as used by the nested feed keys and the
    /// surface container attributes.
    pub fn key(&self) -> &'static str {
        match self {
            FamilyTag::Ar => "ar",
            FamilyTag::Gan => "gan",
            FamilyTag::Diffusion => "diffusion",
        }
    }

    /// Human-readable group heading.
    pub fn display_name(&self) -> &'static str {
        match self {
            FamilyTag::Ar => "Autorregresivos",
            FamilyTag::Gan => "Adversariales",
            FamilyTag::Diffusion => "Difusión",
        }
    }

    pub fn from_key(key: &str) -> Option<FamilyTag> {
        FamilyTag::ALL
            .iter()
            .copied()
            .find(|family| family.key() == key)
    }
}

impl std::fmt::Display for FamilyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered keyword table. A slice, not a map: the declaration order is the
/// tie-break when a name matches keywords from more than one family.
const FAMILY_KEYWORDS: [(FamilyTag, &[&str]); 3] = [
    (
        FamilyTag::Ar,
        &[
            "wavenet",
            "samplernn",
            "music transformer",
            "musictransformer",
            "jukebox",
            "audiolm",
            "musiclm",
            "musicgen",
            "performance rnn",
            "note rnn",
            "musicvae",
            "music vae",
            "maestro",
            "wave2midi",
        ],
    ),
    (
        FamilyTag::Gan,
        &["gansynth", "wavegan", "melgan", "hifi-gan", "hifigan"],
    ),
    (
        FamilyTag::Diffusion,
        &[
            "diffwave",
            "wavegrad",
            "riffusion",
            "audioldm",
            "stable audio",
            "mustango",
            "musicldm",
            "ddsp",
            "tone transfer",
        ],
    ),
];

/// Maps a free-text model name to its family tag.
///
/// Returns `None` for empty input or when no keyword matches; items without a
/// family are excluded from every group.
pub fn classify(model_name: &str) -> Option<FamilyTag> {
    if model_name.is_empty() {
        return None;
    }
    let lower = model_name.to_lowercase();
    for (family, keywords) in FAMILY_KEYWORDS.iter() {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return Some(*family);
        }
    }
    None
}
