//! Tier naming and the fixed static asset list

const DEFAULT_PREFIX: &str = "listentube";
const DEFAULT_VERSION: &str = "v1";

const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/style.css",
    "/script.js",
    "/manifest.json",
];

/// Names of the two tiers for the current cache generation.
///
/// The version suffix is what lets [`crate::activate`] recognise and drop
/// tiers left behind by older generations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierNames {
    pub static_tier: String,
    pub audio_tier: String,
}

impl TierNames {
    pub fn versioned(prefix: &str, version: &str) -> Self {
        Self {
            static_tier: format!("{prefix}-static-{version}"),
            audio_tier: format!("{prefix}-audio-{version}"),
        }
    }

    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_tier || name == self.audio_tier
    }
}

impl Default for TierNames {
    fn default() -> Self {
        Self::versioned(DEFAULT_PREFIX, DEFAULT_VERSION)
    }
}

/// Paths primed at install and served cache-first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAssets(Vec<String>);

impl StaticAssets {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    /// The root document always counts as static
    pub fn contains(&self, path: &str) -> bool {
        path == "/" || self.0.iter().any(|p| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for StaticAssets {
    fn default() -> Self {
        Self::new(DEFAULT_STATIC_ASSETS.iter().copied())
    }
}
