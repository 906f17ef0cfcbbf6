use crate::request::RequestDescriptor;
use crate::tiers::StaticAssets;

/// How an intercepted request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Cache-first against the static tier
    Static,
    /// Network-first against the audio tier
    AudioDownload,
    /// Network-first against the audio tier
    AudioPlay,
    /// Forwarded to the network, never cached
    Passthrough,
}

impl RouteClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::Static => "static",
            RouteClass::AudioDownload => "audio-download",
            RouteClass::AudioPlay => "audio-play",
            RouteClass::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    static_assets: StaticAssets,
}

impl RequestClassifier {
    pub fn new(static_assets: StaticAssets) -> Self {
        Self { static_assets }
    }

    pub fn static_assets(&self) -> &StaticAssets {
        &self.static_assets
    }

    /// Only GET requests are ever cached; everything else passes through
    pub fn classify(&self, request: &RequestDescriptor) -> RouteClass {
        if !request.is_get() {
            return RouteClass::Passthrough;
        }
        self.classify_path(request.path())
    }

    pub fn classify_path(&self, path: &str) -> RouteClass {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match segments.as_slice() {
            ["tasks", id, "download"] if !id.is_empty() => RouteClass::AudioDownload,
            ["tasks", id, "play"] if !id.is_empty() => RouteClass::AudioPlay,
            _ if self.static_assets.contains(path) => RouteClass::Static,
            _ => RouteClass::Passthrough,
        }
    }
}
