//! Server object types

use std::fmt;

/// Type of a server-side media object, as named on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaKind {
    MediaPipeline,

    // Endpoints
    WebRtcEndpoint,
    PlayerEndpoint,
    RecorderEndpoint,
    RtpEndpoint,
    HttpPostEndpoint,

    // Filters
    FaceOverlayFilter,
    ImageOverlayFilter,
    ZBarFilter,
    GStreamerFilter,

    // Hubs
    Composite,
    Dispatcher,
    DispatcherOneToMany,

    /// Any type not listed above, e.g. one from a server module
    Other(String),
}

/// Coarse grouping of [`MediaKind`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Pipeline,
    Endpoint,
    Filter,
    Hub,
    Other,
}

impl MediaKind {
    /// Wire name, the `type` of a `create` request
    pub fn as_str(&self) -> &str {
        match self {
            MediaKind::MediaPipeline => "MediaPipeline",
            MediaKind::WebRtcEndpoint => "WebRtcEndpoint",
            MediaKind::PlayerEndpoint => "PlayerEndpoint",
            MediaKind::RecorderEndpoint => "RecorderEndpoint",
            MediaKind::RtpEndpoint => "RtpEndpoint",
            MediaKind::HttpPostEndpoint => "HttpPostEndpoint",
            MediaKind::FaceOverlayFilter => "FaceOverlayFilter",
            MediaKind::ImageOverlayFilter => "ImageOverlayFilter",
            MediaKind::ZBarFilter => "ZBarFilter",
            MediaKind::GStreamerFilter => "GStreamerFilter",
            MediaKind::Composite => "Composite",
            MediaKind::Dispatcher => "Dispatcher",
            MediaKind::DispatcherOneToMany => "DispatcherOneToMany",
            MediaKind::Other(name) => name,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            MediaKind::MediaPipeline => Category::Pipeline,
            MediaKind::WebRtcEndpoint
            | MediaKind::PlayerEndpoint
            | MediaKind::RecorderEndpoint
            | MediaKind::RtpEndpoint
            | MediaKind::HttpPostEndpoint => Category::Endpoint,
            MediaKind::FaceOverlayFilter
            | MediaKind::ImageOverlayFilter
            | MediaKind::ZBarFilter
            | MediaKind::GStreamerFilter => Category::Filter,
            MediaKind::Composite | MediaKind::Dispatcher | MediaKind::DispatcherOneToMany => {
                Category::Hub
            }
            MediaKind::Other(_) => Category::Other,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MediaKind {
    fn from(name: &str) -> Self {
        match name {
            "MediaPipeline" => MediaKind::MediaPipeline,
            "WebRtcEndpoint" => MediaKind::WebRtcEndpoint,
            "PlayerEndpoint" => MediaKind::PlayerEndpoint,
            "RecorderEndpoint" => MediaKind::RecorderEndpoint,
            "RtpEndpoint" => MediaKind::RtpEndpoint,
            "HttpPostEndpoint" => MediaKind::HttpPostEndpoint,
            "FaceOverlayFilter" => MediaKind::FaceOverlayFilter,
            "ImageOverlayFilter" => MediaKind::ImageOverlayFilter,
            "ZBarFilter" => MediaKind::ZBarFilter,
            "GStreamerFilter" => MediaKind::GStreamerFilter,
            "Composite" => MediaKind::Composite,
            "Dispatcher" => MediaKind::Dispatcher,
            "DispatcherOneToMany" => MediaKind::DispatcherOneToMany,
            other => MediaKind::Other(other.to_string()),
        }
    }
}
