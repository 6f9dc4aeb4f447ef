//! Filter operations and constructor params

/// Region of the frame an overlay is drawn in, as fractions of width/height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    pub fn new(offset_x: f64, offset_y: f64, width: f64, height: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }
}

impl Default for Placement {
    /// The whole frame
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// FaceOverlayFilter: draws an image over every detected face
pub mod face_overlay {
    use super::Placement;
    use crate::object::Operation;
    use serde_json::json;

    /// Overlay `uri` relative to each face's bounding box
    pub fn set_overlayed_image(uri: &str, placement: Placement) -> Operation {
        Operation::with_params(
            "setOverlayedImage",
            json!({
                "uri": uri,
                "offsetXPercent": placement.offset_x,
                "offsetYPercent": placement.offset_y,
                "widthPercent": placement.width,
                "heightPercent": placement.height,
            }),
        )
    }

    pub fn unset_overlayed_image() -> Operation {
        Operation::new("unsetOverlayedImage")
    }
}

/// ImageOverlayFilter: draws images at fixed positions
pub mod image_overlay {
    use super::Placement;
    use crate::object::Operation;
    use serde_json::json;

    /// Image to place, keyed by a caller-chosen `id`
    #[derive(Debug, Clone, PartialEq)]
    pub struct Image {
        pub id: String,
        pub uri: String,
        pub placement: Placement,
        pub keep_aspect_ratio: bool,
        pub center: bool,
    }

    impl Image {
        pub fn new(id: impl Into<String>, uri: impl Into<String>, placement: Placement) -> Self {
            Self {
                id: id.into(),
                uri: uri.into(),
                placement,
                keep_aspect_ratio: true,
                center: true,
            }
        }

        pub fn keep_aspect_ratio(mut self, keep: bool) -> Self {
            self.keep_aspect_ratio = keep;
            self
        }

        pub fn center(mut self, center: bool) -> Self {
            self.center = center;
            self
        }
    }

    pub fn add_image(image: &Image) -> Operation {
        Operation::with_params(
            "addImage",
            json!({
                "id": image.id,
                "uri": image.uri,
                "offsetXPercent": image.placement.offset_x,
                "offsetYPercent": image.placement.offset_y,
                "widthPercent": image.placement.width,
                "heightPercent": image.placement.height,
                "keepAspectRatio": image.keep_aspect_ratio,
                "center": image.center,
            }),
        )
    }

    pub fn remove_image(id: &str) -> Operation {
        Operation::with_params("removeImage", json!({ "id": id }))
    }
}

/// GStreamerFilter: runs an arbitrary gst-launch style element
pub mod gstreamer {
    use serde_json::{Map, Value};

    pub fn constructor(command: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("command".to_string(), Value::from(command));
        params
    }
}

/// ZBarFilter: QR/bar code detection
pub mod zbar {
    /// Raised once per newly detected code; the payload carries
    /// `codeType` and `value`
    pub const CODE_FOUND: &str = "CodeFoundEvent";
}
