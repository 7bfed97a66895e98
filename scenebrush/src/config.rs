//! Generation configuration: model catalog, aspect ratios and credentials.
//!
//! The values here describe what the Gemini image endpoints accept; the
//! pipeline consumes them when assembling a request, and hosts consume
//! them to populate pickers or CLI flags.

/// Base URL for all Gemini API calls.
pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Minimum plausible length of an API key.
///
/// Real keys are considerably longer; anything shorter is caught before a
/// network call is made.
pub const MIN_API_KEY_LEN: usize = 20;

/// Maximum number of object reference images a request may carry.
///
/// Enforced by callers when collecting input, not by the pipeline.
pub const MAX_OBJECT_REFERENCES: usize = 6;

/// Maximum number of human reference images a request may carry.
///
/// Human references are only honoured by the Pro model. Enforced by
/// callers, not by the pipeline.
pub const MAX_HUMAN_REFERENCES: usize = 5;

/// Checks whether a key is plausibly a real API key.
///
/// This is a local heuristic only (non-blank, minimum length); actual
/// validity is established by [`crate::gemini::ValidateKeyTask`].
pub fn api_key_looks_valid(key: &str) -> bool {
    let trimmed = key.trim();
    !trimmed.is_empty() && trimmed.len() >= MIN_API_KEY_LEN
}

/// Source of the current API key.
///
/// Hosts keep credentials wherever they like (environment, keychain, a
/// settings store); the core only needs the current value as an opaque
/// string.
pub trait CredentialsProvider {
    /// Returns the current API key.
    fn api_key(&self) -> String;
}

impl CredentialsProvider for String {
    fn api_key(&self) -> String {
        self.clone()
    }
}

impl CredentialsProvider for &str {
    fn api_key(&self) -> String {
        (*self).to_string()
    }
}

/// Image generation model tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Model {
    /// Pro tier. Supports explicit image size selection and human
    /// reference images.
    #[default]
    ProImagePreview,
    /// Flash tier. Faster and cheaper; image size is fixed by the API.
    FlashImage,
}

impl Model {
    /// The model id interpolated into the request path.
    pub fn id(self) -> &'static str {
        match self {
            Model::ProImagePreview => "gemini-3-pro-image-preview",
            Model::FlashImage => "gemini-2.5-flash-image",
        }
    }

    /// Human-readable name for pickers and logs.
    pub fn display_name(self) -> &'static str {
        match self {
            Model::ProImagePreview => "Pro (gemini-3-pro-image-preview)",
            Model::FlashImage => "Flash (gemini-2.5-flash-image)",
        }
    }

    /// Whether the model accepts an `imageSize` field in its image config.
    pub fn supports_image_size(self) -> bool {
        matches!(self, Model::ProImagePreview)
    }

    /// Looks a model up by wire id.
    pub fn from_id(id: &str) -> Option<Model> {
        match id {
            "gemini-3-pro-image-preview" => Some(Model::ProImagePreview),
            "gemini-2.5-flash-image" => Some(Model::FlashImage),
            _ => None,
        }
    }
}

/// Target resolution tier for generated images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageSize {
    #[default]
    OneK,
    TwoK,
    FourK,
}

impl ImageSize {
    /// The wire label sent in the request (`"1K"`, `"2K"`, `"4K"`).
    pub fn label(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }

    /// Parses a wire label.
    pub fn from_label(label: &str) -> Option<ImageSize> {
        match label {
            "1K" => Some(ImageSize::OneK),
            "2K" => Some(ImageSize::TwoK),
            "4K" => Some(ImageSize::FourK),
            _ => None,
        }
    }
}

/// An aspect ratio the API accepts, with the pixel dimensions produced at
/// each resolution tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspectRatio {
    /// Display label, e.g. `"16:9 (Widescreen)"`.
    pub label: &'static str,
    /// The wire value sent in the request, e.g. `"16:9"`.
    pub ratio: &'static str,
    res_1k: (u32, u32),
    res_2k: (u32, u32),
    res_4k: (u32, u32),
}

impl AspectRatio {
    /// The pixel dimensions produced at the given resolution tier.
    pub fn resolution(&self, size: ImageSize) -> (u32, u32) {
        match size {
            ImageSize::OneK => self.res_1k,
            ImageSize::TwoK => self.res_2k,
            ImageSize::FourK => self.res_4k,
        }
    }

    /// Looks a catalog entry up by its wire ratio value.
    pub fn from_ratio(ratio: &str) -> Option<AspectRatio> {
        ASPECT_RATIOS.iter().find(|a| a.ratio == ratio).copied()
    }
}

impl Default for AspectRatio {
    /// 16:9 widescreen.
    fn default() -> Self {
        ASPECT_RATIOS[8]
    }
}

/// Aspect ratios accepted by the image endpoints.
pub const ASPECT_RATIOS: [AspectRatio; 10] = [
    AspectRatio {
        label: "1:1 (Square)",
        ratio: "1:1",
        res_1k: (1024, 1024),
        res_2k: (2048, 2048),
        res_4k: (4096, 4096),
    },
    AspectRatio {
        label: "2:3 (Portrait)",
        ratio: "2:3",
        res_1k: (848, 1264),
        res_2k: (1696, 2528),
        res_4k: (3392, 5056),
    },
    AspectRatio {
        label: "3:2 (Landscape)",
        ratio: "3:2",
        res_1k: (1264, 848),
        res_2k: (2528, 1696),
        res_4k: (5056, 3392),
    },
    AspectRatio {
        label: "3:4 (Portrait)",
        ratio: "3:4",
        res_1k: (896, 1200),
        res_2k: (1792, 2400),
        res_4k: (3584, 4800),
    },
    AspectRatio {
        label: "4:3 (Landscape)",
        ratio: "4:3",
        res_1k: (1200, 896),
        res_2k: (2400, 1792),
        res_4k: (4800, 3584),
    },
    AspectRatio {
        label: "4:5 (Portrait)",
        ratio: "4:5",
        res_1k: (928, 1152),
        res_2k: (1856, 2304),
        res_4k: (3712, 4608),
    },
    AspectRatio {
        label: "5:4 (Landscape)",
        ratio: "5:4",
        res_1k: (1152, 928),
        res_2k: (2304, 1856),
        res_4k: (4608, 3712),
    },
    AspectRatio {
        label: "9:16 (Vertical)",
        ratio: "9:16",
        res_1k: (768, 1376),
        res_2k: (1536, 2752),
        res_4k: (3072, 5504),
    },
    AspectRatio {
        label: "16:9 (Widescreen)",
        ratio: "16:9",
        res_1k: (1376, 768),
        res_2k: (2752, 1536),
        res_4k: (5504, 3072),
    },
    AspectRatio {
        label: "21:9 (Ultrawide)",
        ratio: "21:9",
        res_1k: (1584, 672),
        res_2k: (3168, 1344),
        res_4k: (6336, 2688),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_heuristic_rejects_blank_and_short() {
        assert!(!api_key_looks_valid(""));
        assert!(!api_key_looks_valid("   "));
        assert!(!api_key_looks_valid("short-key"));
    }

    #[test]
    fn test_api_key_heuristic_accepts_plausible_key() {
        assert!(api_key_looks_valid("AIzaSyA-0123456789abcdefghij"));
    }

    #[test]
    fn test_api_key_heuristic_trims_whitespace() {
        // 19 chars of key padded to 25 with spaces must still be rejected
        assert!(!api_key_looks_valid("   0123456789abcdefghi   "));
    }

    #[test]
    fn test_model_ids_round_trip() {
        for model in [Model::ProImagePreview, Model::FlashImage] {
            assert_eq!(Model::from_id(model.id()), Some(model));
        }
        assert_eq!(Model::from_id("gemini-unknown"), None);
    }

    #[test]
    fn test_only_pro_supports_image_size() {
        assert!(Model::ProImagePreview.supports_image_size());
        assert!(!Model::FlashImage.supports_image_size());
    }

    #[test]
    fn test_image_size_labels_round_trip() {
        for size in [ImageSize::OneK, ImageSize::TwoK, ImageSize::FourK] {
            assert_eq!(ImageSize::from_label(size.label()), Some(size));
        }
        assert_eq!(ImageSize::from_label("8K"), None);
    }

    #[test]
    fn test_default_aspect_ratio_is_widescreen() {
        assert_eq!(AspectRatio::default().ratio, "16:9");
    }

    #[test]
    fn test_aspect_ratio_lookup_and_resolution() {
        let square = AspectRatio::from_ratio("1:1").unwrap();
        assert_eq!(square.resolution(ImageSize::OneK), (1024, 1024));
        assert_eq!(square.resolution(ImageSize::FourK), (4096, 4096));

        let wide = AspectRatio::from_ratio("16:9").unwrap();
        assert_eq!(wide.resolution(ImageSize::TwoK), (2752, 1536));

        assert_eq!(AspectRatio::from_ratio("7:3"), None);
    }

    #[test]
    fn test_credentials_provider_for_string() {
        let key = String::from("stored-key");
        assert_eq!(key.api_key(), "stored-key");
        assert_eq!("literal-key".api_key(), "literal-key");
    }
}
