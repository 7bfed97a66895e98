//! Generation request assembly.
//!
//! A [`GenerationRequest`] collects everything one generation needs: the
//! prompt, the mandatory scene image, optional reference images and the
//! generation configuration. [`encode_request`] lowers it to the JSON
//! body the API expects, with the parts array in its required order:
//! prompt text first, then scene, character, style, object and human
//! references.

use thiserror::Error;

use crate::codec::{self, CodecError, PixelSource};
use crate::config::{AspectRatio, ImageSize, Model};

use super::wire::{
    Content, GenerateContentRequest, GenerationConfig, ImageConfig, InlineData, RequestPart,
};

/// Everything needed for one image generation.
///
/// List-valued references are capped by the collecting caller
/// ([`crate::config::MAX_OBJECT_REFERENCES`] /
/// [`crate::config::MAX_HUMAN_REFERENCES`]); the pipeline encodes
/// whatever it is given.
pub struct GenerationRequest {
    /// Prompt text. Arbitrary content; escaping is handled at
    /// serialization time.
    pub prompt: String,
    /// The scene image to transform. Mandatory.
    pub scene: Box<dyn PixelSource>,
    /// Reference for character consistency.
    pub character_reference: Option<Box<dyn PixelSource>>,
    /// Reference for art style.
    pub style_reference: Option<Box<dyn PixelSource>>,
    /// Objects to appear in the generated image.
    pub object_references: Vec<Box<dyn PixelSource>>,
    /// Human references (honoured by the Pro tier).
    pub human_references: Vec<Box<dyn PixelSource>>,
    pub aspect_ratio: AspectRatio,
    /// Requested resolution tier; only sent when the model supports it.
    pub image_size: Option<ImageSize>,
    pub model: Model,
}

impl GenerationRequest {
    /// Creates a request with the mandatory fields and default
    /// configuration (Pro model, 16:9, no explicit size tier).
    pub fn new(prompt: impl Into<String>, scene: impl PixelSource + 'static) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            scene: Box::new(scene),
            character_reference: None,
            style_reference: None,
            object_references: Vec::new(),
            human_references: Vec::new(),
            aspect_ratio: AspectRatio::default(),
            image_size: None,
            model: Model::default(),
        }
    }

    pub fn with_character_reference(mut self, image: impl PixelSource + 'static) -> Self {
        self.character_reference = Some(Box::new(image));
        self
    }

    pub fn with_style_reference(mut self, image: impl PixelSource + 'static) -> Self {
        self.style_reference = Some(Box::new(image));
        self
    }

    pub fn add_object_reference(mut self, image: impl PixelSource + 'static) -> Self {
        self.object_references.push(Box::new(image));
        self
    }

    pub fn add_human_reference(mut self, image: impl PixelSource + 'static) -> Self {
        self.human_references.push(Box::new(image));
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = Some(size);
        self
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }
}

/// Errors raised while lowering a request to its wire body.
#[derive(Debug, Error)]
pub enum RequestBuildError {
    /// A reference image could not be read or encoded.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// The document could not be serialized.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Lowers a request to the JSON body of a `generateContent` call.
pub fn encode_request(request: &GenerationRequest) -> Result<Vec<u8>, RequestBuildError> {
    let mut parts = Vec::with_capacity(
        2 + request.object_references.len() + request.human_references.len() + 2,
    );
    parts.push(RequestPart::Text {
        text: request.prompt.clone(),
    });
    parts.push(inline_part(request.scene.as_ref())?);
    if let Some(character) = &request.character_reference {
        parts.push(inline_part(character.as_ref())?);
    }
    if let Some(style) = &request.style_reference {
        parts.push(inline_part(style.as_ref())?);
    }
    for object in &request.object_references {
        parts.push(inline_part(object.as_ref())?);
    }
    for human in &request.human_references {
        parts.push(inline_part(human.as_ref())?);
    }

    let image_size = if request.model.supports_image_size() {
        request.image_size.map(|size| size.label().to_string())
    } else {
        None
    };

    let document = GenerateContentRequest {
        contents: vec![Content { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            image_config: ImageConfig {
                aspect_ratio: request.aspect_ratio.ratio.to_string(),
                image_size,
            },
        },
    };

    Ok(serde_json::to_vec(&document)?)
}

fn inline_part(source: &dyn PixelSource) -> Result<RequestPart, RequestBuildError> {
    Ok(RequestPart::Inline {
        inline_data: InlineData {
            mime_type: "image/png".to_string(),
            data: codec::png_base64(source)?,
        },
    })
}
