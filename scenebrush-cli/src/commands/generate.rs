//! The `generate` subcommand.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use scenebrush::config::{
    AspectRatio, ImageSize, Model, MAX_HUMAN_REFERENCES, MAX_OBJECT_REFERENCES,
};
use scenebrush::gemini::{GenerateTask, GenerationRequest, GenerationResult};
use scenebrush::progress::ProgressBus;
use scenebrush::runner::{ManualTickSource, TaskRunner};
use scenebrush::transport::HttpTransport;

use super::{resolve_api_key, run_to_idle};

#[derive(Args)]
pub struct GenerateArgs {
    /// Prompt describing the transformation
    #[arg(long)]
    prompt: String,

    /// Scene image to transform
    #[arg(long)]
    scene: PathBuf,

    /// Character reference image
    #[arg(long)]
    character: Option<PathBuf>,

    /// Style reference image
    #[arg(long)]
    style: Option<PathBuf>,

    /// Object reference image (repeatable, up to 6)
    #[arg(long = "object")]
    objects: Vec<PathBuf>,

    /// Human reference image (repeatable, up to 5, Pro model only)
    #[arg(long = "human")]
    humans: Vec<PathBuf>,

    /// Aspect ratio, e.g. 16:9
    #[arg(long, default_value = "16:9")]
    aspect_ratio: String,

    /// Resolution tier: 1K, 2K or 4K (Pro model only)
    #[arg(long)]
    size: Option<String>,

    /// Model id
    #[arg(long, default_value = "gemini-3-pro-image-preview")]
    model: String,

    /// API key; defaults to the GEMINI_API_KEY environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Where to save the generated PNG
    #[arg(long, default_value = "generated.png")]
    out: PathBuf,
}

pub fn run(mut args: GenerateArgs) -> i32 {
    let Some(api_key) = resolve_api_key(args.api_key.take()) else {
        eprintln!("error: no API key; pass --api-key or set GEMINI_API_KEY");
        return 2;
    };

    let request = match build_request(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("error: {}", message);
            return 2;
        }
    };

    let transport = match HttpTransport::new() {
        Ok(transport) => Arc::new(transport),
        Err(message) => {
            eprintln!("error: {}", message);
            return 1;
        }
    };

    let ticks = Rc::new(ManualTickSource::new());
    let runner = TaskRunner::new(ticks.clone());
    let bus = ProgressBus::new();

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {percent:>3}% {msg}")
            .expect("static progress template"),
    );
    let bar_sink = bar.clone();
    let _subscription = bus.subscribe(move |update| {
        bar_sink.set_position((update.fraction * 100.0) as u64);
        bar_sink.set_message(update.stage.clone());
    });

    let result: Rc<RefCell<Option<GenerationResult>>> = Rc::new(RefCell::new(None));
    let slot = result.clone();
    runner.start(
        GenerateTask::new(request, api_key, transport, bus, move |r| {
            *slot.borrow_mut() = Some(r)
        }),
        None,
    );

    run_to_idle(&ticks, &runner);
    bar.finish_and_clear();

    let Some(result) = result.borrow_mut().take() else {
        eprintln!("error: generation produced no result");
        return 1;
    };

    if let Some(text) = result.text.as_deref().filter(|t| !t.is_empty()) {
        println!("{}", text);
    }

    match result.image {
        Some(image) => {
            if let Err(e) = image.save(&args.out) {
                eprintln!("error: failed to save {}: {}", args.out.display(), e);
                return 1;
            }
            println!("saved {}", args.out.display());
            0
        }
        None => {
            eprintln!(
                "error: {}",
                result
                    .error_message
                    .as_deref()
                    .unwrap_or("generation failed")
            );
            1
        }
    }
}

fn build_request(args: &GenerateArgs) -> Result<GenerationRequest, String> {
    let Some(model) = Model::from_id(&args.model) else {
        return Err(format!(
            "unknown model '{}'; known: {}, {}",
            args.model,
            Model::ProImagePreview.id(),
            Model::FlashImage.id()
        ));
    };

    let Some(aspect_ratio) = AspectRatio::from_ratio(&args.aspect_ratio) else {
        return Err(format!("unknown aspect ratio '{}'", args.aspect_ratio));
    };

    let size = match args.size.as_deref() {
        Some(label) => match ImageSize::from_label(label) {
            Some(size) => Some(size),
            None => return Err(format!("unknown size '{}'; use 1K, 2K or 4K", label)),
        },
        None => None,
    };

    if args.objects.len() > MAX_OBJECT_REFERENCES {
        return Err(format!(
            "too many object references ({}); at most {} allowed",
            args.objects.len(),
            MAX_OBJECT_REFERENCES
        ));
    }
    if args.humans.len() > MAX_HUMAN_REFERENCES {
        return Err(format!(
            "too many human references ({}); at most {} allowed",
            args.humans.len(),
            MAX_HUMAN_REFERENCES
        ));
    }

    let mut request = GenerationRequest::new(args.prompt.clone(), load_image(&args.scene)?)
        .with_model(model)
        .with_aspect_ratio(aspect_ratio);
    if let Some(size) = size {
        request = request.with_image_size(size);
    }
    if let Some(path) = &args.character {
        request = request.with_character_reference(load_image(path)?);
    }
    if let Some(path) = &args.style {
        request = request.with_style_reference(load_image(path)?);
    }
    for path in &args.objects {
        request = request.add_object_reference(load_image(path)?);
    }
    if !args.humans.is_empty() && model != Model::ProImagePreview {
        warn!("human references are only honoured by the Pro model; sending anyway");
    }
    for path in &args.humans {
        request = request.add_human_reference(load_image(path)?);
    }

    Ok(request)
}

fn load_image(path: &PathBuf) -> Result<image::DynamicImage, String> {
    image::open(path).map_err(|e| format!("failed to load {}: {}", path.display(), e))
}
