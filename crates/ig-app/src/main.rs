use std::sync::Arc;
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use ig_app::{GenBackendConfig, Generator};
use ig_core::{AspectRatio, GenerationRequest, ProgressEvent, ProgressStatus, ReferenceImage};

#[derive(Parser, Debug)]
#[command(name = "ig-app", version, about = "Generate an image from a prompt and follow its progress")]
struct Args {
    /// Text prompt
    prompt: String,

    #[arg(long)]
    negative_prompt: Option<String>,

    #[arg(long, default_value_t = AspectRatio::default())]
    aspect_ratio: AspectRatio,

    /// Reference image URL for image-to-image generation
    #[arg(long)]
    image_url: Option<String>,

    /// How closely to follow the reference image, 0 to 1
    #[arg(long)]
    fidelity: Option<f32>,

    #[arg(long)]
    variants: Option<u32>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

impl Args {
    fn request(&self) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.prompt.clone()).with_aspect_ratio(self.aspect_ratio);
        if let Some(negative) = &self.negative_prompt {
            request = request.with_negative_prompt(negative.clone());
        }
        if let Some(url) = &self.image_url {
            request = request.with_reference_image(ReferenceImage::Url(url.clone()));
        }
        if let Some(fidelity) = self.fidelity {
            request = request.with_image_fidelity(fidelity);
        }
        if let Some(variants) = self.variants {
            request = request.with_variant_count(variants);
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = GenBackendConfig::load()?;
    let generator = Arc::new(Generator::new(config)?);

    let mut stream = generator.generate_stream(args.request());
    let mut terminal: Option<ProgressEvent> = None;

    while let Some(event) = stream.next().await {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
        if event.is_terminal() {
            terminal = Some(event);
        }
    }

    match terminal {
        Some(event) if event.status == ProgressStatus::Success => Ok(()),
        Some(event) => anyhow::bail!(event.error.unwrap_or_else(|| "generation failed".into())),
        None => anyhow::bail!("generation ended without a result"),
    }
}

fn print_event(event: &ProgressEvent) {
    match event.status {
        ProgressStatus::Success => {
            println!("[{:>3}%] done: {}", event.progress, event.url.as_deref().unwrap_or_default())
        }
        ProgressStatus::Error => {
            println!("[{:>3}%] failed: {}", event.progress, event.error.as_deref().unwrap_or_default())
        }
        status => println!("[{:>3}%] {:?}", event.progress, status),
    }
}
