use anyhow::Result;
use clap::Parser;
use inline_image_upload::adapter::UploadAdapter;
use inline_image_upload::loader::ImageBlob;
use inline_image_upload::models::{Config, SimpleUploadConfig};
use inline_image_upload::repository::{
    Base64UploadPlugin, FileRepository, Plugin, SimpleUploadPlugin,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "inline-image-upload")]
#[command(about = "Inline an image as a size-bounded data URL, or upload it to an endpoint")]
struct CliArgs {
    /// Image file to process.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Starting JPEG quality for downscaled images (0-1).
    #[arg(long)]
    quality: Option<f32>,

    /// Longest allowed side in pixels.
    #[arg(long)]
    max_side: Option<u32>,

    /// Size budget of the data URL in kilobytes.
    #[arg(long)]
    max_size_kb: Option<usize>,

    /// Keep the requested quality for images that are not downscaled.
    #[arg(long)]
    keep_quality_when_unscaled: bool,

    /// Upload to this endpoint instead of inlining.
    #[arg(long)]
    upload_url: Option<String>,

    /// Extra request header for the upload, as "Name: value".
    #[arg(long = "header", value_name = "NAME: VALUE", value_parser = parse_header_arg)]
    headers: Vec<(String, String)>,

    /// Write the result here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_header_arg(input: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = input
        .split_once(':')
        .ok_or_else(|| format!("Invalid header '{}'. Expected format: Name: value", input))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid header '{}': empty name", input));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn apply_args(mut config: Config, args: &CliArgs) -> Config {
    let base64 = &mut config.base64_upload;
    if let Some(quality) = args.quality {
        base64.quality = quality;
    }
    if let Some(max_side) = args.max_side {
        base64.max_side = max_side;
    }
    if let Some(max_size_kb) = args.max_size_kb {
        base64.max_size_kb = max_size_kb;
    }
    if args.keep_quality_when_unscaled {
        base64.quality_when_unscaled = None;
    }

    if let Some(url) = &args.upload_url {
        let simple = config
            .simple_upload
            .get_or_insert_with(SimpleUploadConfig::default);
        simple.upload_url = Some(url.clone());
    }
    if !args.headers.is_empty() {
        let simple = config
            .simple_upload
            .get_or_insert_with(SimpleUploadConfig::default);
        simple.headers.extend(args.headers.iter().cloned());
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inline_image_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    let config = apply_args(Config::from_env()?, &args);

    let mut repository = FileRepository::new();
    let plugin: Box<dyn Plugin> = match &config.simple_upload {
        Some(simple) => Box::new(SimpleUploadPlugin::new(Some(simple.clone()))),
        None => Box::new(Base64UploadPlugin::new(&config.base64_upload)),
    };
    plugin.init(&mut repository)?;
    info!("Using {}", plugin.name());

    let blob = ImageBlob::from_path(&args.file).await?;
    let loader = repository.create_loader(blob);
    let adapter: Arc<dyn UploadAdapter> = Arc::from(repository.create_upload_adapter(loader)?);

    let mut upload = tokio::spawn({
        let adapter = Arc::clone(&adapter);
        async move { adapter.upload().await }
    });

    let result = tokio::select! {
        joined = &mut upload => joined?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, aborting upload");
            adapter.abort();
            upload.await?
        }
    };

    match result {
        Ok(result) => {
            match &args.output {
                Some(path) => {
                    tokio::fs::write(path, &result.default).await?;
                    info!("Wrote result to {}", path.display());
                }
                None => println!("{}", result.default),
            }
            Ok(())
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            std::process::exit(1);
        }
    }
}
