use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a narrated MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Validate a render config and print it with defaults filled in.
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source document (.txt, .md or .pdf).
    #[arg(long)]
    document: Option<PathBuf>,

    /// Narration text used when the document yields nothing.
    #[arg(long)]
    text: Option<String>,

    /// Slideshow images, in order.
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,

    /// Caption per slot, in order.
    #[arg(long = "overlay-text")]
    overlay_texts: Vec<String>,

    /// Background music, looped under the narration.
    #[arg(long)]
    music: Option<PathBuf>,

    /// Static background image.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Watermark image.
    #[arg(long)]
    watermark: Option<PathBuf>,

    /// Sound effect as `path@offset_secs`.
    #[arg(long = "sfx", value_parser = parse_sfx)]
    sfx: Vec<(PathBuf, f64)>,

    /// TTS command template with `{text_file}`, `{out}` and `{lang}` placeholders.
    #[arg(long, default_value = "espeak-ng -v {lang} -f {text_file} -w {out}")]
    tts_cmd: String,

    /// Parent directory for intermediate assets. A private subdirectory is created and removed.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CheckConfigArgs {
    /// Render config JSON.
    #[arg(long)]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyreel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::CheckConfig(args) => cmd_check_config(args),
    }
}

fn parse_sfx(s: &str) -> Result<(PathBuf, f64), String> {
    let (path, offset) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("expected path@offset_secs, got '{s}'"))?;
    let offset: f64 = offset
        .parse()
        .map_err(|e| format!("invalid offset '{offset}': {e}"))?;
    if !offset.is_finite() || offset < 0.0 {
        return Err(format!("offset must be finite and >= 0, got {offset}"));
    }
    Ok((PathBuf::from(path), offset))
}

fn read_bytes(path: &Path, what: &str) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("read {what} '{}'", path.display()))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn audio_input(path: &Path, what: &str) -> anyhow::Result<storyreel::AudioInput> {
    Ok(storyreel::AudioInput::Encoded {
        bytes: read_bytes(path, what)?,
        extension: extension_of(path),
    })
}

fn image_input(path: &Path, what: &str) -> anyhow::Result<storyreel::ImageInput> {
    Ok(storyreel::ImageInput::Encoded(read_bytes(path, what)?))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<storyreel::RenderConfig> {
    let cfg = match path {
        Some(p) => storyreel::RenderConfig::from_path(p)?,
        None => storyreel::RenderConfig::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    let document = args
        .document
        .as_deref()
        .map(|p| -> anyhow::Result<storyreel::Document> {
            let media_type = storyreel::MediaType::from_extension(&extension_of(p));
            Ok(storyreel::Document::new(read_bytes(p, "document")?, media_type))
        })
        .transpose()?;

    let images = args
        .images
        .iter()
        .map(|p| image_input(p, "image"))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let effects = args
        .sfx
        .iter()
        .map(|(p, offset)| -> anyhow::Result<storyreel::EffectInput> {
            Ok(storyreel::EffectInput {
                audio: audio_input(p, "sound effect")?,
                offset: *offset,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let request = storyreel::RenderRequest {
        document,
        fallback_text: args.text,
        images,
        overlay_texts: args.overlay_texts,
        music: args
            .music
            .as_deref()
            .map(|p| audio_input(p, "music"))
            .transpose()?,
        background: args
            .background
            .as_deref()
            .map(|p| image_input(p, "background"))
            .transpose()?,
        watermark: args
            .watermark
            .as_deref()
            .map(|p| image_input(p, "watermark"))
            .transpose()?,
        effects,
        config,
    };

    let store = match &args.work_dir {
        Some(dir) => storyreel::AssetStore::open(dir)?,
        None => storyreel::AssetStore::in_temp_dir()?,
    };
    let tts = storyreel::CommandSynthesizer::from_template(&args.tts_cmd)?;
    let pipeline = storyreel::Pipeline::new(Arc::new(store), Arc::new(tts));

    let mut sink = storyreel::FfmpegSink::new(storyreel::FfmpegSinkOpts {
        bg: request.config.background_color,
        ..storyreel::FfmpegSinkOpts::new(&args.out)
    });

    let result = pipeline.render(&request, &mut sink);
    match &result.status {
        storyreel::RenderStatus::Success => {
            eprintln!(
                "wrote {} ({:.2}s, {} frames)",
                args.out.display(),
                result.duration_sec,
                result.artifact.frames
            );
            Ok(())
        }
        storyreel::RenderStatus::Failed { .. } => {
            anyhow::bail!("render failed: {}", result.status)
        }
    }
}

fn cmd_check_config(args: CheckConfigArgs) -> anyhow::Result<()> {
    let cfg = load_config(Some(&args.config))?;
    let json = serde_json::to_string_pretty(&cfg).context("serialize config")?;
    println!("{json}");
    Ok(())
}
