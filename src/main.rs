mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, EncodeArgs};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use df_av::{FfprobeProber, Prober, ToolRegistry};
use df_core::config::Config;
use df_pipeline::{DashEncodeResult, DashEncoder, EncodeContext, MatchingHints, ProgressSender};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dashforge=trace,df_core=trace,df_av=trace,df_mpd=trace,df_pipeline=trace".to_string()
        } else {
            "dashforge=info,df_core=info,df_av=info,df_mpd=info,df_pipeline=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::Encode(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(encode(args, &config))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, &config))
        }
        Commands::CheckTools => check_tools(&config),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("dashforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Summary printed by `encode --json`.
#[derive(Serialize)]
struct EncodeSummary<'a> {
    manifest: &'a Path,
    qualities: Vec<String>,
    copy_top_quality: bool,
    framerate: f64,
    keyframe_interval: u32,
    representations: Vec<&'a str>,
    subtitles: Vec<&'a Path>,
    encoder_command: &'a str,
    muxer_command: &'a str,
}

impl<'a> EncodeSummary<'a> {
    fn new(result: &'a DashEncodeResult) -> Self {
        Self {
            manifest: &result.manifest_path,
            qualities: result.resolved.qualities.iter().map(ToString::to_string).collect(),
            copy_top_quality: result.resolved.copy_top_quality,
            framerate: result.resolved.framerate,
            keyframe_interval: result.resolved.keyframe_interval,
            representations: result.manifest.representation_ids(),
            subtitles: result.subtitles.iter().map(|s| s.path.as_path()).collect(),
            encoder_command: &result.encoder_command_line,
            muxer_command: &result.muxer_command_line,
        }
    }
}

async fn encode(args: EncodeArgs, config: &Config) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", args.input);
    }

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let basename = match args.basename {
        Some(name) => name,
        None => args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("input has no file name")?,
    };

    let mut defaults = config.encode.clone();
    if let Some(tier) = args.tier {
        defaults.tier = tier;
    }
    let mut request = defaults.request(&args.input, output_dir, basename, args.qualities);
    if let Some(dir) = args.work_dir {
        request = request.with_working_directory(dir);
    }
    if let Some(fps) = args.framerate {
        request = request.with_framerate(fps);
    }
    if let Some(gop) = args.keyframe_interval {
        request = request.with_keyframe_interval(gop);
    }
    if args.copy {
        request = request.with_stream_copying(true);
    }
    if args.no_crush {
        request = request.without_quality_crushing();
    }
    if let Some(tolerance) = args.tolerance {
        request.crush_tolerance = tolerance;
    }

    let tools = ToolRegistry::discover(&config.tools);
    let encoder = DashEncoder::from_registry(&tools)
        .context("ffmpeg, ffprobe and MP4Box are required; run `dashforge check-tools`")?
        .with_copy_eligibility(Arc::new(MatchingHints));

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let ctx = EncodeContext::new()
        .with_cancellation(token)
        .with_progress(ProgressSender::new(|fraction| {
            tracing::debug!("[{:.0}%] encoding", fraction * 100.0);
        }));

    let result = match encoder.encode(&request, &ctx).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(log) = e.log() {
                tracing::debug!("tool output:\n{log}");
            }
            return Err(anyhow::Error::new(e).context(format!("Encoding {:?} failed", request.input)));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&EncodeSummary::new(&result))?);
        return Ok(());
    }

    println!("Manifest: {}", result.manifest_path.display());
    println!("Renditions: {}", result.resolved.qualities.len());
    for quality in &result.resolved.qualities {
        if quality.is_copy() && result.resolved.copy_top_quality {
            println!("  copy (source video)");
        } else {
            println!("  {quality}");
        }
    }
    println!(
        "Frame rate: {} fps, GOP {} frames",
        result.resolved.framerate, result.resolved.keyframe_interval
    );
    if !result.subtitles.is_empty() {
        println!("Subtitles: {}", result.subtitles.len());
        for sub in &result.subtitles {
            println!("  [{}] {} ({})", sub.language, sub.file_name(), sub.label);
        }
    }

    Ok(())
}

async fn probe_file(file: &Path, json: bool, config: &Config) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let metadata = prober
        .probe(file)
        .await?
        .with_context(|| format!("ffprobe could not read {:?}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("File: {}", metadata.input_path.display());
    println!("Bitrate: {} kb/s", metadata.bitrate_kbps);
    println!("Frame rate: {:.3} fps", metadata.framerate);
    let secs = metadata.duration_secs as u64;
    println!("Duration: {:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60);

    println!("\nVideo Streams: {}", metadata.video_streams.len());
    for (i, stream) in metadata.video_streams.iter().enumerate() {
        print!("  [{}] {}", i, stream.codec_name);
        if let (Some(w), Some(h)) = (stream.width, stream.height) {
            print!(" {w}x{h}");
        }
        if let Some(ref pix) = stream.pixel_format {
            print!(", {pix}");
        }
        if let Some(ref profile) = stream.profile {
            print!(", {profile}");
        }
        if let Some(ref level) = stream.level {
            print!(" @ {level}");
        }
        println!();
    }

    println!("\nAudio Streams: {}", metadata.audio_streams.len());
    for (i, stream) in metadata.audio_streams.iter().enumerate() {
        println!("  [{}] {} ({})", i, stream.codec_name, stream.language_or_und());
    }

    println!("\nSubtitle Streams: {}", metadata.subtitle_streams.len());
    for (i, stream) in metadata.subtitle_streams.iter().enumerate() {
        println!("  [{}] {} ({})", i, stream.codec_name, stream.language_or_und());
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable encoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file: {:?}", p))?;
            Config::from_toml(&text)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ! {warning}");
        }
    }
    println!("  Tier: {:?}", config.encode.tier);
    println!("  Preset: {}", config.encode.preset);
    println!("  Crush tolerance: {}", config.encode.crush_tolerance);
    println!("  Stream copying: {}", config.encode.enable_stream_copying);
    println!("  Video codec: {}", config.encode.encoder.video_codec);
    println!("  Audio codec: {}", config.encode.encoder.audio_codec);
    println!("  DASH profile: {}", config.encode.muxer.profile);

    Ok(())
}
