use anyhow::{Context, Result};
use audioloop::interactive::run_interactive_wizard;
use audioloop::{naming, AudioSource, Config, FfmpegEngine, Session};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audioloop")]
#[command(version, about = "Loop or extract a region of an audio file")]
#[command(
    long_about = "Mark a time region inside an audio file and produce either the region repeated N times back-to-back or the region alone, via lossless FFmpeg stream copies."
)]
struct Cli {
    /// Input audio file (mp3, wav, ogg, m4a); omit for interactive mode
    input: Option<PathBuf>,

    /// Region start in seconds (defaults to 20% of the duration)
    #[arg(short, long)]
    start: Option<f64>,

    /// Region end in seconds (defaults to 80% of the duration)
    #[arg(short, long)]
    end: Option<f64>,

    /// Number of repetitions for the looped output
    #[arg(short, long)]
    count: Option<u32>,

    /// Extract the region alone instead of looping it
    #[arg(long)]
    extract: bool,

    /// Output file (defaults to the suggested name next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn output_path_for(input: &Path, suggested_filename: &str) -> PathBuf {
    input.with_file_name(suggested_filename)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let (input, repeat_count, extract) = match cli.input {
        Some(input) => (
            input,
            cli.count.unwrap_or(config.repeat_count),
            cli.extract,
        ),
        None => {
            let wizard = run_interactive_wizard(&config)?;
            (wizard.input, wizard.repeat_count, wizard.extract)
        }
    };

    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let engine = FfmpegEngine::new().context(
        "FFmpeg not available. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)",
    )?;

    let duration = FfmpegEngine::probe_duration(&input)
        .with_context(|| format!("Failed to probe duration of {}", input.display()))?;

    let display_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let bytes = std::fs::read(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let source = AudioSource::new(display_name, None, bytes, duration)?;

    let mut session = Session::new(Arc::new(engine));
    session.load_source(source)?;

    if cli.start.is_some() || cli.end.is_some() {
        let region = session.region().context("No region available")?;
        let start = cli.start.unwrap_or(region.start);
        let end = cli.end.unwrap_or(region.end);
        session
            .set_region(start, end)
            .context("Invalid region bounds")?;
    }

    let region = session.region().context("No region available")?;
    info!("Input:   {}", input.display());
    info!(
        "Region:  {} - {} ({})",
        naming::format_time(region.start),
        naming::format_time(region.end),
        naming::format_time(region.duration())
    );
    if !extract {
        info!("Repeat:  {} times", repeat_count);
    }

    let progress_bar = config.show_progress.then(|| {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });
    let bar_for_callback = progress_bar.clone();
    let on_progress = move |percent: u8| {
        if let Some(pb) = &bar_for_callback {
            pb.set_position(percent as u64);
        }
    };

    let start_time = Instant::now();
    let artifact = if extract {
        session.extract_region(on_progress).await?
    } else {
        session.generate_loop(repeat_count, on_progress).await?
    };
    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let output = cli
        .output
        .unwrap_or_else(|| output_path_for(&input, &artifact.suggested_filename));
    std::fs::write(&output, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let output_duration = if extract {
        region.duration()
    } else {
        region.duration() * repeat_count as f64
    };
    print_summary(
        &output,
        &artifact.mime_type,
        artifact.size_mb(),
        output_duration,
        start_time.elapsed().as_secs_f64(),
    );

    Ok(())
}

fn print_summary(
    output: &Path,
    mime_type: &str,
    size_mb: f64,
    duration_seconds: f64,
    elapsed_seconds: f64,
) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                         Job Complete                           ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:    {}", output.display());
    println!("  Type:      {mime_type}");
    println!("  Size:      {size_mb:.2} MB");
    println!("  Length:    {}", naming::format_time(duration_seconds));
    println!("  Took:      {elapsed_seconds:.2}s");
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
