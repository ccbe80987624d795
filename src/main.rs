use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use cadenza_dsp::io::{decoder, wav};
use cadenza_dsp::{analyze, metronome, AnalysisConfig};

#[derive(Parser, Debug)]
#[command(
    name = "cadenza",
    about = "Tempo, beat, meter, and key analysis with click-track output"
)]
struct Cli {
    /// Input audio file (MP3, MP4, M4A, WAV, FLAC, OGG) or URL
    ///
    /// URLs require yt-dlp and ffmpeg on the PATH.
    input: String,

    /// Output WAV path (default: <input>_click.wav)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print detailed analysis diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Minimum BPM to consider
    #[arg(long, default_value_t = 50.0)]
    min_bpm: f32,

    /// Maximum BPM to consider
    #[arg(long, default_value_t = 220.0)]
    max_bpm: f32,

    /// Click volume (0.0 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    click_volume: f32,

    /// Click frequency in Hz
    #[arg(long, default_value_t = 1000.0)]
    click_freq: f32,

    /// Downbeat click frequency in Hz
    #[arg(long, default_value_t = 1500.0)]
    downbeat_freq: f32,

    /// Use a higher-pitched click on downbeats
    #[arg(long)]
    accent_downbeats: bool,

    /// Disable key detection
    #[arg(long)]
    no_key: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();

    let is_remote = cli.input.contains("://");

    let mut audio = decoder::decode(&cli.input)
        .with_context(|| format!("Failed to decode {}", cli.input))?;
    log::info!(
        "Decoded {} frames @ {} Hz ({:.1}s)",
        audio.num_frames(),
        audio.sample_rate,
        audio.duration_seconds()
    );

    let config = AnalysisConfig {
        min_bpm: cli.min_bpm,
        max_bpm: cli.max_bpm,
        detect_key: !cli.no_key,
        ..AnalysisConfig::default()
    };
    let result = analyze(&audio, &config).context("Analysis failed")?;

    println!("Detected BPM: {:.2}", result.bpm);
    println!("Beat count: {}", result.beat_samples.len());
    println!("Time signature: {}", result.meter.time_signature);
    if let Some(key) = &result.key {
        println!(
            "Key: {} (r={:.2}, confidence={:.2})",
            key.key, key.correlation, key.confidence
        );
    }

    // Build output paths. Remote sources without an explicit output get a
    // name derived from the track title, plus a raw un-clicked copy.
    let bpm_int = result.bpm.round() as i64;
    let mut raw_output: Option<PathBuf> = None;
    let output_path = match cli.output {
        Some(path) => path,
        None if is_remote => match &audio.title {
            Some(title) => {
                let base = sanitize_filename(title);
                raw_output = Some(PathBuf::from(format!("{}.wav", base)));
                PathBuf::from(format!("{}_{}bpm.wav", base, bpm_int))
            }
            None => PathBuf::from("output_click.wav"),
        },
        None => PathBuf::from(format!("{}_click.wav", cli.input)),
    };

    if let Some(raw_path) = &raw_output {
        wav::write_wav(raw_path, &audio)
            .with_context(|| format!("Failed to write {}", raw_path.display()))?;
        println!("Audio: {}", raw_path.display());
    }

    if cli.accent_downbeats && !result.meter.downbeat_samples.is_empty() {
        metronome::overlay_clicks_accented(
            &mut audio,
            &result.beat_samples,
            &result.meter.downbeat_samples,
            cli.click_volume,
            cli.click_freq,
            cli.downbeat_freq,
        );
    } else {
        metronome::overlay_clicks(
            &mut audio,
            &result.beat_samples,
            cli.click_volume,
            cli.click_freq,
        );
    }

    wav::write_wav(&output_path, &audio)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    println!("Output: {}", output_path.display());

    Ok(())
}

/// Replace filesystem-hostile characters in a title-derived filename
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' | '-' => '_',
            other => other,
        })
        .collect()
}
