use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use emotion_features::cache::{AnalysisCache, JsonFileCacheStore, SystemClock};
use emotion_features::config::AppConfig;
use emotion_features::managers::PersonalizationManager;
use emotion_features::personalization::{ProfileStore, TrainingSample};
use emotion_features::{
    FeatureSummarizer, FrameFeature, OnsetDetector, SpectralFrameExtractor,
};
use serde::Serialize;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "emotion_cli",
    about = "Offline feature extraction, cache maintenance and profile training"
)]
struct Cli {
    /// Analysis configuration JSON (defaults to assets/analysis_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at DEBUG instead of INFO
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract per-frame descriptors from a WAV file
    Extract {
        #[arg(long)]
        input: PathBuf,
        /// Include every frame in the output
        #[arg(long)]
        full: bool,
    },
    /// Detect onset/beat/phrase/section events in a WAV file
    Onsets {
        #[arg(long)]
        input: PathBuf,
    },
    /// Summarize a WAV file into a bounded waveform with scores and digest
    Summarize {
        #[arg(long)]
        input: PathBuf,
        /// Target point count (clamped to 500-8000)
        #[arg(long)]
        points: Option<usize>,
        /// Text context (lyrics/annotations) file
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Inspect or maintain a persisted analysis cache
    Cache {
        /// Cache file (defaults to the platform cache directory)
        #[arg(long)]
        cache: Option<PathBuf>,
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Train and persist a personalization model from a sample file
    Train {
        #[arg(long)]
        profile: String,
        /// JSON array of {input, output} training samples
        #[arg(long)]
        samples: PathBuf,
        /// Profile store directory (defaults to the platform data directory)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List entries and their status
    Status {
        #[arg(long)]
        track: Option<String>,
    },
    /// Remove one track's entry
    Invalidate {
        #[arg(long)]
        track: String,
    },
    /// Remove every expired entry
    Sweep,
}

#[derive(Serialize)]
struct ExtractReport {
    sample_rate: u32,
    duration_seconds: f64,
    frame_count: usize,
    peak_amplitude: f32,
    mean_centroid: f32,
    mean_flux: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<FrameFeature>>,
}

#[derive(Serialize)]
struct CacheStatusReport {
    track_id: String,
    complete: bool,
    created_at_ms: u64,
    points: usize,
    suggestions: usize,
    status: emotion_features::CacheStatus,
}

struct Track {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Track {
    fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    config
        .validate()
        .map_err(|err| anyhow!("invalid configuration: {err}"))?;

    match cli.command {
        Commands::Extract { input, full } => run_extract(&config, &input, full),
        Commands::Onsets { input } => run_onsets(&config, &input),
        Commands::Summarize {
            input,
            points,
            context,
        } => run_summarize(config, &input, points, context),
        Commands::Cache { cache, action } => run_cache(&config, cache, action),
        Commands::Train {
            profile,
            samples,
            store,
        } => run_train(&config, &profile, &samples, store),
    }
}

fn run_extract(config: &AppConfig, input: &Path, full: bool) -> Result<ExitCode> {
    let track = load_wav_mono(input)?;
    let frames = extract(config, &track)?;

    let count = frames.len().max(1) as f32;
    let report = ExtractReport {
        sample_rate: track.sample_rate,
        duration_seconds: track.duration_seconds(),
        frame_count: frames.len(),
        peak_amplitude: frames.iter().map(|f| f.amplitude).fold(0.0, f32::max),
        mean_centroid: frames.iter().map(|f| f.spectral_centroid).sum::<f32>() / count,
        mean_flux: frames.iter().map(|f| f.spectral_flux).sum::<f32>() / count,
        frames: full.then_some(frames),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_onsets(config: &AppConfig, input: &Path) -> Result<ExitCode> {
    let track = load_wav_mono(input)?;
    let frames = extract(config, &track)?;
    let events = OnsetDetector::with_config(config.onset.clone()).detect_track(
        &frames,
        track.samples.len(),
        config.extraction.frame_size,
    );

    println!("{}", serde_json::to_string_pretty(&events)?);
    Ok(ExitCode::from(0))
}

fn run_summarize(
    mut config: AppConfig,
    input: &Path,
    points: Option<usize>,
    context: Option<PathBuf>,
) -> Result<ExitCode> {
    if let Some(points) = points {
        config.summarizer.target_points = points;
    }

    let track = load_wav_mono(input)?;
    let frames = extract(&config, &track)?;
    let onsets = OnsetDetector::with_config(config.onset.clone()).detect_track(
        &frames,
        track.samples.len(),
        config.extraction.frame_size,
    );
    let waveform = FeatureSummarizer::new(config.summarizer.clone()).summarize(
        &frames,
        &onsets,
        track.duration_seconds(),
    );

    let context_text = context
        .map(|path| {
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        })
        .transpose()?;

    let report = serde_json::json!({
        "scores": waveform.scores,
        "points": waveform.points,
        "onsets": onsets,
        "digest": waveform.digest(config.summarizer.digest_points),
        "content_hash": emotion_features::cache::content_hash(&waveform, config.cache.hash_sample_points),
        "context_hash": emotion_features::cache::context_hash(context_text.as_deref()),
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_cache(config: &AppConfig, path: Option<PathBuf>, action: CacheAction) -> Result<ExitCode> {
    let store = match path {
        Some(path) => JsonFileCacheStore::new(path),
        None => JsonFileCacheStore::in_default_location()
            .map_err(|err| anyhow!("locating cache: {err}"))?,
    };
    let mut cache = AnalysisCache::open(Arc::new(store), Arc::new(SystemClock), config.cache.clone());

    match action {
        CacheAction::Status { track } => {
            let track_ids: Vec<String> = match track {
                Some(track) => vec![track],
                None => cache.track_ids().map(str::to_string).collect(),
            };
            let reports: Vec<CacheStatusReport> = track_ids
                .into_iter()
                .filter_map(|track_id| {
                    let entry = cache.get(&track_id)?;
                    Some(CacheStatusReport {
                        complete: entry.complete,
                        created_at_ms: entry.created_at_ms,
                        points: entry.waveform.len(),
                        suggestions: entry.suggestions.len(),
                        status: cache.status(&track_id),
                        track_id,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        CacheAction::Invalidate { track } => {
            if !cache.invalidate(&track) {
                eprintln!("No cache entry for {track}");
                return Ok(ExitCode::from(2));
            }
            println!("Invalidated {track}");
        }
        CacheAction::Sweep => {
            let removed = cache.sweep();
            println!("Removed {removed} expired entries, {} remain", cache.len());
        }
    }

    Ok(ExitCode::from(0))
}

fn run_train(
    config: &AppConfig,
    profile: &str,
    samples_path: &Path,
    store_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let raw = fs::read(samples_path)
        .with_context(|| format!("reading {}", samples_path.display()))?;
    let samples: Vec<TrainingSample> = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing {}", samples_path.display()))?;

    let store = match store_dir {
        Some(dir) => ProfileStore::new(dir),
        None => ProfileStore::in_default_location()
            .map_err(|err| anyhow!("locating profile store: {err}"))?,
    };
    store
        .save_samples(profile, &samples)
        .map_err(|err| anyhow!("saving samples: {err}"))?;

    let manager = PersonalizationManager::new(store, config.personalization.clone());
    manager
        .switch_profile(profile)
        .map_err(|err| anyhow!("switching profile: {err}"))?;
    let report = manager
        .retrain()
        .map_err(|err| anyhow!("training profile {profile}: {err}"))?;

    println!(
        "Trained profile {} on {} samples ({} epochs, mse {:.5})",
        report.profile_id, report.samples, report.epochs, report.final_loss
    );
    Ok(ExitCode::from(0))
}

fn extract(config: &AppConfig, track: &Track) -> Result<Vec<FrameFeature>> {
    let extractor = SpectralFrameExtractor::new(track.sample_rate, config.extraction.clone())
        .map_err(|err| anyhow!("creating extractor: {err}"))?;
    Ok(extractor.extract(&track.samples))
}

/// Decode a WAV file, averaging channels down to mono
fn load_wav_mono(path: &Path) -> Result<Track> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 | 24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => bail!("unsupported bit depth {} in {}", other, path.display()),
            }
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    tracing::info!(
        "[emotion_cli] Loaded {} ({} Hz, {} channel(s))",
        path.display(),
        spec.sample_rate,
        spec.channels
    );

    Ok(Track {
        samples,
        sample_rate: spec.sample_rate,
    })
}
