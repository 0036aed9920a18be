use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{info, warn};

use beatroot_rs::beatroot::event;
use beatroot_rs::{AgentParameters, BeatDetector, BeatTrack, BeatTracker, Error, Event, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-agent beat tracking")]
struct Args {
    /// Onset detection function, one or more whitespace separated values per line
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Time in seconds between detection function frames
    #[arg(long, default_value_t = 0.01, value_parser = positive_seconds)]
    hop: f64,

    /// Read `time salience` onset lines instead of a detection function
    #[arg(long, default_value_t = false)]
    onsets: bool,

    /// Path to a TOML file overriding the tracking parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not find beats after this time, in seconds
    #[arg(long)]
    stop: Option<f64>,

    /// Known beat times to continue tracking from
    #[arg(long, num_args = 1.., value_name = "TIME")]
    seed: Vec<f64>,

    /// Print the tracked beats without interpolating missed ones
    #[arg(long, default_value_t = false)]
    unfilled: bool,
}

fn positive_seconds(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{} is not a positive number of seconds", s))
    }
}

/// Parses a finite number. `nan` and `inf` are rejected.
fn parse_finite(token: &str) -> std::result::Result<f64, String> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("{:?} is not finite", token)),
        Err(e) => Err(format!("{:?}: {}", token, e)),
    }
}

/// Parses detection function values. A token that is not a number repeats the previous value.
fn parse_features(text: &str) -> Vec<f64> {
    let mut previous = 0.0;
    let mut features = Vec::new();
    for (i, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            match parse_finite(token) {
                Ok(value) => previous = value,
                Err(e) => warn!("line {}: {}, repeating {}", i + 1, e, previous),
            }
            features.push(previous);
        }
    }
    features
}

/// Parses one onset per line: a time in seconds, optionally followed by a salience (default 1).
/// Blank lines and lines starting with `#` are skipped.
fn parse_onsets(text: &str) -> Result<Vec<Event>> {
    let mut onsets: Vec<Event> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |message: String| Error::Parse {
            line: i + 1,
            message,
        };
        let mut fields = line.split_whitespace();
        let time = parse_finite(fields.next().unwrap_or_default())
            .map_err(|e| parse_error(format!("bad onset time {}", e)))?;
        let salience = match fields.next() {
            Some(field) => {
                parse_finite(field).map_err(|e| parse_error(format!("bad salience {}", e)))?
            }
            None => 1.0,
        };
        if salience < 0.0 {
            return Err(parse_error(format!("negative salience {}", salience)));
        }
        if let Some(extra) = fields.next() {
            return Err(parse_error(format!("unexpected field {:?}", extra)));
        }
        if onsets.last().is_some_and(|last| time < last.time) {
            return Err(parse_error(format!("onset at {} is out of order", time)));
        }

        onsets.push(Event::onset(time, salience));
    }
    Ok(onsets)
}

fn track(args: &Args, params: AgentParameters, text: &str) -> Result<BeatTrack> {
    if args.onsets {
        let mut tracker = BeatTracker::new(params);
        if let Some(stop) = args.stop {
            tracker = tracker.with_stop_time(stop);
        }
        let onsets = parse_onsets(text)?;
        info!("read {} onsets", onsets.len());
        return Ok(tracker.beat_track_from(&onsets, &event::beats_at(&args.seed)));
    }

    let mut detector = BeatDetector::new(args.hop, params);
    if let Some(stop) = args.stop {
        detector.set_stop_time(stop);
    }
    detector.set_seed_beats(&args.seed);
    detector.process_features(&parse_features(text));
    info!(
        "processed {} frames ({:.2} seconds)",
        detector.processed_frames(),
        detector.processed_frames_duration().as_secs_f64()
    );
    Ok(detector.finalize())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let params = match &args.config {
        Some(path) => AgentParameters::load(path)?,
        None => AgentParameters::default(),
    };
    for warning in params.range_warnings() {
        warn!("{}", warning);
    }

    let text = std::fs::read_to_string(&args.path)?;
    let result = track(&args, params, &text)?;

    let beats = if args.unfilled {
        &result.unfilled
    } else {
        &result.beats
    };
    for beat in beats {
        println!("{:.3}", beat.time);
    }

    match result.bpm() {
        Some(bpm) => info!("detected tempo: {:.2} bpm", bpm),
        None => warn!("no beats found"),
    }
    info!(
        "finished in {} seconds",
        (Instant::now() - start).as_secs_f64()
    );
    Ok(())
}
