//! bowls CLI: measure bowl distances from the jack in a photo.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bowls::{MeasureConfig, MeasureRequest, MemorySettings, ProcessingOutcome};
use clap::{Args, Parser, Subcommand};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "bowls")]
#[command(about = "Rank bowls by distance from the jack in a photo of the end")]
#[command(version)]
struct Cli {
    /// Emit JSON logs (only with the `tracing` feature).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure one image.
    Measure(MeasureArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct MeasureArgs {
    /// Path to the input image.
    image: PathBuf,

    /// JSON configuration (see `default-config`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the four corner markers for perspective-corrected distances.
    #[arg(long)]
    accurate: bool,

    /// Jack diameter in millimeters (default from config).
    #[arg(long)]
    jack_diameter: Option<f64>,

    /// Jack position in image pixels, skipping automatic jack detection.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    jack: Option<(f64, f64)>,

    /// Directory for cached results.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Processing timeout in seconds.
    #[arg(long, value_parser = parse_timeout)]
    timeout: Option<f64>,

    /// Print the full outcome as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y (got {s:?})"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

fn parse_timeout(s: &str) -> Result<f64, String> {
    let secs: f64 = s.trim().parse().map_err(|e| format!("bad timeout: {e}"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("timeout must be a positive number of seconds (got {s})"))
    }
}

fn init_logging(json: bool) {
    #[cfg(feature = "tracing")]
    {
        bowls::core::init_tracing(json);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = json;
        let _ = bowls::core::init_from_env(log::LevelFilter::Warn);
    }
}

fn print_table(outcome: &ProcessingOutcome) {
    let Some(result) = &outcome.result else {
        return;
    };
    let mode = if result.using_high_accuracy {
        "high accuracy"
    } else {
        "jack scale"
    };
    println!("{} bowls ({mode})", result.bowls.len());
    if let Some(msg) = &result.accuracy_message {
        println!("note: {msg}");
    }
    for b in &result.bowls {
        println!(
            "{:>3}  #{:<3} {:<12} {:>7.1} cm",
            b.rank, b.id, b.team_label, b.distance_from_jack
        );
    }
}

async fn measure(args: MeasureArgs) -> CliResult<ProcessingOutcome> {
    let mut cfg = match &args.config {
        Some(path) => MeasureConfig::load_json(path)?,
        None => MeasureConfig::default(),
    };
    if let Some(secs) = args.timeout {
        cfg.orchestrator.timeout_ms = ((secs * 1000.0).ceil() as u64).max(1);
    }

    let mut request = MeasureRequest::from_path(&args.image)?
        .with_high_accuracy(args.accurate)
        .with_jack_diameter(args.jack_diameter.unwrap_or(cfg.jack_diameter_mm));
    if let Some((x, y)) = args.jack {
        request = request.with_manual_jack(x, y);
    }

    let orchestrator =
        cfg.build_orchestrator(Arc::new(MemorySettings::new()), args.cache_dir.as_deref())?;
    Ok(orchestrator.process(request).await)
}

fn run(cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&MeasureConfig::default())?);
            Ok(true)
        }
        Commands::Measure(args) => {
            let json = args.json;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            let outcome = runtime.block_on(measure(args))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_table(&outcome);
                if let Some(err) = &outcome.error {
                    eprintln!("error: {err}");
                }
            }
            Ok(outcome.success)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_parse() {
        assert_eq!(parse_point("12.5, 40"), Ok((12.5, 40.0)));
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn timeouts_must_be_positive() {
        assert_eq!(parse_timeout("2.5"), Ok(2.5));
        for bad in ["0", "-1", "NaN", "inf", "soon"] {
            assert!(parse_timeout(bad).is_err(), "{bad}");
        }
    }
}
