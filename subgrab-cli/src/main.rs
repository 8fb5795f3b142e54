use std::process;

use clap::Parser;
use subgrab::{
    cli::Args, config::ProgramConfig, error::AppError, listing::render_tracks,
    progress::ProgressReporter, sink::DirectorySink,
};
use subgrab_engine::{SubtitleExtractor, TrackOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Exit status when nothing was exported and at least one track failed.
const EXIT_FAILED: i32 = 1;
/// Exit status after Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {e}");
            eprintln!("Error: {e}");
            process::exit(EXIT_FAILED);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}

async fn run(args: Args) -> Result<i32, AppError> {
    let config = ProgramConfig::from_args(&args)?;

    let token = CancellationToken::new();
    let reporter = ProgressReporter::new(args.quiet || args.list);
    let extractor = SubtitleExtractor::new(config.extractor)?
        .with_progress(reporter.callback())
        .with_cancellation(token.clone());

    let manifest = match &args.manifest_file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            info!(path = %path.display(), "Using local manifest");
            extractor.parse(&config.manifest_url, &text, args.dialect)?
        }
        None => extractor.discover(&config.manifest_url, args.dialect).await?,
    };

    if args.list {
        print!("{}", render_tracks(&manifest, &config.filter));
        return Ok(0);
    }

    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current track");
            ctrl_c_token.cancel();
        }
    });

    let sink = DirectorySink::new(&args.output_dir, args.overwrite);
    let report = extractor
        .run(&manifest, &config.filter, &config.context, &sink)
        .await;
    reporter.finish();

    for outcome in &report.outcomes {
        match outcome {
            TrackOutcome::Exported {
                name,
                cues,
                failed_segments,
                ..
            } if *failed_segments > 0 => {
                warn!("{name}: {cues} cues, {failed_segments} segments missing");
            }
            TrackOutcome::Exported { .. } => {}
            TrackOutcome::Failed { label, error } => error!("{label}: {error}"),
        }
    }
    info!(
        "Done: {} exported, {} failed, {} skipped into {}",
        report.exported(),
        report.failed(),
        report.skipped,
        sink.dir().display()
    );

    if token.is_cancelled() || report.is_cancelled() {
        return Ok(EXIT_CANCELLED);
    }
    if report.exported() == 0 && report.failed() > 0 {
        return Ok(EXIT_FAILED);
    }
    Ok(0)
}
