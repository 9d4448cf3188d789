use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use tapedeck::browser::TermPage;
use tapedeck::host::TerminalHost;
use tapedeck::options::{load_options, Options};
use tapedeck::render::{default_encoders, run_pipeline};
use tapedeck::rotate::apply_loop_offset;
use tapedeck::session::{cleanup_frames, Session};

#[derive(Debug, Parser)]
#[command(name = "tapedeck")]
#[command(about = "Terminal-session recorder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record the terminal session and compile the video artifacts.
    Record {
        /// Options file (YAML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Debugger websocket URL of the already-running browser.
        #[arg(long)]
        ws_url: String,
        /// How long to record, in seconds.
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
    },
    /// Validate an options file.
    Check { config: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            config,
            ws_url,
            duration,
        } => run_record(config.as_deref(), &ws_url, duration),
        Commands::Check { config } => run_check(&config),
    }
}

fn run_check(config: &Path) -> Result<()> {
    let options = load_options(config)?;
    println!(
        "OK: {} ({}x{} @ {} fps, padding {}, loop offset {}%)",
        config.display(),
        options.video.width,
        options.video.height,
        options.video.framerate,
        options.video.padding,
        options.loop_offset_percent,
    );
    Ok(())
}

fn run_record(config: Option<&Path>, ws_url: &str, duration: f64) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        bail!("recording duration must be positive, got {duration}");
    }
    let options = match config {
        Some(path) => load_options(path)?,
        None => {
            let options = Options::default();
            options.validate()?;
            options
        }
    };

    let host = TerminalHost::spawn()?;
    let page = TermPage::connect(ws_url, &host.url())?;
    let session = Session::new(options.clone(), page, host);
    session.setup()?;
    let store = session.store().clone();

    let mut recording = session.record()?;
    let drain = recording.take_errors().map(|errors| {
        thread::spawn(move || {
            for err in errors {
                eprintln!("capture: {err:#}");
            }
        })
    });

    thread::sleep(Duration::from_secs_f64(duration));

    let summary = recording.finish()?;
    if let Some(handle) = drain {
        let _ = handle.join();
    }
    if let Err(err) = summary.teardown {
        eprintln!("teardown: {err:#}");
    }
    eprintln!("captured {} frames", summary.total_frames);

    let starting_frame = match apply_loop_offset(
        &store,
        options.video.starting_frame,
        summary.total_frames,
        options.loop_offset_percent,
    ) {
        Ok(frame) => frame,
        // A failed rotation leaves the sequence unusable for rendering.
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    };

    let artifacts = run_pipeline(default_encoders(
        &store,
        &options.video,
        starting_frame,
        &options.theme,
    ))?;
    for artifact in &artifacts {
        println!("Wrote {}", artifact.display());
    }

    cleanup_frames(&options, &store)?;
    Ok(())
}
