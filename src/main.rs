use clap::{Parser, Subcommand};
use core_types::{ManualClock, SystemClock};
use events::{Event, EventsError, Session};
use record::{RecordOptions, Recorder};
use replay::{ReplayError, Replayer, ReplayerConfig};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Lines of the replayed tree printed at most.
const OUTLINE_CAP: usize = 400;

/// Records documents into sessions and replays them.
#[derive(Parser, Debug)]
#[command(name = "retrace", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Snapshot an HTML file and write the session as JSON to stdout.
    Record {
        file: PathBuf,
        /// Write pretty-printed JSON.
        #[arg(long)]
        pretty: bool,
    },
    /// Replay a session file and print the reconstructed tree.
    Replay {
        session: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Stop at this offset from the first event instead of the end.
        #[arg(long)]
        until: Option<i64>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} has no usable file url")]
    Href(PathBuf),
    #[error(transparent)]
    Events(#[from] EventsError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn record(file: &Path, pretty: bool) -> Result<String, CliError> {
    let markup = read(file)?;
    let absolute = std::fs::canonicalize(file).map_err(|source| CliError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let href = Url::from_file_path(&absolute).map_err(|()| CliError::Href(absolute.clone()))?;
    let options = RecordOptions {
        href: href.into(),
        ..RecordOptions::default()
    };

    let events: Rc<RefCell<Vec<Event>>> = Rc::default();
    let sink = Rc::clone(&events);
    let mut doc = dom::parse_document(&markup);
    let mut recorder = Recorder::new(options, SystemClock, move |event, _| {
        sink.borrow_mut().push(event);
    });
    recorder.start(&mut doc);
    recorder.flush(&mut doc);

    let session = Session {
        events: events.take(),
    };
    log::info!(target: "retrace", "recorded {} events from {}", session.events.len(), file.display());
    let json = if pretty {
        session.to_json_pretty()?
    } else {
        session.to_json()?
    };
    Ok(json)
}

/// Plays the session on a manual clock moved by the wall time `stop` takes
/// at `speed`, never past it. Whatever rounding leaves short is closed with a
/// seek.
fn replay(path: &Path, speed: f64, until: Option<i64>) -> Result<Vec<String>, CliError> {
    let input = read(path)?;
    let config = ReplayerConfig {
        speed,
        ..ReplayerConfig::default()
    };
    let clock = ManualClock::new(Duration::ZERO);
    let mut player = Replayer::from_json(&input, config, clock.clone())?;
    let meta = player.meta_data()?;
    let stop = until.unwrap_or(meta.total_time).clamp(0, meta.total_time);
    log::info!(
        target: "retrace",
        "replaying {} events, {}ms of {}ms at {speed}x",
        player.len(),
        stop,
        meta.total_time
    );

    player.play(0)?;
    if speed > 0.0 {
        let wall = (stop as f64 / speed).floor() as u64;
        clock.advance(Duration::from_millis(wall));
        player.tick()?;
    }
    if player.current_time() < stop {
        player.seek(stop)?;
    }

    let Some(tree) = player.tree() else {
        return Ok(Vec::new());
    };
    let mut lines = dom::debug::outline(tree.doc(), tree.root(), OUTLINE_CAP);
    if tree.pending_len() > 0 {
        log::warn!(target: "retrace", "{} adds still wait for their parent", tree.pending_len());
    }
    let state = player.state();
    if let Some(href) = &state.href {
        lines.insert(0, format!("# {href} {}x{}", state.viewport.width, state.viewport.height));
    }
    Ok(lines)
}

fn run(args: Args) -> Result<(), CliError> {
    match args.command {
        Command::Record { file, pretty } => {
            println!("{}", record(&file, pretty)?);
        }
        Command::Replay {
            session,
            speed,
            until,
        } => {
            for line in replay(&session, speed, until)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: "retrace", "{err}");
            eprintln!("retrace: {err}");
            ExitCode::FAILURE
        }
    }
}
