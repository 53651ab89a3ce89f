use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use folio::app::App;
use folio::config::{AppConfig, WatcherConfig};
use folio::error::{AppError, Result};
use folio::event::{Event, EventHandler};
use folio::fs::classifier::EntryClassifier;
use folio::handler::handle_command;
use folio::host::{HostRuntime, LocalHost};
use folio::logging;
use folio::owner::SessionOwner;
use folio::sync::channel::SyncHub;

/// Timer resolution for debounced cursor moves and searches.
const TICK_RATE: Duration = Duration::from_millis(25);

/// Browse images, videos and archives as tabbed, paged sessions.
///
/// Commands are read line by line from stdin; type `help` for the list.
#[derive(Parser, Debug)]
#[command(name = "folio", version, about)]
struct Cli {
    /// File, folder or archive to open in a viewer tab
    filepath: Option<PathBuf>,

    /// Path to a config file (overrides the default locations)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (e.g. "debug", "folio=trace")
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Disable directory watching (no auto-rebuild)
    #[arg(long)]
    no_watcher: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let overrides = cli.no_watcher.then(|| AppConfig {
        watcher: WatcherConfig {
            enabled: Some(false),
            ..WatcherConfig::default()
        },
        ..AppConfig::default()
    });
    let config = AppConfig::load(cli.config.as_deref(), overrides.as_ref());

    let classifier = EntryClassifier::from_config(&config);
    let (watch_tx, watch_rx) = mpsc::unbounded_channel();
    let host: Arc<dyn HostRuntime> = Arc::new(LocalHost::new(
        classifier.clone(),
        config.watcher_enabled().then_some(watch_tx),
        config.watch_debounce(),
    ));

    let (hub, intent_rx) = SyncHub::new();
    let mut owner = SessionOwner::new(host.clone(), hub.clone(), classifier, config.page_size());

    if let Some(filepath) = &cli.filepath {
        let path = filepath.canonicalize().map_err(|_| {
            AppError::InvalidPath(format!("{} does not exist", filepath.display()))
        })?;
        owner.file_opened(path);
    }

    let owner_task = tokio::spawn(owner.run(intent_rx, watch_rx));

    let mut events = EventHandler::with_input(TICK_RATE);
    let mut app = App::start("main", true, &hub, host, &config, events.sender())?;

    loop {
        match events.next().await? {
            Event::Command(line) => {
                for out in handle_command(&mut app, &line, Instant::now()) {
                    println!("{out}");
                }
            }
            event => app.handle_event(event, Instant::now()),
        }
        if app.should_quit {
            break;
        }
    }

    app.teardown();
    // The owner keeps a hub handle, so its intent queue never closes on its own.
    owner_task.abort();
    if let Err(e) = owner_task.await {
        if !e.is_cancelled() {
            warn!(error = %e, "session owner ended abnormally");
        }
    }
    info!("bye");
    Ok(())
}
