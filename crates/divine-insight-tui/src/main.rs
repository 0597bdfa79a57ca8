mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use std::sync::Arc;
use anyhow::Result;
use tracing::{info, warn};

use divine_insight_core::storage::ANNOTATIONS_SLOT;
use divine_insight_core::{
    AnnotationSlot, AnnotationStore, Config, Corpus, FlowGateway, LlmClient, LlmGateway, MemorySlot,
    Notice, SqliteSlot, UnconfiguredGateway,
};

use app::{App, Store};
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = logging::init();
    info!(log_file = ?log_file, "starting divine-insight");

    let mut startup_notices = Vec::new();

    let config = Config::load().unwrap_or_else(|err| {
        warn!(error = %err, "could not read config, using defaults");
        startup_notices.push(Notice::warning(
            "Settings not loaded",
            "Your settings file could not be read. Using defaults.",
        ));
        Config::default()
    });

    // An optional JSON corpus path replaces the built-in sample text
    let corpus = match std::env::args().nth(1) {
        Some(path) => Corpus::load_from_json(&path).await?,
        None => Corpus::kjv(),
    };

    let (store, slot_notice) = open_store(&config);
    startup_notices.extend(slot_notice);
    let gateway = build_gateway(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(&config, corpus, store, gateway, events.sender());
    for notice in startup_notices {
        app.show_notice(notice);
    }

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("exiting");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

/// Annotations live in sqlite; if that cannot be opened they are kept in
/// memory for the session.
fn open_store(config: &Config) -> (Store, Option<Notice>) {
    let path = match &config.annotations_path {
        Some(path) => Ok(path.clone()),
        None => SqliteSlot::default_path(),
    };

    let (slot, notice): (Box<dyn AnnotationSlot>, Option<Notice>) =
        match path.and_then(|p| SqliteSlot::open(&p, ANNOTATIONS_SLOT)) {
            Ok(slot) => (Box::new(slot), None),
            Err(err) => {
                warn!(error = %err, "annotation storage unavailable, keeping annotations in memory");
                (
                    Box::new(MemorySlot::new()),
                    Some(Notice::warning(
                        "Annotations will not be saved",
                        "Local storage is unavailable. Annotations last only for this session.",
                    )),
                )
            }
        };

    (AnnotationStore::load(slot, config.persistence), notice)
}

fn build_gateway(config: &Config) -> Arc<dyn FlowGateway> {
    match LlmClient::from_config(config) {
        Ok(client) => {
            info!(provider = client.provider().as_str(), model = client.model(), "AI gateway ready");
            Arc::new(LlmGateway::new(client))
        }
        Err(err) => {
            warn!(error = %err, "AI gateway not configured");
            Arc::new(UnconfiguredGateway::new(config.provider))
        }
    }
}
