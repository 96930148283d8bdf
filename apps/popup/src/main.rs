use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dispatcher::{Dispatcher, HttpAskBackend};
use storage::InteractionStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

mod controller;
mod settings;

use controller::{PopupController, TranscriptLine};

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the ask backend.
    #[arg(long)]
    backend_url: Option<String>,
    /// Sqlite URL of the shared interaction store.
    #[arg(long)]
    database_url: Option<String>,
    /// Page the questions are about.
    #[arg(long)]
    page_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = settings::load_settings();
    if let Some(v) = args.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = args.database_url {
        settings.database_url = v;
    }
    if let Some(v) = args.page_url {
        settings.page_url = Some(v);
    }
    let page_url = settings
        .page_url
        .clone()
        .unwrap_or_else(|| "about:blank".to_string());

    let store = InteractionStore::new(&settings.database_url).await?;
    store.health_check().await?;
    let handle = Dispatcher::spawn(
        Arc::new(HttpAskBackend::new(settings.backend_url.clone())),
        store.clone(),
    );
    info!(backend_url = %settings.backend_url, %page_url, "popup ready");

    let mut popup = PopupController::new();
    popup.on_open(store.latest().as_ref());
    render(&popup);

    let mut changes = store.subscribe();
    let _ = changes.borrow_and_update();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let record = changes.borrow_and_update().clone();
                if let Some(record) = record {
                    popup.on_change(&record);
                    render(&popup);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Some(intent) = popup.on_submit(&line, &page_url) {
                    match handle.submit(intent.clone()) {
                        Ok(request_id) => popup.on_submit_accepted(request_id, &intent.query),
                        Err(err) => popup.on_submit_rejected(&err),
                    }
                }
                render(&popup);
            }
        }
    }

    Ok(())
}

fn render(popup: &PopupController) {
    println!("----");
    for line in popup.transcript() {
        match line {
            TranscriptLine::User(text) => println!("You: {text}"),
            TranscriptLine::Ai(text) => println!("AI: {text}"),
            TranscriptLine::Error(text) => println!("! {text}"),
            TranscriptLine::Info(text) => println!("({text})"),
        }
    }
    if let Some(indicator) = popup.indicator() {
        println!("[{indicator}]");
    }
}
