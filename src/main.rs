use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use oddsfeed::config::Config;
use oddsfeed::error::Result;
use oddsfeed::feed::{Multiplexer, MultiplexerOptions, WsTransport};
use oddsfeed::store::OddsStore;
use oddsfeed::types::{LifecycleEvent, ListKind, Topic};
use oddsfeed::views::list_view;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let store = Arc::new(OddsStore::new(cfg.pending_relation_cap));
    let transport = Arc::new(WsTransport::new(cfg.ws_url.clone()));
    let mux = Multiplexer::new(transport, Arc::clone(&store), MultiplexerOptions::from_config(&cfg));
    info!("feed client ready, upstream {}", cfg.ws_url);

    let sport_id = std::env::var("FEED_SPORT_ID").unwrap_or_else(|_| "FBL".to_string());
    let list_kind = match std::env::var("FEED_LIST").ok().as_deref() {
        Some("today") => ListKind::Today,
        Some("upcoming") => ListKind::Upcoming,
        Some("popular") => ListKind::Popular,
        _ => ListKind::Live,
    };
    let topic = Topic::new(sport_id, list_kind, 20);
    let scope = topic.scope();
    info!(topic = %topic.key(), "subscribing");

    // Periodic counter dump for flow diagnostics.
    let metrics_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        tick.tick().await;
        loop {
            tick.tick().await;
            let m = metrics_store.metrics_snapshot();
            info!(
                applied = m.records_applied,
                unknown = m.records_unknown,
                snapshots = m.batches_snapshot,
                deltas = m.batches_delta,
                notified = m.notifications_sent,
                pending_dropped = m.pending_dropped,
                "store counters"
            );
        }
    });

    let mut sub = mux.subscribe(&topic);
    while let Some(event) = sub.events.recv().await {
        match event {
            LifecycleEvent::Connected => info!("topic connected"),
            LifecycleEvent::InitialContent(summary) => {
                info!(
                    matches = summary.match_ids.len(),
                    applied = summary.records_applied,
                    "initial content"
                );
                for view in list_view(&store, &scope, 20) {
                    info!(
                        match_id = %view.row.id,
                        status = %view.row.status,
                        markets = view.markets.len(),
                        "{} vs {}",
                        view.row.home_participant_name,
                        view.row.away_participant_name,
                    );
                }
            }
            LifecycleEvent::UpdatedContent(summary) => {
                info!(
                    applied = summary.records_applied,
                    skipped = summary.records_skipped,
                    "update"
                );
            }
            LifecycleEvent::Disconnected(reason) => {
                warn!("topic disconnected: {reason:?}");
                break;
            }
        }
    }

    Ok(())
}
