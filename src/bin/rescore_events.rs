use anyhow::Result;
use chrono::Utc;
use kawaraban::clustering;
use kawaraban::config::EngineConfig;
use kawaraban::db::Database;
use tokio::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Utility to recompute heat scores for all active events.
///
/// A crash between an article update and its event's rescore can leave an
/// event's heat stale; running this tool brings every active event back in
/// line with its confirmed article set.
///
/// Usage:
///    cargo run --bin rescore_events

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set default subscriber");

    let start_time = Instant::now();
    let db = Database::instance().await;
    let config = EngineConfig::from_env();
    let now = Utc::now();

    let events = db.all_active_events().await?;
    info!("Rescoring {} active events...", events.len());

    let mut changed = 0;
    let mut errors = 0;

    for event in &events {
        match clustering::rescore_event(db, event.id, now, &config).await {
            Ok(heat_score) => {
                if heat_score != event.heat_score {
                    info!(
                        "Event {} heat score {} -> {}",
                        event.id, event.heat_score, heat_score
                    );
                    changed += 1;
                }
            }
            Err(e) => {
                error!("Error rescoring event {}: {}", event.id, e);
                errors += 1;
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!("Rescoring completed in {:.2?}", elapsed);
    info!("  Events scanned: {}", events.len());
    info!("  Scores changed: {}", changed);
    info!("  Errors: {}", errors);

    Ok(())
}
