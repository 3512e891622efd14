use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use prettytable::{row, Table};
use tracing::{error, info};

use kawaraban::clustering::{self, MergeDecision};
use kawaraban::config::EngineConfig;
use kawaraban::db::Database;
use kawaraban::logging::configure_logging;
use kawaraban::scoring;
use kawaraban::similarity::LexicalOracle;

#[derive(Parser)]
#[command(name = "kawaraban", version)]
#[command(about = "Clusters Japanese-politics news articles into events and scores them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Decision {
    Approve,
    Reject,
}

#[derive(Subcommand)]
enum Command {
    /// Run the clustering engine over articles not yet assigned to an event
    Process {
        /// Number of articles per progress report
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
        /// Stop after this many articles
        #[arg(long)]
        max_articles: Option<usize>,
    },
    /// List articles awaiting merge review
    Pending,
    /// Approve or reject a suggested merge for a pending article
    Resolve {
        article_id: i64,
        #[arg(value_enum)]
        decision: Decision,
    },
    /// Show the hottest active events
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show how an event's heat score was computed
    Breakdown {
        event_id: i64,
        /// Emit the breakdown as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Register a feed source or update its weight
    AddSource {
        name: String,
        #[arg(long)]
        feed_url: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        weight: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let cli = Cli::parse();
    let db = Database::instance().await;
    let config = EngineConfig::from_env();

    match cli.command {
        Command::Process {
            batch_size,
            max_articles,
        } => process(db, &config, batch_size, max_articles).await?,
        Command::Pending => pending(db).await?,
        Command::Resolve {
            article_id,
            decision,
        } => {
            let decision = match decision {
                Decision::Approve => MergeDecision::Approve,
                Decision::Reject => MergeDecision::Reject,
            };
            let event_id = clustering::resolve_merge(db, article_id, decision).await?;
            println!("Article {} resolved onto event {}", article_id, event_id);
        }
        Command::Top { limit } => top(db, limit).await?,
        Command::Breakdown { event_id, json } => breakdown(db, &config, event_id, json).await?,
        Command::AddSource {
            name,
            feed_url,
            weight,
        } => {
            let id = db.add_source(&name, feed_url.as_deref(), weight).await?;
            println!("Source {} registered with id {}", name, id);
        }
    }

    Ok(())
}

/// Drains unprocessed articles through the clustering engine in batches
async fn process(
    db: &Database,
    config: &EngineConfig,
    batch_size: usize,
    max_articles: Option<usize>,
) -> Result<()> {
    let oracle = LexicalOracle::default();

    let articles = db.find_unprocessed_articles(max_articles).await?;
    let total = articles.len();
    info!("Found {} articles to process", total);

    if total == 0 {
        info!("No unprocessed articles, exiting.");
        return Ok(());
    }

    let mut processed = 0;
    let mut confirmed = 0;
    let mut pending = 0;
    let mut created = 0;
    let mut errors = 0;

    for chunk in articles.chunks(batch_size) {
        for &article_id in chunk {
            match clustering::process_article(db, &oracle, config, article_id).await {
                Ok(event_id) => {
                    let article = db.get_article(article_id).await?;
                    match (article.match_status, article.match_confidence) {
                        (_, Some(c)) if c >= 1.0 => {
                            created += 1;
                            info!("Created new event {} for article {}", event_id, article_id);
                        }
                        (Some(kawaraban::clustering::MatchStatus::Pending), _) => {
                            pending += 1;
                            info!(
                                "Article {} pending review against event {}",
                                article_id, event_id
                            );
                        }
                        _ => {
                            confirmed += 1;
                            info!("Assigned article {} to event {}", article_id, event_id);
                        }
                    }
                }
                Err(e) => {
                    error!("Error processing article {}: {}", article_id, e);
                    errors += 1;
                }
            }

            processed += 1;
        }

        info!(
            "Progress: {}/{} articles processed ({:.1}%)",
            processed,
            total,
            (processed as f32 / total as f32) * 100.0
        );
    }

    info!("Summary:");
    info!("  Total articles processed: {}", processed);
    info!("  Confirmed on existing events: {}", confirmed);
    info!("  Pending review: {}", pending);
    info!("  New events created: {}", created);
    info!("  Errors: {}", errors);

    Ok(())
}

async fn pending(db: &Database) -> Result<()> {
    let articles = db.find_pending_articles().await?;

    if articles.is_empty() {
        println!("No articles awaiting review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["ARTICLE", "TITLE", "EVENT", "CONFIDENCE"]);
    for article in &articles {
        table.add_row(row![
            article.id,
            article.title,
            article
                .event_id
                .map_or("-".to_string(), |id| id.to_string()),
            article
                .match_confidence
                .map_or("-".to_string(), |c| format!("{:.4}", c)),
        ]);
    }
    table.printstd();

    Ok(())
}

async fn top(db: &Database, limit: usize) -> Result<()> {
    let events = db.top_events(limit).await?;

    let mut table = Table::new();
    table.add_row(row!["EVENT", "HEAT", "LAST UPDATED", "TITLE"]);
    for event in &events {
        table.add_row(row![
            event.id,
            event.heat_score,
            event
                .last_updated_at
                .map_or("-".to_string(), |t| t.to_rfc3339()),
            event.title,
        ]);
    }
    table.printstd();

    Ok(())
}

async fn breakdown(db: &Database, config: &EngineConfig, event_id: i64, json: bool) -> Result<()> {
    let event = db.get_event(event_id).await?;
    let articles = db.find_confirmed_articles_with_source(event_id).await?;
    let breakdown = scoring::score_breakdown(&event, &articles, Utc::now(), config);

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!("Event {}: {}", event.id, event.title);
    println!("  Sources counted: {}", breakdown.source_count);
    println!("  Raw score:       {}", breakdown.raw_score);
    println!("  Decay factor:    {:.4}", breakdown.decay_factor);
    println!("  Final score:     {}", breakdown.final_score);

    if breakdown.contributions.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.add_row(row!["SOURCE", "NAME", "ARTICLE", "WEIGHT", "POINTS"]);
    for contribution in &breakdown.contributions {
        let name = db
            .get_source(contribution.source_id)
            .await?
            .map_or("(deleted)".to_string(), |s| s.name);
        table.add_row(row![
            contribution.source_id,
            name,
            contribution.article_id,
            contribution.weight,
            contribution.points,
        ]);
    }
    table.printstd();

    Ok(())
}
