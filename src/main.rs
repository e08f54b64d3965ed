use anyhow::Context;
use content_client::ContentApiClient;
use feed_assembler::{FeedLoader, LoadOutcome};
use interest_directory::Database;
use std::sync::Arc;
use threadist_core::{AppConfig, ContentSource, ErrorExt};

const SEARCH_LIMIT: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "threadist=debug,feed_assembler=debug,playback=debug".into()
            }),
        )
        .init();

    tracing::info!("Starting Threadist");

    let config = AppConfig::from_env().context("loading configuration")?;
    let content = Arc::new(ContentApiClient::new(&config)?);

    let mut database = Database::new(config.database_url.clone());
    database.connect().await?;
    database.run_migrations().await?;
    let directory = Arc::new(database);

    // Any arguments are treated as a search query instead of a feed load.
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !query.trim().is_empty() {
        let stories = content.search(query.trim(), None, SEARCH_LIMIT).await?;
        for story in &stories {
            println!("r/{:<20} {}", story.subreddit, story.title);
        }
        return Ok(());
    }

    let user_id = std::env::var("THREADIST_USER_ID").ok();
    let loader = FeedLoader::new(content, directory, config.feed.clone());

    match loader.load(user_id.as_deref()).await? {
        LoadOutcome::Loaded(loaded) => {
            for notice in &loaded.notices {
                notice.log_warn();
            }
            if loaded.needs_onboarding {
                tracing::info!("No interest selection yet; showing the general feed");
            }
            for section in &loaded.feed.sections {
                println!("{} ({} stories)", section.title, section.stories.len());
                for story in &section.stories {
                    println!("  r/{:<20} {}", story.subreddit, story.title);
                }
            }
        }
        LoadOutcome::Superseded { generation } => {
            tracing::debug!("Feed pass {} superseded", generation);
        }
    }

    Ok(())
}
