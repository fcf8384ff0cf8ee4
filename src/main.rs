use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

mod cache;
mod catalog;
mod config;
mod conversation;
mod crawler;
mod database;
mod deal_finder;
mod error;
mod filter;
mod messages;
mod models;
mod pagination;
mod scraper;
mod scrapers;
mod sweep;
mod telegram;
#[cfg(test)]
mod testing;
mod traits;

use config::Settings;
use database::Database;
use deal_finder::DealFinder;
use scraper::Scraper;
use telegram::TelegramBot;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting climbing gear deal bot");

    let settings = Settings::from_env()?;
    let token = settings
        .telegram_token
        .as_deref()
        .context("TELEGRAM_BOT_TOKEN must be set")?;

    let bot = Arc::new(TelegramBot::new(token)?);
    let fetcher = Arc::new(Scraper::new(settings.request_timeout)?);
    let database = Database::new(&settings.database_url).await?;

    let finder = DealFinder::new(&settings, fetcher, database, bot.clone())?;

    // Daily push of the biggest discounts to subscribers
    let sched = JobScheduler::new().await?;

    let sweep = finder.sweep(settings.sweep_discount_floor);
    sched
        .add(Job::new_async(settings.sweep_schedule.as_str(), move |_uuid, _l| {
            let sweep = sweep.clone();
            Box::pin(async move {
                if let Err(e) = sweep.run().await {
                    error!("Notification sweep failed: {}", e);
                }
            })
        })?)
        .await?;

    info!("Scheduler started - sweeping on '{}'", settings.sweep_schedule);
    sched.start().await?;

    if let Err(e) = bot.set_commands().await {
        warn!("Failed to register bot commands: {}", e);
    }

    bot.listen(finder).await;
    Ok(())
}
