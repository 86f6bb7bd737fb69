use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

use doctoria::cache::{CacheBackend, CacheCoordinator, MemoryCacheBackend, RedisCacheBackend};
use doctoria::conference::PageLinkProvider;
use doctoria::core::{config, init_logger};
use doctoria::dialogue::{
    Deps, Dispatcher, MemorySessionStore, RedisSessionStore, SessionStore,
};
use doctoria::schedule;
use doctoria::storage::{create_pool, SqliteDirectory};
use doctoria::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramRenderer};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present, before any config
    // static is touched
    let _ = dotenv();

    // Set up global panic handler so a panic inside the dispatcher is logged
    // instead of silently terminating the task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;
    log::info!("Starting doctoria bot");

    // Database pool + data access
    let pool = create_pool(&config::DATABASE_PATH)?;
    let directory = Arc::new(SqliteDirectory::new(pool));

    // Session store and cache backend: Redis when configured, in-memory
    // single-node mode otherwise
    let (sessions, cache_backend): (Arc<dyn SessionStore>, Arc<dyn CacheBackend>) =
        match config::REDIS_URL.as_deref() {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = client.get_connection_manager().await?;
                log::info!("Using Redis session store and cache backend");
                (
                    Arc::new(RedisSessionStore::new(manager.clone(), config::session::TTL_SECS)),
                    Arc::new(RedisCacheBackend::new(manager)),
                )
            }
            None => {
                log::warn!("REDIS_URL is not set, falling back to in-memory stores");
                (Arc::new(MemorySessionStore::new()), Arc::new(MemoryCacheBackend::new()))
            }
        };

    let cache = Arc::new(CacheCoordinator::new(
        cache_backend,
        directory.clone(),
        config::cache::ttl(),
    ));

    // Telegram transport
    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }
    let renderer = Arc::new(TelegramRenderer::new(bot.clone()));

    let deps = Deps {
        directory,
        cache,
        sessions,
        renderer: renderer.clone(),
        payments: renderer,
        links: Arc::new(PageLinkProvider::new()?),
    };

    // Warm the reference-data cache before accepting updates
    deps.cache.refresh_all().await;

    // Background jobs: daily cache refresh, link health check, statistic
    // broadcasts
    schedule::spawn_all(deps.clone());

    let dispatcher = Arc::new(Dispatcher::new(deps));
    let handler_deps = HandlerDeps::new(dispatcher);

    log::info!("Dispatcher starting");
    teloxide::dispatching::Dispatcher::builder(bot, schema(handler_deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown");
    Ok(())
}
