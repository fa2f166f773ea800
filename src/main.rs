use lootlord::cache::MessageCache;
use lootlord::commands;
use lootlord::config::Config;
use lootlord::core::{bootstrap, EventSource, InitOptions, PluginRegistry};
use lootlord::db::Database;
use lootlord::discord::{intents, Handler, SerenityClient};
use serenity::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);

    let store = Database::new(&config.database_url)
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", config.database_url, e))?;
    store.execute_init()?;

    let cache = MessageCache::new(config.message_cache_size);
    let client = Arc::new(SerenityClient::new(&config.discord_token, cache.clone()));
    let events = EventSource::new(config.prefix.clone());

    let options = InitOptions {
        config: config.clone(),
        store,
        client: client.clone(),
        events: events.clone(),
        registry: Arc::new(PluginRegistry::new()),
    };
    let plugins = bootstrap(&options, &commands::select(&config)?)?;
    info!("Loaded {} plugins", plugins.len());

    let mut gateway = Client::builder(&config.discord_token, intents())
        .event_handler(Handler::new(client, cache, events))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = gateway.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
