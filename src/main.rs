use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{serializer::Json, ErasedStorage, InMemStorage, RedisStorage, Storage};
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shopbot::bot;
use shopbot::config::{LedgerBackend, ShopConfig};
use shopbot::db::{self, PgStore};
use shopbot::dialogue::Session;
use shopbot::ledger::{FileOrderLedger, OrderLedger};
use shopbot::localization::{init_localization, t_lang, DEFAULT_LOCALE};
use shopbot::messenger::TelegramMessenger;
use shopbot::shop::Shop;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging; teloxide's `log` records are picked up by the subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Shop Telegram Bot");

    let config = ShopConfig::from_env().context("Failed to load configuration")?;
    init_localization()?;

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::init_database_schema(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let storage: Arc<ErasedStorage<Session>> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis session storage");
            RedisStorage::open(url.as_str(), Json)
                .await
                .context("Failed to open Redis session storage")?
                .erase()
        }
        None => {
            warn!("REDIS_URL not set, sessions are kept in memory");
            InMemStorage::<Session>::new().erase()
        }
    };

    let ledger: Arc<dyn OrderLedger> = match config.ledger_backend {
        LedgerBackend::File => Arc::new(FileOrderLedger::open(&config.orders_file).await?),
        LedgerBackend::Postgres => store.clone(),
    };

    // Initialize the bot
    let bot = Bot::new(&config.bot_token);
    let messenger = Arc::new(TelegramMessenger::new(bot.clone(), &config.provider_token));

    let commands = vec![
        BotCommand::new("start", t_lang("command-start", Some(DEFAULT_LOCALE))),
        BotCommand::new("catalog", t_lang("command-catalog", Some(DEFAULT_LOCALE))),
        BotCommand::new("cart", t_lang("command-cart", Some(DEFAULT_LOCALE))),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    let shop = Arc::new(Shop::new(storage, messenger, store.clone(), store, ledger, config));

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![shop])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
