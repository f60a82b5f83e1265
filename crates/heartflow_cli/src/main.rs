use anyhow::{Context, Result};
use clap::Parser;
use heartflow_core::{
    GroupInfo, HeartflowConfig, InboundMessage, RelationshipStore, StreamId, UserInfo,
};
use heartflow_expression::MessageManager;
use heartflow_limbic::WillingManager;
use heartflow_memory::{InMemoryRelationshipStore, RelationshipManager, SqliteRelationshipStore};
use heartflow_reasoning::{
    create_client, ChatBot, ChatServices, Engagement, LlmClient, ScriptedClient,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod collaborators;

use collaborators::{ChatLog, FixedSchedule, KeywordInterest, NoMemory, SimpleMood};

const PLATFORM: &str = "terminal";

#[derive(Parser, Debug)]
#[command(name = "heartflow", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// SQLite file for relationships (overrides the config)
    #[arg(short, long)]
    db: Option<String>,

    /// Chat as a member of this group instead of privately
    #[arg(short, long)]
    group: Option<String>,

    /// Your user id
    #[arg(short, long, default_value = "1")]
    user: String,

    /// Your nickname
    #[arg(short, long, default_value = "网友")]
    nickname: String,

    /// Topics the bot cares about, comma separated
    #[arg(long, value_delimiter = ',')]
    interest: Vec<String>,

    /// Extra reply probability added to every message
    #[arg(long)]
    gain: Option<f64>,

    /// Write JSON logs to a daily rolling file in this directory
    #[arg(long, env = "HEARTFLOW_LOG_DIR")]
    log_dir: Option<String>,

    /// Use the offline scripted model instead of a real provider
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref());

    let mut config = HeartflowConfig::load_or_default(&args.config);
    if let Some(db) = &args.db {
        config.relationship.db_path = Some(db.clone());
    }
    if args.mock {
        config.llm.provider = "mock".to_string();
    }
    info!("Initializing {}...", config.bot.nickname);

    let store: Arc<dyn RelationshipStore> = match &config.relationship.db_path {
        Some(path) => {
            info!("Relationships stored in {}", path);
            Arc::new(SqliteRelationshipStore::new(path).await?)
        }
        None => {
            info!("No database configured, relationships are kept in memory");
            Arc::new(InMemoryRelationshipStore::new())
        }
    };
    let relationships = Arc::new(RelationshipManager::new(store));
    let loaded = relationships
        .load_all()
        .await
        .context("Failed to load relationships")?;
    info!("Loaded {} relationships", loaded);

    let llm: Arc<dyn LlmClient> = match create_client(&config.llm) {
        Ok(client) => client,
        Err(e) => {
            warn!("LLM provider unavailable ({:#}), falling back to offline replies", e);
            Arc::new(ScriptedClient::offline())
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let willing = Arc::new(WillingManager::new(config.willing.clone()));
    let outbound = Arc::new(MessageManager::new());
    let chat_log = Arc::new(ChatLog::new());

    let background = vec![
        willing.spawn_decay(shutdown_rx.clone()),
        outbound.spawn_sweeper(
            config.outbound.sweep_interval(),
            config.outbound.thinking_timeout(),
            shutdown_rx.clone(),
        ),
        relationships.spawn_autosave(config.relationship.autosave_interval(), shutdown_rx),
    ];

    let bot_name = config.bot.nickname.clone();
    let bot = ChatBot::new(
        config,
        ChatServices {
            llm,
            memory: Arc::new(NoMemory),
            interest: Arc::new(KeywordInterest::new(args.interest.clone())),
            mood: Arc::new(SimpleMood::new()),
            observer: chat_log.clone(),
            schedule: Arc::new(FixedSchedule("在电脑前摸鱼".to_string())),
            outbound: outbound.clone(),
            willing: willing.clone(),
            relationships: relationships.clone(),
        },
    );

    let user = UserInfo::new(PLATFORM, &args.user, &args.nickname);
    let group = args.group.as_ref().map(|id| GroupInfo {
        group_id: id.clone(),
        group_name: None,
    });
    let stream_id = StreamId::derive(PLATFORM, &user.user_id, group.as_ref());

    println!(
        "{} is online. Start a line with '@' to mention. Type '/state' to inspect, 'quit' to exit.",
        bot_name
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if trimmed == "/state" {
            print_state(&bot, &willing, &relationships, &stream_id, &user).await;
            continue;
        }

        let (at_bot, text) = match trimmed.strip_prefix('@') {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };
        let mut message = InboundMessage::text(user.clone(), group.clone(), text);
        message.at_bot = at_bot;
        message.probability_gain = args.gain;
        chat_log.record(&stream_id, message.render_line()).await;

        match bot.process_message(message).await {
            Ok(Engagement::Ignored { probability }) => {
                info!("Ignored (p={:.2})", probability);
            }
            Ok(Engagement::Replied { .. }) => {}
            Ok(other) => info!("No reply sent: {:?}", other),
            Err(e) => warn!("Message rejected: {:#}", e),
        }

        for set in outbound.drain_ready(&stream_id).await {
            for segment in &set.segments {
                println!("{}: {}", bot_name, segment.text);
                chat_log
                    .record(&stream_id, format!("{}: {}", bot_name, segment.text))
                    .await;
            }
        }
    }

    info!("Shutting down...");
    if let Some(heartflow) = bot.heartflow() {
        heartflow.shutdown().await;
    }
    let _ = shutdown_tx.send(true);
    for handle in background {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    let saved = relationships.save_all().await;
    info!("Saved {} relationships. Bye.", saved);
    Ok(())
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

/// Console logs go to stderr; with a log dir, JSON lines also go to a daily file.
fn init_tracing(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "heartflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    guard
}

async fn print_state(
    bot: &ChatBot,
    willing: &WillingManager,
    relationships: &RelationshipManager,
    stream_id: &StreamId,
    user: &UserInfo,
) {
    println!("willing: {:.2}", willing.get_willing(stream_id).await);
    match relationships.get(user).await {
        Ok(Some(rel)) => println!("relationship with {}: {:.2}", rel.nickname, rel.value),
        Ok(None) => println!("relationship with {}: none yet", user.nickname),
        Err(e) => println!("relationship lookup failed: {:#}", e),
    }
    let Some(heartflow) = bot.heartflow() else {
        println!("think flow disabled");
        return;
    };
    match heartflow.get_submind(stream_id).await {
        Some(mind) => {
            let state = mind.snapshot().await;
            println!("mind: {}", state.current_mind);
            println!("reflection rating: {} ({:?})", state.willing, state.activity);
        }
        None => println!("mind: not started"),
    }
}
