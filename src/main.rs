use std::error::Error;
use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::sync::mpsc;

use rust_dm_chat::common::{NewMessage, NewParticipant, ParticipantId, SessionCommand};
use rust_dm_chat::config::{self, AppConfig, BackendConfig};
use rust_dm_chat::network::{DetachedChannel, PushChannel};
use rust_dm_chat::storage::{MessageStore, ParticipantStore, RestStore, SqliteStore};
use rust_dm_chat::sync::{ChatSession, IdentityResolver};
use rust_dm_chat::ui::TerminalApp;
use rust_dm_chat::ui::components::sidebar;

#[derive(Parser)]
#[command(
    name = "rust_dm_chat",
    version,
    about = "Direct-message chat client with optimistic sends and realtime sync"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file with default settings
    InitConfig,
    /// Provision a participant for an external identity
    Register {
        external_id: String,
        display_name: String,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// List everyone you can message
    Users {
        #[arg(long = "as", value_name = "EXTERNAL_ID")]
        identity: String,
        /// Only names containing this text (case-insensitive)
        #[arg(long)]
        search: Option<String>,
    },
    /// Send a single message and exit
    Send {
        #[arg(long = "as", value_name = "EXTERNAL_ID")]
        identity: String,
        #[arg(long, value_name = "PARTICIPANT_ID")]
        to: String,
        text: String,
    },
    /// Interactive chat session
    Chat {
        #[arg(long = "as", value_name = "EXTERNAL_ID")]
        identity: String,
        /// Open this conversation right away
        #[arg(long, value_name = "PARTICIPANT_ID")]
        with: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    if let Command::InitConfig = cli.command {
        config::save_config(&cli.config, &AppConfig::default())?;
        println!("Wrote default config to {}", cli.config);
        return Ok(());
    }

    let app_config = config::load_effective_config(&cli.config);
    match app_config.backend.clone() {
        BackendConfig::Sqlite { path } => {
            log::info!("Using SQLite store at {path}");
            let store = SqliteStore::open(&path)?;
            let channel = store.push_channel();
            run_command(cli.command, Arc::new(store), channel, &app_config).await
        }
        BackendConfig::Rest { url, api_key } => {
            log::info!("Using hosted store at {url} (no realtime channel)");
            let store = RestStore::new(url, api_key)?;
            run_command(cli.command, Arc::new(store), DetachedChannel, &app_config).await
        }
    }
}

async fn run_command<S, C>(
    command: Command,
    store: Arc<S>,
    channel: C,
    app_config: &AppConfig,
) -> Result<(), Box<dyn Error>>
where
    S: MessageStore + ParticipantStore,
    C: PushChannel,
{
    match command {
        Command::InitConfig => {}
        Command::Register {
            external_id,
            display_name,
            avatar,
        } => {
            let participant = store
                .provision_participant(NewParticipant {
                    external_id,
                    display_name,
                    avatar_url: avatar,
                })
                .await?;
            println!("{}", participant.id);
        }
        Command::Users { identity, search } => {
            let me = IdentityResolver::new(Arc::clone(&store), identity)
                .resolve()
                .await?;
            let query = search.unwrap_or_default();
            let participants: Vec<_> = store
                .list_participants(&me)
                .await?
                .into_iter()
                .filter(|participant| participant.matches_search(&query))
                .collect();
            sidebar::render(&mut io::stdout().lock(), &participants)?;
        }
        Command::Send { identity, to, text } => {
            let me = IdentityResolver::new(Arc::clone(&store), identity)
                .resolve()
                .await?;
            let message = store
                .insert(NewMessage::new(me, ParticipantId::new(to), &text)?)
                .await?;
            println!("{}", message.id);
        }
        Command::Chat { identity, with } => {
            run_chat(store, channel, identity, with, app_config).await?;
        }
    }
    Ok(())
}

async fn run_chat<S, C>(
    store: Arc<S>,
    channel: C,
    identity: String,
    with: Option<String>,
    app_config: &AppConfig,
) -> Result<(), Box<dyn Error>>
where
    S: MessageStore + ParticipantStore,
    C: PushChannel,
{
    // Front end -> session
    let (cmd_tx, cmd_rx) = mpsc::channel(app_config.channel_capacity);
    // Session -> front end
    let (event_tx, event_rx) = mpsc::channel(app_config.channel_capacity);

    let session = ChatSession::new(
        store,
        channel,
        identity,
        app_config.identity.retry_policy(),
        event_tx,
        cmd_rx,
    );
    let session_task = tokio::spawn(async move {
        if let Err(err) = session.run().await {
            log::error!("Chat session terminated: {err}");
        }
    });

    if let Some(peer) = with {
        cmd_tx
            .send(SessionCommand::SelectPeer(Some(ParticipantId::new(peer))))
            .await?;
    }

    TerminalApp::new(cmd_tx, event_rx).run().await?;
    session_task.await?;
    Ok(())
}
