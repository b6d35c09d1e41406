//! Wadesk CLI - WhatsApp inbox client for the Wadesk CRM
//!
//! A terminal client for agents: inbox listing, reading and sending,
//! and a live watch mode driven by the push channels.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wadesk::api::{self, ApiClient, AttachmentUpload};
use wadesk::config::Config;
use wadesk::conversation::{ConversationSnapshot, ConversationStore};
use wadesk::inbox::{InboxReconciler, InboxSnapshot};
use wadesk::models::{ConversationId, ConversationSummary, Message, SenderRole};
use wadesk::realtime::ConnectionSupervisor;
use wadesk::SessionContext;

#[derive(Parser)]
#[command(name = "wadesk")]
#[command(about = "WhatsApp inbox client for the Wadesk CRM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write backend URL and agent identity to the config file
    Init {
        /// REST base URL, e.g. https://crm.example.com/api
        #[arg(long)]
        api_base_url: String,

        /// WebSocket base URL; derived from the REST base when omitted
        #[arg(long)]
        ws_base_url: Option<String>,

        /// Tenant id
        #[arg(long)]
        tenant: String,

        /// Department id
        #[arg(long)]
        department: String,

        /// Agent user id
        #[arg(long)]
        user: String,
    },

    /// Show the stored configuration
    Status,

    /// List the inbox
    Inbox {
        /// Maximum number of conversations to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Read a conversation's messages
    Read {
        /// Conversation ID (from `inbox` output)
        conversation_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a text message
    Send {
        /// Conversation ID (from `inbox` output)
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Send a file
    SendFile {
        /// Conversation ID (from `inbox` output)
        #[arg(short, long)]
        to: String,

        /// Path of the file to send
        path: std::path::PathBuf,

        /// Caption shown with the file
        #[arg(short, long)]
        caption: Option<String>,

        /// MIME type of the file
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },

    /// Turn the AI assistant on or off for a conversation
    ToggleAi {
        /// Conversation ID (from `inbox` output)
        conversation_id: String,

        /// New state: on or off
        state: String,
    },

    /// Register as an active agent in a conversation
    Join {
        /// Conversation ID (from `inbox` output)
        conversation_id: String,
    },

    /// Leave a conversation
    Leave {
        /// Conversation ID (from `inbox` output)
        conversation_id: String,
    },

    /// Follow the inbox (and optionally one conversation) live
    Watch {
        /// Conversation ID to follow alongside the inbox
        #[arg(short, long)]
        conversation: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Init {
            api_base_url,
            ws_base_url,
            tenant,
            department,
            user,
        } => {
            let config = Config {
                api_base_url: Some(api_base_url),
                ws_base_url,
                tenant_id: Some(tenant),
                department_id: Some(department),
                user_id: Some(user),
            };
            // Validate before writing so a typo is caught here, not on the
            // first fetch.
            config.api_base()?;
            config.ws_base()?;
            config.session()?;
            config.save()?;
            println!("Config written to {}", Config::config_path()?.display());
        }
        Commands::Status => {
            let config = Config::load()?;
            println!("Config file: {}", Config::config_path()?.display());
            println!("  api_base_url:  {}", field(&config.api_base_url));
            println!("  ws_base_url:   {}", field(&config.ws_base_url));
            println!("  tenant_id:     {}", field(&config.tenant_id));
            println!("  department_id: {}", field(&config.department_id));
            println!("  user_id:       {}", field(&config.user_id));
        }
        Commands::Inbox { limit } => {
            tracing::info!("Fetching inbox...");
            let (client, session) = client_and_session()?;
            let items = api::fetch_inbox(&client, &session).await?;
            print_inbox(&items, limit);
        }
        Commands::Read {
            conversation_id,
            limit,
        } => {
            let (client, _) = client_and_session()?;
            let id = ConversationId::from(conversation_id.as_str());
            let history = api::fetch_conversation(&client, &id).await?;
            print_messages(&history.messages, limit);
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            let (client, session) = client_and_session()?;
            let id = ConversationId::from(to.as_str());
            api::send_message(&client, &session, &id, &message).await?;
            println!("Message sent.");
        }
        Commands::SendFile {
            to,
            path,
            caption,
            mime,
        } => {
            let (client, session) = client_and_session()?;
            let id = ConversationId::from(to.as_str());
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string());
            let upload = AttachmentUpload {
                file_name,
                mime_type: mime,
                bytes,
                caption,
            };
            api::send_attachment(&client, &session, &id, &upload).await?;
            println!("File sent.");
        }
        Commands::ToggleAi {
            conversation_id,
            state,
        } => {
            let enabled = match state.as_str() {
                "on" => true,
                "off" => false,
                other => bail!("expected 'on' or 'off', got '{}'", other),
            };
            let (client, _) = client_and_session()?;
            let id = ConversationId::from(conversation_id.as_str());
            api::toggle_ai(&client, &id, enabled).await?;
            println!("AI {} for conversation {}.", state, id);
        }
        Commands::Join { conversation_id } => {
            let (client, session) = client_and_session()?;
            let id = ConversationId::from(conversation_id.as_str());
            api::join_conversation(&client, &session, &id).await?;
            println!("Joined conversation {}.", id);
        }
        Commands::Leave { conversation_id } => {
            let (client, session) = client_and_session()?;
            let id = ConversationId::from(conversation_id.as_str());
            api::leave_conversation(&client, &session, &id).await?;
            println!("Left conversation {}.", id);
        }
        Commands::Watch { conversation } => {
            watch(conversation).await?;
        }
    }

    Ok(())
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

fn client_and_session() -> Result<(ApiClient, SessionContext)> {
    let config = Config::load()?;
    Ok((ApiClient::new(config.api_base()?), config.session()?))
}

fn print_inbox(items: &[ConversationSummary], limit: usize) {
    println!("\nInbox:");
    println!("{:-<60}", "");

    if items.is_empty() {
        println!("  (no conversations)");
        return;
    }

    for item in items.iter().take(limit) {
        let unread = if item.unread_count > 0 {
            format!(" [{} unread]", item.unread_count)
        } else {
            String::new()
        };
        println!("{}{}", item.display_name, unread);
        println!("  ID: {}", item.id);
        if !item.phone.is_empty() {
            println!("  Phone: {}", item.phone);
        }
        if let Some(ref at) = item.last_message_at {
            println!("  Last: {}", at);
        }
        if let Some(ref preview) = item.last_message {
            if !preview.trim().is_empty() {
                println!("  > {}", preview.trim());
            }
        }
        if let Some(ref agent) = item.assigned_agent {
            println!("  Agent: {}", agent);
        }
        println!();
    }
}

fn print_messages(messages: &[Message], limit: usize) {
    if messages.is_empty() {
        println!("(no messages)");
        return;
    }

    let skip = messages.len().saturating_sub(limit);
    for msg in &messages[skip..] {
        let when = msg
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let who = match msg.sender {
            SenderRole::Patient => "patient",
            SenderRole::Agent => "agent",
            SenderRole::Bot => "bot",
            SenderRole::System => "*",
        };
        println!("[{}] {}: {}", when, who, msg.text);
        for att in &msg.attachments {
            println!("    ({} {} bytes {})", att.name, att.size, att.mime_type);
        }
    }
}

/// Follow the inbox and optionally one conversation until Ctrl-C.
async fn watch(conversation: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let client = Arc::new(ApiClient::new(config.api_base()?));
    let ws_base = config.ws_base()?;
    let session = config.session()?;

    // A terminal session is always "visible and focused"; entering watch
    // mode is what puts us on the chat screen.
    let supervisor = Arc::new(ConnectionSupervisor::new());
    supervisor.set_route(true);

    let reconciler = InboxReconciler::spawn(client.clone(), session.clone(), &supervisor, &ws_base)?;
    let mut inbox_snaps = WatchStream::new(reconciler.snapshots());

    let store = ConversationStore::new(client, session, supervisor.clone(), ws_base);
    let mut conv_snaps = WatchStream::new(store.snapshots());
    if let Some(ref id) = conversation {
        store.switch_to(ConversationId::from(id.as_str())).await?;
    }

    tracing::info!("Watching for updates... (Ctrl-C to stop)");
    loop {
        tokio::select! {
            Some(snap) = inbox_snaps.next() => print_inbox_snapshot(&snap),
            Some(snap) = conv_snaps.next() => print_conversation_snapshot(&snap),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    store.close().await;
    reconciler.dispose();
    println!("\nStopped.");
    Ok(())
}

fn print_inbox_snapshot(snap: &InboxSnapshot) {
    let mode = if snap.live { "live" } else { "polling" };
    println!("\n=== Inbox ({} conversations, {}) ===", snap.items.len(), mode);
    if let Some(ref err) = snap.last_error {
        println!("  (showing last good list; fetch failed: {})", err);
    }
    print_inbox(&snap.items, 10);
}

fn print_conversation_snapshot(snap: &ConversationSnapshot) {
    let Some(ref id) = snap.conversation_id else {
        return;
    };
    let ai = if snap.is_ai_enabled { "on" } else { "off" };
    println!("\n=== Conversation {} (AI {}) ===", id, ai);
    if let Some(ref err) = snap.last_error {
        println!("  (showing last good log; fetch failed: {})", err);
    }
    print_messages(&snap.messages, 10);
}
