use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::client::{AgentClient, WebhookClient};
use crate::config::Config;
use crate::controller::{Controller, ControllerSettings};
use crate::events::{AppEvent, ConnectionStatus, Message, Sender};
use crate::runtime::Runtime;
use crate::session::SessionToken;
use crate::storage::HistoryStore;

pub fn print_history(config: &Config) -> Result<()> {
    let store = HistoryStore::new(config.history_path());
    let messages = store.load();

    if messages.is_empty() {
        println!("📭 No conversation yet. Run 'chattr' to start chatting!");
        return Ok(());
    }

    println!("💬 Conversation history ({} messages):", messages.len());
    if let Some(path) = store.path() {
        println!("📍 {}", path.display());
    }
    println!("{}", "=".repeat(50));
    for message in &messages {
        print_message(message);
    }

    Ok(())
}

pub fn clear_history(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        print!("🗑️  Erase the saved conversation? [y/N] ");
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;

        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("👋 Nothing erased.");
            return Ok(());
        }
    }

    let store = HistoryStore::new(config.history_path());
    store.clear().context("Failed to erase conversation history")?;
    println!("✨ Conversation history erased.");
    Ok(())
}

/// Write the effective configuration so it can be edited by hand
pub fn init_config(config: &Config, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("⚠️  {} already exists. Use --force to overwrite.", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    config.save(path)?;
    println!("📝 Wrote configuration to {}", path.display());
    Ok(())
}

pub async fn ping(config: &Config) -> Result<()> {
    let client = WebhookClient::new(config).context("Failed to build HTTP client")?;

    println!("📡 Checking {} ...", client.base_url());
    match client.check_connection().await {
        ConnectionStatus::Online => println!("✅ {}", config.messages.online),
        _ => println!("❌ {}", config.messages.offline),
    }

    Ok(())
}

/// Send one utterance without opening the chat screen and print what the
/// agent answers, including retry notices. The exchange is not added to the
/// saved conversation.
pub async fn send_once(config: &Config, text: &str) -> Result<()> {
    let client: Arc<dyn AgentClient> =
        Arc::new(WebhookClient::new(config).context("Failed to build HTTP client")?);
    let session = SessionToken::generate();
    tracing::info!(session = %session, "one-shot send");

    let controller = one_shot_controller(config);

    let (runtime, rx) = Runtime::new(client, session);
    let replies = exchange(controller, &runtime, rx, text).await?;

    if replies.is_empty() {
        println!("👋 Nothing to send.");
    }
    for message in &replies {
        print_message(message);
    }

    Ok(())
}

/// Controller for `send`: no stagger, and a detached store so a running chat
/// window keeps sole ownership of the history file
fn one_shot_controller(config: &Config) -> Controller {
    let mut settings = ControllerSettings::from(config);
    settings.stagger = Duration::ZERO;
    Controller::new(settings, HistoryStore::detached())
}

/// Submit `text` and pump runtime events until the controller settles.
/// Returns the bot messages appended along the way.
async fn exchange(
    mut controller: Controller,
    runtime: &Runtime,
    mut rx: mpsc::UnboundedReceiver<AppEvent>,
    text: &str,
) -> Result<Vec<Message>> {
    let before = controller.messages().len();
    runtime.execute(controller.submit(text));

    while !controller.is_settled() {
        let event = rx
            .recv()
            .await
            .context("Runtime stopped before the agent answered")?;
        runtime.execute(controller.handle(event));
    }

    Ok(controller.messages()[before..]
        .iter()
        .filter(|m| m.sender == Sender::Bot)
        .cloned()
        .collect())
}

fn print_message(message: &Message) {
    let who = match message.sender {
        Sender::User => "👤 You",
        Sender::Bot => "🤖 Agent",
    };
    println!("{} ({})", who, message.time);
    for line in message.text.lines() {
        println!("   {}", line);
    }
    for button in &message.buttons {
        println!("   [ {} ] → {}", button.title, button.payload);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::controller;
    use crate::error::ClientError;
    use crate::events::ReplySegment;
    use crate::runtime::test_support::ScriptedClient;

    #[tokio::test(start_paused = true)]
    async fn exchange_collects_bot_replies() {
        let (_dir, controller) = controller();
        let (runtime, rx) = Runtime::new(
            Arc::new(ScriptedClient::new(vec![Ok(vec![
                ReplySegment::text("hi"),
                ReplySegment::text("there"),
            ])])),
            SessionToken::from("user_cli"),
        );

        let replies = exchange(controller, &runtime, rx, "hello").await.unwrap();
        let texts: Vec<_> = replies.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hi", "there"]);
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_reports_retries_and_give_up() {
        let (_dir, controller) = controller();
        let give_up = controller.settings().messages.give_up_notice();
        let failures = (0..4)
            .map(|_| Err(ClientError::Transport("refused".into())))
            .collect();
        let (runtime, rx) = Runtime::new(
            Arc::new(ScriptedClient::new(failures)),
            SessionToken::from("user_cli"),
        );

        let replies = exchange(controller, &runtime, rx, "hello").await.unwrap();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[3].text, give_up);
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_send_leaves_saved_history_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let saved = vec![Message::new(Sender::User, "from the chat window", "t")];
        HistoryStore::new(config.history_path()).save(&saved).unwrap();
        let before = std::fs::read_to_string(config.history_path()).unwrap();

        let (runtime, rx) = Runtime::new(
            Arc::new(ScriptedClient::new(vec![Ok(vec![ReplySegment::text("hi")])])),
            SessionToken::from("user_cli"),
        );
        let controller = one_shot_controller(&config);
        assert_eq!(controller.messages().len(), 1);

        let replies = exchange(controller, &runtime, rx, "hello").await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(std::fs::read_to_string(config.history_path()).unwrap(), before);
    }

    #[tokio::test]
    async fn blank_text_returns_nothing() {
        let (_dir, controller) = controller();
        let (runtime, rx) = Runtime::new(
            Arc::new(ScriptedClient::new(vec![])),
            SessionToken::from("user_cli"),
        );

        let replies = exchange(controller, &runtime, rx, "   ").await.unwrap();
        assert!(replies.is_empty());
    }
}
