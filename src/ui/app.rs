//! Terminal session: owns the screen and drives the event loop

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::ExecutableCommand;
use crossterm::event::{DisableFocusChange, EnableFocusChange, Event, EventStream};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::client::{AgentClient, WebhookClient};
use crate::config::Config;
use crate::controller::{Controller, ControllerSettings};
use crate::runtime::Runtime;
use crate::session::SessionToken;
use crate::storage::HistoryStore;
use crate::ui::conversation::{ConversationAction, ConversationManager};

const REDRAW_INTERVAL: Duration = Duration::from_millis(150);

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    pub fn init() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableFocusChange)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(DisableFocusChange);
        let _ = io::stdout().execute(LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Open the chat window and run until the user quits
pub async fn run(config: Config) -> Result<()> {
    let client: Arc<dyn AgentClient> =
        Arc::new(WebhookClient::new(&config).context("Failed to build HTTP client")?);
    let session = SessionToken::generate();
    tracing::info!(session = %session, base_url = %config.base_url, "starting chat");

    let (runtime, mut rx) = Runtime::new(client, session);
    let controller = Controller::new(
        ControllerSettings::from(&config),
        HistoryStore::new(config.history_path()),
    );
    let monitor = runtime.spawn_health_monitor(config.health_interval());
    let mut manager = ConversationManager::new(controller, runtime);

    let mut tui = Tui::init().context("Failed to initialise terminal")?;
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    let outcome = loop {
        if let Err(err) = tui.terminal.draw(|frame| manager.render(frame)) {
            break Err(err).context("Failed to draw frame");
        }

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if manager.handle_key(key) == ConversationAction::Exit {
                        break Ok(());
                    }
                }
                Some(Ok(Event::FocusGained)) => manager.on_focus_gained(),
                Some(Ok(Event::FocusLost)) => manager.on_focus_lost(),
                Some(Ok(_)) => {}
                Some(Err(err)) => break Err(err).context("Failed to read terminal input"),
                None => break Ok(()),
            },
            Some(event) = rx.recv() => manager.handle_app_event(event),
            _ = redraw.tick() => manager.on_tick(),
        }
    };

    monitor.abort();
    drop(tui);
    tracing::info!("chat closed");
    outcome
}
