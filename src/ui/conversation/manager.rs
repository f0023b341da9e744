use crate::controller::{Confirmation, Controller};
use crate::events::{AppEvent, ButtonId, ConnectionStatus};
use crate::runtime::Runtime;
use crate::ui::conversation::{
    ConfirmDialog, ConversationComposer, ConversationHistory, HelpPopup, LoadingOverlay,
    ParsedCommand, SlashCommand, composer::ConversationResult, get_help_text,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Glues the controller, the effect runtime and the widgets together
pub struct ConversationManager {
    controller: Controller,
    runtime: Runtime,
    composer: ConversationComposer,
    selected_button: Option<ButtonId>,
    show_help: bool,
    tick: u64,
}

impl ConversationManager {
    pub fn new(controller: Controller, runtime: Runtime) -> Self {
        let mut manager = Self {
            controller,
            runtime,
            composer: ConversationComposer::new("Type a message, / for commands"),
            selected_button: None,
            show_help: false,
            tick: 0,
        };
        manager.sync_input();
        manager
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Feed a runtime outcome into the controller and run what follows
    pub fn handle_app_event(&mut self, event: AppEvent) {
        let effects = self.controller.handle(event);
        self.runtime.execute(effects);
        self.sync_input();
    }

    /// The terminal regained focus; refresh the connection badge
    pub fn on_focus_gained(&mut self) {
        self.runtime.check_now();
        self.composer.set_focus(true);
    }

    pub fn on_focus_lost(&mut self) {
        self.composer.set_focus(false);
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d')) {
            return ConversationAction::Exit;
        }

        if self.show_help {
            self.show_help = false;
            return ConversationAction::None;
        }

        if self.controller.pending_confirmation().is_some() {
            let answer = match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
                _ => None,
            };
            if let Some(accepted) = answer {
                if accepted {
                    self.composer.clear();
                    self.selected_button = None;
                }
                let effects = self.controller.confirm(accepted);
                self.runtime.execute(effects);
                self.sync_input();
            }
            return ConversationAction::None;
        }

        if self.controller.is_loading() {
            return ConversationAction::None;
        }

        if ctrl {
            match key.code {
                KeyCode::Char('l') => self.controller.request_clear(),
                KeyCode::Char('r') => self.controller.request_reset(),
                _ => {}
            }
            self.sync_input();
            return ConversationAction::None;
        }

        if self.composer.is_empty() {
            match key.code {
                KeyCode::Tab => {
                    self.cycle_button();
                    return ConversationAction::None;
                }
                KeyCode::Esc if self.selected_button.is_some() => {
                    self.selected_button = None;
                    return ConversationAction::None;
                }
                KeyCode::Enter => {
                    if let Some(id) = self.selected_button.take() {
                        let effects = self.controller.press_button(id);
                        self.runtime.execute(effects);
                        self.sync_input();
                        return ConversationAction::None;
                    }
                }
                _ => {}
            }
        }

        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.selected_button = None;
                let effects = self.controller.submit(&input);
                self.runtime.execute(effects);
                self.sync_input();
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Clear => self.controller.request_clear(),
            SlashCommand::Reset => self.controller.request_reset(),
            SlashCommand::Status => self.runtime.check_now(),
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Quit => return ConversationAction::Exit,
        }
        self.sync_input();
        ConversationAction::None
    }

    fn cycle_button(&mut self) {
        let buttons = self.controller.latest_buttons();
        if buttons.is_empty() {
            self.selected_button = None;
            return;
        }

        let next = match self
            .selected_button
            .and_then(|id| buttons.iter().position(|b| b.id == id))
        {
            Some(index) => (index + 1) % buttons.len(),
            None => 0,
        };
        self.selected_button = Some(buttons[next].id);
    }

    fn sync_input(&mut self) {
        self.composer.set_enabled(self.controller.input_enabled());
        if self.controller.take_focus_request() {
            self.composer.set_focus(true);
        }
        if let Some(id) = self.selected_button {
            if !self.controller.latest_buttons().iter().any(|b| b.id == id) {
                self.selected_button = None;
            }
        }
    }

    /// Render the conversation UI components
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
            ])
            .split(area);

        frame.render_widget(self.header(chunks[0].width), chunks[0]);

        let history = ConversationHistory::new(self.controller.messages())
            .selected(self.selected_button)
            .highlighted(self.controller.highlighted())
            .typing(self.controller.is_typing())
            .tick(self.tick);
        frame.render_widget(history, chunks[1]);

        frame.render_widget(&self.composer, chunks[2]);

        self.render_overlays(frame, area);
    }

    fn render_overlays(&self, frame: &mut Frame, area: Rect) {
        let messages = &self.controller.settings().messages;

        if self.controller.is_loading() {
            frame.render_widget(
                LoadingOverlay {
                    label: &messages.restarting,
                    tick: self.tick,
                },
                area,
            );
        }

        if let Some(confirmation) = self.controller.pending_confirmation() {
            let question = match confirmation {
                Confirmation::Clear => &messages.confirm_clear,
                Confirmation::Reset => &messages.confirm_reset,
            };
            frame.render_widget(ConfirmDialog { question }, area);
        }

        if self.show_help {
            let text = get_help_text();
            frame.render_widget(HelpPopup { text: &text }, area);
        }
    }

    fn header(&self, width: u16) -> Paragraph<'static> {
        let messages = &self.controller.settings().messages;
        let (label, color) = match self.controller.status() {
            ConnectionStatus::Online => (messages.online.clone(), Color::Green),
            ConnectionStatus::Offline => (messages.offline.clone(), Color::Red),
            ConnectionStatus::Unknown => (messages.checking.clone(), Color::DarkGray),
        };

        let title = format!(" chattr · {}", self.runtime.session());
        let retry = self.controller.retry();
        let retry_note = if retry.count() > 0 {
            format!("retry {}/{}  ", retry.count(), retry.max())
        } else {
            String::new()
        };
        let badge = format!("● {label} ");
        let used = title.chars().count() + retry_note.chars().count() + badge.chars().count();
        let padding = " ".repeat((width as usize).saturating_sub(used));

        Paragraph::new(Line::from(vec![
            Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(padding),
            Span::styled(retry_note, Style::default().fg(Color::Yellow)),
            Span::styled(badge, Style::default().fg(color)),
        ]))
    }
}
