//! Conversation controller: the send / retry / reset state machine.
//!
//! The controller performs no I/O besides persisting the transcript. Every
//! operation returns the [`Effect`]s the runtime has to carry out, and the
//! outcomes come back through [`Controller::handle`]. Scheduled work carries
//! the epoch it was issued in; clearing or resetting bumps the epoch so that
//! late callbacks from the previous conversation are dropped.
//!
//! | from                    | trigger                         | to                 |
//! |-------------------------|---------------------------------|--------------------|
//! | Idle / RenderingReply   | submit (non-empty)              | Sending { 1 }      |
//! | Sending { n }           | reply with segments             | RenderingReply     |
//! | Sending { n }           | empty reply                     | Idle               |
//! | Sending { n }           | failure, retries left           | AwaitingReply { n }|
//! | AwaitingReply { n }     | retry timer fired               | Sending { n + 1 }  |
//! | Sending { n }           | failure, retries exhausted      | Idle               |
//! | RenderingReply          | last segment rendered           | Idle               |
//! | any                     | clear / reset                   | Idle               |

use chrono::Local;
use std::fmt::Write as _;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ClientError, RestartError};
use crate::events::{
    AppEvent, ButtonId, ConnectionStatus, Effect, Message, QuickReply, ReplySegment, Sender,
};
use crate::prompts::Messages;
use crate::storage::HistoryStore;

/// Where the current outgoing message is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Request `attempt` is in flight
    Sending { attempt: u32 },
    /// Request `attempt` failed and a retry is scheduled
    AwaitingReply { attempt: u32 },
    /// Reply segments are still being staggered in
    RenderingReply,
}

/// Action waiting for a yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Clear,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    count: u32,
    max: u32,
}

impl RetryState {
    pub fn new(max: u32) -> Self {
        Self { count: 0, max }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    fn can_retry(&self) -> bool {
        self.count < self.max
    }

    fn bump(&mut self) -> u32 {
        self.count = (self.count + 1).min(self.max);
        self.count
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub stagger: Duration,
    pub highlight: Duration,
    pub time_format: String,
    pub messages: Messages,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            stagger: config.stagger(),
            highlight: config.highlight(),
            time_format: config.time_format.clone(),
            messages: config.messages.clone(),
        }
    }
}

pub struct Controller {
    settings: ControllerSettings,
    store: HistoryStore,
    messages: Vec<Message>,
    phase: Phase,
    retry: RetryState,
    typing: bool,
    loading: bool,
    confirmation: Option<Confirmation>,
    epoch: u64,
    pending_segments: usize,
    next_button: u64,
    highlighted: Option<ButtonId>,
    status: ConnectionStatus,
    focus_requested: bool,
}

impl Controller {
    /// Seed the welcome message and restore the persisted transcript
    pub fn new(settings: ControllerSettings, store: HistoryStore) -> Self {
        let retry = RetryState::new(settings.max_retries);
        let mut controller = Self {
            settings,
            store,
            messages: Vec::new(),
            phase: Phase::Idle,
            retry,
            typing: false,
            loading: false,
            confirmation: None,
            epoch: 0,
            pending_segments: 0,
            next_button: 0,
            highlighted: None,
            status: ConnectionStatus::Unknown,
            focus_requested: true,
        };

        controller.messages.push(controller.welcome_message());

        let mut restored = controller.store.load();
        if restored
            .first()
            .is_some_and(|m| m.sender == Sender::Bot && m.text == controller.settings.messages.welcome)
        {
            controller.messages[0].time = restored.remove(0).time;
        }
        tracing::debug!(restored = restored.len(), "transcript restored");
        controller.messages.extend(restored);

        controller
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn retry(&self) -> RetryState {
        self.retry
    }

    #[cfg(test)]
    pub fn retry_count(&self) -> u32 {
        self.retry.count()
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pending_confirmation(&self) -> Option<Confirmation> {
        self.confirmation
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn highlighted(&self) -> Option<ButtonId> {
        self.highlighted
    }

    #[cfg(test)]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// True once no request, retry or staggered segment is outstanding
    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Idle && self.pending_segments == 0 && !self.loading
    }

    pub fn input_enabled(&self) -> bool {
        !self.loading
            && self.confirmation.is_none()
            && matches!(self.phase, Phase::Idle | Phase::RenderingReply)
    }

    /// Returns true once after the controller wants the composer focused
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// Quick replies of the most recent message that carries any
    pub fn latest_buttons(&self) -> &[QuickReply] {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.buttons.is_empty())
            .map(|m| m.buttons.as_slice())
            .unwrap_or(&[])
    }

    /// Send a user utterance
    pub fn submit(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if !self.input_enabled() {
            tracing::debug!(phase = ?self.phase, "submit ignored while input is disabled");
            return Vec::new();
        }

        self.append(Sender::User, text.to_string());
        self.retry.reset();
        self.phase = Phase::Sending { attempt: 1 };
        self.show_typing();

        vec![Effect::Dispatch {
            epoch: self.epoch,
            text: text.to_string(),
        }]
    }

    /// Press a rendered quick reply; its payload is sent as if typed
    pub fn press_button(&mut self, id: ButtonId) -> Vec<Effect> {
        let Some(button) = self
            .messages
            .iter()
            .flat_map(|m| m.buttons.iter())
            .find(|b| b.id == id)
            .cloned()
        else {
            tracing::debug!(?id, "press on unknown button");
            return Vec::new();
        };
        if !self.input_enabled() {
            return Vec::new();
        }

        let payload = if button.payload.trim().is_empty() {
            button.title
        } else {
            button.payload
        };

        self.highlighted = Some(id);
        let mut effects = vec![Effect::ClearHighlight {
            button: id,
            delay: self.settings.highlight,
        }];
        effects.extend(self.submit(&payload));
        effects
    }

    pub fn request_clear(&mut self) {
        if !self.loading {
            self.confirmation = Some(Confirmation::Clear);
        }
    }

    pub fn request_reset(&mut self) {
        if !self.loading {
            self.confirmation = Some(Confirmation::Reset);
        }
    }

    /// Resolve the pending yes/no question
    pub fn confirm(&mut self, accepted: bool) -> Vec<Effect> {
        let Some(confirmation) = self.confirmation.take() else {
            return Vec::new();
        };
        self.focus_requested = true;
        if !accepted {
            return Vec::new();
        }

        match confirmation {
            Confirmation::Clear => {
                self.clear();
                Vec::new()
            }
            Confirmation::Reset => self.begin_reset(),
        }
    }

    /// Feed an outcome reported by the runtime
    pub fn handle(&mut self, event: AppEvent) -> Vec<Effect> {
        match event {
            AppEvent::ReplyReceived {
                epoch,
                text,
                result,
            } => {
                if self.is_stale(epoch, "reply") {
                    return Vec::new();
                }
                self.on_reply(text, result)
            }
            AppEvent::RetryDue { epoch, text } => {
                if self.is_stale(epoch, "retry") {
                    return Vec::new();
                }
                self.on_retry_due(text)
            }
            AppEvent::SegmentDue { epoch, segment } => {
                if self.is_stale(epoch, "segment") {
                    return Vec::new();
                }
                self.render_segment(segment);
                Vec::new()
            }
            AppEvent::RestartFinished { epoch, result } => {
                if self.is_stale(epoch, "restart") {
                    return Vec::new();
                }
                self.finish_reset(result);
                Vec::new()
            }
            AppEvent::HighlightExpired { button } => {
                if self.highlighted == Some(button) {
                    self.highlighted = None;
                }
                Vec::new()
            }
            AppEvent::StatusChecked(status) => {
                if status != self.status {
                    tracing::info!(?status, "connection status changed");
                }
                self.status = status;
                Vec::new()
            }
        }
    }

    fn is_stale(&self, epoch: u64, what: &str) -> bool {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, what, "dropping stale event");
            return true;
        }
        false
    }

    fn on_reply(&mut self, text: String, result: Result<Vec<ReplySegment>, ClientError>) -> Vec<Effect> {
        let Phase::Sending { attempt } = self.phase else {
            tracing::debug!(phase = ?self.phase, "reply arrived while not sending");
            return Vec::new();
        };
        self.hide_typing();

        match result {
            Ok(segments) => {
                self.retry.reset();
                self.focus_requested = true;

                if segments.is_empty() {
                    let fallback = self.settings.messages.fallback.clone();
                    self.append(Sender::Bot, fallback);
                    self.phase = Phase::Idle;
                    return Vec::new();
                }

                tracing::debug!(segments = segments.len(), attempt, "rendering reply");
                self.phase = Phase::RenderingReply;
                self.pending_segments += segments.len();
                segments
                    .into_iter()
                    .enumerate()
                    .map(|(index, segment)| Effect::RenderSegment {
                        epoch: self.epoch,
                        delay: self.settings.stagger * index as u32,
                        segment,
                    })
                    .collect()
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    transport = err.is_transport(),
                    attempt,
                    retries = self.retry.count(),
                    "send failed"
                );

                if self.retry.can_retry() {
                    let count = self.retry.bump();
                    let notice = self
                        .settings
                        .messages
                        .retry_notice(count, self.retry.max());
                    self.append(Sender::Bot, notice);
                    self.phase = Phase::AwaitingReply { attempt };
                    vec![Effect::ScheduleRetry {
                        epoch: self.epoch,
                        text,
                        delay: self.settings.retry_delay,
                    }]
                } else {
                    let notice = self.settings.messages.give_up_notice();
                    self.append(Sender::Bot, notice);
                    self.retry.reset();
                    self.phase = Phase::Idle;
                    self.focus_requested = true;
                    Vec::new()
                }
            }
        }
    }

    fn on_retry_due(&mut self, text: String) -> Vec<Effect> {
        let Phase::AwaitingReply { attempt } = self.phase else {
            tracing::debug!(phase = ?self.phase, "retry fired while not awaiting");
            return Vec::new();
        };

        self.phase = Phase::Sending {
            attempt: attempt + 1,
        };
        self.show_typing();
        vec![Effect::Dispatch {
            epoch: self.epoch,
            text,
        }]
    }

    fn render_segment(&mut self, segment: ReplySegment) {
        if let Some(text) = segment.text {
            self.append(Sender::Bot, text);
        }

        if let Some(buttons) = segment.buttons.filter(|b| !b.is_empty()) {
            let first_id = self.next_button;
            self.next_button += buttons.len() as u64;
            match self.messages.last_mut() {
                Some(last) => last.buttons.extend(buttons.into_iter().enumerate().map(
                    |(offset, button)| QuickReply {
                        id: ButtonId(first_id + offset as u64),
                        title: button.title,
                        payload: button.payload,
                    },
                )),
                None => tracing::debug!("no message to attach buttons to"),
            }
        }

        if let Some(attachment) = segment.attachment {
            self.append(Sender::Bot, describe_attachment(&attachment));
        }

        self.pending_segments = self.pending_segments.saturating_sub(1);
        if self.pending_segments == 0 && self.phase == Phase::RenderingReply {
            self.phase = Phase::Idle;
        }
    }

    fn clear(&mut self) {
        self.epoch += 1;
        self.messages.truncate(1);
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to erase stored history");
        }
        self.reset_flags();
        tracing::info!("conversation cleared");
    }

    fn begin_reset(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.loading = true;
        self.phase = Phase::Idle;
        self.pending_segments = 0;
        self.hide_typing();
        vec![Effect::Restart { epoch: self.epoch }]
    }

    fn finish_reset(&mut self, result: Result<(), RestartError>) {
        self.loading = false;
        self.focus_requested = true;

        match result {
            Ok(()) => {
                self.messages.clear();
                let welcome = self.welcome_message();
                self.messages.push(welcome);
                if let Err(err) = self.store.clear() {
                    tracing::warn!(error = %err, "failed to erase stored history");
                }
                self.reset_flags();
                tracing::info!("conversation reset");
            }
            Err(err) => {
                tracing::error!(error = %err, "conversation reset failed");
                let notice = self.settings.messages.restart_failed.clone();
                self.append(Sender::Bot, notice);
            }
        }
    }

    fn reset_flags(&mut self) {
        self.retry.reset();
        self.hide_typing();
        self.phase = Phase::Idle;
        self.pending_segments = 0;
        self.highlighted = None;
        self.focus_requested = true;
    }

    fn show_typing(&mut self) {
        self.typing = true;
    }

    fn hide_typing(&mut self) {
        self.typing = false;
    }

    fn append(&mut self, sender: Sender, text: String) {
        let time = self.clock_time();
        tracing::debug!(sender = %sender, chars = text.chars().count(), "append message");
        self.messages.push(Message::new(sender, text, time));
        if let Err(err) = self.store.save(&self.messages) {
            tracing::warn!(error = %err, "failed to persist history");
        }
    }

    fn welcome_message(&self) -> Message {
        Message::new(
            Sender::Bot,
            self.settings.messages.welcome.clone(),
            self.clock_time(),
        )
    }

    fn clock_time(&self) -> String {
        let now = Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.settings.time_format)).is_err() {
            out = now.format("%H:%M").to_string();
        }
        out
    }
}

/// Text shown for an attachment: its URL when one can be found
fn describe_attachment(value: &serde_json::Value) -> String {
    if let Some(text) = value.as_str() {
        return format!("📎 {text}");
    }

    let url = ["/payload/src", "/payload/url", "/url", "/src", "/image"]
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(|v| v.as_str()));

    match url {
        Some(url) => format!("📎 {url}"),
        None => format!("📎 {value}"),
    }
}
