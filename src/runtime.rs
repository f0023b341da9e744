use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::AgentClient;
use crate::error::RestartError;
use crate::events::{AppEvent, Effect};
use crate::session::SessionToken;

/// Carries out controller effects as tokio tasks and reports each outcome
/// back as an [`AppEvent`]. Tasks cannot be cancelled once spawned; the
/// controller drops their late results by epoch.
#[derive(Clone)]
pub struct Runtime {
    client: Arc<dyn AgentClient>,
    session: SessionToken,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl Runtime {
    pub fn new(
        client: Arc<dyn AgentClient>,
        session: SessionToken,
    ) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                client,
                session,
                tx,
            },
            rx,
        )
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    pub fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.spawn(effect);
        }
    }

    fn spawn(&self, effect: Effect) {
        let tx = self.tx.clone();

        match effect {
            Effect::Dispatch { epoch, text } => {
                let client = Arc::clone(&self.client);
                let session = self.session.clone();
                tokio::spawn(async move {
                    let result = client.send_utterance(&session, &text).await;
                    let _ = tx.send(AppEvent::ReplyReceived {
                        epoch,
                        text,
                        result,
                    });
                });
            }
            Effect::ScheduleRetry { epoch, text, delay } => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(AppEvent::RetryDue { epoch, text });
                });
            }
            Effect::RenderSegment {
                epoch,
                delay,
                segment,
            } => {
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = tx.send(AppEvent::SegmentDue { epoch, segment });
                });
            }
            Effect::Restart { epoch } => {
                let client = Arc::clone(&self.client);
                let session = self.session.clone();
                tokio::spawn(async move {
                    // A panicking client must still release the loading overlay.
                    let restart =
                        tokio::spawn(async move { client.restart_session(&session).await });
                    let result = match restart.await {
                        Ok(result) => result,
                        Err(join) => Err(RestartError::Aborted(join.to_string())),
                    };
                    let _ = tx.send(AppEvent::RestartFinished { epoch, result });
                });
            }
            Effect::ClearHighlight { button, delay } => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(AppEvent::HighlightExpired { button });
                });
            }
        }
    }

    /// Probe the webhook once, right away
    pub fn check_now(&self) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = client.check_connection().await;
            let _ = tx.send(AppEvent::StatusChecked(status));
        });
    }

    /// Probe at startup and then every `interval` until the receiver is gone
    pub fn spawn_health_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = client.check_connection().await;
                if tx.send(AppEvent::StatusChecked(status)).is_err() {
                    break;
                }
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{RestartBehavior, ScriptedClient};
    use super::*;
    use crate::controller::{Controller, Phase, test_support::controller};
    use crate::error::ClientError;
    use crate::events::{ConnectionStatus, ReplySegment, Sender};
    use tokio::time::Instant;

    /// Pump events into the controller until it has nothing outstanding
    async fn settle(
        controller: &mut Controller,
        runtime: &Runtime,
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
        mut on_event: impl FnMut(&AppEvent, &Controller),
    ) {
        while !controller.is_settled() {
            let event = rx.recv().await.unwrap();
            on_event(&event, controller);
            let effects = controller.handle(event);
            runtime.execute(effects);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hello_renders_two_segments_half_a_second_apart() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(vec![
            ReplySegment::text("hi"),
            ReplySegment::text("there"),
        ])]));
        let (runtime, mut rx) = Runtime::new(client.clone(), SessionToken::from("user_test"));
        let (_dir, mut controller) = controller();

        runtime.execute(controller.submit("hello"));
        assert_eq!(controller.messages().len(), 2);

        let mut segment_times = Vec::new();
        settle(&mut controller, &runtime, &mut rx, |event, _| {
            if matches!(event, AppEvent::SegmentDue { .. }) {
                segment_times.push(Instant::now());
            }
        })
        .await;

        let texts: Vec<_> = controller.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts[1..], ["hello", "hi", "there"]);
        assert_eq!(segment_times.len(), 2);
        assert!(segment_times[1] - segment_times[0] >= Duration::from_millis(500));
        assert_eq!(client.sent(), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failures_retry_with_delay_then_give_up() {
        let client = Arc::new(ScriptedClient::new(
            (0..4)
                .map(|_| Err(ClientError::Status { status: 500 }))
                .collect(),
        ));
        let (runtime, mut rx) = Runtime::new(client.clone(), SessionToken::from("u"));
        let (_dir, mut controller) = controller();
        let start = Instant::now();

        runtime.execute(controller.submit("hello"));
        settle(&mut controller, &runtime, &mut rx, |_, _| {}).await;

        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(client.sent().len(), 4);
        assert_eq!(controller.retry_count(), 0);
        let bot_notices = controller.messages()[2..]
            .iter()
            .filter(|m| m.sender == Sender::Bot)
            .count();
        assert_eq!(bot_notices, 4);
        assert_eq!(
            controller.messages().last().unwrap().text,
            controller.settings().messages.give_up_notice()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recovered_retry_renders_reply() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(ClientError::Transport("connection refused".into())),
            Ok(vec![ReplySegment::text("back online")]),
        ]));
        let (runtime, mut rx) = Runtime::new(client.clone(), SessionToken::from("u"));
        let (_dir, mut controller) = controller();

        runtime.execute(controller.submit("hello"));
        settle(&mut controller, &runtime, &mut rx, |_, _| {}).await;

        assert_eq!(controller.messages().last().unwrap().text, "back online");
        assert_eq!(controller.retry_count(), 0);
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_survives_panicking_restart() {
        let client = Arc::new(ScriptedClient::new(vec![]).with_restart(RestartBehavior::Panic));
        let (runtime, mut rx) = Runtime::new(client.clone(), SessionToken::from("u"));
        let (_dir, mut controller) = controller();

        controller.request_reset();
        runtime.execute(controller.confirm(true));
        assert!(controller.is_loading());
        settle(&mut controller, &runtime, &mut rx, |_, _| {}).await;

        assert!(!controller.is_loading());
        assert_eq!(
            controller.messages().last().unwrap().text,
            controller.settings().messages.restart_failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_reply_still_in_flight() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(vec![ReplySegment::text(
            "too late",
        )])]));
        let (runtime, mut rx) = Runtime::new(client.clone(), SessionToken::from("u"));
        let (_dir, mut controller) = controller();

        let dispatch = controller.submit("hello");
        controller.request_reset();
        // the confirmation gate is open while the request is in flight
        runtime.execute(dispatch);
        runtime.execute(controller.confirm(true));
        settle(&mut controller, &runtime, &mut rx, |_, _| {}).await;

        assert_eq!(client.restarts.load(std::sync::atomic::Ordering::Acquire), 1);
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(
            controller.messages()[0].text,
            controller.settings().messages.welcome
        );
    }

    #[tokio::test(start_paused = true)]
    async fn health_monitor_reports_immediately_and_periodically() {
        let client = Arc::new(ScriptedClient::new(vec![]).with_status(ConnectionStatus::Offline));
        let (runtime, mut rx) = Runtime::new(client, SessionToken::from("u"));

        let monitor = runtime.spawn_health_monitor(Duration::from_secs(30));
        let start = Instant::now();

        for _ in 0..2 {
            match rx.recv().await.unwrap() {
                AppEvent::StatusChecked(status) => assert_eq!(status, ConnectionStatus::Offline),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(start.elapsed() >= Duration::from_secs(30));
        monitor.abort();
    }
}
