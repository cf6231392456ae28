//! Serve loop: poll the chat transport, dispatch, reply.
//!
//! Updates are handled one at a time, in order. A failed poll is logged and
//! retried after the reconnect delay; a failed reply is logged and dropped.

use robo_dispatch::Dispatcher;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::BotResult;
use crate::telegram::{ChatTransport, Update};

pub struct Bot<T: ChatTransport> {
    transport: T,
    dispatcher: Dispatcher,
    reconnect_delay: Duration,
    offset: i64,
}

impl<T: ChatTransport> Bot<T> {
    pub fn new(transport: T, dispatcher: Dispatcher, reconnect_delay: Duration) -> Self {
        Self {
            transport,
            dispatcher,
            reconnect_delay,
            offset: 0,
        }
    }

    /// Next `update_id` to request.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Poll once and handle every update received. Returns how many updates
    /// were consumed.
    pub async fn poll_once(&mut self) -> BotResult<usize> {
        let updates = self.transport.poll(self.offset).await?;
        let count = updates.len();
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            self.handle_update(&update).await;
        }
        Ok(count)
    }

    /// Handle a single update. Anything but a text message is ignored.
    pub async fn handle_update(&self, update: &Update) {
        let Some(message) = &update.message else {
            debug!(update_id = update.update_id, "ignoring non-message update");
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };

        let chat_id = message.chat.id;
        let Some(reply) = self.dispatcher.handle_message(chat_id, text).await else {
            return;
        };

        if let Err(e) = self.transport.send_text(chat_id, &reply).await {
            warn!(chat_id, error = %e, "failed to send reply");
        }
    }

    /// Confirm handled updates so a restart does not receive them again.
    async fn confirm_offset(&self) {
        if self.offset == 0 {
            return;
        }
        if let Err(e) = self.transport.acknowledge(self.offset).await {
            warn!(offset = self.offset, error = %e, "failed to confirm handled updates");
        }
    }

    /// Serve until `shutdown` resolves. Handled updates are confirmed before
    /// returning.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!("serving chat commands");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(offset = self.offset, "shutdown requested");
                    self.confirm_offset().await;
                    return;
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        error!(error = %e, "polling failed");
                        info!(
                            delay = self.reconnect_delay.as_secs(),
                            "retrying in {} seconds", self.reconnect_delay.as_secs()
                        );
                        tokio::time::sleep(self.reconnect_delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::telegram::{Chat, Message};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use robo_auth::AllowList;
    use robo_client::{RemoteError, RemoteResult, RobotApi};
    use robo_proto::{ResetDescriptor, ResetOutcome, ServerRecord};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted transport: each poll pops one batch; sends are recorded.
    #[derive(Default)]
    struct FakeTransport {
        batches: Mutex<VecDeque<BotResult<Vec<Update>>>>,
        polled_offsets: Mutex<Vec<i64>>,
        acknowledged: Mutex<Vec<i64>>,
        sent: Mutex<Vec<(i64, String)>>,
        fail_sends: bool,
    }

    #[async_trait]
    impl ChatTransport for FakeTransport {
        async fn poll(&self, offset: i64) -> BotResult<Vec<Update>> {
            self.polled_offsets.lock().push(offset);
            let next = self.batches.lock().pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    // idle long-poll
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn send_text(&self, chat_id: i64, text: &str) -> BotResult<()> {
            if self.fail_sends {
                return Err(BotError::Transport("send failed".to_string()));
            }
            self.sent.lock().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn acknowledge(&self, offset: i64) -> BotResult<()> {
            self.acknowledged.lock().push(offset);
            Ok(())
        }
    }

    /// Robot API that is never expected to succeed.
    struct DownRobot;

    #[async_trait]
    impl RobotApi for DownRobot {
        async fn list_servers(&self) -> RemoteResult<Vec<ServerRecord>> {
            Err(RemoteError::Status { status: 502, body: String::new() })
        }
        async fn reset_options(&self, _ip: &str) -> RemoteResult<ResetDescriptor> {
            Err(RemoteError::Status { status: 502, body: String::new() })
        }
        async fn execute_reset(&self, _ip: &str, _t: &str) -> RemoteResult<ResetOutcome> {
            Err(RemoteError::Status { status: 502, body: String::new() })
        }
    }

    fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat { id: chat_id },
                from: None,
                text: Some(text.to_string()),
            }),
        }
    }

    fn bot(transport: FakeTransport) -> Bot<FakeTransport> {
        let dispatcher = Dispatcher::new(Arc::new(DownRobot), AllowList::new([42]));
        Bot::new(transport, dispatcher, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_poll_once_replies_and_advances_offset() {
        let transport = FakeTransport::default();
        transport.batches.lock().push_back(Ok(vec![
            text_update(10, 42, "/help"),
            text_update(11, 42, "/list"),
        ]));
        let mut bot = bot(transport);

        assert_eq!(bot.poll_once().await.expect("poll"), 2);
        assert_eq!(bot.offset(), 12);

        let sent = bot.transport().sent.lock().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], (42, robo_dispatch::HELP_TEXT.to_string()));
        assert_eq!(sent[1], (42, robo_dispatch::REMOTE_FAILURE_TEXT.to_string()));
    }

    #[tokio::test]
    async fn test_unauthorized_and_non_text_updates_get_no_reply() {
        let transport = FakeTransport::default();
        transport.batches.lock().push_back(Ok(vec![
            text_update(1, 7, "/help"),
            Update { update_id: 2, message: None },
            Update {
                update_id: 3,
                message: Some(Message {
                    message_id: 3,
                    chat: Chat { id: 42 },
                    from: None,
                    text: None,
                }),
            },
        ]));
        let mut bot = bot(transport);

        bot.poll_once().await.expect("poll");
        assert_eq!(bot.offset(), 4);
        assert!(bot.transport().sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_processing() {
        let transport = FakeTransport {
            fail_sends: true,
            ..FakeTransport::default()
        };
        transport.batches.lock().push_back(Ok(vec![
            text_update(1, 42, "/help"),
            text_update(2, 42, "/help"),
        ]));
        let mut bot = bot(transport);
        assert_eq!(bot.poll_once().await.expect("poll"), 2);
        assert_eq!(bot.offset(), 3);
    }

    #[tokio::test]
    async fn test_run_survives_poll_errors_until_shutdown() {
        let transport = FakeTransport::default();
        {
            let mut batches = transport.batches.lock();
            batches.push_back(Err(BotError::Transport("network down".to_string())));
            batches.push_back(Ok(vec![text_update(1, 42, "/help")]));
        }
        let mut bot = bot(transport);

        bot.run(tokio::time::sleep(Duration::from_millis(200))).await;

        assert_eq!(bot.offset(), 2);
        let sent = bot.transport().sent.lock().clone();
        assert_eq!(sent, vec![(42, robo_dispatch::HELP_TEXT.to_string())]);
        let offsets = bot.transport().polled_offsets.lock().clone();
        assert_eq!(&offsets[..2], &[0, 0]);
        assert_eq!(bot.transport().acknowledged.lock().clone(), vec![2]);
    }

    #[tokio::test]
    async fn test_shutdown_without_updates_confirms_nothing() {
        let mut bot = bot(FakeTransport::default());
        bot.run(tokio::time::sleep(Duration::from_millis(20))).await;
        assert!(bot.transport().acknowledged.lock().is_empty());
    }
}
