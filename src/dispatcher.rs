//! Dispatch loop — routes inbound messages to per-user workers.
//!
//! Each session key gets its own mailbox and worker task, so turns for one
//! user run strictly in arrival order while different users proceed in
//! parallel. A worker retires after sitting idle; the next message for that
//! user spawns a fresh one, which first waits for its predecessor to finish.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage};
use crate::config::{BotConfig, IntakeCatalog};
use crate::error;
use crate::registration::{Effect, SessionStore, StateMachine, TransitionKind};

/// How often stale sessions are swept, at most.
const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

struct Mailbox {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// Drives the registration machine from channel input.
#[derive(Clone)]
pub struct Dispatcher {
    machine: Arc<StateMachine>,
    store: Arc<SessionStore>,
    channels: Arc<ChannelManager>,
    session_idle_timeout: Duration,
    worker_idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(machine: StateMachine, channels: ChannelManager, config: &BotConfig) -> Self {
        Self {
            machine: Arc::new(machine),
            store: Arc::new(SessionStore::new()),
            channels: Arc::new(channels),
            session_idle_timeout: config.session_idle_timeout,
            worker_idle_timeout: config.worker_idle_timeout,
        }
    }

    /// Load the catalog named by `config` and build the machine around it.
    pub fn from_config(config: &BotConfig, channels: ChannelManager) -> error::Result<Self> {
        let catalog = IntakeCatalog::load(config.catalog_path.as_deref())?;
        let machine = StateMachine::new(catalog, config.unexpected_input);
        Ok(Self::new(machine, channels, config))
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn channels(&self) -> &ChannelManager {
        &self.channels
    }

    /// Run one turn for `message`.
    ///
    /// The session is only written back once the reply has been handed to
    /// the channel; if sending fails the stored session is left as it was.
    pub async fn handle_message(&self, message: &IncomingMessage) -> error::Result<TransitionKind> {
        let key = message.session_key();
        let session = self.store.get(&key).await;
        let from = session.state;

        let transition = self.machine.handle(session, message);
        let kind = transition.kind;

        tracing::debug!(
            user = %key,
            name = message.user_name.as_deref().unwrap_or("-"),
            from = %from,
            to = %transition.session.state,
            kind = %kind,
            "Registration turn"
        );

        if kind == TransitionKind::Ignored {
            return Ok(kind);
        }

        if let Effect::Reply(response) = transition.effect {
            self.channels.respond(message, response).await?;
        }

        if transition.session.is_blank() {
            self.store.clear(&key).await;
        } else {
            self.store.put(transition.session).await;
        }

        Ok(kind)
    }

    /// Run until Ctrl+C or until every channel stream ends.
    pub async fn run(self) -> error::Result<()> {
        let mut message_stream = self.channels.start_all().await?;

        // Spawn session pruning task
        let store = Arc::clone(&self.store);
        let session_idle_timeout = self.session_idle_timeout;
        let prune_every = session_idle_timeout
            .min(MAX_PRUNE_INTERVAL)
            .max(Duration::from_secs(1));
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(prune_every);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                store.prune_stale(session_idle_timeout).await;
            }
        });

        tracing::info!(channels = ?self.channels.names(), "Registration bot ready and listening");

        let mut mailboxes: HashMap<String, Mailbox> = HashMap::new();

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            mailboxes.retain(|_, mailbox| !mailbox.handle.is_finished());
            self.route(&mut mailboxes, message);
        }

        // Closing the mailboxes lets each worker drain what it already has
        pruning_handle.abort();
        for (key, mailbox) in mailboxes {
            drop(mailbox.tx);
            if let Err(e) = mailbox.handle.await {
                tracing::warn!(user = %key, "Worker ended abnormally: {}", e);
            }
        }

        self.channels.shutdown_all().await?;
        Ok(())
    }

    /// Hand `message` to its user's worker, spawning one if needed.
    fn route(&self, mailboxes: &mut HashMap<String, Mailbox>, message: IncomingMessage) {
        let key = message.session_key();

        let (message, previous) = match mailboxes.remove(&key) {
            Some(mailbox) => match mailbox.tx.send(message) {
                Ok(()) => {
                    mailboxes.insert(key, mailbox);
                    return;
                }
                // The worker closed its mailbox while retiring
                Err(mpsc::error::SendError(message)) => (message, Some(mailbox.handle)),
            },
            None => (message, None),
        };

        let mailbox = self.spawn_worker(key.clone(), previous);
        if mailbox.tx.send(message).is_err() {
            tracing::error!(user = %key, "Fresh worker mailbox is closed, dropping message");
        }
        mailboxes.insert(key, mailbox);
    }

    fn spawn_worker(&self, key: String, previous: Option<JoinHandle<()>>) -> Mailbox {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let dispatcher = self.clone();

        let handle = tokio::spawn(async move {
            // Keep per-user ordering across a worker hand-over
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            loop {
                match tokio::time::timeout(dispatcher.worker_idle_timeout, rx.recv()).await {
                    Ok(Some(message)) => dispatcher.process(&message).await,
                    Ok(None) => break,
                    Err(_) => {
                        rx.close();
                        while let Ok(message) = rx.try_recv() {
                            dispatcher.process(&message).await;
                        }
                        break;
                    }
                }
            }

            tracing::debug!(user = %key, "Worker retired");
        });

        Mailbox { tx, handle }
    }

    async fn process(&self, message: &IncomingMessage) {
        match self.handle_message(message).await {
            Ok(kind) => {
                tracing::trace!(user = %message.session_key(), kind = %kind, "Turn finished");
            }
            Err(e) => {
                tracing::error!(
                    user = %message.session_key(),
                    message_id = %message.id,
                    "Error handling message: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::stream;
    use tokio::sync::Mutex;

    use super::*;
    use crate::channels::{Channel, MessageStream, OutgoingResponse};
    use crate::config::{IntakeCatalog, UnexpectedInputPolicy};
    use crate::error::{ChannelError, Error};
    use crate::registration::{RegistrationState, prompts};

    /// Replays a fixed script and records every reply.
    struct Scripted {
        inbound: Vec<IncomingMessage>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Channel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(stream::iter(self.inbound.clone())))
        }

        async fn respond(
            &self,
            msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            // Yield so interleaving between users is possible
            tokio::task::yield_now().await;
            self.sent
                .lock()
                .await
                .push((msg.user_id.clone(), response.content().to_string()));
            Ok(())
        }
    }

    fn dispatcher(channel: Arc<Scripted>, worker_idle: Duration) -> Dispatcher {
        let mut channels = ChannelManager::new();
        channels.add(channel);
        let config = BotConfig {
            worker_idle_timeout: worker_idle,
            ..Default::default()
        };
        let machine = StateMachine::new(IntakeCatalog::default(), UnexpectedInputPolicy::Reprompt);
        Dispatcher::new(machine, channels, &config)
    }

    fn msg(user: &str, text: &str) -> IncomingMessage {
        IncomingMessage::new("scripted", user, text)
    }

    #[tokio::test]
    async fn run_keeps_per_user_order_across_users() {
        let inbound = vec![
            msg("a", prompts::MENU_REGISTRATION),
            msg("b", prompts::MENU_REGISTRATION),
            msg("a", prompts::ROLE_PROGRAMMER),
            msg("b", prompts::ROLE_FOUNDER),
            msg("a", "Иван"),
            msg("b", "Анна"),
        ];
        let channel = Arc::new(Scripted {
            inbound,
            sent: Mutex::new(Vec::new()),
        });
        let d = dispatcher(Arc::clone(&channel), Duration::from_secs(30));
        let store = Arc::clone(d.store());

        d.run().await.unwrap();

        let sent = channel.sent.lock().await;
        let replies_for = |user: &str| -> Vec<String> {
            sent.iter()
                .filter(|(u, _)| u == user)
                .map(|(_, text)| text.clone())
                .collect()
        };
        assert_eq!(
            replies_for("a"),
            vec![
                prompts::ASK_ROLE.to_string(),
                prompts::ask_name_for(prompts::ROLE_PROGRAMMER),
                prompts::ASK_AGE.to_string(),
            ]
        );
        assert_eq!(
            replies_for("b"),
            vec![
                prompts::ASK_ROLE.to_string(),
                prompts::ask_name_for(prompts::ROLE_FOUNDER),
                prompts::ASK_PROJECT.to_string(),
            ]
        );

        assert_eq!(
            store.get("scripted:a").await.state,
            RegistrationState::ProgrammerAge
        );
        assert_eq!(
            store.get("scripted:b").await.state,
            RegistrationState::FounderProject
        );
    }

    #[tokio::test]
    async fn retired_worker_is_replaced_in_order() {
        let channel = Arc::new(Scripted {
            inbound: Vec::new(),
            sent: Mutex::new(Vec::new()),
        });
        let d = dispatcher(Arc::clone(&channel), Duration::from_millis(10));
        let mut mailboxes = HashMap::new();

        d.route(&mut mailboxes, msg("a", prompts::MENU_REGISTRATION));
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The first worker has retired by now
        d.route(&mut mailboxes, msg("a", prompts::ROLE_FOUNDER));

        let mailbox = mailboxes.remove("scripted:a").unwrap();
        drop(mailbox.tx);
        mailbox.handle.await.unwrap();

        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, prompts::ask_name_for(prompts::ROLE_FOUNDER));
    }

    #[tokio::test]
    async fn blank_sessions_are_not_stored() {
        let channel = Arc::new(Scripted {
            inbound: Vec::new(),
            sent: Mutex::new(Vec::new()),
        });
        let d = dispatcher(channel, Duration::from_secs(30));

        d.handle_message(&msg("a", prompts::MENU_REGISTRATION))
            .await
            .unwrap();
        assert_eq!(d.store().len().await, 1);

        let kind = d.handle_message(&msg("a", "/cancel")).await.unwrap();
        assert_eq!(kind, TransitionKind::Reset);
        assert!(d.store().is_empty().await);
    }

    #[test]
    fn from_config_reports_unreadable_catalog() {
        let config = BotConfig {
            catalog_path: Some("/nonexistent/intake-catalog.json".into()),
            ..Default::default()
        };
        let err = Dispatcher::from_config(&config, ChannelManager::new()).err();
        assert!(matches!(err, Some(Error::Config(_))));

        let d = Dispatcher::from_config(&BotConfig::default(), ChannelManager::new()).unwrap();
        assert_eq!(d.worker_idle_timeout, BotConfig::default().worker_idle_timeout);
    }
}
