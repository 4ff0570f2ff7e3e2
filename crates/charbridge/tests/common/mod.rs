//! Shared harness for relay integration tests: a scripted AI backend plus a
//! fake gateway wired through the real manager, handler, and registry.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use charbridge::access::AuthorizedSet;
use charbridge::backend::{ChatBackend, ChatClient, ChatError, NewChat};
use charbridge::gateway::{
    GatewayCommand, GatewayEvent, GatewayManager, MessageContent, MessageReceivedData,
    RelayHandler, Sender,
};
use charbridge::session::SessionRegistry;

// ============================================================================
// Scripted Backend
// ============================================================================

/// Backend double with queued send outcomes and call counters.
///
/// An empty send queue echoes the prompt back.
pub struct ScriptedBackend {
    send_script: StdMutex<VecDeque<Result<String, ChatError>>>,
    create_calls: AtomicUsize,
    close_calls: AtomicUsize,
    chat_counter: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            send_script: StdMutex::new(VecDeque::new()),
            create_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            chat_counter: AtomicUsize::new(0),
        })
    }

    pub fn script_send(&self, outcome: Result<String, ChatError>) {
        self.send_script.lock().unwrap().push_back(outcome);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

/// Local newtype so we can implement the foreign `ChatBackend` trait for a
/// shared `Arc<ScriptedBackend>` without tripping the orphan rule in this
/// integration-test crate.
pub struct BackendHandle(pub Arc<ScriptedBackend>);

#[async_trait]
impl ChatBackend for BackendHandle {
    async fn connect(&self) -> Result<Arc<dyn ChatClient>, ChatError> {
        Ok(Arc::new(ScriptedClient {
            backend: self.0.clone(),
        }))
    }
}

struct ScriptedClient {
    backend: Arc<ScriptedBackend>,
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn create_chat(&self, _character_id: &str) -> Result<NewChat, ChatError> {
        self.backend.create_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.backend.chat_counter.fetch_add(1, Ordering::SeqCst);
        Ok(NewChat {
            chat_id: format!("chat_{}", n),
            greeting: Some("greetings".to_string()),
        })
    }

    async fn send_message(
        &self,
        _character_id: &str,
        _chat_id: &str,
        text: &str,
    ) -> Result<String, ChatError> {
        self.backend
            .send_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo:{}", text)))
    }

    async fn close(&self) -> Result<(), ChatError> {
        self.backend.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// The relay wired up end-to-end, minus the real Telegram gateway: events go
/// in through `evt_tx`, commands come out through `cmd_rx`.
pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub registry: Arc<SessionRegistry>,
    pub gateways: GatewayManager,
    pub evt_tx: mpsc::Sender<GatewayEvent>,
    pub cmd_rx: mpsc::Receiver<GatewayCommand>,
}

/// Build a harness authorizing user id 42 and username "alice".
pub async fn harness() -> Harness {
    let backend = ScriptedBackend::new();
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(BackendHandle(backend.clone())),
        "char_1",
    ));

    let gateways = GatewayManager::new();
    let authorized = AuthorizedSet::new(
        HashSet::from([42]),
        HashSet::from(["alice".to_string()]),
    );
    let handler = RelayHandler::new(authorized, registry.clone(), gateways.clone());
    gateways.set_handler(Arc::new(handler)).await;

    let (cmd_rx, evt_tx) = gateways.register("telegram").await;

    Harness {
        backend,
        registry,
        gateways,
        evt_tx,
        cmd_rx,
    }
}

impl Harness {
    /// Inject an inbound text message event.
    pub async fn deliver(&self, message_id: &str, sender_id: &str, username: Option<&str>, text: &str) {
        let event = GatewayEvent::MessageReceived(Box::new(MessageReceivedData {
            message_id: message_id.to_string(),
            chat_id: "100".to_string(),
            sender: Sender {
                id: sender_id.to_string(),
                username: username.map(str::to_string),
                display_name: None,
            },
            content: MessageContent::Text {
                text: text.to_string(),
            },
            reply_to: None,
            timestamp: None,
        }));
        self.evt_tx.send(event).await.unwrap();
    }

    /// Wait for the next outbound SendMessage, skipping typing indicators.
    pub async fn next_reply(&mut self) -> (String, Option<String>) {
        loop {
            let command = tokio::time::timeout(Duration::from_secs(2), self.cmd_rx.recv())
                .await
                .expect("timed out waiting for a reply")
                .expect("command channel closed");

            match command {
                GatewayCommand::SendMessage {
                    content, reply_to, ..
                } => return (content, reply_to),
                GatewayCommand::SendTyping { .. } => continue,
                other => panic!("unexpected command: {:?}", other),
            }
        }
    }

    /// Assert that no command at all is emitted within the window.
    pub async fn expect_silence(&mut self) {
        let outcome =
            tokio::time::timeout(Duration::from_millis(200), self.cmd_rx.recv()).await;
        if let Ok(Some(command)) = outcome {
            panic!("expected silence, got: {:?}", command);
        }
    }
}
