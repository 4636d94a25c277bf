//! Mock Protocol Engine for Testing
//!
//! Provides [`MockTransport`] and [`MockHandle`] so the state machine,
//! reconnect policy, and dispatcher can be exercised without a real
//! messaging network. Tests inject engine events through the transport and
//! assert on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::gateway::engine::{
    ChatAddress, EngineError, EngineEvent, EngineHandle, EngineResult, EngineSession,
    EngineTransport, SendOptions,
};
use crate::session::SessionAuthState;

/// Mock transport: opens [`MockHandle`]s and keeps the event senders so
/// tests can drive the event stream.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

#[derive(Default)]
struct MockTransportState {
    opens: u32,
    fail_next_open: Option<String>,
    handles: Vec<Arc<MockHandle>>,
    event_senders: Vec<mpsc::Sender<EngineEvent>>,
    last_auth: Option<SessionAuthState>,
    last_device_name: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` call fail with `message`.
    pub fn fail_next_open(&self, message: &str) {
        self.state.lock().unwrap().fail_next_open = Some(message.to_string());
    }

    /// How many handles have been opened over this transport's lifetime.
    pub fn open_count(&self) -> u32 {
        self.state.lock().unwrap().opens
    }

    /// The most recently opened handle, for assertions.
    pub fn latest_handle(&self) -> Option<Arc<MockHandle>> {
        self.state.lock().unwrap().handles.last().cloned()
    }

    /// The auth state handed to the most recent `open`, as the engine sees it.
    pub fn last_auth(&self) -> Option<SessionAuthState> {
        self.state.lock().unwrap().last_auth.clone()
    }

    /// The device name from the most recent session bundle.
    pub fn last_device_name(&self) -> Option<String> {
        self.state.lock().unwrap().last_device_name.clone()
    }

    /// Emit an engine event on the most recently opened handle's stream.
    pub async fn emit(&self, event: EngineEvent) {
        let sender = self
            .state
            .lock()
            .unwrap()
            .event_senders
            .last()
            .cloned()
            .expect("no handle opened");
        // A closed receiver just means the session was torn down already.
        let _ = sender.send(event).await;
    }
}

#[async_trait]
impl EngineTransport for MockTransport {
    type Handle = MockHandle;

    async fn open(
        &self,
        session: EngineSession,
    ) -> EngineResult<(Arc<MockHandle>, mpsc::Receiver<EngineEvent>)> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;

        if let Some(message) = state.fail_next_open.take() {
            return Err(EngineError::Connect(message));
        }

        let (tx, rx) = mpsc::channel(16);
        let handle = Arc::new(MockHandle::new());
        state.handles.push(Arc::clone(&handle));
        state.event_senders.push(tx);
        state.last_auth = Some(session.auth);
        state.last_device_name = Some(session.device_name);

        Ok((handle, rx))
    }
}

/// A recorded outbound send.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub address: ChatAddress,
    pub body: String,
    pub options: SendOptions,
}

/// Mock connection handle recording every call made against it.
pub struct MockHandle {
    state: Mutex<MockHandleState>,
}

#[derive(Default)]
struct MockHandleState {
    sent: Vec<SentMessage>,
    registered: HashMap<String, ChatAddress>,
    fail_resolve: Option<String>,
    fail_send: Option<String>,
    logout_calls: u32,
    terminations: Vec<String>,
    next_message_id: u64,
}

impl MockHandle {
    fn new() -> Self {
        Self {
            state: Mutex::new(MockHandleState::default()),
        }
    }

    /// Register `digits` as reachable, resolving to `address`.
    pub fn register_number(&self, digits: &str, address: &str) {
        self.state
            .lock()
            .unwrap()
            .registered
            .insert(digits.to_string(), ChatAddress(address.to_string()));
    }

    /// Make every `resolve_address` call fail with `message`.
    pub fn fail_resolve(&self, message: &str) {
        self.state.lock().unwrap().fail_resolve = Some(message.to_string());
    }

    /// Make every `send_text` call fail with `message`.
    pub fn fail_send(&self, message: &str) {
        self.state.lock().unwrap().fail_send = Some(message.to_string());
    }

    /// Sent messages, for assertions.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn logout_count(&self) -> u32 {
        self.state.lock().unwrap().logout_calls
    }

    /// Reasons passed to `terminate`, in call order.
    pub fn terminations(&self) -> Vec<String> {
        self.state.lock().unwrap().terminations.clone()
    }
}

#[async_trait]
impl EngineHandle for MockHandle {
    async fn send_text(
        &self,
        address: &ChatAddress,
        body: &str,
        options: SendOptions,
    ) -> EngineResult<Value> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = state.fail_send.clone() {
            return Err(EngineError::Send(message));
        }

        state.next_message_id += 1;
        let id = state.next_message_id;
        state.sent.push(SentMessage {
            address: address.clone(),
            body: body.to_string(),
            options,
        });

        Ok(json!({ "id": format!("msg-{id}"), "to": address.0 }))
    }

    async fn resolve_address(&self, digits: &str) -> EngineResult<Option<ChatAddress>> {
        let state = self.state.lock().unwrap();

        if let Some(message) = state.fail_resolve.clone() {
            return Err(EngineError::Resolve(message));
        }

        Ok(state.registered.get(digits).cloned())
    }

    async fn logout(&self) -> EngineResult<()> {
        self.state.lock().unwrap().logout_calls += 1;
        Ok(())
    }

    async fn terminate(&self, reason: &str) {
        self.state
            .lock()
            .unwrap()
            .terminations
            .push(reason.to_string());
    }
}
