//! The console's view of the controller link.
//!
//! Emits are fire-and-forget: the caller generates a request id, records it
//! in a ledger, and passes it as `ack`. Acknowledgements come back later
//! through [`EventChannel::poll`] as [`Inbound::Ack`], so the ledger is the
//! only correlation state.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use pistat_types::error::{PistatError, Result};

use crate::protocol::{AckReply, Inbound, RemoteEvent};

pub trait EventChannel {
    /// Send an event. `ack` asks the peer to reply with that request id.
    fn emit(&mut self, event: &str, payload: Value, ack: Option<&str>) -> Result<()>;

    /// Drain everything received since the last poll. Never blocks.
    fn poll(&mut self, now_ms: u64) -> Vec<Inbound>;

    fn is_connected(&self) -> bool;

    /// Release the underlying transport.
    fn close(&mut self) {}
}

/// Used when no controller is configured. Every emit fails.
#[derive(Debug, Default)]
pub struct OfflineChannel;

impl EventChannel for OfflineChannel {
    fn emit(&mut self, event: &str, _payload: Value, _ack: Option<&str>) -> Result<()> {
        Err(PistatError::Channel(format!(
            "not connected to controller (dropped '{event}')"
        )))
    }

    fn poll(&mut self, _now_ms: u64) -> Vec<Inbound> {
        Vec::new()
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// One recorded outbound emit.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub event: String,
    pub payload: Value,
    pub ack: Option<String>,
}

#[derive(Debug)]
struct LoopbackState {
    connected: bool,
    emitted: Vec<Emitted>,
    inbound: VecDeque<Inbound>,
}

/// In-memory channel. Clones share state, so a test can keep one handle
/// while the console owns another.
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    state: Rc<RefCell<LoopbackState>>,
}

impl LoopbackChannel {
    /// A connected loopback with nothing queued.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(LoopbackState {
                connected: true,
                emitted: Vec::new(),
                inbound: VecDeque::new(),
            })),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    pub fn push_event(&self, event: RemoteEvent) {
        self.state
            .borrow_mut()
            .inbound
            .push_back(Inbound::Event(event));
    }

    pub fn push_ack(&self, request_id: &str, reply: AckReply) {
        self.state.borrow_mut().inbound.push_back(Inbound::Ack {
            request_id: request_id.to_string(),
            reply,
        });
    }

    /// Everything emitted so far.
    pub fn emitted(&self) -> Vec<Emitted> {
        self.state.borrow().emitted.clone()
    }

    /// The most recent emit with the given event name.
    pub fn last_emit(&self, event: &str) -> Option<Emitted> {
        self.state
            .borrow()
            .emitted
            .iter()
            .rev()
            .find(|e| e.event == event)
            .cloned()
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventChannel for LoopbackChannel {
    fn emit(&mut self, event: &str, payload: Value, ack: Option<&str>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(PistatError::Channel("loopback disconnected".to_string()));
        }
        state.emitted.push(Emitted {
            event: event.to_string(),
            payload,
            ack: ack.map(str::to_string),
        });
        Ok(())
    }

    fn poll(&mut self, _now_ms: u64) -> Vec<Inbound> {
        self.state.borrow_mut().inbound.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
}
