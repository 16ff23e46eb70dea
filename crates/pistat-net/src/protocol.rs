//! Wire format for the controller link.
//!
//! Each message is one JSON object per line (NDJSON). Outbound events carry
//! an optional `ack` id when the caller wants an acknowledgement; inbound
//! acknowledgements carry only `ack` and a reply payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pistat_types::error::{PistatError, Result};

/// Outbound event names.
pub mod outbound {
    pub const RUN_TASK: &str = "run_task";
    pub const EXECUTE_TERMINAL: &str = "execute_terminal";
    pub const ASSIGN_TASK: &str = "assign_task";
    pub const ASSIGN_NAME: &str = "assign_name";
    pub const CATALOG_REQUEST: &str = "catalog:request";
}

/// One framed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<String>,
}

impl Envelope {
    pub fn event(name: &str, payload: Value, ack: Option<&str>) -> Self {
        Self {
            event: Some(name.to_string()),
            payload,
            ack: ack.map(str::to_string),
        }
    }

    pub fn ack(request_id: &str, reply: &AckReply) -> Result<Self> {
        Ok(Self {
            event: None,
            payload: serde_json::to_value(reply)?,
            ack: Some(request_id.to_string()),
        })
    }

    /// Serialize as a single newline-terminated line.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Reply to an acknowledged request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Id the controller assigned to the request, when it differs from ours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// A device entry from a `stats_snapshot` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStats {
    pub pi_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub cpu_percent: Option<f64>,
    #[serde(default)]
    pub ram_percent: Option<f64>,
    #[serde(default)]
    pub ram_used_gb: Option<f64>,
    #[serde(default)]
    pub ram_total_gb: Option<f64>,
    #[serde(default)]
    pub active_task: Option<String>,
    #[serde(default = "default_online")]
    pub online: bool,
    #[serde(default)]
    pub assigned_task: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_online() -> bool {
    true
}

/// A runnable task advertised by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub command_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

fn default_level() -> String {
    "info".to_string()
}

/// Payload shared by every request-correlated event (`task_*`,
/// `terminal_*`) and by `pi_console`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub pi_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Which ledger a correlated event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Task,
    Terminal,
}

/// Lifecycle stage of a correlated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Started,
    Output,
    Finished,
    Error,
}

impl RequestPhase {
    /// Finished and error events end a request.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Connect,
    Disconnect,
    StatsSnapshot(Vec<DeviceStats>),
    TaskCatalog(Vec<TaskEntry>),
    Log(LogRecord),
    Request {
        kind: RequestKind,
        phase: RequestPhase,
        event: RequestEvent,
    },
    PiConsole(RequestEvent),
}

impl RemoteEvent {
    /// Build a typed event from its wire name and payload.
    pub fn from_wire(name: &str, payload: Value) -> Result<Self> {
        let request = |kind, phase, payload: Value| -> Result<Self> {
            Ok(Self::Request {
                kind,
                phase,
                event: serde_json::from_value(payload)?,
            })
        };
        match name {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "stats_snapshot" => Ok(Self::StatsSnapshot(serde_json::from_value(payload)?)),
            "task_catalog" => Ok(Self::TaskCatalog(serde_json::from_value(payload)?)),
            "log" => Ok(Self::Log(serde_json::from_value(payload)?)),
            "task_started" => request(RequestKind::Task, RequestPhase::Started, payload),
            "task_output" => request(RequestKind::Task, RequestPhase::Output, payload),
            "task_finished" => request(RequestKind::Task, RequestPhase::Finished, payload),
            "task_error" => request(RequestKind::Task, RequestPhase::Error, payload),
            "terminal_started" => request(RequestKind::Terminal, RequestPhase::Started, payload),
            "terminal_output" => request(RequestKind::Terminal, RequestPhase::Output, payload),
            "terminal_finished" => {
                request(RequestKind::Terminal, RequestPhase::Finished, payload)
            },
            "terminal_error" => request(RequestKind::Terminal, RequestPhase::Error, payload),
            "pi_console" => Ok(Self::PiConsole(serde_json::from_value(payload)?)),
            other => Err(PistatError::Protocol(format!("unknown event '{other}'"))),
        }
    }
}

/// Anything the channel can deliver to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(RemoteEvent),
    Ack { request_id: String, reply: AckReply },
}

impl Inbound {
    /// Decode one wire line.
    pub fn decode(line: &str) -> Result<Self> {
        let envelope = Envelope::decode(line)?;
        match (envelope.event, envelope.ack) {
            (Some(name), _) => Ok(Self::Event(RemoteEvent::from_wire(&name, envelope.payload)?)),
            (None, Some(request_id)) => {
                let reply = if envelope.payload.is_null() {
                    AckReply::default()
                } else {
                    serde_json::from_value(envelope.payload)?
                };
                Ok(Self::Ack { request_id, reply })
            },
            (None, None) => Err(PistatError::Protocol(
                "message has neither event nor ack".to_string(),
            )),
        }
    }
}
