//! Command trait, registry, resolver, and dispatch.
//!
//! The dispatcher is the console's error-isolation boundary: a handler that
//! returns `Err` or panics produces one `Command '<name>' failed: ...` line
//! and a `false` result, and nothing it asked the console to do survives.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use pistat_net::channel::EventChannel;
use pistat_net::catalog::Catalog;
use pistat_net::ledger::{PendingLedger, PendingRequest, new_request_id};
use pistat_net::protocol::RequestKind;
use pistat_types::channel::ChannelId;
use pistat_types::entropy::Entropy;
use pistat_types::error::Result;
use pistat_types::output::{LineOptions, LineStyle, OutputSink};
use pistat_types::time::TimeService;
use pistat_ui::{LogBook, StatsBoard, ThemeState};

/// Identifier of an active hold.
pub type HoldId = u32;

/// The one two-word alias in the grammar: `clear logs` -> `clearlogs`.
const CLEAR_LOGS: &str = "clearlogs";

/// A parsed command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedInvocation {
    /// Internal command name. `None` for empty input, which callers treat
    /// as a silent no-op.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub tokens: Vec<String>,
    /// The tokens joined by single spaces.
    pub label: String,
    /// The first token exactly as typed.
    pub invoked_name: String,
}

/// Turn tokens into an invocation.
pub fn resolve(tokens: &[String]) -> ResolvedInvocation {
    let Some((first, rest)) = tokens.split_first() else {
        return ResolvedInvocation::default();
    };
    let name = first.to_lowercase();
    let label = tokens.join(" ");

    if name == "clear" && rest.first().is_some_and(|t| t.eq_ignore_ascii_case("logs")) {
        return ResolvedInvocation {
            command: Some(CLEAR_LOGS.to_string()),
            args: rest[1..].to_vec(),
            tokens: tokens.to_vec(),
            label,
            invoked_name: first.clone(),
        };
    }

    ResolvedInvocation {
        command: Some(name),
        args: rest.to_vec(),
        tokens: tokens.to_vec(),
        label,
        invoked_name: first.clone(),
    }
}

/// Work a handler asks the console to do after it returns successfully.
///
/// Handlers cannot reach the hold table or the router directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleAction {
    /// Stop every hold and report on `channel`.
    ReleaseHolds { channel: ChannelId },
    SelectChannel(ChannelId),
}

/// Services shared by every command.
pub struct Environment {
    pub time: Box<dyn TimeService>,
    pub entropy: Entropy,
    pub stats: StatsBoard,
    pub logs: LogBook,
    pub catalog: Catalog,
    pub theme: ThemeState,
    pub remote: Box<dyn EventChannel>,
    /// Task runs and assignments.
    pub task_ledger: PendingLedger,
    /// Remote shell commands.
    pub terminal_ledger: PendingLedger,
    /// Monotonic time the console booted.
    pub boot_ms: u64,
    pub hold_interval_ms: u64,
    actions: Vec<ConsoleAction>,
}

impl Environment {
    pub fn new(
        time: Box<dyn TimeService>,
        remote: Box<dyn EventChannel>,
        entropy: Entropy,
        stats: StatsBoard,
        logs: LogBook,
        hold_interval_ms: u64,
    ) -> Self {
        let boot_ms = time.monotonic_ms();
        Self {
            time,
            entropy,
            stats,
            logs,
            catalog: Catalog::new(),
            theme: ThemeState::default(),
            remote,
            task_ledger: PendingLedger::new(),
            terminal_ledger: PendingLedger::new(),
            boot_ms,
            hold_interval_ms,
            actions: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.time.monotonic_ms()
    }

    pub fn ledger(&self, kind: RequestKind) -> &PendingLedger {
        match kind {
            RequestKind::Task => &self.task_ledger,
            RequestKind::Terminal => &self.terminal_ledger,
        }
    }

    pub fn ledger_mut(&mut self, kind: RequestKind) -> &mut PendingLedger {
        match kind {
            RequestKind::Task => &mut self.task_ledger,
            RequestKind::Terminal => &mut self.terminal_ledger,
        }
    }

    /// Take the actions queued by successful invocations.
    pub fn take_actions(&mut self) -> Vec<ConsoleAction> {
        std::mem::take(&mut self.actions)
    }
}

/// A request to send to the controller with acknowledgement tracking.
#[derive(Debug, Clone)]
pub struct OutboundRequest<'r> {
    pub ledger: RequestKind,
    pub event: &'static str,
    pub device: Option<&'r str>,
    /// Task id or command text, used for labels.
    pub subject: &'r str,
    /// `false` for requests whose only reply is the acknowledgement.
    pub awaits_events: bool,
    /// Event payload. `request_id` is added automatically.
    pub payload: Value,
}

/// Per-invocation view handed to a handler.
pub struct ExecutionContext<'a> {
    pub raw: String,
    pub input: String,
    pub command: String,
    /// A private copy; changing it never affects the caller's invocation.
    pub args: Vec<String>,
    pub from_hold: bool,
    pub hold_id: Option<HoldId>,
    /// Channel this invocation's output is tagged with.
    pub channel: ChannelId,
    /// Channel selected in the console when the invocation started.
    pub active_channel: ChannelId,
    pub registry: &'a CommandRegistry,
    pub env: &'a mut Environment,
    sink: &'a mut dyn OutputSink,
    prefix: String,
    issued: Vec<(RequestKind, String)>,
    actions: Vec<ConsoleAction>,
}

impl ExecutionContext<'_> {
    pub fn write(&mut self, text: &str) {
        self.write_styled(text, LineStyle::Normal);
    }

    pub fn write_styled(&mut self, text: &str, style: LineStyle) {
        let line = format!("{}{text}", self.prefix);
        self.sink
            .write(&line, LineOptions::on(self.channel.clone()).styled(style));
    }

    pub fn clear(&mut self) {
        self.sink.clear();
    }

    /// Queue a console action; dropped if this invocation fails.
    pub fn request(&mut self, action: ConsoleAction) {
        self.actions.push(action);
    }

    /// Record a pending request and send it. Returns the request id.
    ///
    /// If the send fails the ledger entry is removed again.
    pub fn issue(&mut self, req: OutboundRequest<'_>) -> Result<String> {
        let request_id = new_request_id();
        let mut payload = req.payload;
        if let Value::Object(ref mut map) = payload {
            map.insert("request_id".to_string(), Value::String(request_id.clone()));
        }
        let now = self.env.now_ms();
        self.env.ledger_mut(req.ledger).insert(PendingRequest {
            request_id: request_id.clone(),
            device_id: req.device.map(str::to_string),
            subject: req.subject.to_string(),
            issued_at_ms: now,
            acknowledged: false,
            awaits_events: req.awaits_events,
        });
        if let Err(e) = self.env.remote.emit(req.event, payload, Some(request_id.as_str())) {
            self.env.ledger_mut(req.ledger).forget(&request_id);
            return Err(e);
        }
        log::debug!("issued {} as {request_id}", req.event);
        self.issued.push((req.ledger, request_id.clone()));
        Ok(request_id)
    }
}

/// A single executable command.
pub trait Command {
    /// Registry key (lowercase).
    fn name(&self) -> &str;

    /// One-line description for `help`.
    fn description(&self) -> &str;

    fn usage(&self) -> &str;

    /// Name shown to the user. Differs from `name` for aliased commands.
    fn label(&self) -> &str {
        self.name()
    }

    /// Whether `hold` may repeat this command.
    fn hold_eligible(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()>;
}

/// How to run one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Suppress the "not recognized" lines.
    pub silent: bool,
    pub from_hold: bool,
    pub hold_id: Option<HoldId>,
    /// Overrides the `[H#<id>] ` prefix derived from the hold fields.
    pub prefix: Option<String>,
    pub raw: Option<String>,
    pub input: Option<String>,
    /// Output channel. `None` means `global`.
    pub channel: Option<ChannelId>,
    pub active_channel: ChannelId,
}

impl DispatchOptions {
    fn line_prefix(&self) -> String {
        if let Some(ref p) = self.prefix {
            return p.clone();
        }
        match (self.from_hold, self.hold_id) {
            (true, Some(id)) => format!("[H#{id}] "),
            _ => String::new(),
        }
    }
}

/// Registry of available commands, kept in registration order.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
    order: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Replaces any existing command with the same name.
    pub fn register(&mut self, cmd: Box<dyn Command>) {
        let name = cmd.name().to_string();
        if self.commands.insert(name.clone(), cmd).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(Box::as_ref)
    }

    /// Commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &dyn Command> {
        self.order.iter().filter_map(|n| self.get(n))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run an invocation once. Returns `true` on success.
    ///
    /// Never panics and never returns an error: unknown commands, handler
    /// errors and handler panics all become output lines.
    pub fn dispatch(
        &self,
        resolved: &ResolvedInvocation,
        opts: &DispatchOptions,
        env: &mut Environment,
        sink: &mut dyn OutputSink,
    ) -> bool {
        let Some(ref name) = resolved.command else {
            return false;
        };
        let prefix = opts.line_prefix();
        let channel = opts.channel.clone().unwrap_or_default();

        let Some(command) = self.get(name) else {
            if !opts.silent {
                let invoked = if resolved.invoked_name.is_empty() {
                    name.as_str()
                } else {
                    resolved.invoked_name.as_str()
                };
                let line_opts = LineOptions::on(channel).styled(LineStyle::Error);
                sink.write(
                    &format!("{prefix}Command not recognized: {invoked}"),
                    line_opts.clone(),
                );
                sink.write(
                    &format!("{prefix}Type 'help' to list available commands."),
                    line_opts,
                );
            }
            return false;
        };

        log::debug!("dispatch '{}' (hold: {:?})", resolved.label, opts.hold_id);

        let mut ctx = ExecutionContext {
            raw: opts.raw.clone().unwrap_or_else(|| resolved.label.clone()),
            input: opts.input.clone().unwrap_or_else(|| resolved.label.clone()),
            command: name.clone(),
            args: resolved.args.clone(),
            from_hold: opts.from_hold,
            hold_id: opts.hold_id,
            channel,
            active_channel: opts.active_channel.clone(),
            registry: self,
            env,
            sink,
            prefix,
            issued: Vec::new(),
            actions: Vec::new(),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command.execute(&mut ctx)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };

        match failure {
            None => {
                let actions = std::mem::take(&mut ctx.actions);
                ctx.env.actions.extend(actions);
                true
            },
            Some(message) => {
                log::warn!("command '{name}' failed: {message}");
                for (kind, id) in std::mem::take(&mut ctx.issued) {
                    ctx.env.ledger_mut(kind).forget(&id);
                }
                ctx.write_styled(&format!("Command '{name}' failed: {message}"), LineStyle::Error);
                false
            },
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
