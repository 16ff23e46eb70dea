//! Rendering of controller traffic into the scrollback.

use serde_json::json;

use pistat_net::ledger::{PendingRequest, UNKNOWN_DEVICE, resolve_device, resolve_label};
use pistat_net::protocol::{
    AckReply, Inbound, LogRecord, RemoteEvent, RequestEvent, RequestKind, RequestPhase, outbound,
};
use pistat_types::channel::ChannelId;
use pistat_types::output::{LineOptions, LineStyle, OutputSink};

use super::Console;

const LEDGERS: [RequestKind; 2] = [RequestKind::Task, RequestKind::Terminal];

/// Channel a request's replies belong to.
fn request_channel(entry: &PendingRequest) -> ChannelId {
    entry
        .device_id
        .as_deref()
        .map(ChannelId::device)
        .unwrap_or_default()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

impl Console {
    pub(super) fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Event(event) => self.handle_event(event),
            Inbound::Ack { request_id, reply } => self.handle_ack(&request_id, reply),
        }
    }

    fn handle_event(&mut self, event: RemoteEvent) {
        match event {
            RemoteEvent::Connect => {
                let tasks = self.env.task_ledger.clear();
                let terminals = self.env.terminal_ledger.clear();
                log::info!(
                    "controller connected; dropped {tasks} task and {terminals} terminal request(s)"
                );
                self.meta("Connected to controller.");
                if let Err(e) = self
                    .env
                    .remote
                    .emit(outbound::CATALOG_REQUEST, json!({}), None)
                {
                    log::warn!("catalog request failed: {e}");
                }
            },
            RemoteEvent::Disconnect => {
                log::warn!("controller connection lost");
                self.meta("Connection to controller lost.");
            },
            RemoteEvent::StatsSnapshot(devices) => {
                let now = self.env.now_ms();
                self.env.catalog.absorb_snapshot(&devices);
                self.env
                    .stats
                    .apply_snapshot(&devices, now, &mut self.env.entropy);
            },
            RemoteEvent::TaskCatalog(tasks) => self.env.catalog.replace_tasks(tasks),
            RemoteEvent::Log(record) => self.handle_log(&record),
            RemoteEvent::Request { kind, phase, event } => {
                self.handle_request_event(kind, phase, &event);
            },
            RemoteEvent::PiConsole(event) => {
                let device = non_empty(event.pi_id.as_deref()).unwrap_or(UNKNOWN_DEVICE);
                if let Some(ref line) = event.line {
                    self.router.write(
                        line,
                        LineOptions::on(ChannelId::device(device)).styled(LineStyle::Output),
                    );
                }
            },
        }
    }

    fn handle_log(&mut self, record: &LogRecord) {
        let style = if record.level.eq_ignore_ascii_case("error") {
            LineStyle::Error
        } else {
            LineStyle::Normal
        };
        self.router.write(
            &format!("[{}] {}", record.level, record.message),
            LineOptions::default().styled(style),
        );
        let now = self.env.time.unix_secs();
        self.env.logs.push(&record.message, now);
    }

    fn handle_request_event(&mut self, kind: RequestKind, phase: RequestPhase, event: &RequestEvent) {
        let request_id = non_empty(event.request_id.as_deref());
        let pending = request_id.and_then(|id| {
            let ledger = self.env.ledger_mut(kind);
            ledger.mark_acknowledged(id);
            ledger.resolve(id).cloned()
        });
        let payload_subject = match kind {
            RequestKind::Task => event.task_id.as_deref(),
            RequestKind::Terminal => event.command.as_deref(),
        };
        let label = resolve_label(
            pending.as_ref(),
            &self.env.catalog,
            event.label.as_deref(),
            payload_subject,
        );
        let device = resolve_device(pending.as_ref(), event.pi_id.as_deref());
        let device_label = self.env.catalog.device_label(&device).to_string();
        let error = non_empty(event.error.as_deref()).unwrap_or("unknown error");

        let rendered = match (kind, phase) {
            (_, RequestPhase::Output) => event
                .line
                .as_ref()
                .map(|line| (line.clone(), LineStyle::Output)),
            (RequestKind::Task, RequestPhase::Started) => Some((
                format!("Task '{label}' started on {device_label}."),
                LineStyle::Normal,
            )),
            (RequestKind::Task, RequestPhase::Finished) => {
                let text = match event.exit_code {
                    Some(code) => format!("Task '{label}' finished (exit {code})."),
                    None => format!("Task '{label}' finished."),
                };
                Some((text, LineStyle::Normal))
            },
            (RequestKind::Task, RequestPhase::Error) => {
                let text = match event.exit_code {
                    Some(code) => format!("Task '{label}' failed: {error} (exit {code})."),
                    None => format!("Task '{label}' failed: {error}."),
                };
                Some((text, LineStyle::Error))
            },
            (RequestKind::Terminal, RequestPhase::Started) => {
                let command = non_empty(event.command.as_deref()).unwrap_or(&label);
                Some((format!("$ {command}"), LineStyle::Prompt))
            },
            (RequestKind::Terminal, RequestPhase::Finished) => {
                let code = event
                    .exit_code
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string());
                Some((
                    format!("Command '{label}' exited with code {code}."),
                    LineStyle::Normal,
                ))
            },
            (RequestKind::Terminal, RequestPhase::Error) => Some((
                format!("Command '{label}' failed: {error}."),
                LineStyle::Error,
            )),
        };

        if let Some((text, style)) = rendered {
            self.router
                .write(&text, LineOptions::on(ChannelId::device(device)).styled(style));
        }

        if phase.is_terminal() {
            if let Some(id) = request_id {
                self.env.ledger_mut(kind).settle(id);
            }
        }
    }

    /// Find a pending request in either ledger.
    fn find_pending(&self, request_id: &str) -> Option<(RequestKind, PendingRequest)> {
        LEDGERS.into_iter().find_map(|kind| {
            self.env
                .ledger(kind)
                .resolve(request_id)
                .map(|entry| (kind, entry.clone()))
        })
    }

    fn find_settled(&self, request_id: &str) -> Option<PendingRequest> {
        LEDGERS
            .into_iter()
            .find_map(|kind| self.env.ledger(kind).settled(request_id).cloned())
    }

    fn handle_ack(&mut self, request_id: &str, reply: AckReply) {
        let Some((kind, entry)) = self.find_pending(request_id) else {
            // The terminal event can beat its own acknowledgement.
            match self.find_settled(request_id) {
                Some(entry) => {
                    self.write_ack(&entry, &reply);
                },
                None => log::debug!("ack for unknown request {request_id}"),
            }
            return;
        };

        if self.write_ack(&entry, &reply) {
            self.env.ledger_mut(kind).forget(request_id);
            return;
        }

        let ledger = self.env.ledger_mut(kind);
        ledger.mark_acknowledged(request_id);
        if !entry.awaits_events {
            ledger.forget(request_id);
        } else if let Some(remote_id) = non_empty(reply.request_id.as_deref()) {
            ledger.rekey(request_id, remote_id);
        }
    }

    /// Render an acknowledgement on the request's channel. Returns `true`
    /// when the controller rejected the request.
    fn write_ack(&mut self, entry: &PendingRequest, reply: &AckReply) -> bool {
        let channel = request_channel(entry);
        if let Some(error) = non_empty(reply.error.as_deref()) {
            let label = resolve_label(Some(entry), &self.env.catalog, None, None);
            log::warn!("request '{label}' rejected: {error}");
            self.router.write(
                &format!("Request '{label}' rejected: {error}"),
                LineOptions::on(channel).styled(LineStyle::Error),
            );
            return true;
        }
        if let Some(message) = non_empty(reply.message.as_deref()) {
            self.router.write(message, LineOptions::on(channel));
        }
        false
    }

    /// Drop requests the controller never acknowledged.
    pub(super) fn sweep_ack_timeouts(&mut self, now_ms: u64) {
        let timeout = self.config.ack_timeout_ms;
        if timeout == 0 {
            return;
        }
        for kind in LEDGERS {
            for id in self.env.ledger(kind).expired(now_ms, timeout) {
                let Some(entry) = self.env.ledger_mut(kind).forget(&id) else {
                    continue;
                };
                let label = resolve_label(Some(&entry), &self.env.catalog, None, None);
                log::warn!("no acknowledgement for {id} ('{label}') after {timeout}ms");
                self.router.write(
                    &format!("No acknowledgement from controller for '{label}'."),
                    LineOptions::on(request_channel(&entry)).styled(LineStyle::Error),
                );
            }
        }
    }

    /// Drop acknowledged requests whose terminal event never arrived.
    pub(super) fn sweep_outlived(&mut self, now_ms: u64) {
        let lifetime = self.config.request_lifetime_ms;
        if lifetime == 0 {
            return;
        }
        for kind in LEDGERS {
            for id in self.env.ledger(kind).outlived(now_ms, lifetime) {
                if let Some(entry) = self.env.ledger_mut(kind).forget(&id) {
                    log::warn!(
                        "no result for {id} ('{}') after {lifetime}ms, dropping",
                        entry.subject
                    );
                }
            }
        }
    }
}
