//! Hold scheduler: repeating invocations at a fixed interval.
//!
//! Lifecycle per hold is `Created -> Running -> {Cancelled, Failed}`. A hold
//! only enters the table after its first invocation succeeds, and any
//! failing tick removes it. Ids start at 1 and are never reused.

use std::collections::BTreeMap;

use pistat_types::channel::ChannelId;
use pistat_types::output::{LineOptions, LineStyle, MemorySink, OutputSink};

use crate::interpreter::{
    CommandRegistry, DispatchOptions, Environment, HoldId, ResolvedInvocation,
};

/// An active hold.
#[derive(Debug, Clone)]
pub struct Hold {
    pub id: HoldId,
    pub label: String,
    /// Copied at creation; every tick dispatches a fresh clone of it.
    snapshot: ResolvedInvocation,
    /// Channel the hold was started from.
    pub channel: ChannelId,
    next_due_ms: u64,
    pub runs: u64,
}

/// A hold removed by [`HoldScheduler::stop_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedHold {
    pub id: HoldId,
    pub label: String,
}

#[derive(Debug)]
pub struct HoldScheduler {
    holds: BTreeMap<HoldId, Hold>,
    next_id: HoldId,
    interval_ms: u64,
}

impl HoldScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            holds: BTreeMap::new(),
            next_id: 1,
            interval_ms: interval_ms.max(1),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Start holding `resolved`.
    ///
    /// Non-eligible or unknown commands are rejected with a message and no
    /// state. Otherwise the first invocation runs immediately; if it fails
    /// the hold is aborted and never registered.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        resolved: &ResolvedInvocation,
        label: &str,
        channel: ChannelId,
        now_ms: u64,
        registry: &CommandRegistry,
        env: &mut Environment,
        sink: &mut dyn OutputSink,
    ) -> Option<HoldId> {
        let name = resolved.command.as_deref()?;
        let invoked = if resolved.invoked_name.is_empty() {
            name
        } else {
            resolved.invoked_name.as_str()
        };
        let Some(command) = registry.get(name) else {
            let first = if invoked.is_empty() {
                "Unable to determine command to hold.".to_string()
            } else {
                format!("Command not recognized: {invoked}")
            };
            note(sink, &channel, &first, LineStyle::Error);
            note(sink, &channel, "Type 'help' to list available commands.", LineStyle::Error);
            return None;
        };
        if !command.hold_eligible() {
            let display = if command.label() != command.name() {
                command.label()
            } else {
                invoked
            };
            note(sink, &channel, &format!("Command '{display}' cannot be held."), LineStyle::Error);
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        let label = if label.is_empty() {
            command.label().to_string()
        } else {
            label.to_string()
        };
        let hold = Hold {
            id,
            label,
            snapshot: resolved.clone(),
            channel: channel.clone(),
            next_due_ms: now_ms + self.interval_ms,
            runs: 1,
        };

        // Buffer the first run so the announcement can precede its output
        // without announcing a hold that is about to abort.
        let mut first = MemorySink::new();
        let ok = registry.dispatch(&hold.snapshot, &hold.dispatch_options(), env, &mut first);
        if ok {
            note(
                sink,
                &channel,
                &format!(
                    "Holding #{id}: {} (every {})",
                    hold.label,
                    interval_text(self.interval_ms)
                ),
                LineStyle::Meta,
            );
        }
        replay(&first, sink);

        if !ok {
            log::info!("hold #{id} aborted for '{}'", hold.label);
            note(
                sink,
                &channel,
                &format!("Hold #{id} aborted for '{}'.", hold.label),
                LineStyle::Error,
            );
            return None;
        }

        log::info!("hold #{id} started: {}", hold.label);
        self.holds.insert(id, hold);
        Some(id)
    }

    /// Run every hold that is due. Returns the ids of holds stopped by a
    /// failing tick. Periods missed while the host stalled are skipped.
    pub fn tick(
        &mut self,
        now_ms: u64,
        registry: &CommandRegistry,
        env: &mut Environment,
        sink: &mut dyn OutputSink,
    ) -> Vec<HoldId> {
        let due: Vec<HoldId> = self
            .holds
            .values()
            .filter(|h| h.next_due_ms <= now_ms)
            .map(|h| h.id)
            .collect();

        let mut stopped = Vec::new();
        for id in due {
            let Some(hold) = self.holds.get(&id) else {
                continue;
            };
            let invocation = hold.snapshot.clone();
            let opts = hold.dispatch_options();
            let ok = registry.dispatch(&invocation, &opts, env, sink);

            if !ok {
                if let Some(hold) = self.holds.remove(&id) {
                    log::warn!("hold #{id} stopped after {} runs", hold.runs);
                    sink.write(
                        &format!("Hold #{id} stopped due to command failure."),
                        LineOptions::on(hold.channel).styled(LineStyle::Error),
                    );
                }
                stopped.push(id);
                continue;
            }

            if let Some(hold) = self.holds.get_mut(&id) {
                hold.runs += 1;
                let behind = now_ms - hold.next_due_ms;
                hold.next_due_ms = now_ms + self.interval_ms - behind % self.interval_ms;
            }
        }
        stopped
    }

    /// Cancel every hold. Returns what was released, in id order. Calling
    /// it again returns an empty list.
    pub fn stop_all(&mut self) -> Vec<ReleasedHold> {
        let released: Vec<ReleasedHold> = std::mem::take(&mut self.holds)
            .into_values()
            .map(|h| ReleasedHold {
                id: h.id,
                label: h.label,
            })
            .collect();
        if !released.is_empty() {
            log::info!("released {} hold(s)", released.len());
        }
        released
    }

    pub fn get(&self, id: HoldId) -> Option<&Hold> {
        self.holds.get(&id)
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    /// Earliest time any hold is due.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.holds.values().map(|h| h.next_due_ms).min()
    }
}

impl Hold {
    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            from_hold: true,
            hold_id: Some(self.id),
            raw: Some(self.label.clone()),
            input: Some(self.label.clone()),
            channel: Some(self.channel.clone()),
            active_channel: self.channel.clone(),
            ..DispatchOptions::default()
        }
    }
}

/// `1s`, `2.5s`, `0.25s`.
pub fn interval_text(ms: u64) -> String {
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        let secs = format!("{:.3}", ms as f64 / 1000.0);
        format!("{}s", secs.trim_end_matches('0'))
    }
}

fn note(sink: &mut dyn OutputSink, channel: &ChannelId, text: &str, style: LineStyle) {
    sink.write(text, LineOptions::on(channel.clone()).styled(style));
}

fn replay(buffer: &MemorySink, sink: &mut dyn OutputSink) {
    for (text, opts) in &buffer.lines {
        sink.write(text, opts.clone());
    }
}
