//! The console: owns the command registry, the hold table, the scrollback
//! and every shared service, and drives them from one cooperative loop.
//!
//! All state lives in one [`Console`] value, so several consoles can run
//! side by side and tests need no global reset.

mod remote;

use pistat_net::channel::EventChannel;
use pistat_types::channel::ChannelId;
use pistat_types::config::ConsoleConfig;
use pistat_types::entropy::Entropy;
use pistat_types::output::{LineOptions, LineStyle, OutputSink};
use pistat_types::time::TimeService;
use pistat_ui::{LogBook, StatsBoard, TweenWindow};

use crate::commands::register_builtins;
use crate::hold::HoldScheduler;
use crate::interpreter::{CommandRegistry, ConsoleAction, DispatchOptions, Environment, resolve};
use crate::router::{ChannelRouter, RenderUpdate};
use crate::tokenizer::tokenize;

/// Boot banner, one scrollback line each.
pub const BANNER: [&str; 8] = [
    "== PI STAT V0.9.7 ==",
    "Initializing diagnostics...",
    "Loading sensor drivers: OK",
    "Checking CPU cores: OK",
    "Reading memory map: OK",
    "Starting telemetry streams...",
    "System stable. Use boot bar controls to switch panels.",
    "Type 'help' to list console commands.",
];

pub struct Console {
    config: ConsoleConfig,
    registry: CommandRegistry,
    holds: HoldScheduler,
    router: ChannelRouter,
    env: Environment,
    shut_down: bool,
}

impl Console {
    pub fn new(
        config: ConsoleConfig,
        time: Box<dyn TimeService>,
        remote: Box<dyn EventChannel>,
    ) -> Self {
        let entropy = config
            .entropy_seed
            .map(Entropy::new)
            .unwrap_or_else(Entropy::from_clock);
        let window = TweenWindow::new(config.tween_min_ms, config.tween_max_ms);
        let env = Environment::new(
            time,
            remote,
            entropy,
            StatsBoard::new(window),
            LogBook::new(config.log_capacity),
            config.hold_interval_ms,
        );
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);

        Self {
            holds: HoldScheduler::new(config.hold_interval_ms),
            router: ChannelRouter::new(config.scrollback_limit),
            registry,
            env,
            config,
            shut_down: false,
        }
    }

    /// Print the banner and mark the log book ready.
    pub fn boot(&mut self) {
        log::info!("console boot: {} commands registered", self.registry.len());
        if self.config.banner {
            for line in BANNER {
                self.router.write(line, LineOptions::default());
            }
        }
        let now = self.env.time.unix_secs();
        self.env.logs.push("Terminal ready.", now);
    }

    /// Handle one line of user input.
    ///
    /// Output is tagged with the channel that was active when the line was
    /// submitted.
    pub fn submit(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let origin = self.router.active().clone();
        self.router.write(
            &format!("> {trimmed}"),
            LineOptions::on(origin.clone()).styled(LineStyle::Prompt),
        );

        let tokens = tokenize(trimmed);
        let Some(first) = tokens.first() else {
            return;
        };
        if first.eq_ignore_ascii_case("hold") {
            self.start_hold(&tokens[1..], origin);
        } else {
            let resolved = resolve(&tokens);
            let opts = DispatchOptions {
                raw: Some(trimmed.to_string()),
                input: Some(raw.to_string()),
                channel: Some(origin.clone()),
                active_channel: origin,
                ..DispatchOptions::default()
            };
            self.registry
                .dispatch(&resolved, &opts, &mut self.env, &mut self.router);
        }
        self.apply_actions();
    }

    fn start_hold(&mut self, tokens: &[String], channel: ChannelId) {
        if tokens.is_empty() {
            self.router.write("Usage: hold <command>", LineOptions::on(channel));
            return;
        }
        let resolved = resolve(tokens);
        let now = self.env.now_ms();
        self.holds.start(
            &resolved,
            &resolved.label,
            channel,
            now,
            &self.registry,
            &mut self.env,
            &mut self.router,
        );
    }

    /// One cooperative frame: due holds, tweens, inbound remote traffic,
    /// request deadlines, then queued console actions.
    pub fn tick(&mut self) {
        let now = self.env.now_ms();
        self.holds
            .tick(now, &self.registry, &mut self.env, &mut self.router);
        self.env.stats.advance(now);

        for inbound in self.env.remote.poll(now) {
            self.handle_inbound(inbound);
        }
        self.sweep_ack_timeouts(now);
        self.sweep_outlived(now);
        self.apply_actions();
    }

    /// Change the active channel, announcing it on `meta`.
    pub fn select_channel(&mut self, channel: ChannelId) {
        match channel {
            ChannelId::Meta => {
                log::debug!("meta channel is not selectable");
            },
            ChannelId::Global => {
                if self.router.set_active(ChannelId::Global) {
                    self.meta("Returned to global console view.");
                }
            },
            ChannelId::Device(ref id) => {
                let label = self.env.catalog.device_label(id).to_string();
                if self.router.set_active(channel.clone()) {
                    self.meta(&format!("Viewing {label} console. Type 'channel global' to return."));
                    self.router.add_placeholder(&channel);
                }
            },
        }
    }

    fn apply_actions(&mut self) {
        for action in self.env.take_actions() {
            match action {
                ConsoleAction::ReleaseHolds { channel } => self.release_holds(channel),
                ConsoleAction::SelectChannel(channel) => self.select_channel(channel),
            }
        }
    }

    fn release_holds(&mut self, channel: ChannelId) {
        let released = self.holds.stop_all();
        let text = if released.is_empty() {
            "No active holds to release.".to_string()
        } else {
            let summary: Vec<String> = released
                .iter()
                .map(|h| format!("#{} ({})", h.id, h.label))
                .collect();
            format!("Released holds: {}.", summary.join(", "))
        };
        self.router.write(&text, LineOptions::on(channel));
    }

    fn meta(&mut self, text: &str) {
        self.router
            .write(text, LineOptions::on(ChannelId::Meta).styled(LineStyle::Meta));
    }

    /// Cancel every hold and close the controller link. Safe to call more
    /// than once; also run on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        let released = self.holds.stop_all();
        log::info!("console shutdown: {} hold(s) cancelled", released.len());
        self.env.remote.close();
    }

    /// What the renderer has to draw since the last call.
    pub fn take_render(&mut self) -> Option<RenderUpdate> {
        self.router.take_render()
    }

    /// How long the host may sleep before the next frame, capped at
    /// `frame_ms` and shortened when a hold falls due sooner.
    pub fn sleep_budget_ms(&self, frame_ms: u64) -> u64 {
        match self.holds.next_due_ms() {
            Some(due) => frame_ms.min(due.saturating_sub(self.env.now_ms())),
            None => frame_ms,
        }
    }

    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    pub fn holds(&self) -> &HoldScheduler {
        &self.holds
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn active_channel(&self) -> &ChannelId {
        self.router.active()
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}
