//! Shared fixtures for command tests.

use pistat_net::channel::LoopbackChannel;
use pistat_types::channel::ChannelId;
use pistat_types::entropy::Entropy;
use pistat_types::output::MemorySink;
use pistat_types::time::ManualTime;
use pistat_ui::{LogBook, StatsBoard, TweenWindow};

use crate::commands::register_builtins;
use crate::interpreter::{CommandRegistry, DispatchOptions, Environment, resolve};
use crate::tokenizer::tokenize;

/// Registry with every built-in, an environment on a manual clock and a
/// connected loopback remote.
pub struct Harness {
    pub registry: CommandRegistry,
    pub env: Environment,
    pub sink: MemorySink,
    pub time: ManualTime,
    pub remote: LoopbackChannel,
}

impl Harness {
    pub fn new() -> Self {
        let time = ManualTime::at_unix(3600);
        let remote = LoopbackChannel::new();
        let env = Environment::new(
            Box::new(time.clone()),
            Box::new(remote.clone()),
            Entropy::new(7),
            StatsBoard::new(TweenWindow::default()),
            LogBook::new(50),
            1000,
        );
        let mut registry = CommandRegistry::new();
        register_builtins(&mut registry);
        Self {
            registry,
            env,
            sink: MemorySink::new(),
            time,
            remote,
        }
    }

    /// Run one line with `global` active.
    pub fn run(&mut self, line: &str) -> bool {
        self.run_on(line, ChannelId::Global)
    }

    /// Run one line as if typed while `channel` was active.
    pub fn run_on(&mut self, line: &str, channel: ChannelId) -> bool {
        let resolved = resolve(&tokenize(line));
        let opts = DispatchOptions {
            channel: Some(channel.clone()),
            active_channel: channel,
            ..DispatchOptions::default()
        };
        self.registry
            .dispatch(&resolved, &opts, &mut self.env, &mut self.sink)
    }

    /// Captured texts, draining the sink.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sink.lines)
            .into_iter()
            .map(|(text, _)| text)
            .collect()
    }
}
