//! Built-in console commands.

use pistat_types::error::Result;
use pistat_ui::theme::{preset, preset_names};

use crate::hold::interval_text;
use crate::interpreter::{Command, CommandRegistry, ConsoleAction, ExecutionContext};

/// Register all built-in commands into a registry.
///
/// Registration order is the order `help` lists them in.
pub fn register_builtins(reg: &mut CommandRegistry) {
    reg.register(Box::new(HelpCmd));
    reg.register(Box::new(PingCmd));
    reg.register(Box::new(ColorCmd));
    reg.register(Box::new(ClearCmd));
    reg.register(Box::new(EchoCmd));
    crate::system_commands::register_system_commands(reg);
    reg.register(Box::new(ReleaseCmd));
    crate::task_commands::register_task_commands(reg);
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

struct HelpCmd;
impl Command for HelpCmd {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "Show available commands"
    }
    fn usage(&self) -> &str {
        "help"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let registry = ctx.registry;
        ctx.write("Available commands:");
        for cmd in registry.commands() {
            let label = cmd.label();
            ctx.write(&format!("  {label:<12} {}", cmd.description()));
            if !cmd.usage().is_empty() && cmd.usage() != label {
                ctx.write(&format!("      usage: {}", cmd.usage()));
            }
        }
        let every = match ctx.env.hold_interval_ms {
            1000 => "second".to_string(),
            ms => interval_text(ms),
        };
        ctx.write(&format!("  hold <command>  Hold a command and refresh every {every}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ping
// ---------------------------------------------------------------------------

struct PingCmd;
impl Command for PingCmd {
    fn name(&self) -> &str {
        "ping"
    }
    fn description(&self) -> &str {
        "Test latency to core systems"
    }
    fn usage(&self) -> &str {
        "ping"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let latency = ctx.env.entropy.range(20, 100);
        ctx.write(&format!("PONG {latency}ms"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// color
// ---------------------------------------------------------------------------

struct ColorCmd;
impl Command for ColorCmd {
    fn name(&self) -> &str {
        "color"
    }
    fn description(&self) -> &str {
        "Change the UI accent/preset"
    }
    fn usage(&self) -> &str {
        "color <green|amber|blue|purple|#hex>"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let Some(choice) = ctx.args.first().cloned() else {
            ctx.write(&format!("Usage: {}", self.usage()));
            return Ok(());
        };
        let key = choice.to_lowercase();
        if preset(&key).is_some() {
            ctx.env.theme.apply_preset(&key);
            ctx.write(&format!("Applied {key} theme."));
            return Ok(());
        }
        if let Some(hex) = ctx.env.theme.apply_accent(&choice) {
            ctx.write(&format!("Accent color set to {hex}."));
            return Ok(());
        }
        ctx.write(&format!("Unknown color \"{choice}\"."));
        ctx.write(&format!("Presets: {}", preset_names(", ")));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// clear
// ---------------------------------------------------------------------------

struct ClearCmd;
impl Command for ClearCmd {
    fn name(&self) -> &str {
        "clear"
    }
    fn description(&self) -> &str {
        "Clear the terminal buffer"
    }
    fn usage(&self) -> &str {
        "clear"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// echo
// ---------------------------------------------------------------------------

struct EchoCmd;
impl Command for EchoCmd {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echo the provided text"
    }
    fn usage(&self) -> &str {
        "echo <message>"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if ctx.args.is_empty() {
            ctx.write("Usage: echo <message>");
            return Ok(());
        }
        let text = ctx.args.join(" ");
        ctx.write(&text);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// release
// ---------------------------------------------------------------------------

/// Stops every hold. The console reports what was released once the
/// invocation has returned.
struct ReleaseCmd;
impl Command for ReleaseCmd {
    fn name(&self) -> &str {
        "release"
    }
    fn description(&self) -> &str {
        "Release all active holds"
    }
    fn usage(&self) -> &str {
        "release"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if !ctx.args.is_empty() {
            ctx.write("release ignores additional parameters; clearing all holds.");
        }
        let channel = ctx.channel.clone();
        ctx.request(ConsoleAction::ReleaseHolds { channel });
        Ok(())
    }
}
