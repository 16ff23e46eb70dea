//! Console status commands: uptime, stats, logs, clear logs, monitor.

use pistat_types::error::Result;
use pistat_types::time::duration_hms;
use pistat_ui::StatTile;

use crate::interpreter::{Command, CommandRegistry, ExecutionContext};

/// Highest slot `monitor` accepts.
const MAX_PI_SLOT: u32 = 7;

const DEFAULT_LOG_COUNT: f64 = 5.0;
const MAX_LOG_COUNT: f64 = 20.0;

pub fn register_system_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(UptimeCmd));
    reg.register(Box::new(StatsCmd));
    reg.register(Box::new(LogsCmd));
    reg.register(Box::new(ClearLogsCmd));
    reg.register(Box::new(MonitorCmd));
}

/// ` - <description>` or nothing.
fn describe_suffix(tile: &StatTile) -> String {
    let description = tile.description();
    if description.is_empty() {
        String::new()
    } else {
        format!(" - {description}")
    }
}

// ---------------------------------------------------------------------------
// uptime
// ---------------------------------------------------------------------------

struct UptimeCmd;
impl Command for UptimeCmd {
    fn name(&self) -> &str {
        "uptime"
    }
    fn description(&self) -> &str {
        "Show UI session uptime"
    }
    fn usage(&self) -> &str {
        "uptime"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let secs = ctx.env.now_ms().saturating_sub(ctx.env.boot_ms) / 1000;
        ctx.write(&format!("Uptime: {}", duration_hms(secs)));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// stats
// ---------------------------------------------------------------------------

struct StatsCmd;
impl Command for StatsCmd {
    fn name(&self) -> &str {
        "stats"
    }
    fn description(&self) -> &str {
        "Snapshot the stats panel values"
    }
    fn usage(&self) -> &str {
        "stats"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let lines: Vec<String> = ctx
            .env
            .stats
            .tiles()
            .iter()
            .map(|t| format!("{}: {}{}", t.label, t.value(), describe_suffix(t)))
            .collect();
        if lines.is_empty() {
            ctx.write("No stats currently available.");
            return Ok(());
        }
        for line in &lines {
            ctx.write(line);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// logs
// ---------------------------------------------------------------------------

/// How many entries `logs [count]` shows. Missing, zero or non-numeric
/// counts mean the default; the rest is clamped to `1..=20`.
fn log_count(arg: Option<&str>) -> usize {
    let requested = arg
        .and_then(|a| a.trim().parse::<f64>().ok())
        .filter(|n| !n.is_nan() && *n != 0.0)
        .unwrap_or(DEFAULT_LOG_COUNT);
    requested.clamp(1.0, MAX_LOG_COUNT).floor() as usize
}

struct LogsCmd;
impl Command for LogsCmd {
    fn name(&self) -> &str {
        "logs"
    }
    fn description(&self) -> &str {
        "Show recent log entries"
    }
    fn usage(&self) -> &str {
        "logs [count]"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let count = log_count(ctx.args.first().map(String::as_str));
        let total = ctx.env.logs.len();
        if total == 0 {
            ctx.write("No log entries recorded yet.");
            return Ok(());
        }
        let shown: Vec<String> = ctx.env.logs.entries().take(count).map(str::to_string).collect();
        ctx.write(&format!("Showing {} of {total} logs:", shown.len()));
        for entry in &shown {
            ctx.write(entry);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// clear logs
// ---------------------------------------------------------------------------

struct ClearLogsCmd;
impl Command for ClearLogsCmd {
    fn name(&self) -> &str {
        "clearlogs"
    }
    fn label(&self) -> &str {
        "clear logs"
    }
    fn description(&self) -> &str {
        "Clear the log panel entries"
    }
    fn usage(&self) -> &str {
        "clear logs"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.env.logs.clear();
        ctx.write("Log buffer cleared.");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

/// Slot number from `pi <n>` or the first digit run of the first argument.
fn parse_slot(args: &[String]) -> Option<u32> {
    let first = args.first()?;
    let candidate: f64 = if first.eq_ignore_ascii_case("pi") {
        args.get(1)?.trim().parse().ok()?
    } else {
        let digits: String = first
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()?
    };
    let in_range = candidate.fract() == 0.0 && (1.0..=f64::from(MAX_PI_SLOT)).contains(&candidate);
    in_range.then_some(candidate as u32)
}

struct MonitorCmd;
impl Command for MonitorCmd {
    fn name(&self) -> &str {
        "monitor"
    }
    fn description(&self) -> &str {
        "Inspect a specific PI channel"
    }
    fn usage(&self) -> &str {
        "monitor pi <1-7>"
    }
    fn hold_eligible(&self) -> bool {
        true
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if ctx.args.is_empty() {
            ctx.write("Usage: monitor pi <1-7>");
            return Ok(());
        }
        let Some(slot) = parse_slot(&ctx.args) else {
            ctx.write(&format!("Provide a PI channel between 1 and {MAX_PI_SLOT}."));
            ctx.write("Usage: monitor pi <1-7>");
            return Ok(());
        };
        if ctx.env.stats.is_empty() {
            ctx.write("No stats currently available.");
            return Ok(());
        }
        let line = match ctx.env.stats.by_index(slot as usize) {
            Some(tile) => format!(
                "Monitoring {}{}: {}",
                tile.label,
                describe_suffix(tile),
                tile.value()
            ),
            None => format!("PI {slot} feed unavailable."),
        };
        ctx.write(&line);
        Ok(())
    }
}
