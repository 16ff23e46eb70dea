//! Controller commands: channel selection, remote exec, tasks, device names.

use serde_json::json;

use pistat_net::protocol::{RequestKind, outbound};
use pistat_types::channel::ChannelId;
use pistat_types::error::Result;

use crate::interpreter::{
    Command, CommandRegistry, ConsoleAction, ExecutionContext, OutboundRequest,
};

/// Device `task run` targets when none is given.
const DEFAULT_DEVICE: &str = "local";

pub fn register_task_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(ChannelCmd));
    reg.register(Box::new(ExecCmd));
    reg.register(Box::new(TaskCmd));
    reg.register(Box::new(AssignCmd));
}

// ---------------------------------------------------------------------------
// channel
// ---------------------------------------------------------------------------

struct ChannelCmd;
impl Command for ChannelCmd {
    fn name(&self) -> &str {
        "channel"
    }
    fn description(&self) -> &str {
        "Select or list device consoles"
    }
    fn usage(&self) -> &str {
        "channel [<device>|global]"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if ctx.args.is_empty() {
            let active = ctx.active_channel.clone();
            ctx.write(&format!("Active channel: {active}"));
            let catalog = &ctx.env.catalog;
            let devices: Vec<String> = catalog
                .devices()
                .map(|id| match catalog.device_label(id) {
                    label if label == id => id.to_string(),
                    label => format!("{id} ({label})"),
                })
                .collect();
            if devices.is_empty() {
                ctx.write("No devices reported yet.");
            } else {
                ctx.write(&format!("Devices: {}", devices.join(", ")));
            }
            return Ok(());
        }

        let reference = ctx.args.join(" ");
        let target = match reference.parse::<ChannelId>()? {
            ChannelId::Meta => {
                ctx.write("The meta channel is always visible; select a device or global.");
                return Ok(());
            },
            ChannelId::Global => ChannelId::Global,
            ChannelId::Device(id) => {
                let resolved = ctx.env.catalog.find_device(&id).unwrap_or(&id).to_string();
                ChannelId::Device(resolved)
            },
        };
        ctx.request(ConsoleAction::SelectChannel(target));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// exec
// ---------------------------------------------------------------------------

struct ExecCmd;
impl Command for ExecCmd {
    fn name(&self) -> &str {
        "exec"
    }
    fn description(&self) -> &str {
        "Run a shell command on the selected device"
    }
    fn usage(&self) -> &str {
        "exec <command>"
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if ctx.args.is_empty() {
            ctx.write("Usage: exec <command>");
            return Ok(());
        }
        let Some(device) = ctx.active_channel.device_id().map(str::to_string) else {
            ctx.write("Select a device channel before using exec.");
            return Ok(());
        };
        let command = ctx.args.join(" ");
        ctx.issue(OutboundRequest {
            ledger: RequestKind::Terminal,
            event: outbound::EXECUTE_TERMINAL,
            device: Some(&device),
            subject: &command,
            awaits_events: true,
            payload: json!({ "pi_id": device, "command": command }),
        })?;
        let label = ctx.env.catalog.device_label(&device).to_string();
        ctx.write(&format!("Sent to {label}: {command}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// task
// ---------------------------------------------------------------------------

const TASK_USAGE: &str = "task list|run <id> [device]|assign <device> <label>";

struct TaskCmd;
impl Command for TaskCmd {
    fn name(&self) -> &str {
        "task"
    }
    fn description(&self) -> &str {
        "List, run or assign controller tasks"
    }
    fn usage(&self) -> &str {
        TASK_USAGE
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let sub = ctx.args.first().map(|s| s.to_lowercase());
        match sub.as_deref() {
            Some("list") => task_list(ctx),
            Some("run") => task_run(ctx),
            Some("assign") => task_assign(ctx),
            _ => {
                ctx.write(&format!("Usage: {TASK_USAGE}"));
                Ok(())
            },
        }
    }
}

fn task_list(ctx: &mut ExecutionContext<'_>) -> Result<()> {
    let lines: Vec<String> = ctx
        .env
        .catalog
        .tasks()
        .iter()
        .map(|t| {
            let label = t.label.as_deref().unwrap_or(&t.id);
            match t.description.as_deref() {
                Some(desc) if !desc.is_empty() => format!("  {:<12} {label} - {desc}", t.id),
                _ => format!("  {:<12} {label}", t.id),
            }
        })
        .collect();
    if lines.is_empty() {
        ctx.write("No task catalog received from the controller yet.");
        return Ok(());
    }
    ctx.write("Available tasks:");
    for line in &lines {
        ctx.write(line);
    }
    Ok(())
}

fn task_run(ctx: &mut ExecutionContext<'_>) -> Result<()> {
    let Some(task_id) = ctx.args.get(1).cloned() else {
        ctx.write("Usage: task run <id> [device]");
        return Ok(());
    };
    let catalog = &ctx.env.catalog;
    if !catalog.tasks().is_empty() && catalog.task(&task_id).is_none() {
        ctx.write(&format!("Unknown task '{task_id}'. Use 'task list' to see available tasks."));
        return Ok(());
    }
    let device = match ctx.args.get(2) {
        Some(reference) => catalog.find_device(reference).unwrap_or(reference).to_string(),
        None => DEFAULT_DEVICE.to_string(),
    };
    let label = catalog.task_label(&task_id).unwrap_or(&task_id).to_string();
    let device_label = catalog.device_label(&device).to_string();

    ctx.issue(OutboundRequest {
        ledger: RequestKind::Task,
        event: outbound::RUN_TASK,
        device: Some(&device),
        subject: &task_id,
        awaits_events: true,
        payload: json!({ "task": task_id, "pi_id": device }),
    })?;
    ctx.write(&format!("Requested task '{label}' on {device_label}."));
    Ok(())
}

fn task_assign(ctx: &mut ExecutionContext<'_>) -> Result<()> {
    if ctx.args.len() < 3 {
        ctx.write("Usage: task assign <device> <label>");
        return Ok(());
    }
    let reference = ctx.args[1].clone();
    let task = ctx.args[2..].join(" ");
    let device = ctx
        .env
        .catalog
        .find_device(&reference)
        .unwrap_or(&reference)
        .to_string();
    ctx.issue(OutboundRequest {
        ledger: RequestKind::Task,
        event: outbound::ASSIGN_TASK,
        device: Some(&device),
        subject: &task,
        awaits_events: false,
        payload: json!({ "pi": reference, "task": task }),
    })?;
    ctx.write(&format!("Assigning '{task}' to {reference}..."));
    Ok(())
}

// ---------------------------------------------------------------------------
// assign
// ---------------------------------------------------------------------------

const ASSIGN_USAGE: &str = "assign name <device> <name>";

struct AssignCmd;
impl Command for AssignCmd {
    fn name(&self) -> &str {
        "assign"
    }
    fn description(&self) -> &str {
        "Give a device a display name"
    }
    fn usage(&self) -> &str {
        ASSIGN_USAGE
    }
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let is_name = ctx.args.first().is_some_and(|s| s.eq_ignore_ascii_case("name"));
        if !is_name || ctx.args.len() < 3 {
            ctx.write(&format!("Usage: {ASSIGN_USAGE}"));
            return Ok(());
        }
        let reference = ctx.args[1].clone();
        let name = ctx.args[2..].join(" ");
        let device = ctx
            .env
            .catalog
            .find_device(&reference)
            .unwrap_or(&reference)
            .to_string();
        ctx.issue(OutboundRequest {
            ledger: RequestKind::Task,
            event: outbound::ASSIGN_NAME,
            device: Some(&device),
            subject: &name,
            awaits_events: false,
            payload: json!({ "pi": reference, "name": name }),
        })?;
        ctx.write(&format!("Renaming {reference} to '{name}'..."));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pistat_net::protocol::TaskEntry;
    use pistat_types::channel::ChannelId;

    use crate::interpreter::ConsoleAction;
    use crate::test_utils::Harness;

    fn catalog(h: &mut Harness) {
        h.env.catalog.replace_tasks(vec![
            TaskEntry {
                id: "backup".into(),
                label: Some("Nightly backup".into()),
                description: Some("rsync to NAS".into()),
                command_preview: None,
            },
            TaskEntry {
                id: "reboot".into(),
                label: None,
                description: None,
                command_preview: None,
            },
        ]);
        h.env.catalog.set_device_label("pi-a", "Alpha");
    }

    #[test]
    fn channel_lists_devices() {
        let mut h = Harness::new();
        h.run("channel");
        assert_eq!(h.take(), vec!["Active channel: global", "No devices reported yet."]);
        catalog(&mut h);
        h.env.catalog.set_device_label("pi-b", "pi-b");
        h.run("channel");
        assert_eq!(h.take(), vec!["Active channel: global", "Devices: pi-a (Alpha), pi-b"]);
    }

    #[test]
    fn channel_selects_by_label_or_id() {
        let mut h = Harness::new();
        catalog(&mut h);
        h.run("channel alpha");
        h.run("channel device:dev9");
        h.run("channel GLOBAL");
        assert_eq!(
            h.env.take_actions(),
            vec![
                ConsoleAction::SelectChannel(ChannelId::device("pi-a")),
                ConsoleAction::SelectChannel(ChannelId::device("dev9")),
                ConsoleAction::SelectChannel(ChannelId::Global),
            ]
        );
        h.run("channel meta");
        assert!(h.env.take_actions().is_empty());
    }

    #[test]
    fn exec_needs_device_channel() {
        let mut h = Harness::new();
        h.run("exec");
        h.run("exec uname -a");
        assert_eq!(
            h.take(),
            vec!["Usage: exec <command>", "Select a device channel before using exec."]
        );
        assert!(h.remote.emitted().is_empty());
    }

    #[test]
    fn exec_issues_terminal_request() {
        let mut h = Harness::new();
        assert!(h.run_on("exec uname -a", ChannelId::device("pi-a")));
        let sent = h.remote.last_emit("execute_terminal").unwrap();
        assert_eq!(sent.payload["pi_id"], "pi-a");
        assert_eq!(sent.payload["command"], "uname -a");
        let id = sent.ack.unwrap();
        let entry = h.env.terminal_ledger.resolve(&id).unwrap();
        assert_eq!(entry.subject, "uname -a");
        assert_eq!(entry.device_id.as_deref(), Some("pi-a"));
        assert!(h.env.task_ledger.is_empty());
    }

    #[test]
    fn exec_offline_fails_without_entry() {
        let mut h = Harness::new();
        h.remote.set_connected(false);
        assert!(!h.run_on("exec ls", ChannelId::device("pi-a")));
        assert!(h.env.terminal_ledger.is_empty());
    }

    #[test]
    fn task_list_and_usage() {
        let mut h = Harness::new();
        h.run("task");
        h.run("task list");
        catalog(&mut h);
        h.run("task list");
        assert_eq!(
            h.take(),
            vec![
                "Usage: task list|run <id> [device]|assign <device> <label>",
                "No task catalog received from the controller yet.",
                "Available tasks:",
                "  backup       Nightly backup - rsync to NAS",
                "  reboot       reboot",
            ]
        );
    }

    #[test]
    fn task_run_records_pending_request() {
        let mut h = Harness::new();
        catalog(&mut h);
        assert!(h.run("task run backup Alpha"));
        let sent = h.remote.last_emit("run_task").unwrap();
        assert_eq!(sent.payload["task"], "backup");
        assert_eq!(sent.payload["pi_id"], "pi-a");
        let id = sent.ack.unwrap();
        assert_eq!(sent.payload["request_id"], id.as_str());
        let entry = h.env.task_ledger.resolve(&id).unwrap();
        assert_eq!(entry.subject, "backup");
        assert!(entry.awaits_events);
        assert_eq!(h.take(), vec!["Requested task 'Nightly backup' on Alpha."]);
    }

    #[test]
    fn task_run_defaults_to_local_and_checks_catalog() {
        let mut h = Harness::new();
        assert!(h.run("task run anything"));
        let sent = h.remote.last_emit("run_task").unwrap();
        assert_eq!(sent.payload["pi_id"], "local");
        h.take();

        catalog(&mut h);
        h.run("task run nope");
        assert_eq!(
            h.take(),
            vec!["Unknown task 'nope'. Use 'task list' to see available tasks."]
        );
        assert_eq!(h.env.task_ledger.len(), 1);
    }

    #[test]
    fn assignments_wait_only_for_ack() {
        let mut h = Harness::new();
        catalog(&mut h);
        h.run("task assign Alpha media server");
        h.run("assign name pi-a Kitchen Pi");
        h.run("assign pi-a x");
        let out = h.take();
        assert_eq!(out[0], "Assigning 'media server' to Alpha...");
        assert_eq!(out[1], "Renaming pi-a to 'Kitchen Pi'...");
        assert_eq!(out[2], "Usage: assign name <device> <name>");

        let task = h.remote.last_emit("assign_task").unwrap();
        assert_eq!(task.payload["pi"], "Alpha");
        assert_eq!(task.payload["task"], "media server");
        let name = h.remote.last_emit("assign_name").unwrap();
        assert_eq!(name.payload["name"], "Kitchen Pi");
        let entry = h.env.task_ledger.resolve(&name.ack.unwrap()).unwrap();
        assert!(!entry.awaits_events);
    }
}
