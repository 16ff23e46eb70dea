//! Console engine and terminal subsystem.
//!
//! Input lines are tokenized, resolved against a registry of commands that
//! implement the `Command` trait, and dispatched once or repeatedly through
//! the hold scheduler. Every output line is tagged with a channel; the
//! channel router decides which lines the active view shows. `Console`
//! ties these together with the controller link.

pub mod commands;
pub mod console;
pub mod hold;
pub mod interpreter;
pub mod router;
pub mod system_commands;
pub mod task_commands;
pub mod tokenizer;

#[cfg(test)]
mod test_utils;

/// Register every built-in command into a registry.
pub use commands::register_builtins;
/// The console: registry, holds, scrollback and controller link.
pub use console::Console;
/// Repeating invocations with cancel-all.
pub use hold::HoldScheduler;
/// A single executable command trait.
pub use interpreter::Command;
/// Registry of available commands with dispatch.
pub use interpreter::CommandRegistry;
/// Per-invocation view handed to a command.
pub use interpreter::ExecutionContext;
/// Shared services passed to every command.
pub use interpreter::Environment;
pub use interpreter::{ConsoleAction, DispatchOptions, ResolvedInvocation, resolve};
/// Scrollback multiplexed over channels.
pub use router::{ChannelRouter, Line, RenderUpdate};
pub use tokenizer::tokenize;
