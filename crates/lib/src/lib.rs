//! buildwatch-lib: run a front-end build tool and stream its output.
//!
//! The central piece is [`BuildWatcher`], which launches an external build
//! command (often in watch mode), relays its stdout and stderr chunk by chunk,
//! and finishes with a [`BuildResult`]:
//! - `BuildInvocation`: immutable description of one run
//! - `BuildRun`: handle yielding `OutputEvent`s, cancellable
//! - `relay`: forwards events to the console
//! - `WatchConfig`: JSON config files describing a build

pub mod config;
pub mod consts;
pub mod event;
pub mod invocation;
pub mod relay;
pub mod result;
pub mod shell;
pub mod watcher;

mod stream;
#[cfg(test)]
mod util;

pub use config::{ConfigError, WatchConfig};
pub use event::{OutputEvent, StreamKind};
pub use invocation::{BuildInvocation, BuildInvocationBuilder, InvocationError};
pub use relay::{EventSource, ScriptedEvents, relay};
pub use result::{BuildResult, BuildState, TerminationReason};
pub use watcher::{BuildRun, BuildWatcher, CancelHandle, run};
