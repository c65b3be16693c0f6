//! Crate-wide constants.

use std::time::Duration;

/// Default ceiling for a single buffered output chunk, in bytes.
///
/// Large enough for the progress and stats reports emitted by common
/// front-end bundlers in one write.
pub const DEFAULT_BUFFER_LIMIT: usize = 1_024_000;

/// Time between the termination request and a forced kill.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// How long a stream may stay silent after the child has exited before it is abandoned.
///
/// A detached grandchild can hold the pipe open indefinitely.
pub const STREAM_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Output events queued between the stream readers and the consumer.
///
/// When the queue is full the readers stop reading, so a slow consumer
/// throttles the build through its pipes.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the buffered reader sitting on each child stream.
pub const READ_CAPACITY: usize = 8 * 1024;

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE_NAME: &str = "buildwatch.json";

/// Environment variable overriding the configured buffer limit.
pub const BUFFER_LIMIT_ENV: &str = "BUILDWATCH_BUFFER_LIMIT";
