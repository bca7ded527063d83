//! Platform adapter: impersonates the client's single-instance protocol.
//!
//! Selected at compile time via `cfg(unix)`/`cfg(windows)` into a
//! `posix`/`windows` module pair, since this crate runs on both.

#[cfg(unix)]
pub mod posix;
#[cfg(windows)]
pub mod windows;

use crate::model::Paths;
use crate::router::CommandRouter;
use std::sync::Arc;

/// Shared surface both adapters implement. The Supervisor owns a
/// `Box<dyn ClientLink>` — composition, not inheritance.
pub trait ClientLink: Send {
    /// Whether the PID recorded for the client is a still-running process.
    fn is_client_pid_valid(&self) -> anyhow::Result<bool>;
    /// Records this process's PID as the client's.
    fn set_client_pid(&self) -> anyhow::Result<()>;
    /// Whether a listener (client or acolyte peer) is reachable through the
    /// command-delivery channel.
    fn connect(&self) -> anyhow::Result<bool>;
    /// Starts listening for forwarded command lines, dispatching each to
    /// `router`. Spawns a background thread (POSIX) or registers an OS wait
    /// (Windows); must be cancellable via [`ClientLink::unlock`].
    fn listen(&mut self, router: Arc<CommandRouter>) -> anyhow::Result<()>;
    /// Delivers a command line to whatever is listening.
    fn send(&self, args: &[String]) -> anyhow::Result<()>;
    /// Releases the client lock (not the acolyte singleton). Idempotent.
    fn unlock(&mut self) -> anyhow::Result<()>;
    /// Blocks until the client process exits.
    fn wait_for_client_exit(&self) -> anyhow::Result<()>;
    /// Attempts to acquire the acolyte singleton. Returns whether this
    /// process now owns it (`false` means a peer already holds it).
    fn acquire_acolyte_lock(&mut self) -> anyhow::Result<bool>;
    /// Releases the acolyte singleton. Called exactly once, at process exit.
    fn release_acolyte_lock(&mut self);
    /// Reads the client's persisted "last user" pointer, if any.
    fn read_last_user(&self) -> anyhow::Result<Option<String>>;
    /// Writes the client's persisted "last user" pointer and the
    /// remember-password flag.
    fn write_last_user(&self, account_name: &str, remember_password: bool) -> anyhow::Result<()>;
}

/// Constructs the adapter for the current platform.
#[cfg(unix)]
pub fn new(paths: &Paths) -> Box<dyn ClientLink> {
    Box::new(posix::PosixLink::new(paths.clone()))
}

/// Constructs the adapter for the current platform.
#[cfg(windows)]
pub fn new(paths: &Paths) -> Box<dyn ClientLink> {
    Box::new(windows::WindowsLink::new(paths.clone()))
}
