//! Command Router: tokenizes forwarded command lines and hands them to the
//! running supervisor through a single-slot mailbox.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Latest-wins mailbox for a forwarded argument list, shared with the
/// platform adapter's listener thread/wait registration.
pub struct CommandRouter {
    pending: Mutex<Option<Vec<String>>>,
    notify: Sender<()>,
}

impl CommandRouter {
    /// Builds a router plus the receiving half the supervisor polls/blocks on.
    pub fn new() -> (Arc<Self>, Receiver<()>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (
            Arc::new(Self {
                pending: Mutex::new(None),
                notify: tx,
            }),
            rx,
        )
    }

    /// Called by the listening platform adapter when a raw command line
    /// arrives. Tokenizes with shell-style quoting (matching `send()`'s own
    /// quoting on both platforms), drops `argv[0]`, and overwrites any
    /// previous pending args — last writer wins, intentionally: a forwarded
    /// command from a hyperactive user should not queue.
    pub fn on_command_line(&self, line: &str) {
        let Some(mut tokens) = shlex::split(line) else {
            log::warn!("dropping unparsable forwarded command line: {line:?}");
            return;
        };
        if tokens.is_empty() {
            return;
        }
        tokens.remove(0); // argv[0]
        *self.pending.lock().expect("router mutex poisoned") = Some(tokens);
        let _ = self.notify.send(());
    }

    /// Drains the mailbox, if anything is pending.
    pub fn take_pending(&self) -> Option<Vec<String>> {
        self.pending.lock().expect("router mutex poisoned").take()
    }
}

/// Quotes and joins an argument list the same way a forwarded command line
/// is expected to be tokenized back apart by [`CommandRouter::on_command_line`].
pub fn quote_join(exe: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(shlex::try_quote(exe).unwrap_or_else(|_| exe.into()).into_owned());
    parts.extend(
        args.iter()
            .map(|a| shlex::try_quote(a).unwrap_or_else(|_| a.as_str().into()).into_owned()),
    );
    parts.join(" ")
}
