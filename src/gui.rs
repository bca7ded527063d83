//! GUI seam (out of scope per the design notes): a named interface the
//! Supervisor drives so the core compiles and runs end-to-end from the CLI
//! without any real window toolkit wired in.

use crate::model::SteamUser;

/// Presents the account list and brings the window forward on a forwarded
/// command. No real implementation ships here — see [`NullPresenter`].
pub trait LoginPresenter: Send {
    fn present_users(&self, users: &[SteamUser]);
    fn bring_to_front(&self);
}

/// The only [`LoginPresenter`] this crate builds: logs to stdout instead of
/// drawing a window. The bare CLI mode (no subcommand) wires the Supervisor
/// to this and otherwise behaves like a long-lived daemon waiting on the
/// client lock.
pub struct NullPresenter;

impl LoginPresenter for NullPresenter {
    fn present_users(&self, users: &[SteamUser]) {
        let mut sorted: Vec<&SteamUser> = users.iter().collect();
        sorted.sort_by(|a, b| {
            a.persona_name
                .to_ascii_lowercase()
                .cmp(&b.persona_name.to_ascii_lowercase())
                .then_with(|| {
                    a.account_name
                        .to_ascii_lowercase()
                        .cmp(&b.account_name.to_ascii_lowercase())
                })
        });
        for user in sorted {
            println!("{}\t{}", user.persona_name, user.account_name);
        }
    }

    fn bring_to_front(&self) {
        log::info!("forwarded command received; a real presenter would raise the window here");
    }
}
