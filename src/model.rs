//! Core data model: [`SteamUser`] records and installation [`Paths`].

use std::path::PathBuf;

/// An immutable record of a user known to the client's `loginusers.vdf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamUser {
    pub steam_id: String,
    pub account_name: String,
    pub persona_name: String,
    pub timestamp: i64,
}

impl SteamUser {
    /// The sentinel "new account" entry: an empty `account_name` presents
    /// the client's own login screen instead of switching to a cookie.
    pub fn is_new_account_sentinel(&self) -> bool {
        self.account_name.is_empty()
    }
}

/// Resolved filesystem/registry locations for one client installation.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root of the client's config tree (contains `config/`, and the
    /// supervisor-owned `acolyte/` subtree).
    pub root: PathBuf,
    /// Launcher executable/command.
    pub exe: PathBuf,
}

impl Paths {
    pub fn config_vdf(&self) -> PathBuf {
        self.root.join("config").join("config.vdf")
    }

    pub fn loginusers_vdf(&self) -> PathBuf {
        self.root.join("config").join("loginusers.vdf")
    }

    pub fn acolyte_dir(&self) -> PathBuf {
        self.root.join("acolyte")
    }

    pub fn cookie_path(&self, account_name: &str) -> PathBuf {
        self.acolyte_dir().join(account_name).join("config.vdf")
    }

    #[cfg(unix)]
    pub fn acolyte_lock_path(&self) -> PathBuf {
        self.acolyte_dir().join("acolyte.lock")
    }
}
