//! Cookie Store: per-account snapshots of the client's `config.vdf`, the
//! active snapshot switch, and the "last user" pointer. Stays platform
//! agnostic by delegating the registry-equivalent "last user" reads/writes
//! to whatever [`ClientLink`] the caller hands in — the same
//! adapter-into-supervisor composition the design notes call for.

use crate::model::{Paths, SteamUser};
use crate::vdf::{self, Value};
use std::fs;

/// The slice of [`crate::platform::ClientLink`] the Cookie Store needs for
/// "last user" reads/writes. Kept separate from the full adapter trait so
/// this module stays platform-agnostic and testable against a trivial fake,
/// rather than a fake that has to stub out FIFOs and mutexes it never uses.
pub trait LastUserRegistry {
    fn read_last_user(&self) -> anyhow::Result<Option<String>>;
    fn write_last_user(&self, account_name: &str, remember_password: bool) -> anyhow::Result<()>;
}

impl LastUserRegistry for crate::lock::LockManager {
    fn read_last_user(&self) -> anyhow::Result<Option<String>> {
        crate::lock::LockManager::read_last_user(self)
    }
    fn write_last_user(&self, account_name: &str, remember_password: bool) -> anyhow::Result<()> {
        crate::lock::LockManager::write_last_user(self, account_name, remember_password)
    }
}

pub struct CookieStore {
    paths: Paths,
}

impl CookieStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Reads `loginusers.vdf` and projects each entry into a [`SteamUser`].
    /// Ordering is left to the caller (the UI sorts lexicographically).
    pub fn users(&self) -> anyhow::Result<Vec<SteamUser>> {
        let tree = vdf::load(self.paths.loginusers_vdf())?;
        let Some(users) = tree.get("users").and_then(Value::as_map) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(users.len());
        for (steam_id, entry) in users {
            let Some(fields) = entry.as_map() else {
                continue;
            };
            let account_name = fields
                .get("AccountName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let persona_name = fields
                .get("PersonaName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let timestamp = fields
                .get("Timestamp")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0);
            out.push(SteamUser {
                steam_id: steam_id.clone(),
                account_name,
                persona_name,
                timestamp,
            });
        }
        Ok(out)
    }

    /// Captures the current `config.vdf` as `account_name`'s cookie, iff
    /// `account_name` is the registry's `AutoLoginUser` *and* is still
    /// listed in `InstallConfigStore\Software\Valve\Steam\Accounts`. If the
    /// account logged out from inside the client (absent from Accounts),
    /// the existing cookie is left untouched — the last known good
    /// credential blob is preserved rather than overwritten with a blank.
    pub fn store_login_cookie(&self, link: &dyn LastUserRegistry) -> anyhow::Result<bool> {
        let Some(account_name) = link.read_last_user()? else {
            return Ok(false);
        };
        if account_name.is_empty() {
            return Ok(false);
        }
        let config = vdf::load(self.paths.config_vdf())?;
        let present = Self::account_in_accounts(&config, &account_name);
        if !present {
            return Ok(false);
        }
        let cookie_path = self.paths.cookie_path(&account_name);
        if let Some(parent) = cookie_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(self.paths.config_vdf(), &cookie_path)?;
        Ok(true)
    }

    fn account_in_accounts(config: &vdf::Tree, account_name: &str) -> bool {
        let accounts = config
            .get("InstallConfigStore")
            .and_then(Value::as_map)
            .and_then(|m| m.get("Software"))
            .and_then(Value::as_map)
            .and_then(|m| m.get("Valve"))
            .and_then(Value::as_map)
            .and_then(|m| m.get("Steam"))
            .and_then(Value::as_map)
            .and_then(|m| m.get("Accounts"))
            .and_then(Value::as_map);
        let Some(accounts) = accounts else {
            return false;
        };
        let Some(entry) = accounts.get(account_name) else {
            return false;
        };
        match entry {
            Value::Str(s) => s != "0" && !s.is_empty(),
            Value::Map(_) => true,
        }
    }

    /// Deletes the cookie file for `account_name`, if present. A missing
    /// file is not an error.
    pub fn remove_login_cookie(&self, account_name: &str) -> anyhow::Result<()> {
        let path = self.paths.cookie_path(account_name);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a user entirely: cookie, `loginusers.vdf` entry, and the
    /// `Accounts` key in `config.vdf`. Idempotent — a second call finds
    /// nothing left to remove and succeeds as a no-op.
    pub fn remove_user(&self, account_name: &str) -> anyhow::Result<()> {
        self.remove_login_cookie(account_name)?;

        let mut loginusers = vdf::load(self.paths.loginusers_vdf())?;
        if let Some(Value::Map(users)) = loginusers.get_mut("users") {
            let doomed: Vec<String> = users
                .iter()
                .filter(|(_, v)| {
                    v.as_map()
                        .and_then(|m| m.get("AccountName"))
                        .and_then(Value::as_str)
                        == Some(account_name)
                })
                .map(|(k, _)| k.clone())
                .collect();
            for id in doomed {
                users.shift_remove(&id);
            }
        }
        vdf::dump(self.paths.loginusers_vdf(), &loginusers)?;

        let mut config = vdf::load(self.paths.config_vdf())?;
        let accounts = vdf::subkey_lookup(
            &mut config,
            "InstallConfigStore\\Software\\Valve\\Steam\\Accounts",
        );
        accounts.shift_remove(account_name);
        vdf::dump(self.paths.config_vdf(), &config)?;

        Ok(())
    }

    /// A truthy name with an existing cookie file.
    pub fn has_cookie(&self, account_name: &str) -> bool {
        !account_name.is_empty() && self.paths.cookie_path(account_name).is_file()
    }

    /// Switches the active `config.vdf` to `account_name`'s cookie and sets
    /// auto-login. An empty `account_name` is the "new account" sentinel:
    /// it writes the empty auto-login pointer and leaves `config.vdf`
    /// untouched, presenting the client's own login screen.
    ///
    /// `set_last_user` is written *before* the cookie overwrite: a crash
    /// between the two leaves the client pointing at a user whose cookie
    /// hasn't been restored yet, which just falls back to the login
    /// screen on next launch — an acceptable failure mode, not a silent
    /// one.
    pub fn switch_user(&self, link: &dyn LastUserRegistry, account_name: &str) -> anyhow::Result<bool> {
        if account_name.is_empty() {
            link.write_last_user("", true)?;
            return Ok(true);
        }
        if !self.has_cookie(account_name) {
            return Ok(false);
        }
        link.write_last_user(account_name, true)?;
        fs::copy(self.paths.cookie_path(account_name), self.paths.config_vdf())?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeLink {
        last_user: RefCell<Option<String>>,
    }

    impl LastUserRegistry for FakeLink {
        fn read_last_user(&self) -> anyhow::Result<Option<String>> {
            Ok(self.last_user.borrow().clone())
        }
        fn write_last_user(&self, account_name: &str, _remember_password: bool) -> anyhow::Result<()> {
            *self.last_user.borrow_mut() = Some(account_name.to_owned());
            Ok(())
        }
    }

    fn seeded_paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("config")).unwrap();
        let paths = Paths {
            root,
            exe: dir.path().join("steam.sh"),
        };
        (dir, paths)
    }

    fn write_config_with_account(paths: &Paths, account_name: &str, truthy: bool) {
        let mut tree = vdf::Tree::new();
        let accounts = vdf::subkey_lookup(
            &mut tree,
            "InstallConfigStore\\Software\\Valve\\Steam\\Accounts",
        );
        accounts.insert(
            account_name.to_owned(),
            Value::Str(if truthy { "1" } else { "0" }.into()),
        );
        vdf::dump(paths.config_vdf(), &tree).unwrap();
    }

    #[test]
    fn store_login_cookie_requires_account_present_and_truthy() {
        let (_dir, paths) = seeded_paths();
        write_config_with_account(&paths, "alice", true);
        fs::write(paths.config_vdf(), fs::read(paths.config_vdf()).unwrap()).unwrap();
        let store = CookieStore::new(paths.clone());
        let link = FakeLink {
            last_user: RefCell::new(Some("alice".into())),
        };
        assert!(store.store_login_cookie(&link).unwrap());
        assert!(store.has_cookie("alice"));
    }

    #[test]
    fn store_login_cookie_skips_when_absent_from_accounts() {
        let (_dir, paths) = seeded_paths();
        write_config_with_account(&paths, "bob", true);
        let store = CookieStore::new(paths.clone());
        let link = FakeLink {
            last_user: RefCell::new(Some("carol".into())),
        };
        assert!(!store.store_login_cookie(&link).unwrap());
        assert!(!store.has_cookie("carol"));
    }

    #[test]
    fn switch_user_requires_existing_cookie() {
        let (_dir, paths) = seeded_paths();
        let store = CookieStore::new(paths.clone());
        let link = FakeLink {
            last_user: RefCell::new(None),
        };
        assert!(!store.switch_user(&link, "nobody").unwrap());
    }

    #[test]
    fn switch_user_copies_cookie_over_config() {
        let (_dir, paths) = seeded_paths();
        fs::create_dir_all(paths.cookie_path("bob").parent().unwrap()).unwrap();
        fs::write(paths.cookie_path("bob"), b"COOKIE-BYTES").unwrap();
        let store = CookieStore::new(paths.clone());
        let link = FakeLink {
            last_user: RefCell::new(None),
        };
        assert!(store.switch_user(&link, "bob").unwrap());
        assert_eq!(fs::read(paths.config_vdf()).unwrap(), b"COOKIE-BYTES");
        assert_eq!(link.read_last_user().unwrap().as_deref(), Some("bob"));
    }

    #[test]
    fn switch_user_empty_sentinel_leaves_config_untouched() {
        let (_dir, paths) = seeded_paths();
        fs::write(paths.config_vdf(), b"UNCHANGED").unwrap();
        let store = CookieStore::new(paths.clone());
        let link = FakeLink {
            last_user: RefCell::new(None),
        };
        assert!(store.switch_user(&link, "").unwrap());
        assert_eq!(fs::read(paths.config_vdf()).unwrap(), b"UNCHANGED");
    }

    #[test]
    fn remove_user_is_idempotent() {
        let (_dir, paths) = seeded_paths();
        let mut loginusers = vdf::Tree::new();
        let users = vdf::subkey_lookup(&mut loginusers, "users");
        let mut alice = vdf::Tree::new();
        alice.insert("AccountName".into(), Value::Str("alice".into()));
        alice.insert("PersonaName".into(), Value::Str("Alice".into()));
        users.insert("7656100000".into(), Value::Map(alice));
        vdf::dump(paths.loginusers_vdf(), &loginusers).unwrap();
        write_config_with_account(&paths, "alice", true);
        fs::create_dir_all(paths.cookie_path("alice").parent().unwrap()).unwrap();
        fs::write(paths.cookie_path("alice"), b"X").unwrap();

        let store = CookieStore::new(paths.clone());
        store.remove_user("alice").unwrap();
        assert!(!store.has_cookie("alice"));
        assert!(store.users().unwrap().is_empty());

        // second call: nothing left to remove, must not error
        store.remove_user("alice").unwrap();
        assert!(store.users().unwrap().is_empty());
    }
}
