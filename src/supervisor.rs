//! Session Supervisor: orchestrates one switch-and-launch cycle — switch,
//! release the client lock, spawn the client, wait for exit, relock,
//! recapture the cookie.

use crate::cookie::CookieStore;
use crate::gui::LoginPresenter;
use crate::lock::LockManager;
use crate::model::Paths;
use crate::router::CommandRouter;
use anyhow::Context;
use std::process::{Command, Stdio};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub struct Supervisor {
    paths: Paths,
    cookies: CookieStore,
    lock: LockManager,
    router: Arc<CommandRouter>,
    notify_rx: Receiver<()>,
    presenter: Box<dyn LoginPresenter>,
    logfile: Option<std::path::PathBuf>,
    default_args: Vec<String>,
    invocation_tokens: Vec<String>,
}

impl Supervisor {
    pub fn new(
        paths: Paths,
        presenter: Box<dyn LoginPresenter>,
        logfile: Option<std::path::PathBuf>,
        default_args: Vec<String>,
        invocation_tokens: Vec<String>,
    ) -> Self {
        let (router, notify_rx) = CommandRouter::new();
        let link = crate::platform::new(&paths);
        let lock = LockManager::new(link, router.clone());
        Self {
            cookies: CookieStore::new(paths.clone()),
            paths,
            lock,
            router,
            notify_rx,
            presenter,
            logfile,
            default_args,
            invocation_tokens,
        }
    }

    /// `None` when this invocation has nothing to forward (e.g. a bare
    /// `acolyte` launch with no Client-style flags); `Some` otherwise, so
    /// `LockManager::lock` sends this invocation's own command line to
    /// whoever is already listening instead of silently discarding it.
    fn forward_tokens(&self) -> Option<Vec<String>> {
        if self.invocation_tokens.is_empty() {
            None
        } else {
            Some(self.invocation_tokens.clone())
        }
    }

    /// `acolyte` (no subcommand): acquire locks, then behave as a
    /// long-lived process that lists users and waits for either a
    /// forwarded command or an interrupt. Polls `interrupted` on a short
    /// timeout rather than blocking forever on `recv()`, so a Ctrl-C
    /// handler set on the main thread can break the loop.
    pub fn run_daemon(&mut self, interrupted: &std::sync::atomic::AtomicBool) -> anyhow::Result<()> {
        let forward = self.forward_tokens();
        let (first, acquired) = self.lock.lock(forward.as_deref())?;
        if !first {
            // another acolyte instance owns the singleton; our command
            // line (if any) was already forwarded to it by `lock()`, so
            // there's nothing left to do but exit cleanly.
            return Ok(());
        }
        if !acquired {
            if forward.is_some() {
                // we're first, but something is already listening (the real
                // Client, most likely) and we just forwarded our own flags
                // to it (e.g. `-foreground`) — a one-shot notification, not
                // a request to wait around and become the daemon.
                return Ok(());
            }
            self.lock.wait_for_lock()?;
        }
        self.present_users()?;
        use std::sync::atomic::Ordering;
        while !interrupted.load(Ordering::SeqCst) {
            match self.notify_rx.recv_timeout(std::time::Duration::from_millis(200)) {
                Ok(()) => {
                    if let Some(args) = self.router.take_pending() {
                        self.presenter.bring_to_front();
                        log::info!("received forwarded command: {args:?}");
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }

    /// `acolyte store`: capture the current cookie from the live config.
    pub fn store(&mut self) -> anyhow::Result<()> {
        let forward = self.forward_tokens();
        let (first, acquired) = self.lock.lock(forward.as_deref())?;
        if !first {
            return Ok(());
        }
        if !acquired {
            self.lock.wait_for_lock()?;
        }
        self.cookies.store_login_cookie(&self.lock)?;
        Ok(())
    }

    /// `acolyte switch USER`: rewrite config to USER's cookie and set
    /// auto-login, without spawning the client.
    pub fn switch(&mut self, account_name: &str) -> anyhow::Result<bool> {
        let forward = self.forward_tokens();
        let (first, acquired) = self.lock.lock(forward.as_deref())?;
        if !first {
            return Ok(true); // forwarded to a peer; CLI treats as handled
        }
        if !acquired {
            self.lock.wait_for_lock()?;
        }
        let switched = self.cookies.switch_user(&self.lock, account_name)?;
        if !switched {
            eprintln!("no stored credential for {account_name:?}");
        }
        Ok(switched)
    }

    /// `acolyte start USER`: switch, spawn the client, recapture the
    /// cookie on exit.
    pub fn start(&mut self, account_name: &str, forward_args: &[String]) -> anyhow::Result<bool> {
        let forward = self.forward_tokens();
        let (first, acquired) = self.lock.lock(forward.as_deref())?;
        if !first {
            return Ok(true);
        }
        if !acquired {
            self.lock.wait_for_lock()?;
        }
        if !self.lock.client_lock_held() {
            anyhow::bail!("client lock not held; cannot start a session");
        }

        let switched = self.cookies.switch_user(&self.lock, account_name)?;
        if !switched {
            eprintln!("no stored credential for {account_name:?}");
            return Ok(false);
        }

        self.lock.unlock();
        self.spawn_client(forward_args)
            .context("failed to launch client")?;
        self.lock.wait_for_lock()?;
        self.cookies.store_login_cookie(&self.lock)?;
        Ok(true)
    }

    /// Dispatches `exe -shutdown` to a running client without holding the
    /// client lock ourselves.
    pub fn send_shutdown(&self) -> anyhow::Result<bool> {
        self.lock.connect_and_send(&["-shutdown".to_string()])
    }

    fn present_users(&self) -> anyhow::Result<()> {
        let users = self.cookies.users()?;
        self.presenter.present_users(&users);
        Ok(())
    }

    fn spawn_client(&self, forward_args: &[String]) -> anyhow::Result<()> {
        let mut args = self.default_args.clone();
        args.extend(forward_args.iter().cloned());
        let mut cmd = Command::new(&self.paths.exe);
        cmd.args(&args);
        match &self.logfile {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("opening logfile {}", path.display()))?;
                cmd.stdout(Stdio::from(file.try_clone()?));
                cmd.stderr(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }
        let mut child = cmd.spawn()?;
        let status = child.wait()?;
        if !status.success() {
            log::warn!("client exited with status {status}");
        }
        Ok(())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.lock.unlock();
        self.lock.release_acolyte_instance_lock();
    }
}
