//! POSIX adapter: named FIFO for command delivery, PID file for liveness,
//! advisory file lock for the acolyte singleton, `kill(pid, 0)` polling for
//! exit detection.

use super::ClientLink;
use crate::model::Paths;
use crate::router::CommandRouter;
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::{mkfifo, Pid};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

fn home_steam_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".steam")
}

fn pid_path() -> PathBuf {
    home_steam_dir().join("steam.pid")
}

fn pipe_path() -> PathBuf {
    home_steam_dir().join("steam.pipe")
}

fn registry_path() -> PathBuf {
    home_steam_dir().join("registry.vdf")
}

pub struct PosixLink {
    paths: Paths,
    acolyte_lock_file: Option<File>,
    writer_fd: Option<RawFd>,
    reader_stop: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl PosixLink {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            acolyte_lock_file: None,
            writer_fd: None,
            reader_stop: Arc::new(AtomicBool::new(false)),
            reader_thread: None,
        }
    }
}

impl ClientLink for PosixLink {
    fn is_client_pid_valid(&self) -> anyhow::Result<bool> {
        let Ok(raw) = fs::read_to_string(pid_path()) else {
            return Ok(false);
        };
        let Ok(pid) = raw.trim().parse::<i32>() else {
            return Ok(false);
        };
        // signal 0 probes existence without actually signaling the process.
        Ok(kill(Pid::from_raw(pid), None).is_ok())
    }

    fn set_client_pid(&self) -> anyhow::Result<()> {
        let dir = home_steam_dir();
        fs::create_dir_all(&dir)?;
        fs::write(pid_path(), format!("{}", std::process::id()))?;
        Ok(())
    }

    fn connect(&self) -> anyhow::Result<bool> {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(pipe_path())
        {
            Ok(_file) => Ok(true),
            Err(e) if e.raw_os_error() == Some(libc::ENXIO) => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn listen(&mut self, router: Arc<CommandRouter>) -> anyhow::Result<()> {
        let dir = home_steam_dir();
        fs::create_dir_all(&dir)?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755))?;
        let pipe = pipe_path();
        if !pipe.exists() {
            mkfifo(&pipe, nix::sys::stat::Mode::from_bits_truncate(0o644))?;
        }

        // O_RDWR is mandated, not O_RDONLY: opening a FIFO for read-only would
        // block until a writer appears, and a read-only fd could never be used
        // to write the self-wakeup sentinel used by `unlock`. See the open
        // question in the design notes — this is documented behavior, not a
        // workaround to remove.
        let reader = OpenOptions::new().read(true).write(true).open(&pipe)?;
        let writer_fd = unsafe { libc::dup(reader.as_raw_fd()) };
        if writer_fd < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        self.writer_fd = Some(writer_fd);

        let stop = self.reader_stop.clone();
        stop.store(false, Ordering::SeqCst);
        let handle = std::thread::spawn(move || {
            let mut lines = BufReader::new(reader).lines();
            while let Some(Ok(line)) = lines.next() {
                if line.is_empty() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    continue;
                }
                router.on_command_line(&line);
            }
        });
        self.reader_thread = Some(handle);
        Ok(())
    }

    fn send(&self, args: &[String]) -> anyhow::Result<()> {
        let line = crate::router::quote_join(&self.paths.exe.to_string_lossy(), args);
        let mut file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(pipe_path())?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn unlock(&mut self) -> anyhow::Result<()> {
        self.reader_stop.store(true, Ordering::SeqCst);
        if let Some(fd) = self.writer_fd.take() {
            let mut writer = unsafe { File::from_raw_fd(fd) };
            let _ = writer.write_all(b"\n");
        }
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        let _ = fs::remove_file(pid_path());
        Ok(())
    }

    fn wait_for_client_exit(&self) -> anyhow::Result<()> {
        loop {
            if !self.is_client_pid_valid()? {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn acquire_acolyte_lock(&mut self) -> anyhow::Result<bool> {
        let lock_path = self.paths.acolyte_lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .mode(0o644)
            .open(&lock_path)?;
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {
                self.acolyte_lock_file = Some(file);
                Ok(true)
            }
            Err(Errno::EWOULDBLOCK) | Err(Errno::EAGAIN) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn release_acolyte_lock(&mut self) {
        // dropping the File releases the flock
        self.acolyte_lock_file = None;
    }

    fn read_last_user(&self) -> anyhow::Result<Option<String>> {
        let tree = crate::vdf::load(registry_path())?;
        Ok(crate::vdf::get_str(
            &tree,
            "Registry\\HKCU\\Software\\Valve\\Steam\\AutoLoginUser",
        )
        .map(str::to_owned))
    }

    fn write_last_user(&self, account_name: &str, remember_password: bool) -> anyhow::Result<()> {
        let mut tree = crate::vdf::load(registry_path())?;
        let leaf = crate::vdf::subkey_lookup(&mut tree, "Registry\\HKCU\\Software\\Valve\\Steam");
        leaf.insert(
            "AutoLoginUser".into(),
            crate::vdf::Value::Str(account_name.to_owned()),
        );
        leaf.insert(
            "RememberPassword".into(),
            crate::vdf::Value::Str(if remember_password { "1" } else { "0" }.into()),
        );
        crate::vdf::dump(registry_path(), &tree)
    }
}
