//! Windows adapter: named kernel event + registry string for command
//! delivery, registry DWORD for client PID, named mutex for the acolyte
//! singleton, `WaitForSingleObject` on a process handle for exit detection.
//!
//! This adapter needs registry read/write, a named mutex, a named event,
//! and `OpenProcess`/`WaitForSingleObject` across a broad surface, so it
//! depends on the `windows` crate rather than hand-declaring a dozen
//! `extern "system"` FFI signatures for each one.

use super::ClientLink;
use crate::model::Paths;
use crate::router::CommandRouter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use windows::core::PCSTR;
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExA, RegOpenKeyExA, RegQueryValueExA, RegSetValueExA, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE,
    REG_SZ,
};
use windows::Win32::System::Threading::{
    CreateEventA, CreateMutexA, OpenEventA, OpenProcess, SetEvent, WaitForSingleObject,
    EVENT_MODIFY_STATE, INFINITE, PROCESS_SYNCHRONIZE, SYNCHRONIZE,
};

const STEAM_SUBKEY: &str = "SOFTWARE\\WOW6432Node\\Valve\\Steam\0";
const STEAM_SUBKEY_HKCU: &str = "SOFTWARE\\Valve\\Steam\0";
const PID_VALUE: &str = "SteamPID\0";
const CMDLINE_VALUE: &str = "TempAppCmdLine\0";
const AUTOLOGIN_VALUE: &str = "AutoLoginUser\0";
const REMEMBER_PW_VALUE: &str = "RememberPassword\0";
const EVENT_NAME: &str = "Global\\Valve_SteamIPC_Class\0";
const MUTEX_NAME: &str = "acolyte-instance-lock-{4F0BE4F0-3B7F-4A2E-9C0D-6A9E1B2C3D4F}\0";

fn pcstr(s: &str) -> PCSTR {
    PCSTR(s.as_ptr())
}

/// Reads `HKCU\SOFTWARE\Valve\Steam\SteamPath`, used by installation discovery.
pub mod registry {
    use super::*;

    pub fn read_steam_path() -> anyhow::Result<Option<String>> {
        read_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, "SteamPath\0")
    }
}

fn open_key(root: HKEY, subkey: &str, access: u32) -> windows::core::Result<HKEY> {
    let mut key = HKEY::default();
    unsafe {
        RegOpenKeyExA(root, pcstr(subkey), 0, windows::Win32::System::Registry::REG_SAM_FLAGS(access), &mut key)
    }
    .ok()?;
    Ok(key)
}

fn read_string(root: HKEY, subkey: &str, value: &str) -> anyhow::Result<Option<String>> {
    let Ok(key) = open_key(root, subkey, KEY_READ.0) else {
        return Ok(None);
    };
    let mut buf = vec![0u8; 1024];
    let mut len = buf.len() as u32;
    let mut kind = REG_SZ;
    let result = unsafe {
        RegQueryValueExA(
            key,
            pcstr(value),
            None,
            Some(&mut kind),
            Some(buf.as_mut_ptr()),
            Some(&mut len),
        )
    };
    unsafe { let _ = RegCloseKey(key); }
    if result.is_err() {
        return Ok(None);
    }
    buf.truncate(len as usize);
    while buf.last() == Some(&0) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

fn write_string(root: HKEY, subkey: &str, value: &str, data: &str) -> anyhow::Result<()> {
    let mut key = HKEY::default();
    unsafe {
        RegCreateKeyExA(
            root,
            pcstr(subkey),
            0,
            None,
            REG_OPTION_NON_VOLATILE,
            windows::Win32::System::Registry::REG_SAM_FLAGS(KEY_WRITE.0),
            None,
            &mut key,
            None,
        )
    }
    .ok()?;
    let bytes = format!("{data}\0");
    let result = unsafe {
        RegSetValueExA(key, pcstr(value), 0, REG_SZ, Some(bytes.as_bytes()))
    };
    unsafe { let _ = RegCloseKey(key); }
    result.ok()?;
    Ok(())
}

fn read_dword(root: HKEY, subkey: &str, value: &str) -> anyhow::Result<Option<u32>> {
    let Ok(key) = open_key(root, subkey, KEY_READ.0) else {
        return Ok(None);
    };
    let mut data = 0u32;
    let mut len = std::mem::size_of::<u32>() as u32;
    let mut kind = REG_DWORD;
    let result = unsafe {
        RegQueryValueExA(
            key,
            pcstr(value),
            None,
            Some(&mut kind),
            Some(&mut data as *mut u32 as *mut u8),
            Some(&mut len),
        )
    };
    unsafe { let _ = RegCloseKey(key); }
    if result.is_err() {
        return Ok(None);
    }
    Ok(Some(data))
}

fn write_dword(root: HKEY, subkey: &str, value: &str, data: u32) -> anyhow::Result<()> {
    let mut key = HKEY::default();
    unsafe {
        RegCreateKeyExA(
            root,
            pcstr(subkey),
            0,
            None,
            REG_OPTION_NON_VOLATILE,
            windows::Win32::System::Registry::REG_SAM_FLAGS(KEY_WRITE.0),
            None,
            &mut key,
            None,
        )
    }
    .ok()?;
    let result = unsafe {
        RegSetValueExA(
            key,
            pcstr(value),
            0,
            REG_DWORD,
            Some(data.to_ne_bytes().as_slice()),
        )
    };
    unsafe { let _ = RegCloseKey(key); }
    result.ok()?;
    Ok(())
}

struct EventHandle(HANDLE);
unsafe impl Send for EventHandle {}

pub struct WindowsLink {
    #[allow(dead_code)]
    paths: Paths,
    mutex: Option<EventHandle>,
    listen_event: Option<EventHandle>,
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl WindowsLink {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            mutex: None,
            listen_event: None,
            stop: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }
}

impl ClientLink for WindowsLink {
    fn is_client_pid_valid(&self) -> anyhow::Result<bool> {
        let Some(pid) = read_dword(HKEY_LOCAL_MACHINE, STEAM_SUBKEY, PID_VALUE)? else {
            return Ok(false);
        };
        if pid == 0 {
            return Ok(false);
        }
        let handle = unsafe { OpenProcess(PROCESS_SYNCHRONIZE, false, pid) };
        let Ok(handle) = handle else {
            return Ok(false);
        };
        let still_running = unsafe { WaitForSingleObject(handle, 0) } == WAIT_TIMEOUT;
        unsafe { let _ = CloseHandle(handle); }
        Ok(still_running)
    }

    fn set_client_pid(&self) -> anyhow::Result<()> {
        write_dword(HKEY_LOCAL_MACHINE, STEAM_SUBKEY, PID_VALUE, std::process::id())
    }

    fn connect(&self) -> anyhow::Result<bool> {
        match unsafe { OpenEventA(EVENT_MODIFY_STATE, false, pcstr(EVENT_NAME)) } {
            Ok(handle) => {
                unsafe { let _ = CloseHandle(handle); }
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn listen(&mut self, router: Arc<CommandRouter>) -> anyhow::Result<()> {
        let handle = unsafe { CreateEventA(None, false, false, pcstr(EVENT_NAME))? };
        self.listen_event = Some(EventHandle(handle));
        self.stop.store(false, Ordering::SeqCst);
        let stop = self.stop.clone();
        let wait_handle = handle.0 as isize;
        self.listener = Some(std::thread::spawn(move || loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let h = HANDLE(wait_handle);
            let wait = unsafe { WaitForSingleObject(h, 200) };
            if wait == WAIT_OBJECT_0 {
                if let Ok(Some(line)) =
                    read_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, CMDLINE_VALUE)
                {
                    router.on_command_line(&line);
                    let _ = write_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, CMDLINE_VALUE, "");
                }
            }
        }));
        Ok(())
    }

    fn send(&self, args: &[String]) -> anyhow::Result<()> {
        let line = crate::router::quote_join(&self.paths.exe.to_string_lossy(), args);
        write_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, CMDLINE_VALUE, &line)?;
        let handle = unsafe { OpenEventA(EVENT_MODIFY_STATE, false, pcstr(EVENT_NAME))? };
        unsafe { SetEvent(handle)?; }
        unsafe { let _ = CloseHandle(handle); }
        Ok(())
    }

    fn unlock(&mut self) -> anyhow::Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
        if let Some(EventHandle(h)) = self.listen_event.take() {
            unsafe { let _ = CloseHandle(h); }
        }
        let _ = write_dword(HKEY_LOCAL_MACHINE, STEAM_SUBKEY, PID_VALUE, 0);
        Ok(())
    }

    fn wait_for_client_exit(&self) -> anyhow::Result<()> {
        let Some(pid) = read_dword(HKEY_LOCAL_MACHINE, STEAM_SUBKEY, PID_VALUE)? else {
            return Ok(());
        };
        if pid == 0 {
            return Ok(());
        }
        let Ok(handle) = (unsafe { OpenProcess(SYNCHRONIZE, false, pid) }) else {
            return Ok(());
        };
        unsafe { WaitForSingleObject(handle, INFINITE) };
        unsafe { let _ = CloseHandle(handle); }
        Ok(())
    }

    fn acquire_acolyte_lock(&mut self) -> anyhow::Result<bool> {
        let handle = unsafe { CreateMutexA(None, true, pcstr(MUTEX_NAME))? };
        let already_exists = unsafe { GetLastError() } == ERROR_ALREADY_EXISTS;
        if already_exists {
            unsafe { let _ = CloseHandle(handle); }
            return Ok(false);
        }
        self.mutex = Some(EventHandle(handle));
        Ok(true)
    }

    fn release_acolyte_lock(&mut self) {
        if let Some(EventHandle(handle)) = self.mutex.take() {
            unsafe { let _ = CloseHandle(handle); }
        }
    }

    fn read_last_user(&self) -> anyhow::Result<Option<String>> {
        read_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, AUTOLOGIN_VALUE)
    }

    fn write_last_user(&self, account_name: &str, remember_password: bool) -> anyhow::Result<()> {
        write_string(HKEY_CURRENT_USER, STEAM_SUBKEY_HKCU, AUTOLOGIN_VALUE, account_name)?;
        write_dword(
            HKEY_CURRENT_USER,
            STEAM_SUBKEY_HKCU,
            REMEMBER_PW_VALUE,
            remember_password as u32,
        )
    }
}
