//! Client installation discovery.

use crate::error::AcolyteError;
use crate::model::Paths;
use std::path::PathBuf;

/// Overrides taken from the CLI's `--prefix`/`--root`/`--exe` options.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub prefix: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub exe: Option<PathBuf>,
}

#[cfg(unix)]
const CANDIDATE_ROOTS: &[&str] = &[
    ".local/share/Steam",
    ".steam/steam",
    ".steam/root",
    ".steam",
];

/// Locates the client's root/exe paths, honoring CLI overrides first.
pub fn find_paths(overrides: &CliOverrides) -> anyhow::Result<Paths> {
    if let Some(root) = overrides.root.clone().or_else(|| {
        overrides
            .prefix
            .as_ref()
            .map(|p| p.join(".steam").join("steam"))
    }) {
        let exe = overrides.exe.clone().unwrap_or_else(|| root.join("steam.sh"));
        return Ok(Paths { root, exe });
    }

    #[cfg(unix)]
    {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| AcolyteError::EnvMissing("$HOME is not set".into()))?;
        for candidate in CANDIDATE_ROOTS {
            let root = home.join(candidate);
            if root.join("config").join("config.vdf").is_file() {
                let exe = overrides.exe.clone().unwrap_or_else(|| root.join("steam.sh"));
                return Ok(Paths { root, exe });
            }
        }
        Err(AcolyteError::EnvMissing(format!(
            "no client installation found under {}",
            home.display()
        ))
        .into())
    }

    #[cfg(windows)]
    {
        let root = crate::platform::windows::registry::read_steam_path()
            .map_err(|e| AcolyteError::EnvMissing(format!("SteamPath registry read failed: {e}")))?
            .ok_or_else(|| {
                AcolyteError::EnvMissing(
                    "HKCU\\SOFTWARE\\Valve\\Steam\\SteamPath not set".into(),
                )
            })?;
        let root = PathBuf::from(root);
        let exe = overrides.exe.clone().unwrap_or_else(|| root.join("steam.exe"));
        Ok(Paths { root, exe })
    }
}
