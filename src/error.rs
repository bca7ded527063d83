//! Error taxonomy for the supervisor core.
//!
//! Platform and VDF errors bubble up typed so the CLI can match on kind to
//! pick an exit code; expected conditions (missing cookie, absent account)
//! are absorbed at the Cookie Store boundary and returned as `bool`/`Option`,
//! never as `Err` — see `cookie::CookieStore`.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AcolyteError {
    #[error("could not locate the client installation: {0}")]
    EnvMissing(String),

    #[error("another acolyte instance is running")]
    LockContended,

    #[error("no stored credential for {0:?}")]
    StaleCookie(String),

    #[error("failed to parse VDF file {path}: {source}")]
    VdfParse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("platform call failed: {0}")]
    PlatformCall(#[from] std::io::Error),
}
