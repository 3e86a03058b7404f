//! Host platform (linux for example) utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use thiserror::Error;
use uname;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the host module.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable (KESTREL_SW_ROOT) is not set")]
    SwRootNotSet
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the software root directory.
///
/// The root is pointed to by the `KESTREL_SW_ROOT` environment variable and
/// contains the `params` and `sessions` directories.
pub fn get_sw_root() -> Result<PathBuf, HostError> {
    match std::env::var("KESTREL_SW_ROOT") {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => Err(HostError::SwRootNotSet)
    }
}
