//! Host platform (linux for example) utility functions

use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "KESTREL_SW_ROOT";

/// Get the path to the root of the software directory.
///
/// The root is pointed at by the `KESTREL_SW_ROOT` environment variable, and
/// is expected to contain the `params` and `sessions` directories.
pub fn get_kestrel_sw_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var(SW_ROOT_ENV_VAR)?))
}
