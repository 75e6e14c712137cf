//! Generic parameters functions
//!
//! Every executable in the guidance software loads its parameters from TOML files under the
//! `params` directory of the software root, which is located through the `KESTREL_SW_ROOT`
//! environment variable. Parameter structs derive `Deserialize` and are loaded with [`load`].
//!
//! Some parameter files are optional, for instance profile override files which are only
//! present on vehicles that need non-default tunings. These are loaded with [`load_optional`],
//! which treats an absent file as a normal outcome rather than an error.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (KESTREL_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "params" directory under the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_kestrel_sw_root()
        .map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    // Load the file into a string
    let params_str = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(e))
    };

    // Parse the string into the parameter struct
    match toml::from_str(params_str.as_str()) {
        Ok(p) => Ok(p),
        Err(e) => Err(LoadError::DeserialiseError(e))
    }
}

/// Load a parameter file which is allowed to be absent.
///
/// Returns `Ok(None)` if the file does not exist. A file which exists but cannot be read or
/// parsed is still an error, so a broken override file fails loudly instead of being silently
/// skipped.
pub fn load_optional<P>(param_file_path: &str) -> Result<Option<P>, LoadError>
where
    P: DeserializeOwned
{
    match load(param_file_path) {
        Ok(p) => Ok(Some(p)),
        Err(LoadError::FileLoadError(ref e))
            if e.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(None)
        }
        Err(e) => Err(e)
    }
}
