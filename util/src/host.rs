//! Host platform utility functions

use std::env::VarError;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root.
pub const SW_ROOT_ENV_VAR: &str = "MOWER_SIM_ROOT";

/// Get the root directory of the mower simulator software.
///
/// The root is read from the `MOWER_SIM_ROOT` environment variable and is
/// used to locate the `params` and `sessions` directories.
pub fn get_mower_sim_root() -> Result<PathBuf, VarError> {
    Ok(PathBuf::from(std::env::var(SW_ROOT_ENV_VAR)?))
}
