use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory and an initial `config.json` holding the access code.
///
/// # Arguments
/// - `insights_home` - The directory that will hold the configuration, e.g. `$HOME/insights`
/// - `auth_code` - The shared code operators enter on the login page
/// - `bind` - Optional address for `insights serve`, defaults to `127.0.0.1:8501`
///
/// # Errors
/// - Returns an error if the values are invalid, the config already exists, or any file
///   operation fails.
pub async fn init(insights_home: &Path, auth_code: &str, bind: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(insights_home, auth_code, bind)
        .await
        .context("Unable to create the insights directory and config")?;
    Ok(format!(
        "Successfully created the insights config at {}",
        config.config_path().display()
    )
    .into())
}
