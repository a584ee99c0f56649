use crate::commands::Out;
use crate::{Config, Result};
use std::path::Path;

/// Creates the ninja home directory and an initial `config.json` that points at `api_url`, along
/// with default request and polling settings.
///
/// # Arguments
/// - `ninja_home` - The directory that will hold the configuration, e.g. `$HOME/expense-ninja`
/// - `api_url` - The base URL of the expense backend, e.g. `http://127.0.0.1:5000`
///
/// # Errors
/// - Returns a `Config` error if `api_url` is not an http(s) URL or if any file operation fails.
pub async fn init(ninja_home: &Path, api_url: &str) -> Result<Out<()>> {
    let config = Config::create(ninja_home, api_url)
        .await
        .map_err(|e| e.context("Unable to create the ninja home directory and config"))?;
    Ok(format!(
        "Created {} for the backend at {}",
        config.config_path().display(),
        config.api_base_url()
    )
    .into())
}
