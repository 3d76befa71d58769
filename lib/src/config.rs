use lazy_static::lazy_static;

use serde::Deserialize;

use crate::Error;

pub const DEFAULT_PATH: &str = "/etc/mailgun/mailgun.toml";
const ENV_PREFIX: &str = "MAILGUN";

lazy_static! {
    static ref SETTINGS: Settings = match Settings::load(None) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load Mailgun settings: {}", e);
            Settings::default()
        }
    };
}

/// Mailgun settings. Every key is optional; the backend decides which
/// ones it cannot live without.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Settings {
    /// API key, sent as the Basic auth password
    pub access_key: Option<String>,

    /// Sending domain registered with Mailgun
    pub server_name: Option<String>,

    /// Scheme and host of the API, e.g. `https://api.eu.mailgun.net`
    pub api_host: Option<String>,

    /// Request timeout, in seconds
    pub timeout: Option<u64>,
}

impl Settings {
    /// Loads settings from a TOML file and merges them with any
    /// environment variables prefixed with MAILGUN_.
    ///
    /// The file is optional when no explicit path is given.
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::with_name(path.unwrap_or(DEFAULT_PATH)).required(path.is_some()),
            )
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize::<Self>()?)
    }

    /// Process-wide settings, read once from `DEFAULT_PATH` and the environment.
    pub fn global() -> &'static Settings {
        &SETTINGS
    }
}
