use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;

use super::api::{self, Payload};

use crate::backend::EmailBackend;
use crate::config::Settings;
use crate::email::Email;
use crate::Error;

/// Everything needed to reach the API for one sending domain
struct Account {
    access_key: String,
    server_name: String,
    api_url: String,
    client: Client,
}

/// Sends composed messages through the Mailgun HTTP API.
///
/// With `fail_silently` set, every failure (including missing
/// credentials) is logged and reported as a message that was not sent.
pub struct MailgunBackend {
    /// `None` when credentials or the HTTP client could not be set up in
    /// fail-silently mode
    account: Option<Account>,
    fail_silently: bool,
}

impl MailgunBackend {
    /// Create a backend, falling back to the process-wide settings for
    /// any credential not given explicitly.
    pub fn new(
        fail_silently: bool,
        access_key: Option<&str>,
        server_name: Option<&str>,
    ) -> Result<Self, Error> {
        Self::with_settings(Settings::global(), fail_silently, access_key, server_name)
    }

    pub fn with_settings(
        settings: &Settings,
        fail_silently: bool,
        access_key: Option<&str>,
        server_name: Option<&str>,
    ) -> Result<Self, Error> {
        let access_key = resolve(access_key, settings.access_key.as_deref());
        let server_name = resolve(server_name, settings.server_name.as_deref());

        let account = match (access_key, server_name) {
            (Some(access_key), Some(server_name)) => {
                let host = settings
                    .api_host
                    .as_deref()
                    .unwrap_or(api::MAILGUN_API_HOST);
                let timeout = settings.timeout.unwrap_or(api::MAILGUN_REQUEST_TIMEOUT);

                let client = Client::builder()
                    .timeout(Duration::from_secs(timeout))
                    .build();

                disable_on_error(client, fail_silently, "HTTP client")?.map(|client| Account {
                    api_url: api::build_base_url(host, &server_name),
                    access_key,
                    server_name,
                    client,
                })
            }
            (access_key, _) => {
                let missing = if access_key.is_none() {
                    "access_key"
                } else {
                    "server_name"
                };

                if !fail_silently {
                    return Err(Error::Configuration(format!("Mailgun {} is not set", missing)));
                }

                log::warn!("Mailgun {} is not set, all messages will be dropped", missing);
                None
            }
        };

        Ok(Self {
            account,
            fail_silently,
        })
    }

    pub fn fail_silently(&self) -> bool {
        self.fail_silently
    }

    /// Sending domain, if the backend is usable
    pub fn server_name(&self) -> Option<&str> {
        self.account.as_ref().map(|a| a.server_name.as_str())
    }

    /// Send a single message.
    ///
    /// Returns `Ok(false)` without touching the network when the message has
    /// no primary recipients or the backend is disabled.
    pub fn send(&self, email: &Email) -> Result<bool, Error> {
        if email.to.is_empty() {
            log::debug!("Message \"{}\" has no recipients, skipping", email.subject);
            return Ok(false);
        }

        let account = match self.account {
            Some(ref account) => account,
            None => return Ok(false),
        };

        let payload = Payload::from_email(email);
        let url = api::build_endpoint_url(&account.api_url, api::Endpoint::Messages);

        let result = account
            .client
            .post(&url)
            .basic_auth(api::MAILGUN_API_USER, Some(&account.access_key))
            .multipart(payload.into_form())
            .send()
            .map_err(Error::from)
            .and_then(api::map_status);

        match result {
            Ok(resp) => {
                let id = resp
                    .text()
                    .ok()
                    .and_then(|body| serde_json::from_str::<api::SendResult>(&body).ok())
                    .and_then(|r| r.id);

                log::info!(
                    "Mailgun accepted message to {} (id = {})",
                    email.to.join(", "),
                    id.as_deref().unwrap_or("unknown")
                );

                Ok(true)
            }
            Err(e) if self.fail_silently => {
                log::warn!("Dropping message to {}: {}", email.to.join(", "), e);
                Ok(false)
            }
            Err(e) => {
                log::error!("Failed to send message to {}: {}", email.to.join(", "), e);
                Err(e)
            }
        }
    }
}

impl EmailBackend for MailgunBackend {
    /// Messages are sent one at a time, in order. Unless the backend fails
    /// silently, the first error aborts the rest of the batch.
    fn send_messages(&self, emails: &[Email]) -> Result<Option<usize>, Error> {
        if emails.is_empty() {
            return Ok(None);
        }

        let mut num_sent = 0;

        for email in emails {
            if self.send(email)? {
                num_sent += 1;
            }
        }

        Ok(Some(num_sent))
    }
}

/// Setup failure: a configuration error, or a disabled backend (`None`) when
/// failing silently.
fn disable_on_error<T, E: fmt::Display>(
    result: Result<T, E>,
    fail_silently: bool,
    what: &str,
) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if fail_silently => {
            log::warn!("Could not set up {} ({}), all messages will be dropped", what, e);
            Ok(None)
        }
        Err(e) => Err(Error::Configuration(format!("Could not set up {}: {}", what, e))),
    }
}

/// Explicit value first, then settings. Empty values count as missing.
fn resolve(explicit: Option<&str>, setting: Option<&str>) -> Option<String> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| setting.filter(|v| !v.is_empty()))
        .map(str::to_string)
}
