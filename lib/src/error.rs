use std::fmt;

use serde::Deserialize;

/// Raw reply from the Mailgun API for a rejected message.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,

    /// `message` field of the JSON body, if the API sent one
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: String) -> Self {
        let message = serde_json::from_str::<ApiMessage>(&body)
            .ok()
            .map(|m| m.message);

        Self {
            status,
            body,
            message,
        }
    }
}

/// All possible backend errors
#[derive(Debug)]
pub enum Error {
    Configuration(String),
    Transport(String),
    MailgunApi(ApiResponse),
    Mime(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Configuration(ref msg) => write!(f, "Configuration: {}", msg),
            Error::Transport(ref msg) => write!(f, "Transport: {}", msg),
            Error::MailgunApi(ref resp) => match resp.message {
                Some(ref msg) => write!(f, "MailgunApi: {} ({})", resp.status, msg),
                None => write!(f, "MailgunApi: {}", resp.status),
            },
            Error::Mime(ref msg) => write!(f, "Mime: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<mailparse::MailParseError> for Error {
    fn from(err: mailparse::MailParseError) -> Self {
        Self::Mime(err.to_string())
    }
}
