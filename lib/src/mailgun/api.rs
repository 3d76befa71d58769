use reqwest::blocking::{multipart, Response};
use reqwest::StatusCode;

use serde::Deserialize;

use crate::address::sanitize_address;
use crate::email::Email;
use crate::error::{ApiResponse, Error};

pub const MAILGUN_API_HOST: &str = "https://api.mailgun.net";
pub const MAILGUN_API_VERSION: &str = "v2";
pub const MAILGUN_API_USER: &str = "api";

/// Header that maps onto the `o:dkim` sending option
pub const DKIM_HEADER: &str = "X-Mailgun-Dkim";

// Request timeout, in seconds
pub(crate) const MAILGUN_REQUEST_TIMEOUT: u64 = 30;

pub enum Endpoint {
    Messages,
}

/// Reply to an accepted message
#[derive(Deserialize, Debug)]
pub struct SendResult {
    pub id: Option<String>,
    pub message: Option<String>,
}

/// Anything but a 200 is a rejected message
pub fn map_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();

    if status == StatusCode::OK {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();

    Err(Error::MailgunApi(ApiResponse::new(status.as_u16(), body)))
}

/// Base URL for all requests against `domain`, e.g.
/// `https://api.mailgun.net/v2/example.com/`
#[inline]
pub fn build_base_url(host: &str, domain: &str) -> String {
    format!(
        "{}/{}/{}/",
        host.trim_end_matches('/'),
        MAILGUN_API_VERSION,
        domain
    )
}

#[inline]
pub fn build_endpoint_url(base_url: &str, endpoint: Endpoint) -> String {
    match endpoint {
        Endpoint::Messages => format!("{}{}", base_url, "messages"),
    }
}

/// Form fields and files of a single `messages` request
#[derive(Debug, Default)]
pub struct Payload {
    pub fields: Vec<(String, String)>,

    /// `attachment` parts, as `(filename, data)`
    pub files: Vec<(Option<String>, Vec<u8>)>,
}

impl Payload {
    pub fn from_email(email: &Email) -> Self {
        let encoding = email.encoding.as_str();
        let join = |addrs: &[String]| {
            addrs
                .iter()
                .map(|addr| sanitize_address(addr, encoding))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut payload = Payload::default();

        payload.add("to", join(&email.to));
        payload.add("from", sanitize_address(&email.from, encoding));

        if !email.cc.is_empty() {
            payload.add("cc", join(&email.cc));
        }

        if !email.bcc.is_empty() {
            payload.add("bcc", join(&email.bcc));
        }

        // Only the first HTML alternative is used
        if let Some((html, _)) = email
            .alternatives
            .iter()
            .find(|(_, mimetype)| mimetype == "text/html")
        {
            payload.add("html", html.clone());
        }

        for (name, value) in email.extra_headers.iter() {
            if name == DKIM_HEADER {
                payload.add("o:dkim", value.clone());
            } else {
                payload.add(&format!("h:{}", name), value.clone());
            }
        }

        payload.add("subject", email.subject.clone());
        payload.add("text", email.body.clone());

        for attachment in email.attachments.iter() {
            payload.files.push((
                attachment.filename().map(str::to_string),
                attachment.payload().to_vec(),
            ));
        }

        log::debug!(
            "Built payload with {} fields and {} attachments",
            payload.fields.len(),
            payload.files.len()
        );

        payload
    }

    fn add(&mut self, name: &str, value: String) {
        self.fields.push((name.to_string(), value));
    }

    /// Value of the first field called `name`
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn into_form(self) -> multipart::Form {
        let mut form = multipart::Form::new();

        for (name, value) in self.fields {
            form = form.text(name, value);
        }

        for (filename, data) in self.files {
            let mut part = multipart::Part::bytes(data);

            if let Some(filename) = filename {
                part = part.file_name(filename);
            }

            form = form.part("attachment", part);
        }

        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{Attachment, Email};

    fn email() -> Email {
        Email::new()
            .with_sender("sender@example.com")
            .with_recipients(vec!["a@x.com".to_string()])
            .with_subject("Hello")
            .with_body("Plain body")
    }

    #[test]
    fn endpoint_url() {
        let base = build_base_url(MAILGUN_API_HOST, "d");

        assert_eq!(base, "https://api.mailgun.net/v2/d/");
        assert_eq!(
            build_endpoint_url(&base, Endpoint::Messages),
            "https://api.mailgun.net/v2/d/messages"
        );
    }

    #[test]
    fn endpoint_url_trailing_slash() {
        assert_eq!(
            build_base_url("https://api.eu.mailgun.net/", "mg.example.com"),
            "https://api.eu.mailgun.net/v2/mg.example.com/"
        );
    }

    #[test]
    fn basic_fields() {
        let payload = Payload::from_email(&email());

        assert_eq!(payload.field("to"), Some("a@x.com"));
        assert_eq!(payload.field("from"), Some("sender@example.com"));
        assert_eq!(payload.field("subject"), Some("Hello"));
        assert_eq!(payload.field("text"), Some("Plain body"));
        assert!(payload.field("cc").is_none());
        assert!(payload.field("bcc").is_none());
        assert!(payload.field("html").is_none());
        assert!(payload.files.is_empty());
    }

    #[test]
    fn recipients_are_joined() {
        let email = email()
            .with_recipients(vec!["a@x.com".to_string(), "Bob <b@x.com>".to_string()])
            .with_cc(vec!["a@x.com".to_string(), "b@x.com".to_string()])
            .with_bcc(vec!["hidden@x.com".to_string()]);

        let payload = Payload::from_email(&email);

        assert_eq!(payload.field("to"), Some("a@x.com, Bob <b@x.com>"));
        assert_eq!(payload.field("cc"), Some("a@x.com, b@x.com"));
        assert_eq!(payload.field("bcc"), Some("hidden@x.com"));
    }

    #[test]
    fn first_html_alternative_wins() {
        let email = email()
            .with_alternative("ignored", "text/plain")
            .with_alternative("<b>hi</b>", "text/html")
            .with_alternative("<i>later</i>", "text/html");

        let payload = Payload::from_email(&email);

        assert_eq!(payload.field("html"), Some("<b>hi</b>"));
        assert_eq!(payload.fields.iter().filter(|(k, _)| k == "html").count(), 1);
        assert!(payload.fields.iter().all(|(_, v)| v != "ignored"));
    }

    #[test]
    fn dkim_header_becomes_option() {
        let email = email()
            .with_header("X-Mailgun-Dkim", "yes")
            .with_header("X-Custom", "v");

        let payload = Payload::from_email(&email);

        assert_eq!(payload.field("o:dkim"), Some("yes"));
        assert!(payload.field("h:X-Mailgun-Dkim").is_none());
        assert_eq!(payload.field("h:X-Custom"), Some("v"));
    }

    #[test]
    fn dkim_header_name_is_exact() {
        let payload = Payload::from_email(&email().with_header("x-mailgun-dkim", "no"));

        assert!(payload.field("o:dkim").is_none());
        assert_eq!(payload.field("h:x-mailgun-dkim"), Some("no"));
    }

    #[test]
    fn attachments_keep_order() {
        let part = Attachment::mime(
            b"Content-Type: text/plain; name=\"b.txt\"\r\n\
              Content-Disposition: attachment; filename=\"b.txt\"\r\n\
              \r\n\
              second",
        )
        .unwrap();

        let email = email()
            .with_attachment(Attachment::raw("a.txt", b"first".to_vec()))
            .with_attachment(part);

        let payload = Payload::from_email(&email);

        assert_eq!(payload.files.len(), 2);
        assert_eq!(payload.files[0], (Some("a.txt".to_string()), b"first".to_vec()));
        assert_eq!(payload.files[1].0.as_deref(), Some("b.txt"));
        assert_eq!(payload.files[1].1, b"second".to_vec());
    }

    #[test]
    fn message_is_not_modified() {
        let email = email().with_header("X-Mailgun-Dkim", "yes");

        let _ = Payload::from_email(&email);

        assert!(email.extra_headers.contains_key("X-Mailgun-Dkim"));
    }
}
