use std::collections::BTreeMap;

use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail, SingleInfo};

use crate::Error;

pub const DEFAULT_ENCODING: &str = "utf-8";

/// Prefix of headers that are carried over from raw MIME input
const MAILGUN_HEADER_PREFIX: &str = "X-Mailgun-";

/// A composed message, ready to be handed to a backend.
#[derive(Clone, Debug)]
pub struct Email {
    pub from: String,

    /// Primary recipients. A message without any is never sent.
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,

    /// Plaintext body
    pub body: String,

    /// Alternative renderings of the body, as `(content, mimetype)`
    pub alternatives: Vec<(String, String)>,
    pub attachments: Vec<Attachment>,
    pub extra_headers: BTreeMap<String, String>,

    /// Charset used when addresses need encoding
    pub encoding: String,
}

/// A file attached to an `Email`.
///
/// Both variants boil down to a filename and a payload when sent.
#[derive(Clone, Debug)]
pub enum Attachment {
    Mime(MimeAttachment),
    Raw { name: String, data: Vec<u8> },
}

/// An attachment that arrived as a MIME part
#[derive(Clone, Debug, Default)]
pub struct MimeAttachment {
    /// Filename, from Content-Disposition or the Content-Type `name` parameter
    pub filename: Option<String>,

    /// MIME type of the part (e.g., text/plain)
    pub mimetype: String,

    /// Transfer-decoded part body
    pub payload: Vec<u8>,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            body: String::new(),
            alternatives: Vec::new(),
            attachments: Vec::new(),
            extra_headers: BTreeMap::new(),
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

impl Email {
    pub fn new() -> Email {
        Default::default()
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.from = sender.into();
        self
    }

    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.to = recipients;
        self
    }

    pub fn with_cc(mut self, cc: Vec<String>) -> Self {
        self.cc = cc;
        self
    }

    pub fn with_bcc(mut self, bcc: Vec<String>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_alternative(mut self, content: impl Into<String>, mimetype: impl Into<String>) -> Self {
        self.alternatives.push((content.into(), mimetype.into()));
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Recursively walk the MIME parts and extract the following:
    ///
    /// 1. Body (first text/plain part)
    /// 2. Alternatives (every other text part)
    /// 3. Attachments
    ///
    fn parse_recursive(&mut self, part: &ParsedMail) -> Result<(), Error> {
        if is_attachment(part) {
            self.attachments
                .push(Attachment::Mime(MimeAttachment::from_parsed(part)?));
            return Ok(());
        }

        let mimetype = &part.ctype.mimetype;

        if mimetype.starts_with("text/") {
            let body = part.get_body()?;

            if mimetype == "text/plain" && self.body.is_empty() {
                self.body = body;
            } else {
                self.alternatives.push((body, mimetype.clone()));
            }

            return Ok(());
        }

        // Multipart -> process each subpart recursively
        if mimetype.starts_with("multipart/") {
            for subpart in part.subparts.iter() {
                if let Err(e) = self.parse_recursive(subpart) {
                    log::warn!("Skipping unreadable MIME part: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Convert a raw MIME message into a composed `Email`.
    ///
    /// Addressing comes from the From, To and Cc headers; `X-Mailgun-*`
    /// headers are kept as extra headers.
    pub fn from_mime(mime_content: &[u8]) -> Result<Email, Error> {
        let parsed = mailparse::parse_mail(mime_content)?;
        let headers = &parsed.headers;

        let mut email = Email::new();

        if let Some(from) = headers.get_first_value("From") {
            email.from = addresses(&from)?.into_iter().next().unwrap_or(from);
        }
        if let Some(to) = headers.get_first_value("To") {
            email.to = addresses(&to)?;
        }
        if let Some(cc) = headers.get_first_value("Cc") {
            email.cc = addresses(&cc)?;
        }
        if let Some(subject) = headers.get_first_value("Subject") {
            email.subject = subject;
        }

        for header in headers.iter() {
            let key = header.get_key();

            if key.starts_with(MAILGUN_HEADER_PREFIX) {
                email.extra_headers.insert(key, header.get_value());
            }
        }

        email.parse_recursive(&parsed)?;

        Ok(email)
    }
}

impl Attachment {
    pub fn raw(name: impl Into<String>, data: Vec<u8>) -> Self {
        Attachment::Raw {
            name: name.into(),
            data,
        }
    }

    pub fn mime(raw: &[u8]) -> Result<Self, Error> {
        MimeAttachment::from_bytes(raw).map(Attachment::Mime)
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Attachment::Mime(part) => part.filename.as_deref(),
            Attachment::Raw { name, .. } => Some(name),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Attachment::Mime(part) => &part.payload,
            Attachment::Raw { data, .. } => data,
        }
    }
}

impl MimeAttachment {
    /// Parse a single MIME part, e.g. one produced by another mail library
    pub fn from_bytes(raw: &[u8]) -> Result<Self, Error> {
        let parsed = mailparse::parse_mail(raw)?;
        Self::from_parsed(&parsed)
    }

    fn from_parsed(part: &ParsedMail) -> Result<Self, Error> {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();

        Ok(Self {
            filename,
            mimetype: part.ctype.mimetype.clone(),
            payload: part.get_body_raw()?,
        })
    }
}

/// Inspect part headers to determine if this is an attachment.
fn is_attachment(part: &ParsedMail) -> bool {
    if part.headers.get_first_value("Content-Disposition").is_none() {
        return false;
    }

    // If the content disposition is inline AND MIME is text,
    // it is part of the body
    match part.get_content_disposition().disposition {
        DispositionType::Attachment => true,
        DispositionType::Inline => !part.ctype.mimetype.starts_with("text/"),
        _ => false,
    }
}

/// Split an address header into individual mailboxes
fn addresses(value: &str) -> Result<Vec<String>, Error> {
    let parsed = mailparse::addrparse(value)?;

    let mut mailboxes = Vec::new();

    for addr in parsed.iter() {
        match addr {
            MailAddr::Single(info) => mailboxes.push(mailbox(info)),
            MailAddr::Group(group) => mailboxes.extend(group.addrs.iter().map(mailbox)),
        }
    }

    Ok(mailboxes)
}

fn mailbox(info: &SingleInfo) -> String {
    match info.display_name {
        Some(ref name) if !name.is_empty() => format!(
            "\"{}\" <{}>",
            name.replace('\\', "\\\\").replace('"', "\\\""),
            info.addr
        ),
        _ => info.addr.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    static SAMPLE_MESSAGE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources", "/sample_message.eml");
    static SAMPLE_PART: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources", "/attachment_part.eml");

    fn get_mail() -> Email {
        let content = fs::read(SAMPLE_MESSAGE).unwrap();
        Email::from_mime(&content).unwrap()
    }

    #[test]
    fn default_encoding() {
        assert_eq!(Email::new().encoding, "utf-8");
    }

    #[test]
    fn parse_addressing() {
        let mail = get_mail();

        assert_eq!(mail.from, "\"Doe, Jane\" <jane@example.com>");
        assert_eq!(mail.to, vec!["alice@example.com", "\"Bob\" <bob@example.com>"]);
        assert_eq!(mail.cc, vec!["carol@example.com"]);
        assert!(mail.bcc.is_empty());
        assert_eq!(mail.subject, "Quarterly report");
    }

    #[test]
    fn parse_body() {
        let mail = get_mail();

        assert_eq!(mail.body.trim(), "Report attached.");
        assert_eq!(mail.alternatives.len(), 1);
        assert_eq!(mail.alternatives[0].0.trim(), "<p>Report attached.</p>");
        assert_eq!(mail.alternatives[0].1, "text/html");
    }

    #[test]
    fn parse_attachments() {
        let mail = get_mail();

        assert_eq!(mail.attachments.len(), 2);
        assert_eq!(mail.attachments[0].filename(), Some("hello.txt"));
        assert_eq!(mail.attachments[0].payload(), b"Hello there!\n");

        // Inline, but not text
        assert_eq!(mail.attachments[1].filename(), Some("report.pdf"));
        assert_eq!(mail.attachments[1].payload(), b"%PDF-1.4 fake");
    }

    #[test]
    fn parse_mailgun_headers() {
        let mail = get_mail();

        assert_eq!(mail.extra_headers.len(), 2);
        assert_eq!(mail.extra_headers["X-Mailgun-Dkim"], "yes");
        assert_eq!(mail.extra_headers["X-Mailgun-Tag"], "reports");
    }

    #[test]
    fn mime_attachment_from_part() {
        let content = fs::read(SAMPLE_PART).unwrap();
        let attachment = Attachment::mime(&content).unwrap();

        assert_eq!(attachment.filename(), Some("hello.txt"));
        assert_eq!(attachment.payload(), b"Hello there!\n");

        match attachment {
            Attachment::Mime(part) => assert_eq!(part.mimetype, "text/plain"),
            Attachment::Raw { .. } => panic!("expected a MIME attachment"),
        }
    }

    #[test]
    fn raw_attachment() {
        let attachment = Attachment::raw("a.txt", b"hi".to_vec());

        assert_eq!(attachment.filename(), Some("a.txt"));
        assert_eq!(attachment.payload(), b"hi");
    }
}
