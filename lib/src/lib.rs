//! Deliver outgoing mail through the Mailgun HTTP API instead of SMTP.
pub mod address;
pub mod backend;
pub mod config;
pub mod email;
pub mod error;
pub mod mailgun;

pub use backend::EmailBackend;
pub use email::{Attachment, Email, MimeAttachment};
pub use error::{ApiResponse, Error};
pub use mailgun::MailgunBackend;
