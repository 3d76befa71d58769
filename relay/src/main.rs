use std::io::Read;
use std::process;

use structopt::StructOpt;

use mailgun_backend::config::Settings;
use mailgun_backend::{Email, EmailBackend, Error, MailgunBackend};

mod status;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mailgun-relay",
    about = "Relay a message read from stdin through the Mailgun API."
)]
struct Opt {
    /// Envelope sender, overrides the From header
    #[structopt(short, long)]
    sender: Option<String>,

    /// Envelope recipients, override the To header
    #[structopt(short, long)]
    recipients: Vec<String>,

    /// Settings file (defaults to /etc/mailgun/mailgun.toml, if present)
    #[structopt(short, long)]
    config: Option<String>,

    /// Drop the message instead of failing on errors. A dropped message
    /// exits with EX_UNAVAILABLE, so temporary API or network failures
    /// bounce instead of being retried by the MTA.
    #[structopt(long)]
    fail_silently: bool,
}

fn relay(opt: Opt, content: &[u8]) -> Result<Option<usize>, Error> {
    let settings = match opt.config {
        Some(ref path) => Settings::load(Some(path.as_str()))?,
        None => Settings::global().clone(),
    };

    let mut mail = Email::from_mime(content)?;

    if let Some(sender) = opt.sender {
        mail = mail.with_sender(sender);
    }

    if !opt.recipients.is_empty() {
        mail = mail.with_recipients(opt.recipients);
    }

    let backend = MailgunBackend::with_settings(&settings, opt.fail_silently, None, None)?;

    backend.send_messages(&[mail])
}

fn main() {
    // Init logger
    env_logger::builder().format_timestamp_micros().init();

    let opt = Opt::from_args();

    // Get message from stdin
    let mut content = Vec::new();
    if let Err(e) = std::io::stdin().read_to_end(&mut content) {
        log::error!("Failed to read message from stdin: {}", e);
        process::exit(status::TEMPFAIL);
    }

    let result = relay(opt, &content);

    match &result {
        Ok(Some(sent)) => log::info!("Relayed {} message(s)", sent),
        Ok(None) => log::warn!("No message to relay"),
        Err(e) => log::error!("Relay failed: {}", e),
    }

    process::exit(status::exit_code(&result));
}
