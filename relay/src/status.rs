use mailgun_backend::Error;

// See sysexits.h
pub const OK: i32 = 0;
pub const DATAERR: i32 = 65;
pub const UNAVAILABLE: i32 = 69;
pub const TEMPFAIL: i32 = 75;
pub const CONFIG: i32 = 78;

/// Map the outcome of a relay attempt to an exit status the MTA understands.
///
/// TEMPFAIL makes the MTA keep the message queued and retry later; every
/// other failure bounces it.
pub fn exit_code(result: &Result<Option<usize>, Error>) -> i32 {
    match result {
        Ok(Some(sent)) if *sent > 0 => OK,
        // Nothing was sent, e.g. no recipients or a dropped message
        Ok(_) => UNAVAILABLE,
        Err(Error::Transport(_)) => TEMPFAIL,
        Err(Error::MailgunApi(resp)) => {
            if resp.status == 429 || resp.status >= 500 {
                TEMPFAIL
            } else {
                UNAVAILABLE
            }
        }
        Err(Error::Configuration(_)) => CONFIG,
        Err(Error::Mime(_)) => DATAERR,
    }
}
