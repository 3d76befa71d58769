use crate::email::Email;
use crate::Error;

/// Anything that can deliver a batch of composed messages.
pub trait EmailBackend {
    /// Send `emails` in order and return how many were accepted.
    ///
    /// Returns `None` when there was nothing to send, so callers can tell an
    /// empty batch apart from one where every message failed.
    fn send_messages(&self, emails: &[Email]) -> Result<Option<usize>, Error>;
}
