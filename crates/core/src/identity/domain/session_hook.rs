use crate::shared::session::Session;

/// Side effect fired exactly once when a new session is opened
/// (e.g. capturing a first-seen snapshot of an unknown subject).
///
/// Runs after the store has committed the session; it cannot alter
/// tracking state.
pub trait SessionHook: Send {
    fn on_session_created(&mut self, session: &Session);
}

pub struct NullSessionHook;

impl SessionHook for NullSessionHook {
    fn on_session_created(&mut self, _session: &Session) {}
}
