use crate::identity::domain::session_hook::SessionHook;
use crate::shared::session::Session;

/// Logs every newly opened session.
///
/// Unknown subjects are logged at `info` so operators can follow up on
/// them; recognized ones at `debug`.
#[derive(Default)]
pub struct LoggingSessionHook {
    created: usize,
}

impl LoggingSessionHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created
    }
}

impl SessionHook for LoggingSessionHook {
    fn on_session_created(&mut self, session: &Session) {
        self.created += 1;
        let (cx, cy) = session.bbox.center();
        if session.is_known {
            log::debug!(
                "New session {} for '{}' at ({cx:.0}, {cy:.0})",
                session.track_id,
                session.name
            );
        } else {
            log::info!(
                "Unrecognized subject '{}' entered as session {} at ({cx:.0}, {cy:.0})",
                session.name,
                session.track_id
            );
        }
    }
}
