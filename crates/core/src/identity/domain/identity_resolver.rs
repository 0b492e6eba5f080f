use crate::session::domain::session_store::SessionStore;
use crate::shared::session::IdentityRecord;

/// Domain interface for the external identity directory.
///
/// A miss is `None`, not an error: the session stays valid without an
/// external identifier.
pub trait IdentityResolver: Send {
    fn resolve(&self, name: &str) -> Option<IdentityRecord>;
}

/// Resolver with an empty directory.
pub struct NullIdentityResolver;

impl IdentityResolver for NullIdentityResolver {
    fn resolve(&self, _name: &str) -> Option<IdentityRecord> {
        None
    }
}

/// Attaches directory identities to every session currently reported as known.
///
/// A session that already holds an identity for its current name is
/// skipped. A miss is retried on the next cycle, so an entry added to the
/// directory mid-session is picked up. A changed name replaces the previous
/// identity, clearing it on a miss. Sessions currently reported as unknown
/// keep whatever identity they last had.
///
/// Returns the number of directory lookups performed.
pub fn resolve_known_sessions(store: &mut SessionStore, resolver: &dyn IdentityResolver) -> usize {
    let mut lookups = 0;
    for session in store.all_active_mut() {
        if !session.is_known {
            continue;
        }
        let resolved_for_name = session.resolved_name.as_deref() == Some(session.name.as_str());
        if resolved_for_name && session.identity.is_some() {
            continue;
        }

        lookups += 1;
        let identity = resolver.resolve(&session.name);
        match &identity {
            Some(record) => log::debug!(
                "Session {} resolved '{}' to {}",
                session.track_id,
                session.name,
                record.external_id
            ),
            None => log::debug!(
                "Session {}: no directory entry for '{}'",
                session.track_id,
                session.name
            ),
        }
        session.identity = identity;
        session.resolved_name = Some(session.name.clone());
    }
    lookups
}
