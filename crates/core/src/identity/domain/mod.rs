pub mod deduplicator;
pub mod identity_matcher;
pub mod identity_resolver;
pub mod session_hook;
