pub mod directory_resolver;
pub mod logging_session_hook;
