pub mod session_reaper;
pub mod session_sink;
pub mod session_store;
