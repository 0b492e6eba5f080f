pub mod json_lines_session_sink;
pub mod logging_session_sink;
