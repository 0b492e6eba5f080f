pub mod bbox;
pub mod constants;
pub mod detection;
pub mod session;
pub mod timestamp;
pub mod tracker_config;
