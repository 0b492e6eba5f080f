pub mod infrastructure;
pub mod pipeline_logger;
pub mod replay_executor;
pub mod shared_tracker;
pub mod track_presence_use_case;
