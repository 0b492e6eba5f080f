pub mod threaded_replay_executor;
