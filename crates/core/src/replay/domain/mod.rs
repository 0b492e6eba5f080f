pub mod cycle_writer;
pub mod frame_source;
