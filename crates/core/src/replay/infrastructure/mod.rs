pub mod json_lines_cycle_writer;
pub mod json_lines_frame_reader;
