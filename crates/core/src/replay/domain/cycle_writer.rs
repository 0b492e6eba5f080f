use crate::pipeline::track_presence_use_case::CycleOutput;

/// Consumes the result of each tracking cycle, in cycle order.
pub trait CycleWriter: Send {
    fn write(&mut self, output: &CycleOutput) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
