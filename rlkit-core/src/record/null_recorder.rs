use super::{Record, Recorder};

/// A recorder that discards every record.
#[derive(Default)]
pub struct NullRecorder {}

impl NullRecorder {
    pub fn new() -> Self {
        Self {}
    }
}

impl Recorder for NullRecorder {
    fn write(&mut self, _record: Record) {}

    fn store(&mut self, _record: Record) {}

    fn flush(&mut self, _step: i64) {}
}
