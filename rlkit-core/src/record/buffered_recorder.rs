use super::{Record, RecordStorage, Recorder};

/// Keeps records in memory.
///
/// Written records are kept as they are. Stored records are aggregated on
/// [`Recorder::flush`] and kept together with the flushed step.
#[derive(Default)]
pub struct BufferedRecorder {
    written: Vec<Record>,
    storage: RecordStorage,
    flushed: Vec<(i64, Record)>,
}

impl BufferedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records given to [`Recorder::write`].
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.written.iter()
    }

    /// Aggregated records, one per flush.
    pub fn flushed(&self) -> &[(i64, Record)] {
        &self.flushed
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.written.push(record);
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let record = self.storage.aggregate();
        self.flushed.push((step, record));
    }
}
