use super::Record;

/// Destination of records produced during training.
///
/// Recording is fire-and-forget: implementations never fail the caller.
pub trait Recorder {
    /// Writes a record immediately.
    fn write(&mut self, record: Record);

    /// Stores a record to be aggregated at the next [`Recorder::flush`].
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: i64);
}
