use super::{Record, RecordStorage, RecordValue, Recorder};
use log::info;

/// Aggregates stored records and prints them through the `log` facade.
#[derive(Default)]
pub struct AggregateRecorder {
    storage: RecordStorage,
}

impl AggregateRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn format_record(record: &Record) -> String {
    let mut items = record
        .iter()
        .filter_map(|(k, v)| match v {
            RecordValue::Scalar(v) => Some(format!("{}={:.4}", k, v)),
            RecordValue::String(s) => Some(format!("{}={}", k, s)),
            RecordValue::DateTime(t) => Some(format!("{}={}", k, t)),
            _ => None,
        })
        .collect::<Vec<_>>();
    items.sort();
    items.join(", ")
}

impl Recorder for AggregateRecorder {
    fn write(&mut self, record: Record) {
        info!("{}", format_record(&record));
    }

    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let record = self.storage.aggregate();
        if !record.is_empty() {
            info!("[{}] {}", step, format_record(&record));
        }
    }
}
