//! Aggregation of stored records.
use super::{Record, RecordValue};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3Builder;

/// Stores records and aggregates them on demand.
///
/// Scalars stored more than once under the same key are summarized into
/// `{key}_min`, `{key}_max`, `{key}_mean` and `{key}_median`. A scalar
/// stored once keeps its key. For any other value type the latest value wins.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

fn min(vs: &[f32]) -> f32 {
    vs.iter().copied().fold(f32::INFINITY, f32::min)
}

fn max(vs: &[f32]) -> f32 {
    vs.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

fn mean(vs: &[f32]) -> f32 {
    vs.iter().sum::<f32>() / vs.len() as f32
}

fn median(mut vs: Vec<f32>) -> f32 {
    vs.sort_by(|x, y| x.total_cmp(y));
    vs[vs.len() / 2]
}

impl RecordStorage {
    pub fn new() -> Self {
        Self { data: vec![] }
    }

    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn get_keys(&self) -> HashSet<String, Xxh3Builder> {
        let mut keys = HashSet::<String, Xxh3Builder>::default();
        for record in self.data.iter() {
            keys.extend(record.keys().cloned());
        }
        keys
    }

    fn latest(&self, key: &str) -> Option<&RecordValue> {
        self.data.iter().rev().find_map(|record| record.get(key))
    }

    fn scalars(&self, key: &str) -> Vec<f32> {
        self.data
            .iter()
            .filter_map(|record| match record.get(key) {
                Some(RecordValue::Scalar(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }

    fn scalar(&self, key: &str) -> Record {
        let vs = self.scalars(key);
        if vs.len() == 1 {
            Record::from_scalar(key, vs[0])
        } else {
            Record::from_slice(&[
                (format!("{}_min", key), RecordValue::Scalar(min(&vs))),
                (format!("{}_max", key), RecordValue::Scalar(max(&vs))),
                (format!("{}_mean", key), RecordValue::Scalar(mean(&vs))),
                (format!("{}_median", key), RecordValue::Scalar(median(vs))),
            ])
        }
    }

    /// Aggregates the stored records and clears the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut record = Record::empty();

        for key in self.get_keys().iter() {
            match self.latest(key) {
                Some(RecordValue::Scalar(..)) => record.merge_inplace(self.scalar(key)),
                Some(value) => record.insert(key.clone(), value.clone()),
                None => {}
            }
        }

        self.data = vec![];
        record
    }
}
