//! Key-value records produced by samplers, agents and runners.
use crate::error::RlError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// A value stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value such as a loss or an episode return.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array, e.g. per-sample TD errors.
    Array1(Vec<f32>),

    /// A 2-dimensional array with its shape.
    Array2(Vec<f32>, [usize; 2]),

    /// A text value.
    String(String),
}

/// A set of named values.
///
/// ```rust
/// use rlkit_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("LossQ", 0.5);
/// record.insert("EpRet", RecordValue::Scalar(-12.0));
/// assert_eq!(record.get_scalar("LossQ").unwrap(), 0.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges two records. Values of `record` win on key collisions.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges `record` into `self`. Values of `record` win on key collisions.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Returns the scalar stored at `k`.
    pub fn get_scalar(&self, k: &str) -> Result<f32, RlError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(RlError::RecordValueTypeError("Scalar".to_string())),
            None => Err(RlError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the 1-dimensional array stored at `k`.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, RlError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(RlError::RecordValueTypeError("Array1".to_string())),
            None => Err(RlError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the string stored at `k`.
    pub fn get_string(&self, k: &str) -> Result<String, RlError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(RlError::RecordValueTypeError("String".to_string())),
            None => Err(RlError::RecordKeyError(k.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites() {
        let r1 = Record::from_slice(&[
            ("a", RecordValue::Scalar(1.0)),
            ("b", RecordValue::Scalar(2.0)),
        ]);
        let r2 = Record::from_scalar("b", 3.0);
        let r = r1.merge(r2);
        assert_eq!(r.get_scalar("a").unwrap(), 1.0);
        assert_eq!(r.get_scalar("b").unwrap(), 3.0);
    }

    #[test]
    fn test_typed_access_errors() {
        let mut r = Record::empty();
        r.insert("name", RecordValue::String("td3".to_string()));
        assert_eq!(
            r.get_scalar("name"),
            Err(RlError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            r.get_scalar("missing"),
            Err(RlError::RecordKeyError("missing".to_string()))
        );
        assert_eq!(r.get_string("name").unwrap(), "td3");
    }
}
