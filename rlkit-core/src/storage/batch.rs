use super::{FieldData, ACT, DONE, NEXT_OBS, OBS, REW};
use crate::error::RlError;
use ndarray::ArrayD;
use std::collections::{btree_map, BTreeMap};

/// Transitions to be added to a storage, keyed by field name.
///
/// Every field must share the same leading batch dimension.
#[derive(Debug, Clone, Default)]
pub struct FieldBatch(BTreeMap<String, FieldData>);

impl FieldBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, data: impl Into<FieldData>) -> Self {
        self.0.insert(name.into(), data.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, data: impl Into<FieldData>) {
        self.0.insert(name.into(), data.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldData> {
        self.0.get(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldData> {
        self.0.iter()
    }

    pub(super) fn into_inner(self) -> BTreeMap<String, FieldData> {
        self.0
    }
}

/// Dense training batch sampled from a storage.
///
/// Prioritized buffers attach the sampled indices and the importance
/// weights of the samples.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    fields: BTreeMap<String, ArrayD<f32>>,
    indices: Option<Vec<usize>>,
    weights: Option<Vec<f32>>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: ArrayD<f32>) {
        self.fields.insert(name.into(), data);
    }

    pub fn with_indices(mut self, indices: Vec<usize>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn with_weights(mut self, weights: Vec<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Returns the field `name`.
    pub fn get(&self, name: &str) -> Result<&ArrayD<f32>, RlError> {
        self.fields
            .get(name)
            .ok_or_else(|| RlError::MissingField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ArrayD<f32>> {
        self.fields.iter()
    }

    /// Leading dimension shared by the fields.
    pub fn len(&self) -> usize {
        self.fields
            .values()
            .next()
            .and_then(|a| a.shape().first().copied())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn obs(&self) -> Result<&ArrayD<f32>, RlError> {
        self.get(OBS)
    }

    pub fn act(&self) -> Result<&ArrayD<f32>, RlError> {
        self.get(ACT)
    }

    pub fn next_obs(&self) -> Result<&ArrayD<f32>, RlError> {
        self.get(NEXT_OBS)
    }

    pub fn rew(&self) -> Result<&ArrayD<f32>, RlError> {
        self.get(REW)
    }

    pub fn done(&self) -> Result<&ArrayD<f32>, RlError> {
        self.get(DONE)
    }

    /// Storage indices of the samples, if known.
    pub fn indices(&self) -> Option<&[usize]> {
        self.indices.as_deref()
    }

    /// Importance weights of the samples, if prioritized.
    pub fn weights(&self) -> Option<&[f32]> {
        self.weights.as_deref()
    }
}
