use super::{ACT, DONE, NEXT_OBS, OBS, REW};
use crate::Space;
use serde::{Deserialize, Serialize};
use std::collections::{btree_map::Iter, BTreeMap};

/// Layout of a single field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum FieldSpec {
    /// Items are stored in a preallocated array.
    Dense { shape: Vec<usize> },

    /// Items are [`LazyFrames`](super::LazyFrames) materializing to `shape`.
    Object { shape: Vec<usize> },
}

impl FieldSpec {
    pub fn dense(shape: Vec<usize>) -> Self {
        Self::Dense { shape }
    }

    pub fn object(shape: Vec<usize>) -> Self {
        Self::Object { shape }
    }

    /// Shape of a single item.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Dense { shape } => shape,
            Self::Object { shape } => shape,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object { .. })
    }
}

/// Fields of a storage, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DataSpec(BTreeMap<String, FieldSpec>);

impl DataSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> Iter<'_, String, FieldSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard transition fields with dense observations.
    pub fn from_spaces(obs_space: &Space, act_space: &Space) -> Self {
        Self::new()
            .with(OBS, FieldSpec::dense(obs_space.shape()))
            .with(NEXT_OBS, FieldSpec::dense(obs_space.shape()))
            .with(ACT, FieldSpec::dense(vec![act_space.flat_dim()]))
            .with(REW, FieldSpec::dense(vec![]))
            .with(DONE, FieldSpec::dense(vec![]))
    }

    /// Standard transition fields with observations kept as stacks of
    /// `k` frames of `frame_space`.
    pub fn frame_stack(frame_space: &Space, act_space: &Space, k: usize) -> Self {
        let mut shape = vec![k];
        shape.extend(frame_space.shape());
        Self::from_spaces(frame_space, act_space)
            .with(OBS, FieldSpec::object(shape.clone()))
            .with(NEXT_OBS, FieldSpec::object(shape))
    }
}
