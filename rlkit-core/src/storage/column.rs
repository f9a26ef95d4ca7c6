use anyhow::Result;
use ndarray::{ArrayD, Axis};
use std::sync::Arc;

/// A stack of frames that shares its frames with overlapping stacks.
///
/// Consecutive observations of a frame-stacked environment have `k - 1`
/// frames in common; those frames are stored once and referenced here.
#[derive(Debug, Clone)]
pub struct LazyFrames {
    frames: Vec<Arc<ArrayD<f32>>>,
}

impl LazyFrames {
    pub fn new(frames: Vec<Arc<ArrayD<f32>>>) -> Self {
        Self { frames }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Arc<ArrayD<f32>>] {
        &self.frames
    }

    /// Shape of the materialized array, `[k, ...frame]`.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = vec![self.frames.len()];
        if let Some(frame) = self.frames.first() {
            shape.extend_from_slice(frame.shape());
        }
        shape
    }

    /// Stacks the frames into a dense array.
    pub fn materialize(&self) -> Result<ArrayD<f32>> {
        let views = self.frames.iter().map(|f| f.view()).collect::<Vec<_>>();
        Ok(ndarray::stack(Axis(0), &views)?)
    }
}

/// Data of one field in a batch given to
/// [`DictStorage::add`](super::DictStorage::add).
#[derive(Debug, Clone)]
pub enum FieldData {
    /// Array of shape `[b, ...]`.
    Dense(ArrayD<f32>),

    /// `b` frame stacks.
    Object(Vec<LazyFrames>),
}

impl FieldData {
    /// Leading dimension. `None` for a 0-dimensional array.
    pub fn batch_size(&self) -> Option<usize> {
        match self {
            Self::Dense(a) => a.shape().first().copied(),
            Self::Object(v) => Some(v.len()),
        }
    }
}

impl From<ArrayD<f32>> for FieldData {
    fn from(a: ArrayD<f32>) -> Self {
        Self::Dense(a)
    }
}

impl From<Vec<LazyFrames>> for FieldData {
    fn from(v: Vec<LazyFrames>) -> Self {
        Self::Object(v)
    }
}

/// Storage of a single field.
#[derive(Debug)]
pub(super) enum Column {
    Dense(ArrayD<f32>),
    Object(Vec<Option<LazyFrames>>),
}
