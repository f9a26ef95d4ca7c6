use super::{column::Column, Batch, DataSpec, FieldBatch, FieldData, FieldSpec, LazyFrames};
use crate::error::RlError;
use anyhow::Result;
use log::info;
use ndarray::{ArrayD, Axis, IxDyn};
use rand::Rng;
use std::collections::BTreeMap;

/// Ring storage of named columns with a fixed capacity.
#[derive(Debug)]
pub struct DictStorage {
    spec: DataSpec,
    columns: BTreeMap<String, Column>,
    capacity: usize,
    ptr: usize,
    size: usize,
}

fn item_shape(capacity: usize, shape: &[usize]) -> IxDyn {
    let mut dims = vec![capacity];
    dims.extend_from_slice(shape);
    IxDyn(&dims)
}

impl DictStorage {
    /// Allocates a storage for `capacity` items of every field in `spec`.
    pub fn new(spec: DataSpec, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::InvalidCapacity(capacity).into());
        }

        let columns = spec
            .iter()
            .map(|(name, field)| {
                let column = match field {
                    FieldSpec::Dense { shape } => {
                        Column::Dense(ArrayD::zeros(item_shape(capacity, shape)))
                    }
                    FieldSpec::Object { .. } => Column::Object(vec![None; capacity]),
                };
                (name.clone(), column)
            })
            .collect();

        Ok(Self {
            spec,
            columns,
            capacity,
            ptr: 0,
            size: 0,
        })
    }

    pub fn spec(&self) -> &DataSpec {
        &self.spec
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid items.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Index the next item will be written to.
    pub fn ptr(&self) -> usize {
        self.ptr
    }

    /// Forgets every item. The memory is kept and overwritten later.
    pub fn reset(&mut self) {
        self.ptr = 0;
        self.size = 0;
    }

    /// Checks `batch` against the data spec and returns its batch size.
    fn validate(&self, batch: &FieldBatch) -> Result<usize, RlError> {
        for (name, _) in batch.iter() {
            if !self.spec.contains(name) {
                return Err(RlError::UnknownField(name.clone()));
            }
        }

        let mut batch_size: Option<usize> = None;

        for (name, field) in self.spec.iter() {
            let data = batch
                .get(name)
                .ok_or_else(|| RlError::MissingField(name.clone()))?;

            let b = data.batch_size().ok_or_else(|| RlError::ShapeMismatch {
                field: name.clone(),
                expected: field.shape().to_vec(),
                found: vec![],
            })?;

            match batch_size {
                None => batch_size = Some(b),
                Some(expected) if expected != b => {
                    return Err(RlError::BatchSizeMismatch {
                        field: name.clone(),
                        expected,
                        found: b,
                    })
                }
                _ => {}
            }

            match (field, data) {
                (FieldSpec::Dense { shape }, FieldData::Dense(a)) => {
                    if &a.shape()[1..] != shape.as_slice() {
                        return Err(RlError::ShapeMismatch {
                            field: name.clone(),
                            expected: shape.clone(),
                            found: a.shape()[1..].to_vec(),
                        });
                    }
                }
                (FieldSpec::Object { shape }, FieldData::Object(v)) => {
                    if let Some(frames) = v.iter().find(|f| &f.shape() != shape) {
                        return Err(RlError::ShapeMismatch {
                            field: name.clone(),
                            expected: shape.clone(),
                            found: frames.shape(),
                        });
                    }
                }
                _ => return Err(RlError::ColumnKindMismatch(name.clone())),
            }
        }

        Ok(batch_size.unwrap_or(0))
    }

    /// Writes a batch of items and returns the indices they occupy.
    ///
    /// Nothing is written when the batch does not match the data spec.
    pub fn add(&mut self, batch: FieldBatch) -> Result<Vec<usize>> {
        let b = self.validate(&batch)?;
        if b == 0 {
            return Ok(vec![]);
        }

        if self.ptr + b > self.capacity {
            info!("Reaches the end of the replay buffer");
        }
        let indices = (0..b)
            .map(|i| (self.ptr + i) % self.capacity)
            .collect::<Vec<_>>();

        for (name, data) in batch.into_inner() {
            match (self.columns.get_mut(&name), data) {
                (Some(Column::Dense(column)), FieldData::Dense(a)) => {
                    for (i, &ix) in indices.iter().enumerate() {
                        column
                            .index_axis_mut(Axis(0), ix)
                            .assign(&a.index_axis(Axis(0), i));
                    }
                }
                (Some(Column::Object(column)), FieldData::Object(v)) => {
                    for (frames, &ix) in v.into_iter().zip(indices.iter()) {
                        column[ix] = Some(frames);
                    }
                }
                _ => return Err(RlError::ColumnKindMismatch(name).into()),
            }
        }

        self.ptr = (self.ptr + b) % self.capacity;
        self.size = (self.size + b).min(self.capacity);

        Ok(indices)
    }

    /// Draws `batch_size` indices uniformly with replacement from the valid items.
    pub fn sample_indices<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, RlError> {
        if self.size == 0 {
            return Err(RlError::EmptyStorage);
        }
        if batch_size == 0 {
            return Err(RlError::ZeroBatchSize);
        }
        Ok((0..batch_size)
            .map(|_| rng.gen_range(0..self.size))
            .collect())
    }

    /// Samples a batch uniformly with replacement.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        let indices = self.sample_indices(batch_size, rng)?;
        self.gather(&indices)
    }

    /// Returns every valid item in index order.
    pub fn get(&self) -> Result<Batch> {
        if self.size == 0 {
            return Err(RlError::EmptyStorage.into());
        }
        let indices = (0..self.size).collect::<Vec<_>>();
        self.gather(&indices)
    }

    /// Collects the items at `indices` into a dense batch.
    pub fn gather(&self, indices: &[usize]) -> Result<Batch> {
        if let Some(&index) = indices.iter().find(|&&ix| ix >= self.size) {
            return Err(RlError::IndexOutOfRange {
                index,
                size: self.size,
            }
            .into());
        }

        let mut batch = Batch::new();
        for (name, column) in self.columns.iter() {
            let data = match column {
                Column::Dense(a) => a.select(Axis(0), indices),
                Column::Object(v) => {
                    let shape = self.spec.get(name).map(|f| f.shape()).unwrap_or(&[]);
                    self.gather_object(v, indices, shape)?
                }
            };
            batch.insert(name.clone(), data);
        }

        Ok(batch)
    }

    fn gather_object(
        &self,
        column: &[Option<LazyFrames>],
        indices: &[usize],
        shape: &[usize],
    ) -> Result<ArrayD<f32>> {
        if indices.is_empty() {
            return Ok(ArrayD::zeros(item_shape(0, shape)));
        }
        let items = indices
            .iter()
            .map(|&ix| match &column[ix] {
                Some(frames) => frames.materialize(),
                None => Err(RlError::IndexOutOfRange {
                    index: ix,
                    size: self.size,
                }
                .into()),
            })
            .collect::<Result<Vec<_>>>()?;
        let views = items.iter().map(|a| a.view()).collect::<Vec<_>>();
        Ok(ndarray::stack(Axis(0), &views)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ACT, DONE, NEXT_OBS, OBS, REW};
    use ndarray::{Array1, Array2};
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::Arc;

    fn spec() -> DataSpec {
        DataSpec::new()
            .with(OBS, FieldSpec::dense(vec![2]))
            .with(REW, FieldSpec::dense(vec![]))
    }

    /// Items `start..start + b` where obs = [v, -v] and rew = v.
    fn items(start: usize, b: usize) -> FieldBatch {
        let obs = Array2::from_shape_fn((b, 2), |(i, j)| {
            let v = (start + i) as f32;
            if j == 0 {
                v
            } else {
                -v
            }
        });
        let rew = Array1::from_shape_fn(b, |i| (start + i) as f32);
        FieldBatch::new()
            .with(OBS, obs.into_dyn())
            .with(REW, rew.into_dyn())
    }

    fn rewards(storage: &DictStorage) -> Vec<f32> {
        let batch = storage.get().unwrap();
        batch.rew().unwrap().iter().copied().collect()
    }

    #[test]
    fn test_add_wraps_to_front() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 4)?;
        assert_eq!(storage.add(items(0, 3))?, vec![0, 1, 2]);
        assert_eq!(storage.add(items(3, 3))?, vec![3, 0, 1]);
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.ptr(), 2);
        assert_eq!(rewards(&storage), vec![4.0, 5.0, 2.0, 3.0]);

        let obs = storage.get()?.obs()?.clone();
        assert_eq!(obs.shape(), &[4, 2]);
        assert_eq!(obs[[0, 1]], -4.0);
        Ok(())
    }

    #[test]
    fn test_size_is_min_of_added_and_capacity() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 5)?;
        let mut total = 0;
        for b in [1, 3, 0, 2, 4] {
            storage.add(items(total, b))?;
            total += b;
            assert_eq!(storage.len(), total.min(5));
            assert_eq!(storage.ptr(), total % 5);
        }
        Ok(())
    }

    #[test]
    fn test_ring_overwrite_of_singles() -> Result<()> {
        let (capacity, k) = (4, 3);
        let mut storage = DictStorage::new(spec(), capacity)?;
        for i in 0..capacity + k {
            storage.add(items(i, 1))?;
        }
        // The oldest surviving item sits at k % capacity.
        let rews = rewards(&storage);
        assert_eq!(rews[k % capacity], k as f32);
        assert_eq!(rews, vec![4.0, 5.0, 6.0, 3.0]);
        assert_eq!(storage.ptr(), k % capacity);
        Ok(())
    }

    #[test]
    fn test_batch_larger_than_capacity_keeps_last_items() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 3)?;
        storage.add(items(0, 5))?;
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.ptr(), 2);
        assert_eq!(rewards(&storage), vec![3.0, 4.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_inconsistent_batch_is_rejected() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 4)?;
        let batch = FieldBatch::new()
            .with(OBS, Array2::<f32>::zeros((3, 2)).into_dyn())
            .with(REW, Array1::<f32>::zeros(2).into_dyn());
        let err = storage.add(batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RlError>(),
            Some(RlError::BatchSizeMismatch { .. })
        ));
        assert_eq!(storage.len(), 0);
        assert_eq!(storage.ptr(), 0);
        Ok(())
    }

    #[test]
    fn test_unknown_missing_and_shape_errors() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 4)?;

        let missing = FieldBatch::new().with(OBS, Array2::<f32>::zeros((1, 2)).into_dyn());
        let err = storage.add(missing).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RlError>(),
            Some(&RlError::MissingField(REW.to_string()))
        );

        let unknown = items(0, 1).with("extra", Array1::<f32>::zeros(1).into_dyn());
        let err = storage.add(unknown).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RlError>(),
            Some(&RlError::UnknownField("extra".to_string()))
        );

        let wrong_shape = FieldBatch::new()
            .with(OBS, Array2::<f32>::zeros((1, 3)).into_dyn())
            .with(REW, Array1::<f32>::zeros(1).into_dyn());
        let err = storage.add(wrong_shape).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RlError>(),
            Some(RlError::ShapeMismatch { .. })
        ));
        assert!(storage.is_empty());
        Ok(())
    }

    #[test]
    fn test_sample_shapes() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let spec = DataSpec::from_spaces(
            &crate::Space::symmetric_box(vec![3], 1.0),
            &crate::Space::symmetric_box(vec![2], 1.0),
        );
        let mut storage = DictStorage::new(spec, 8)?;
        assert!(storage.sample(4, &mut rng).is_err());

        storage.add(
            FieldBatch::new()
                .with(OBS, Array2::<f32>::ones((5, 3)).into_dyn())
                .with(NEXT_OBS, Array2::<f32>::ones((5, 3)).into_dyn())
                .with(ACT, Array2::<f32>::zeros((5, 2)).into_dyn())
                .with(REW, Array1::<f32>::ones(5).into_dyn())
                .with(DONE, Array1::<f32>::zeros(5).into_dyn()),
        )?;

        let batch = storage.sample(16, &mut rng)?;
        assert_eq!(batch.len(), 16);
        assert_eq!(batch.obs()?.shape(), &[16, 3]);
        assert_eq!(batch.act()?.shape(), &[16, 2]);
        assert_eq!(batch.rew()?.shape(), &[16]);
        assert!(storage.sample(0, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_object_column_shares_frames() -> Result<()> {
        let spec = DataSpec::new()
            .with(OBS, FieldSpec::object(vec![2, 3]))
            .with(REW, FieldSpec::dense(vec![]));
        let mut storage = DictStorage::new(spec, 4)?;

        let frame = |v: f32| Arc::new(ArrayD::from_elem(IxDyn(&[3]), v));
        let (f0, f1, f2) = (frame(0.0), frame(1.0), frame(2.0));
        let stacks = vec![
            LazyFrames::new(vec![f0.clone(), f1.clone()]),
            LazyFrames::new(vec![f1.clone(), f2.clone()]),
        ];
        storage.add(
            FieldBatch::new()
                .with(OBS, stacks)
                .with(REW, Array1::<f32>::zeros(2).into_dyn()),
        )?;
        // Frame f1 is referenced by both stacks and the local handle.
        assert_eq!(Arc::strong_count(&f1), 3);

        let obs = storage.gather(&[1, 0])?.obs()?.clone();
        assert_eq!(obs.shape(), &[2, 2, 3]);
        assert_eq!(obs[[0, 0, 0]], 1.0);
        assert_eq!(obs[[0, 1, 2]], 2.0);
        assert_eq!(obs[[1, 0, 1]], 0.0);

        let dense_for_object = FieldBatch::new()
            .with(OBS, ArrayD::<f32>::zeros(IxDyn(&[1, 2, 3])))
            .with(REW, Array1::<f32>::zeros(1).into_dyn());
        let err = storage.add(dense_for_object).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RlError>(),
            Some(&RlError::ColumnKindMismatch(OBS.to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_reset_keeps_capacity() -> Result<()> {
        let mut storage = DictStorage::new(spec(), 4)?;
        storage.add(items(0, 3))?;
        storage.reset();
        assert!(storage.is_empty());
        assert_eq!(storage.capacity(), 4);
        assert!(storage.get().is_err());
        assert!(DictStorage::new(spec(), 0).is_err());
        Ok(())
    }
}
