//! Sum tree for proportional sampling.
use anyhow::{bail, Result};
use segment_tree::{ops::MaxIgnoreNaN, SegmentPoint};

/// Binary tree whose internal nodes hold the sum of their children.
///
/// Leaves hold `(p + eps)^alpha` for the priority `p` of each slot.
/// A second tree tracks the maximum raw priority, which new slots receive.
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f32>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
    rng: fastrand::Rng,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f32, seed: u64) -> Self {
        Self {
            eps: 1e-8,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f32; 2 * capacity - 1],
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    fn propagate(&mut self, ix: usize, change: f32) {
        let parent = (ix - 1) / 2;
        self.tree[parent] += change;
        if parent != 0 {
            self.propagate(parent, change);
        }
    }

    fn retrieve(&self, ix: usize, s: f32) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        if s <= self.tree[left] || self.tree[right] == 0f32 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Sum of all leaves.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Number of slots that received a priority.
    pub fn len(&self) -> usize {
        self.n_samples
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Largest raw priority, `1.0` while the tree is empty.
    pub fn max_priority(&self) -> f32 {
        match self.n_samples {
            0 => 1.0,
            _ => self.max_tree.query(0, self.max_tree.len()),
        }
    }

    /// Gives slot `ix` the current maximum priority.
    pub fn add(&mut self, ix: usize) -> Result<()> {
        let p = self.max_priority();
        self.update(ix, p)?;
        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
        Ok(())
    }

    /// Sets the raw priority of slot `ix`.
    pub fn update(&mut self, ix: usize, p: f32) -> Result<()> {
        if ix >= self.capacity {
            bail!("Slot {} is out of the capacity {}", ix, self.capacity);
        }
        if !p.is_finite() {
            bail!("Priority of slot {} is not finite: {}", ix, p);
        }

        self.max_tree.modify(ix, p);
        let leaf = (p + self.eps).powf(self.alpha);
        let ix = ix + self.capacity - 1;
        let change = leaf - self.tree[ix];
        self.tree[ix] = leaf;
        if ix > 0 {
            self.propagate(ix, change);
        }
        Ok(())
    }

    /// Slot whose cumulative range contains `s`.
    pub fn get(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        ix + 1 - self.capacity
    }

    /// Samples slots proportionally to their leaves.
    ///
    /// Returns the slots and their importance weights `(n * P(i))^-beta`,
    /// normalized by the largest weight in the batch.
    pub fn sample(&mut self, batch_size: usize, beta: f32) -> (Vec<usize>, Vec<f32>) {
        let p_sum = self.total();
        let ixs = (0..batch_size)
            .map(|_| self.get(p_sum * self.rng.f32()))
            .collect::<Vec<_>>();

        let n = self.n_samples as f32 / p_sum;
        let ws = ixs
            .iter()
            .map(|ix| self.tree[ix + self.capacity - 1])
            .map(|p| (n * p).powf(-beta))
            .collect::<Vec<_>>();
        let w_max = ws.iter().fold(f32::MIN, |m, v| v.max(m));
        let ws = ws.iter().map(|w| w / w_max).collect();

        (ixs, ws)
    }
}

#[cfg(test)]
mod tests {
    use super::SumTree;

    #[test]
    fn test_sum_tree_retrieval() -> anyhow::Result<()> {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(8, 1.0, 0);
        for (ix, p) in data.iter().enumerate() {
            sum_tree.add(ix)?;
            sum_tree.update(ix, *p)?;
        }

        assert!((sum_tree.total() - data.iter().sum::<f32>()).abs() < 1e-4);
        assert_eq!(sum_tree.get(0.0), 0);
        assert_eq!(sum_tree.get(0.4), 0);
        assert_eq!(sum_tree.get(0.6), 1);
        assert_eq!(sum_tree.get(1.2), 2);
        assert_eq!(sum_tree.get(1.6), 3);
        assert_eq!(sum_tree.get(2.0), 4);
        assert_eq!(sum_tree.max_priority(), 3.9);
        Ok(())
    }

    #[test]
    fn test_sampling_follows_priorities() -> anyhow::Result<()> {
        let mut sum_tree = SumTree::new(4, 1.0, 42);
        for ix in 0..4 {
            sum_tree.add(ix)?;
        }
        sum_tree.update(0, 7.0)?;

        let (ixs, ws) = sum_tree.sample(10_000, 1.0);
        let n0 = ixs.iter().filter(|&&ix| ix == 0).count();
        // Slot 0 holds 70% of the total priority.
        assert!(n0 > 6_000 && n0 < 8_000);
        assert!(ws.iter().all(|w| *w > 0.0 && *w <= 1.0));
        assert!(ws.iter().any(|w| (*w - 1.0).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_new_slots_get_max_priority() -> anyhow::Result<()> {
        let mut sum_tree = SumTree::new(4, 0.6, 0);
        assert_eq!(sum_tree.max_priority(), 1.0);
        sum_tree.add(0)?;
        sum_tree.update(0, 5.0)?;
        sum_tree.add(1)?;
        assert_eq!(sum_tree.max_priority(), 5.0);
        sum_tree.update(0, 0.5)?;
        sum_tree.update(1, 0.5)?;
        assert_eq!(sum_tree.max_priority(), 0.5);
        assert!(sum_tree.update(0, f32::NAN).is_err());
        Ok(())
    }
}
