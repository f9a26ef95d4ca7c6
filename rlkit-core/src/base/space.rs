//! Observation and action spaces.
use crate::error::RlError;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Space of a single observation or action.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Space {
    /// Box in `R^n` with elementwise bounds. `low` and `high` are flattened.
    Box {
        shape: Vec<usize>,
        low: Vec<f32>,
        high: Vec<f32>,
    },

    /// Integers `0..n`.
    Discrete(usize),
}

impl Space {
    /// A box whose every element lies in `[-bound, bound]`.
    pub fn symmetric_box(shape: Vec<usize>, bound: f32) -> Self {
        let n = shape.iter().product();
        Self::Box {
            shape,
            low: vec![-bound; n],
            high: vec![bound; n],
        }
    }

    /// Shape of a single element. Empty for a discrete space.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Box { shape, .. } => shape.clone(),
            Self::Discrete(_) => vec![],
        }
    }

    /// Number of scalars in a single element.
    pub fn flat_dim(&self) -> usize {
        match self {
            Self::Box { shape, .. } => shape.iter().product(),
            Self::Discrete(_) => 1,
        }
    }

    /// Draws `n` uniform samples, one per row.
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<f32> {
        match self {
            Self::Box { low, high, .. } => {
                let dim = low.len();
                Array2::from_shape_fn((n, dim), |(_, j)| {
                    if high[j] > low[j] {
                        rng.gen_range(low[j]..high[j])
                    } else {
                        low[j]
                    }
                })
            }
            Self::Discrete(k) => Array2::from_shape_fn((n, 1), |_| rng.gen_range(0..*k) as f32),
        }
    }
}

/// Checks that `space` is a 1-dimensional box with symmetric, uniform bounds.
///
/// Returns the action dimension and the bound `act_lim`, so every action
/// lies in `[-act_lim, act_lim]`.
pub fn verify_continuous_action_space(space: &Space) -> Result<(usize, f32), RlError> {
    match space {
        Space::Discrete(_) => Err(RlError::UnsupportedActionSpace(
            "discrete action space".to_string(),
        )),
        Space::Box { shape, low, high } => {
            if shape.len() != 1 {
                return Err(RlError::UnsupportedActionSpace(format!(
                    "action shape {:?} is not 1-dimensional",
                    shape
                )));
            }
            if shape[0] == 0 || low.len() != shape[0] || high.len() != shape[0] {
                return Err(RlError::UnsupportedActionSpace(format!(
                    "action shape {:?} does not match bounds of length {} and {}",
                    shape,
                    low.len(),
                    high.len()
                )));
            }
            let act_lim = high[0];
            let symmetric =
                high.iter().all(|h| *h == act_lim) && low.iter().all(|l| *l == -act_lim);
            if !symmetric || act_lim <= 0.0 {
                return Err(RlError::UnsupportedActionSpace(format!(
                    "bounds must be [-a, a] for every dimension, got low={:?}, high={:?}",
                    low, high
                )));
            }
            Ok((shape[0], act_lim))
        }
    }
}

/// Checks that `space` is a box of rank 1 and returns its dimension.
pub fn verify_vector_observation_space(space: &Space) -> Result<usize, RlError> {
    match space {
        Space::Box { shape, .. } if shape.len() == 1 => Ok(shape[0]),
        _ => Err(RlError::UnsupportedObservation(format!(
            "expected a 1-dimensional box, got {:?}",
            space.shape()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_verify_action_space() {
        let space = Space::symmetric_box(vec![3], 2.0);
        assert_eq!(verify_continuous_action_space(&space).unwrap(), (3, 2.0));

        assert!(verify_continuous_action_space(&Space::Discrete(4)).is_err());
        assert!(verify_continuous_action_space(&Space::symmetric_box(vec![2, 2], 1.0)).is_err());

        let asymmetric = Space::Box {
            shape: vec![1],
            low: vec![0.0],
            high: vec![1.0],
        };
        assert!(verify_continuous_action_space(&asymmetric).is_err());

        assert!(verify_continuous_action_space(&Space::symmetric_box(vec![0], 1.0)).is_err());
        let short_bounds = Space::Box {
            shape: vec![3],
            low: vec![-1.0],
            high: vec![1.0],
        };
        assert!(verify_continuous_action_space(&short_bounds).is_err());
    }

    #[test]
    fn test_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let space = Space::symmetric_box(vec![2], 0.5);
        let a = space.sample_batch(64, &mut rng);
        assert_eq!(a.shape(), &[64, 2]);
        assert!(a.iter().all(|v| (-0.5..=0.5).contains(v)));
    }
}
