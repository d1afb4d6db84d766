use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal as NormalDist, Uniform as UniformDist};

use super::{Initializer, initializer::fans};
use crate::{NdArray, Result};

fn fill<D: Distribution<f32>>(rng: &mut StdRng, distribution: &D, arr: &mut NdArray) {
    arr.iter_mut()
        .for_each(|x| *x = distribution.sample(&mut *rng));
}

/// Samples weights uniformly from `[-scale, scale)`.
#[derive(Debug)]
pub struct Uniform {
    distribution: UniformDist<f32>,
    rng: StdRng,
}

impl Uniform {
    /// Creates a new `Uniform` initializer.
    ///
    /// # Arguments
    /// * `scale` - The bound of the interval.
    /// * `seed` - The seed of the random number generator.
    ///
    /// # Returns
    /// An error if `scale` is not positive.
    pub fn new(scale: f32, seed: u64) -> Result<Self> {
        Ok(Self {
            distribution: UniformDist::new(-scale, scale)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Initializer for Uniform {
    fn init_weight(&mut self, _name: &str, arr: &mut NdArray) -> Result<()> {
        fill(&mut self.rng, &self.distribution, arr);
        Ok(())
    }
}

/// Samples weights from a zero mean normal distribution.
#[derive(Debug)]
pub struct Normal {
    distribution: NormalDist<f32>,
    rng: StdRng,
}

impl Normal {
    /// Creates a new `Normal` initializer.
    ///
    /// # Arguments
    /// * `sigma` - The standard deviation of the distribution.
    /// * `seed` - The seed of the random number generator.
    ///
    /// # Returns
    /// An error if `sigma` is not finite.
    pub fn new(sigma: f32, seed: u64) -> Result<Self> {
        Ok(Self {
            distribution: NormalDist::new(0., sigma)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Initializer for Normal {
    fn init_weight(&mut self, _name: &str, arr: &mut NdArray) -> Result<()> {
        fill(&mut self.rng, &self.distribution, arr);
        Ok(())
    }
}

/// Samples weights uniformly with a bound scaled by the fan in and fan out of each weight.
#[derive(Debug)]
pub struct Xavier {
    magnitude: f32,
    rng: StdRng,
}

impl Xavier {
    /// Creates a new `Xavier` initializer.
    ///
    /// # Arguments
    /// * `magnitude` - The numerator of the squared bound, `sqrt(magnitude / avg(fan_in, fan_out))`.
    /// * `seed` - The seed of the random number generator.
    pub fn new(magnitude: f32, seed: u64) -> Self {
        Self {
            magnitude,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Initializer for Xavier {
    fn init_weight(&mut self, _name: &str, arr: &mut NdArray) -> Result<()> {
        let (fan_in, fan_out) = fans(arr.shape());
        let scale = (self.magnitude / ((fan_in + fan_out) as f32 / 2.)).sqrt();
        fill(&mut self.rng, &UniformDist::new(-scale, scale)?, arr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn uniform_stays_in_bounds() {
        let mut init = Uniform::new(0.5, 42).unwrap();
        let mut arr = ArrayD::zeros(IxDyn(&[16, 8]));

        init.init("fc_weight", &mut arr).unwrap();

        assert!(arr.iter().all(|x| x.abs() <= 0.5));
        assert!(arr.iter().any(|&x| x != 0.));
    }

    #[test]
    fn same_seed_same_weights() {
        let mut a = ArrayD::zeros(IxDyn(&[4, 4]));
        let mut b = ArrayD::zeros(IxDyn(&[4, 4]));

        Normal::new(1., 7).unwrap().init("w_weight", &mut a).unwrap();
        Normal::new(1., 7).unwrap().init("w_weight", &mut b).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn xavier_bound_depends_on_fans() {
        let mut init = Xavier::new(3., 1);
        let mut arr = ArrayD::zeros(IxDyn(&[10, 20]));

        init.init("fc_weight", &mut arr).unwrap();

        let bound = (3f32 / 15.).sqrt();
        assert!(arr.iter().all(|x| x.abs() <= bound));
    }

    #[test]
    fn invalid_scale() {
        assert!(Uniform::new(0., 0).is_err());
        assert!(Normal::new(f32::NAN, 0).is_err());
    }
}
