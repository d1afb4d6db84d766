use crate::{MlErr, NdArray, Result};

/// Fills parameter buffers with their initial values, choosing the rule by the name suffix.
pub trait Initializer {
    /// Initializes the buffer of the parameter called `name`.
    ///
    /// Biases, betas and moving means start at zero, gammas and moving variances at one and
    /// weights are delegated to `init_weight`.
    ///
    /// # Arguments
    /// * `name` - The name of the parameter.
    /// * `arr` - The buffer to fill.
    ///
    /// # Returns
    /// An error if the suffix of `name` isn't a known parameter kind.
    fn init(&mut self, name: &str, arr: &mut NdArray) -> Result<()> {
        if name.ends_with("bias") || name.ends_with("beta") || name.ends_with("moving_mean") {
            arr.fill(0.);
        } else if name.ends_with("gamma") || name.ends_with("moving_var") {
            arr.fill(1.);
        } else if name.ends_with("weight") {
            self.init_weight(name, arr)?;
        } else {
            return Err(MlErr::UnknownParamKind(name.to_string()));
        }

        Ok(())
    }

    /// Initializes a weight buffer.
    fn init_weight(&mut self, name: &str, arr: &mut NdArray) -> Result<()>;
}

/// Computes `(fan_in, fan_out)` of a weight shaped `(out, in, ...)`.
pub(super) fn fans(shape: &[usize]) -> (usize, usize) {
    match shape {
        [] => (1, 1),
        [n] => (*n, *n),
        [out, inp, rest @ ..] => {
            let receptive: usize = rest.iter().product();
            (inp * receptive, out * receptive)
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    struct Sevens;

    impl Initializer for Sevens {
        fn init_weight(&mut self, _name: &str, arr: &mut NdArray) -> Result<()> {
            arr.fill(7.);
            Ok(())
        }
    }

    #[test]
    fn dispatches_on_suffix() {
        let mut arr = ArrayD::from_elem(IxDyn(&[2]), 5.);

        Sevens.init("fc1_bias", &mut arr).unwrap();
        assert!(arr.iter().all(|&x| x == 0.));

        Sevens.init("bn_moving_var", &mut arr).unwrap();
        assert!(arr.iter().all(|&x| x == 1.));

        Sevens.init("fc1_weight", &mut arr).unwrap();
        assert!(arr.iter().all(|&x| x == 7.));

        Sevens.init("mon_moving_mean", &mut arr).unwrap();
        assert!(arr.iter().all(|&x| x == 0.));
    }

    #[test]
    fn unknown_suffix() {
        let mut arr = ArrayD::zeros(IxDyn(&[2]));
        let err = Sevens.init("mystery", &mut arr).unwrap_err();
        assert!(matches!(err, MlErr::UnknownParamKind(name) if name == "mystery"));
    }

    #[test]
    fn fans_of_a_dense_weight() {
        assert_eq!(fans(&[8, 3]), (3, 8));
        assert_eq!(fans(&[4, 2, 3, 3]), (18, 36));
        assert_eq!(fans(&[5]), (5, 5));
    }
}
