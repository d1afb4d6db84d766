use serde::{Deserialize, Serialize};

/// Gradient pre-processing shared by every optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Multiplies every gradient before anything else, usually `1 / batch_size`.
    pub rescale_grad: f32,
    /// Weight decay coefficient.
    pub wd: f32,
    /// Clips the rescaled gradient to `[-clip, clip]` when set.
    pub clip_gradient: Option<f32>,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            rescale_grad: 1.,
            wd: 0.,
            clip_gradient: None,
        }
    }
}

impl OptimizerOptions {
    /// Computes the gradient an optimizer should step with.
    ///
    /// # Arguments
    /// * `g` - The raw gradient value.
    /// * `w` - The current value of the parameter.
    ///
    /// # Returns
    /// `clip(g * rescale_grad) + wd * w`.
    pub fn effective_grad(&self, g: f32, w: f32) -> f32 {
        let mut g = g * self.rescale_grad;

        if let Some(clip) = self.clip_gradient.map(f32::abs).filter(|clip| !clip.is_nan()) {
            g = g.clamp(-clip, clip);
        }

        g + self.wd * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_leave_the_gradient_untouched() {
        let options = OptimizerOptions::default();
        assert_eq!(options.effective_grad(3., 10.), 3.);
    }

    #[test]
    fn rescale_clip_then_decay() {
        let options = OptimizerOptions {
            rescale_grad: 0.5,
            wd: 0.1,
            clip_gradient: Some(1.),
        };

        // 4 * 0.5 = 2, clipped to 1, plus 0.1 * 2
        assert!((options.effective_grad(4., 2.) - 1.2).abs() < 1e-6);
        assert!((options.effective_grad(-4., 0.) + 1.).abs() < 1e-6);
    }

    #[test]
    fn malformed_clip_bounds_never_panic() {
        let negative = OptimizerOptions {
            clip_gradient: Some(-1.),
            ..Default::default()
        };
        assert_eq!(negative.effective_grad(4., 0.), 1.);

        let nan = OptimizerOptions {
            clip_gradient: Some(f32::NAN),
            ..Default::default()
        };
        assert_eq!(nan.effective_grad(4., 0.), 4.);
    }
}
