//! Adam (adaptive moment estimation)

use ndarray::{Array2, Zip};
use super::layers::Param;

/// Adam over an ordered parameter list
///
/// Moments are matched to parameters by position, so the same list order must be
/// passed on every step. A list of a different length resets the state.
#[derive(Clone, Debug)]
pub struct Adam {
    /// Step size
    pub learning_rate: f32,
    /// Decay of the first moment
    pub beta1: f32,
    /// Decay of the second moment
    pub beta2: f32,
    /// Denominator guard
    pub epsilon: f32,
    t: i32,
    moments: Vec<(Array2<f32>, Array2<f32>)>,
}

impl Adam {
    /// Adam with the usual betas
    pub fn new(learning_rate: f32) -> Self {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            moments: Vec::new(),
        }
    }

    /// Override the moment decays
    pub fn with_betas(mut self, beta1: f32, beta2: f32) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Number of updates applied
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Apply one update from the accumulated gradients
    pub fn step(&mut self, params: Vec<&mut Param>) {
        if self.moments.len() != params.len() {
            self.moments = params
                .iter()
                .map(|p| (Array2::zeros(p.value.raw_dim()), Array2::zeros(p.value.raw_dim())))
                .collect();
            self.t = 0;
        }
        self.t += 1;

        let (lr, beta1, beta2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let correction1 = 1.0 - beta1.powi(self.t);
        let correction2 = 1.0 - beta2.powi(self.t);

        for (param, (m, v)) in params.into_iter().zip(self.moments.iter_mut()) {
            Zip::from(&mut param.value)
                .and(&param.grad)
                .and(m)
                .and(v)
                .for_each(|w, &g, m, v| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / correction1;
                    let v_hat = *v / correction2;
                    *w -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }

    /// Forget all moment state
    pub fn reset(&mut self) {
        self.t = 0;
        self.moments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut optimizer = Adam::new(0.01);
        let mut param = Param::new(Array2::ones((2, 2)));

        for _ in 0..10 {
            param.grad.fill(1.0);
            optimizer.step(vec![&mut param]);
        }

        assert_eq!(optimizer.steps(), 10);
        assert!(param.value.iter().all(|&w| w < 1.0 && w > 0.85));
    }

    #[test]
    fn test_adam_minimises_quadratic() {
        let mut optimizer = Adam::new(0.1);
        let mut param = Param::new(Array2::from_elem((1, 1), 3.0));

        for _ in 0..300 {
            param.grad = param.value.mapv(|w| 2.0 * w);
            optimizer.step(vec![&mut param]);
        }

        assert!(param.value[[0, 0]].abs() < 0.1);
    }
}
