//! Dense layers with hand-written backward passes
//!
//! A layer's `forward` is pure; `backward` takes the same input again, adds the
//! parameter gradients into each [`Param`] and returns the gradient for the input.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

/// Trainable matrix with its accumulated gradient
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Current value
    pub value: Array2<f32>,
    /// Gradient accumulated since the last `zero_grad`
    pub grad: Array2<f32>,
}

impl Param {
    /// Wrap a value with a zero gradient
    pub fn new(value: Array2<f32>) -> Self {
        let grad = Array2::zeros(value.raw_dim());
        Param { value, grad }
    }

    /// Clear the gradient
    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    /// Number of scalars
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Whether the parameter holds no scalars
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Fully connected layer: `y = x W + b`
#[derive(Clone, Debug)]
pub struct Linear {
    /// Weight matrix (input_size x output_size)
    pub weight: Param,
    /// Bias row (1 x output_size)
    pub bias: Option<Param>,
}

impl Linear {
    /// Xavier-uniform weights, zero bias
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, bias: bool, rng: &mut R) -> Self {
        let limit = (6.0 / (input_size + output_size) as f32).sqrt();
        let weight = Array2::from_shape_fn((input_size, output_size), |_| rng.gen_range(-limit..limit));
        Linear {
            weight: Param::new(weight),
            bias: bias.then(|| Param::new(Array2::zeros((1, output_size)))),
        }
    }

    /// All-zero layer
    pub fn zeros(input_size: usize, output_size: usize, bias: bool) -> Self {
        Linear {
            weight: Param::new(Array2::zeros((input_size, output_size))),
            bias: bias.then(|| Param::new(Array2::zeros((1, output_size)))),
        }
    }

    /// Input width
    pub fn input_size(&self) -> usize {
        self.weight.value.nrows()
    }

    /// Output width
    pub fn output_size(&self) -> usize {
        self.weight.value.ncols()
    }

    /// Forward pass over a batch of rows
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        let mut out = input.dot(&self.weight.value);
        if let Some(bias) = &self.bias {
            out += &bias.value;
        }
        out
    }

    /// Accumulate parameter gradients and return the input gradient
    pub fn backward(&mut self, input: &Array2<f32>, grad_output: &Array2<f32>) -> Array2<f32> {
        self.weight.grad += &input.t().dot(grad_output);
        if let Some(bias) = &mut self.bias {
            bias.grad += &grad_output.sum_axis(Axis(0)).insert_axis(Axis(0));
        }
        grad_output.dot(&self.weight.value.t())
    }

    /// Mutable access to the parameters
    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = vec![&mut self.weight];
        if let Some(bias) = &mut self.bias {
            params.push(bias);
        }
        params
    }

    /// Number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, Param::len)
    }
}

/// Linear layer followed by Swish
#[derive(Clone, Debug)]
pub struct LinearBlock {
    /// Affine part
    pub linear: Linear,
}

impl LinearBlock {
    /// Square block with bias
    pub fn new<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        LinearBlock { linear: Linear::new(size, size, true, rng) }
    }

    /// Returns `(pre_activation, output)`
    pub fn forward(&self, input: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let pre = self.linear.forward(input);
        let out = swish(&pre);
        (pre, out)
    }

    /// Backward through Swish then the affine map
    pub fn backward(&mut self, input: &Array2<f32>, pre: &Array2<f32>, grad_output: &Array2<f32>) -> Array2<f32> {
        let delta = grad_output * &swish_grad(pre);
        self.linear.backward(input, &delta)
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Swish: `x * sigmoid(x)`
pub fn swish(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| v * sigmoid(v))
}

/// Derivative of Swish at the pre-activation
pub fn swish_grad(x: &Array2<f32>) -> Array2<f32> {
    x.mapv(|v| {
        let s = sigmoid(v);
        s + v * s * (1.0 - s)
    })
}

/// Log-softmax of a vector, shifted by its maximum
pub fn log_softmax(x: ArrayView1<f32>) -> Array1<f32> {
    if x.is_empty() {
        return Array1::zeros(0);
    }
    let max = x.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let log_sum = max + x.mapv(|v| (v - max).exp()).sum().ln();
    x.mapv(|v| v - log_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn block_loss(block: &LinearBlock, x: &Array2<f32>, c: &Array2<f32>) -> f32 {
        (&block.forward(x).1 * c).sum()
    }

    #[test]
    fn test_log_softmax_normalises() {
        let lp = log_softmax(array![1.0f32, 2.0, 3.0].view());
        let total: f32 = lp.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(lp[2] > lp[1] && lp[1] > lp[0]);
    }

    #[test]
    fn test_linear_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Linear::new(3, 5, true, &mut rng);
        let out = layer.forward(&Array2::ones((4, 3)));
        assert_eq!(out.dim(), (4, 5));
        assert_eq!(layer.num_parameters(), 20);
    }

    #[test]
    fn test_block_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut block = LinearBlock::new(3, &mut rng);
        let x = array![[0.5f32, -1.0, 0.25], [1.5, 0.3, -0.7]];
        let c = array![[1.0f32, -2.0, 0.5], [0.3, 0.8, -1.1]];

        let (pre, _) = block.forward(&x);
        let grad_x = block.backward(&x, &pre, &c);

        let h = 1e-2f32;
        for &(i, j) in &[(0usize, 0usize), (1, 2), (2, 1)] {
            let mut plus = block.clone();
            plus.linear.weight.value[[i, j]] += h;
            let mut minus = block.clone();
            minus.linear.weight.value[[i, j]] -= h;
            let numeric = (block_loss(&plus, &x, &c) - block_loss(&minus, &x, &c)) / (2.0 * h);
            let analytic = block.linear.weight.grad[[i, j]];
            assert!((numeric - analytic).abs() < 5e-3, "w[{},{}]: {} vs {}", i, j, numeric, analytic);
        }

        let mut x_plus = x.clone();
        x_plus[[1, 0]] += h;
        let mut x_minus = x.clone();
        x_minus[[1, 0]] -= h;
        let numeric = (block_loss(&block, &x_plus, &c) - block_loss(&block, &x_minus, &c)) / (2.0 * h);
        assert!((numeric - grad_x[[1, 0]]).abs() < 5e-3);
    }
}
