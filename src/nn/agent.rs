//! Hierarchical {boundary node, STOP} policy
//!
//! Every candidate row is embedded from two scalars (its diffused seed feature and its
//! diffused community feature) and passed through two Swish blocks. A linear head gives
//! each boundary candidate a score; a second head reads the mean hidden state of the
//! episode's community rows and gives a {continue, stop} pair. For one episode
//!
//! ```text
//! log p(node i) = log_softmax(scores)[i] + log p(continue)
//! log p(STOP)   = log p(stop)
//! ```
//!
//! so the distribution over `candidates ∪ {STOP}` always sums to one.

use ndarray::{s, Array1, Array2, Axis};
use rand::Rng;
use crate::{Result, SeedGrowError};
use super::layers::{log_softmax, Linear, LinearBlock, Param};
use super::segment::Segment;

/// Number of hidden Swish blocks
const DEPTH: usize = 2;

/// Flattened policy input for one step of a batch
///
/// Row `r` holds the diffused seed and community features of one node. Each segment
/// owns a contiguous run of rows, boundary candidates first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyInput {
    /// Diffused seed feature per row
    pub seed_feats: Vec<f32>,
    /// Diffused community feature per row
    pub node_feats: Vec<f32>,
    /// One segment per scored episode
    pub segments: Vec<Segment>,
}

impl PolicyInput {
    /// Number of rows
    pub fn n_rows(&self) -> usize {
        self.seed_feats.len()
    }

    /// Check row counts and that every episode has a legal move
    pub fn validate(&self) -> Result<()> {
        if self.seed_feats.len() != self.node_feats.len() {
            return Err(SeedGrowError::Precondition(format!(
                "{} seed features but {} community features",
                self.seed_feats.len(),
                self.node_feats.len()
            )));
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.end > self.n_rows() {
                return Err(SeedGrowError::Precondition(format!(
                    "segment {} ends at row {} of {}",
                    i,
                    seg.end,
                    self.n_rows()
                )));
            }
            if seg.n_candidates() == 0 {
                return Err(SeedGrowError::Precondition(format!(
                    "episode {} has an empty boundary and should already be done",
                    i
                )));
            }
            if seg.n_community() == 0 {
                return Err(SeedGrowError::Precondition(format!("episode {} has an empty community", i)));
            }
        }
        Ok(())
    }
}

/// Intermediate values of one forward pass
struct Trace {
    seed_in: Array2<f32>,
    node_in: Array2<f32>,
    /// Input of every block, then the final hidden state
    activations: Vec<Array2<f32>>,
    pre: Vec<Array2<f32>>,
    node_log_probs: Vec<Array1<f32>>,
    /// `[continue, stop]` per segment
    stop_log_probs: Vec<Array1<f32>>,
    pooled: Vec<Array2<f32>>,
}

/// Policy network
#[derive(Clone, Debug)]
pub struct Agent {
    hidden_size: usize,
    seed_embedding: Linear,
    node_embedding: Linear,
    blocks: Vec<LinearBlock>,
    node_score: Linear,
    stop_score: Linear,
}

impl Agent {
    /// Random embeddings and blocks; both heads start at zero, so the initial
    /// policy is uniform over candidates with an even stop chance
    pub fn new<R: Rng + ?Sized>(hidden_size: usize, rng: &mut R) -> Self {
        Agent {
            hidden_size,
            seed_embedding: Linear::new(1, hidden_size, false, rng),
            node_embedding: Linear::new(1, hidden_size, false, rng),
            blocks: (0..DEPTH).map(|_| LinearBlock::new(hidden_size, rng)).collect(),
            node_score: Linear::zeros(hidden_size, 1, false),
            stop_score: Linear::zeros(hidden_size, 2, false),
        }
    }

    /// Hidden width
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Log-probabilities per segment; index `n_candidates` is STOP
    pub fn forward(&self, input: &PolicyInput) -> Result<Vec<Array1<f32>>> {
        Ok(self.trace(input)?.0)
    }

    fn trace(&self, input: &PolicyInput) -> Result<(Vec<Array1<f32>>, Trace)> {
        input.validate()?;

        let seed_in = Array1::from(input.seed_feats.clone()).insert_axis(Axis(1));
        let node_in = Array1::from(input.node_feats.clone()).insert_axis(Axis(1));

        let mut hidden = self.seed_embedding.forward(&seed_in) + &self.node_embedding.forward(&node_in);
        let mut activations = Vec::with_capacity(self.blocks.len() + 1);
        let mut pre = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (a, out) = block.forward(&hidden);
            activations.push(hidden);
            pre.push(a);
            hidden = out;
        }

        let scores = self.node_score.forward(&hidden).column(0).to_owned();
        let mut outputs = Vec::with_capacity(input.segments.len());
        let mut node_log_probs = Vec::with_capacity(input.segments.len());
        let mut stop_log_probs = Vec::with_capacity(input.segments.len());
        let mut pooled = Vec::with_capacity(input.segments.len());

        for seg in &input.segments {
            let node_lp = log_softmax(scores.slice(s![seg.start..seg.split]));
            let mean = hidden
                .slice(s![seg.split..seg.end, ..])
                .mean_axis(Axis(0))
                .ok_or_else(|| SeedGrowError::Precondition("empty community slice".to_string()))?
                .insert_axis(Axis(0));
            let stop_lp = log_softmax(self.stop_score.forward(&mean).row(0));

            let mut out = Array1::zeros(seg.n_actions());
            out.slice_mut(s![..seg.n_candidates()]).assign(&(&node_lp + stop_lp[0]));
            out[seg.stop_index()] = stop_lp[1];

            outputs.push(out);
            node_log_probs.push(node_lp);
            stop_log_probs.push(stop_lp);
            pooled.push(mean);
        }

        activations.push(hidden);
        let trace = Trace {
            seed_in,
            node_in,
            activations,
            pre,
            node_log_probs,
            stop_log_probs,
            pooled,
        };
        Ok((outputs, trace))
    }

    /// Accumulate parameter gradients given `∂loss/∂log-probs` for each segment
    ///
    /// Replays the forward pass on `input`; the parameters must not have changed
    /// since the log-probabilities being differentiated were produced.
    pub fn backward(&mut self, input: &PolicyInput, output_grads: &[Array1<f32>]) -> Result<()> {
        let (_, trace) = self.trace(input)?;
        if output_grads.len() != input.segments.len() {
            return Err(SeedGrowError::Precondition(format!(
                "{} gradients for {} segments",
                output_grads.len(),
                input.segments.len()
            )));
        }

        let hidden = &trace.activations[self.blocks.len()];
        let n_rows = hidden.nrows();
        let mut d_scores = Array2::zeros((n_rows, 1));
        let mut d_hidden = Array2::<f32>::zeros((n_rows, self.hidden_size));

        for (k, (seg, grad)) in input.segments.iter().zip(output_grads).enumerate() {
            if grad.len() != seg.n_actions() {
                return Err(SeedGrowError::Precondition(format!(
                    "gradient of length {} for {} actions",
                    grad.len(),
                    seg.n_actions()
                )));
            }
            let n_candidates = seg.n_candidates();

            // Node part: every candidate output also depends on log p(continue)
            let grad_nodes = grad.slice(s![..n_candidates]);
            let total = grad_nodes.sum();
            let probs = trace.node_log_probs[k].mapv(f32::exp);
            for i in 0..n_candidates {
                d_scores[[seg.start + i, 0]] = grad_nodes[i] - probs[i] * total;
            }

            let grad_stop = [total, grad[seg.stop_index()]];
            let q = trace.stop_log_probs[k].mapv(f32::exp);
            let grad_sum = grad_stop[0] + grad_stop[1];
            let d_q = Array2::from_shape_fn((1, 2), |(_, j)| grad_stop[j] - q[j] * grad_sum);
            let d_pooled = self.stop_score.backward(&trace.pooled[k], &d_q);

            let share = d_pooled.row(0).mapv(|v| v / seg.n_community() as f32);
            for row in seg.community() {
                let mut target = d_hidden.row_mut(row);
                target += &share;
            }
        }

        d_hidden += &self.node_score.backward(hidden, &d_scores);
        for (idx, block) in self.blocks.iter_mut().enumerate().rev() {
            d_hidden = block.backward(&trace.activations[idx], &trace.pre[idx], &d_hidden);
        }
        self.seed_embedding.backward(&trace.seed_in, &d_hidden);
        self.node_embedding.backward(&trace.node_in, &d_hidden);
        Ok(())
    }

    /// Clear all gradients
    pub fn zero_grad(&mut self) {
        for param in self.params_mut() {
            param.zero_grad();
        }
    }

    /// All parameters in a fixed order
    pub fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut params = self.seed_embedding.params_mut();
        params.extend(self.node_embedding.params_mut());
        for block in &mut self.blocks {
            params.extend(block.linear.params_mut());
        }
        params.extend(self.node_score.params_mut());
        params.extend(self.stop_score.params_mut());
        params
    }

    /// Number of trainable scalars
    pub fn num_parameters(&self) -> usize {
        self.seed_embedding.num_parameters()
            + self.node_embedding.num_parameters()
            + self.blocks.iter().map(|b| b.linear.num_parameters()).sum::<usize>()
            + self.node_score.num_parameters()
            + self.stop_score.num_parameters()
    }
}
