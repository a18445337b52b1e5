//! Categorical action distribution over simplex probabilities.
//!
//! The model emits action probabilities directly (softmax head), so the
//! distribution works on `[T, B, n_actions]` probability tensors. Actions
//! arrive one-hot encoded, which keeps log-likelihood a masked sum rather
//! than an indexed gather.
//!
//! All reductions take an optional validity mask so entries past episode
//! ends drop out of the statistics.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::tensor::masked::valid_mean;

/// Probability floor inside logarithms.
const LOG_EPS: f32 = 1e-8;

/// Categorical distribution over a fixed action set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Categorical;

impl Categorical {
    pub fn new() -> Self {
        Self
    }

    /// Log-likelihood of one-hot `actions` under `probs`, shape `[T, B]`.
    pub fn log_likelihood<B: Backend>(
        &self,
        actions_onehot: &Tensor<B, 3>,
        probs: &Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let [t, b, _] = probs.dims();
        let log_probs = probs.clone().add_scalar(LOG_EPS).log();
        (log_probs * actions_onehot.clone()).sum_dim(2).reshape([t, b])
    }

    /// Per-entry entropy of `probs`, shape `[T, B]`.
    pub fn entropy<B: Backend>(&self, probs: &Tensor<B, 3>) -> Tensor<B, 2> {
        let [t, b, _] = probs.dims();
        let log_probs = probs.clone().add_scalar(LOG_EPS).log();
        -(probs.clone() * log_probs).sum_dim(2).reshape([t, b])
    }

    /// Per-entry perplexity, the exponential of entropy, shape `[T, B]`.
    pub fn perplexity<B: Backend>(&self, probs: &Tensor<B, 3>) -> Tensor<B, 2> {
        self.entropy(probs).exp()
    }

    /// Mean entropy over valid entries.
    pub fn mean_entropy<B: Backend>(
        &self,
        probs: &Tensor<B, 3>,
        valid: Option<&Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        valid_mean(self.entropy(probs), valid)
    }

    /// Mean perplexity over valid entries.
    pub fn mean_perplexity<B: Backend>(
        &self,
        probs: &Tensor<B, 3>,
        valid: Option<&Tensor<B, 2>>,
    ) -> Tensor<B, 1> {
        valid_mean(self.perplexity(probs), valid)
    }

    /// Sample one action per row of a `[batch, n_actions]` probability
    /// tensor. Returns `(actions, log_probs)` of the sampled actions.
    pub fn sample<B: Backend>(&self, probs: &Tensor<B, 2>) -> (Vec<u32>, Vec<f32>) {
        let [batch, n_actions] = probs.dims();
        let data = probs.clone().into_data();
        let rows: &[f32] = data.as_slice().expect("probability data is f32");

        let mut actions = Vec::with_capacity(batch);
        let mut log_probs = Vec::with_capacity(batch);
        for i in 0..batch {
            let rand_val = fastrand::f32();
            let mut cumsum = 0.0;
            let mut selected = (n_actions - 1) as u32;
            for a in 0..n_actions {
                cumsum += rows[i * n_actions + a];
                // The last action also catches rounding shortfall below 1.0.
                if rand_val < cumsum || a == n_actions - 1 {
                    selected = a as u32;
                    break;
                }
            }
            let p = rows[i * n_actions + selected as usize];
            actions.push(selected);
            log_probs.push((p + LOG_EPS).ln());
        }
        (actions, log_probs)
    }
}
