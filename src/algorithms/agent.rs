//! Agent seam between sample batches and policy models.
//!
//! [`PolicyModel`] is the contract a perception-policy network has to meet:
//! a canonical time-major forward pass plus a gradient-norm hook for
//! optimizer diagnostics. [`Agent`] owns one such model together with its
//! action distribution, and does the batch-to-tensor plumbing: observation
//! bytes to an integer tensor, previous actions to one-hot floats, previous
//! rewards to floats, then one model invocation over the whole `[T, B]`
//! batch.

use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Int, Tensor};

use crate::algorithms::distribution::Categorical;
use crate::core::samples::{leaf_at, Samples};
use crate::core::record::RecordError;
use crate::nn::atari_lstm::{ModelOutput, RnnState};
use crate::tensor::convert::{one_hot, to_float_tensor, to_int_tensor};

/// Contract for perception-policy networks driven by the optimizer.
pub trait PolicyModel<B: Backend> {
    /// Time-major forward pass: probabilities `[T, B, n_actions]`, values
    /// `[T, B]`, updated recurrent state.
    fn forward(
        &self,
        image: Tensor<B, 5, Int>,
        prev_action: Tensor<B, 3>,
        prev_reward: Tensor<B, 2>,
        state: Option<&RnnState<B>>,
    ) -> ModelOutput<B>;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Squared global L2 norm of this model's parameter gradients.
    fn grad_sq_norm(&self, grads: &B::Gradients) -> f32
    where
        B: AutodiffBackend;
}

/// Squared gradient norm of one parameter tensor, 0 when it has no gradient.
pub fn param_grad_sq_norm<B: AutodiffBackend, const D: usize>(
    param: &Param<Tensor<B, D>>,
    grads: &B::Gradients,
) -> f32 {
    match param.val().grad(grads) {
        Some(grad) => grad
            .powf_scalar(2.0)
            .sum()
            .into_data()
            .as_slice::<f32>()
            .unwrap()[0],
        None => 0.0,
    }
}

/// Squared gradient norm of a linear layer (weight plus optional bias).
pub fn linear_grad_sq_norm<B: AutodiffBackend>(
    linear: &Linear<B>,
    grads: &B::Gradients,
) -> f32 {
    let mut total = param_grad_sq_norm(&linear.weight, grads);
    if let Some(bias) = &linear.bias {
        total += param_grad_sq_norm(bias, grads);
    }
    total
}

/// An agent: a policy model plus its action distribution, invoked on whole
/// sample batches.
#[derive(Debug, Clone)]
pub struct Agent<B: Backend, M: PolicyModel<B>> {
    model: M,
    distribution: Categorical,
    device: B::Device,
}

impl<B: Backend, M: PolicyModel<B>> Agent<B, M> {
    pub fn new(model: M, device: &B::Device) -> Self {
        Self {
            model,
            distribution: Categorical::new(),
            device: device.clone(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Replace the model after an optimizer step.
    pub fn set_model(&mut self, model: M) {
        self.model = model;
    }

    pub fn distribution(&self) -> &Categorical {
        &self.distribution
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Run the model over the whole batch: `(probs [T,B,A], value [T,B])`.
    ///
    /// Training passes start the recurrent core from zeros; sampling-time
    /// state threading goes through the model's step interfaces instead.
    pub fn call(&self, samples: &Samples) -> Result<(Tensor<B, 3>, Tensor<B, 2>), RecordError> {
        let image: Tensor<B, 5, Int> =
            to_int_tensor(leaf_at(samples, "env", "observation")?, &self.device)?;
        let prev_action_onehot = one_hot(
            leaf_at(samples, "agent", "prev_action")?,
            self.model.n_actions(),
        )?;
        let prev_action: Tensor<B, 3> = to_float_tensor(&prev_action_onehot, &self.device)?;
        let prev_reward: Tensor<B, 2> =
            to_float_tensor(leaf_at(samples, "env", "prev_reward")?, &self.device)?;

        let out = self.model.forward(image, prev_action, prev_reward, None);
        Ok((out.pi, out.value))
    }

    /// One-hot encoding of the batch's taken actions, for the distribution.
    pub fn actions_onehot(&self, samples: &Samples) -> Result<Tensor<B, 3>, RecordError> {
        let onehot = one_hot(leaf_at(samples, "agent", "action")?, self.model.n_actions())?;
        to_float_tensor(&onehot, &self.device)
    }
}
