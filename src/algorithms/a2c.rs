//! Advantage Actor-Critic optimization.
//!
//! One optimization step over a trajectory batch:
//!
//! - policy loss: negative valid-masked mean of log-likelihood times
//!   advantage,
//! - value loss: coefficient times the valid-masked mean of
//!   `0.5 * (value - return)^2`,
//! - entropy bonus: negative coefficient times the valid-masked mean
//!   entropy,
//!
//! summed into one scalar, backpropagated, gradient-norm clipped inside the
//! optimizer, and applied. Perplexity rides along as a diagnostic.
//!
//! Configuration is fixed at construction: discount, learning rate, the two
//! loss coefficients, the optimizer config (choice plus keyword options),
//! the clip threshold, and optionally a saved optimizer record to resume
//! from. Gradient state is per-step by construction (a fresh backward pass
//! each call), so there is no separate clearing step.

use std::sync::{Arc, OnceLock};

use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;

use crate::algorithms::agent::{Agent, PolicyModel};
use crate::algorithms::returns::{process_samples, OptData};
use crate::core::array::BatchArray;
use crate::core::record::{Record, RecordError, RecordSchema};
use crate::core::samples::Samples;
use crate::tensor::masked::valid_mean;

/// Scalar diagnostics of one optimization step, packaged as a record:
/// `OptInfo(loss, grad_norm, entropy, perplexity)`.
pub type OptInfo = Record<BatchArray>;

/// Schema of [`OptInfo`].
pub fn opt_info_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            RecordSchema::new("OptInfo", &["loss", "grad_norm", "entropy", "perplexity"])
                .expect("valid schema")
        })
        .clone()
}

// ============================================================================
// Config
// ============================================================================

/// Configuration for [`A2c`]. Immutable after construction.
#[derive(Clone)]
pub struct A2cConfig {
    /// Discount factor (default: 0.99).
    pub discount: f32,
    /// Learning rate (default: 1e-3).
    pub learning_rate: f64,
    /// Value loss coefficient (default: 0.5).
    pub value_loss_coeff: f32,
    /// Entropy loss coefficient (default: 0.01).
    pub entropy_loss_coeff: f32,
    /// Optimizer choice and its keyword options (default: Adam).
    pub optimizer: AdamConfig,
    /// Global gradient-norm clip threshold (default: 1.0; `None` disables).
    pub clip_grad_norm: Option<f32>,
}

impl Default for A2cConfig {
    fn default() -> Self {
        Self {
            discount: 0.99,
            learning_rate: 1e-3,
            value_loss_coeff: 0.5,
            entropy_loss_coeff: 0.01,
            optimizer: AdamConfig::new(),
            clip_grad_norm: Some(1.0),
        }
    }
}

impl A2cConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discount(mut self, discount: f32) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_value_loss_coeff(mut self, coeff: f32) -> Self {
        self.value_loss_coeff = coeff;
        self
    }

    pub fn with_entropy_loss_coeff(mut self, coeff: f32) -> Self {
        self.entropy_loss_coeff = coeff;
        self
    }

    pub fn with_optimizer(mut self, optimizer: AdamConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_clip_grad_norm(mut self, clip: Option<f32>) -> Self {
        self.clip_grad_norm = clip;
        self
    }

    /// Build the configured optimizer, with gradient-norm clipping applied
    /// inside it when a threshold is set.
    pub fn create_optimizer<B, M>(&self) -> impl Optimizer<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        let mut config = self.optimizer.clone();
        if let Some(max_norm) = self.clip_grad_norm {
            config = config.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
        }
        config.init()
    }
}

// ============================================================================
// Loss output
// ============================================================================

/// Output of [`A2c::loss`]: the combined loss tensor for backpropagation
/// plus the diagnostics that ride along.
#[derive(Debug, Clone)]
pub struct A2cLoss<B: AutodiffBackend> {
    /// Combined scalar loss.
    pub loss: Tensor<B, 1>,
    /// Valid-masked mean entropy.
    pub entropy: Tensor<B, 1>,
    /// Valid-masked mean perplexity.
    pub perplexity: Tensor<B, 1>,
    /// Returns, advantage, and validity handed back for logging.
    pub opt_data: OptData<B>,
}

// ============================================================================
// Algorithm
// ============================================================================

/// Advantage Actor-Critic over an [`Agent`] and an optimizer.
pub struct A2c<B, M, O>
where
    B: AutodiffBackend,
    M: PolicyModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    agent: Agent<B, M>,
    optimizer: O,
    config: A2cConfig,
}

impl<B, M, O> A2c<B, M, O>
where
    B: AutodiffBackend,
    M: PolicyModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub fn new(agent: Agent<B, M>, optimizer: O, config: A2cConfig) -> Self {
        Self {
            agent,
            optimizer,
            config,
        }
    }

    pub fn agent(&self) -> &Agent<B, M> {
        &self.agent
    }

    pub fn config(&self) -> &A2cConfig {
        &self.config
    }

    /// Resume from a saved optimizer record.
    pub fn with_optimizer_record(self, record: O::Record) -> Self {
        let Self {
            agent,
            optimizer,
            config,
        } = self;
        Self {
            agent,
            optimizer: optimizer.load_record(record),
            config,
        }
    }

    /// Snapshot the optimizer state for later resuming.
    pub fn optimizer_record(&self) -> O::Record {
        self.optimizer.to_record()
    }

    /// Compute the combined loss over a trajectory batch.
    ///
    /// An all-zero advantage zeroes the policy term regardless of the
    /// log-likelihoods; masked-out entries contribute to no term.
    pub fn loss(&self, samples: &Samples) -> Result<A2cLoss<B>, RecordError> {
        let (probs, value) = self.agent.call(samples)?;
        let processed = process_samples::<B>(samples, self.config.discount, self.agent.device())?;

        let dist = self.agent.distribution();
        let actions_onehot = self.agent.actions_onehot(samples)?;
        let logli = dist.log_likelihood(&actions_onehot, &probs);

        let valid = processed.valid.clone();
        let pi_loss = -valid_mean(logli * processed.advantage.clone(), Some(&valid));

        let value_error = (value - processed.returns.clone())
            .powf_scalar(2.0)
            .mul_scalar(0.5);
        let value_loss =
            valid_mean(value_error, Some(&valid)).mul_scalar(self.config.value_loss_coeff);

        let entropy = dist.mean_entropy(&probs, Some(&valid));
        let entropy_loss = -entropy.clone().mul_scalar(self.config.entropy_loss_coeff);

        let perplexity = dist.mean_perplexity(&probs, Some(&valid));
        let loss = pi_loss + value_loss + entropy_loss;

        Ok(A2cLoss {
            loss,
            entropy,
            perplexity,
            opt_data: processed.into_record()?,
        })
    }

    /// One optimization step: loss, backward, clipped optimizer update.
    ///
    /// Returns the per-batch tensors and the scalar diagnostics. The
    /// reported gradient norm is the global norm before clipping.
    pub fn optimize_agent(
        &mut self,
        samples: &Samples,
        itr: usize,
    ) -> Result<(OptData<B>, OptInfo), RecordError> {
        let out = self.loss(samples)?;
        let loss_value = tensor_to_scalar(&out.loss);
        let entropy_value = tensor_to_scalar(&out.entropy);
        let perplexity_value = tensor_to_scalar(&out.perplexity);

        let grads = out.loss.backward();
        let grad_norm = self.agent.model().grad_sq_norm(&grads).sqrt();
        let grads = GradientsParams::from_grads(grads, self.agent.model());
        let model = self
            .optimizer
            .step(self.config.learning_rate, self.agent.model().clone(), grads);
        self.agent.set_model(model);

        log::debug!(
            "itr {}: loss {:.6} grad_norm {:.6} entropy {:.6} perplexity {:.6}",
            itr,
            loss_value,
            grad_norm,
            entropy_value,
            perplexity_value
        );

        let opt_info = Record::build(&opt_info_schema())
            .field("loss", BatchArray::scalar_f32(loss_value))
            .field("grad_norm", BatchArray::scalar_f32(grad_norm))
            .field("entropy", BatchArray::scalar_f32(entropy_value))
            .field("perplexity", BatchArray::scalar_f32(perplexity_value))
            .finish()?;

        Ok((out.opt_data, opt_info))
    }
}

/// Extract the single value of a scalar tensor.
fn tensor_to_scalar<B: AutodiffBackend>(tensor: &Tensor<B, 1>) -> f32 {
    let data = tensor.clone().into_data();
    data.as_slice::<f32>().unwrap()[0]
}
