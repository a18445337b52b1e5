//! Recurrent perception-policy model for pixel observations.
//!
//! Pipeline: byte image rescaled to `[0, 1]` → two convolution + max-pool
//! stages → fully-connected features → concatenation with the previous
//! one-hot action and previous reward → LSTM core → policy head (softmaxed
//! to a probability simplex) and scalar value head.
//!
//! The canonical [`AtariLstmModel::forward`] takes time-major `[T, B, ...]`
//! inputs, folds time and batch into one axis for the feed-forward trunk,
//! and restores `[T, B]` leading dims on the outputs. [`forward_batch`] and
//! [`forward_step`] wrap it for the `[B, ...]` and unbatched conventions.
//!
//! Recurrent state crosses the call boundary as a two-field record
//! ([`RnnState`]): `h` and `c`, each `[batch, layers, hidden]`. The core
//! consumes `[layers, batch, hidden]` internally; the model transposes on
//! the way in and out so the external convention never changes. An absent
//! state (or absent field) starts from zeros.
//!
//! Shape mismatches are programming errors and fail hard.
//!
//! [`forward_batch`]: AtariLstmModel::forward_batch
//! [`forward_step`]: AtariLstmModel::forward_step

use std::sync::{Arc, OnceLock};

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig, LstmState};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::core::record::{Field, Record, RecordSchema};

// ============================================================================
// Recurrent state record
// ============================================================================

/// Recurrent-model memory: a record with fields `h` and `c`, each a
/// `[batch, layers, hidden]` tensor. Slicing it selects trajectories along
/// the batch axis across both fields at once.
pub type RnnState<B> = Record<Tensor<B, 3>>;

/// Schema of [`RnnState`]: `RnnState(h, c)`.
pub fn rnn_state_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| RecordSchema::new("RnnState", &["h", "c"]).expect("valid schema"))
        .clone()
}

/// Build a recurrent-state record from hidden and cell tensors.
pub fn rnn_state<B: Backend>(h: Tensor<B, 3>, c: Tensor<B, 3>) -> RnnState<B> {
    Record::build(&rnn_state_schema())
        .field("h", h)
        .field("c", c)
        .finish()
        .expect("schema has exactly the fields h and c")
}

// ============================================================================
// Config
// ============================================================================

/// Which features the policy and value heads read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadWiring {
    /// Heads read the LSTM output.
    Recurrent,
    /// Heads read the fully-connected features directly; the recurrent
    /// state is still computed and threaded through unchanged.
    Convolutional,
}

impl Default for HeadWiring {
    fn default() -> Self {
        HeadWiring::Recurrent
    }
}

impl std::fmt::Display for HeadWiring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// A `#[module(skip)]` field still has to satisfy `Module`; burn provides that
// impl for primitives (the `usize` fields) via this macro, so a constant config
// enum stored in the module needs it too.
use burn::constant;
constant!(HeadWiring);

/// Spatial output size of a square convolution or pooling stage.
pub fn conv2d_output_shape(
    h: usize,
    w: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> (usize, usize) {
    (
        (h + 2 * padding - kernel) / stride + 1,
        (w + 2 * padding - kernel) / stride + 1,
    )
}

/// Configuration for [`AtariLstmModel`].
#[derive(Debug, Clone)]
pub struct AtariLstmModelConfig {
    /// Input image shape `[channels, height, width]`.
    pub image_shape: [usize; 3],
    /// Number of discrete actions.
    pub n_actions: usize,
    /// Fully-connected feature size (default: 256).
    pub hidden_size: usize,
    /// LSTM hidden size (default: 256).
    pub lstm_size: usize,
    /// Recurrent layers (default: 1; the core is single-layer).
    pub lstm_layers: usize,
    /// Which features the heads read (default: recurrent).
    pub head_wiring: HeadWiring,
}

impl AtariLstmModelConfig {
    pub fn new(image_shape: [usize; 3], n_actions: usize) -> Self {
        Self {
            image_shape,
            n_actions,
            hidden_size: 256,
            lstm_size: 256,
            lstm_layers: 1,
            head_wiring: HeadWiring::default(),
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_lstm_size(mut self, lstm_size: usize) -> Self {
        self.lstm_size = lstm_size;
        self
    }

    pub fn with_head_wiring(mut self, head_wiring: HeadWiring) -> Self {
        self.head_wiring = head_wiring;
        self
    }

    /// Initialize the model on the given device.
    pub fn init<B: Backend>(&self, device: &B::Device) -> AtariLstmModel<B> {
        assert_eq!(self.lstm_layers, 1, "the recurrent core is single-layer");
        let [c, h, w] = self.image_shape;

        let conv1 = Conv2dConfig::new([c, 16], [8, 8]).init(device);
        let (h, w) = conv2d_output_shape(h, w, 8, 1, 0);
        let maxp1 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let (h, w) = conv2d_output_shape(h, w, 2, 2, 0);

        let conv2 = Conv2dConfig::new([16, 32], [4, 4]).init(device);
        let (h, w) = conv2d_output_shape(h, w, 4, 1, 0);
        let maxp2 = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let (h, w) = conv2d_output_shape(h, w, 2, 2, 0);

        let fc_in = h * w * 32;
        let fc = LinearConfig::new(fc_in, self.hidden_size).init(device);

        let lstm_in = self.hidden_size + self.n_actions + 1;
        let lstm = LstmConfig::new(lstm_in, self.lstm_size, true).init(device);

        let head_in = match self.head_wiring {
            HeadWiring::Recurrent => self.lstm_size,
            HeadWiring::Convolutional => self.hidden_size,
        };
        let linear_pi = LinearConfig::new(head_in, self.n_actions).init(device);
        let linear_v = LinearConfig::new(head_in, 1).init(device);

        AtariLstmModel {
            conv1,
            maxp1,
            conv2,
            maxp2,
            fc,
            lstm,
            linear_pi,
            linear_v,
            hidden_size: self.hidden_size,
            lstm_size: self.lstm_size,
            n_actions: self.n_actions,
            head_wiring: self.head_wiring,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

/// Output of one model invocation in time-major form.
#[derive(Debug, Clone)]
pub struct ModelOutput<B: Backend> {
    /// Action probabilities `[T, B, n_actions]`, a simplex along the last axis.
    pub pi: Tensor<B, 3>,
    /// Value estimates `[T, B]`.
    pub value: Tensor<B, 2>,
    /// Updated recurrent state, `[batch, layers, hidden]` per field.
    pub state: RnnState<B>,
}

/// Convolutional-recurrent policy and value network over pixel observations.
#[derive(Module, Debug)]
pub struct AtariLstmModel<B: Backend> {
    conv1: Conv2d<B>,
    maxp1: MaxPool2d,
    conv2: Conv2d<B>,
    maxp2: MaxPool2d,
    fc: Linear<B>,
    lstm: Lstm<B>,
    linear_pi: Linear<B>,
    linear_v: Linear<B>,
    #[module(skip)]
    hidden_size: usize,
    #[module(skip)]
    lstm_size: usize,
    #[module(skip)]
    n_actions: usize,
    #[module(skip)]
    head_wiring: HeadWiring,
}

impl<B: Backend> AtariLstmModel<B> {
    /// Number of discrete actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// LSTM hidden size.
    pub fn lstm_size(&self) -> usize {
        self.lstm_size
    }

    /// Zero recurrent state for `batch` trajectories, external convention.
    pub fn initial_state(&self, batch: usize, device: &B::Device) -> RnnState<B> {
        let h = Tensor::zeros([batch, 1, self.lstm_size], device);
        let c = Tensor::zeros([batch, 1, self.lstm_size], device);
        rnn_state(h, c)
    }

    /// External `[batch, layers, hidden]` to the core's per-layer
    /// `[batch, hidden]` (single layer).
    fn state_to_core(&self, x: Tensor<B, 3>, batch: usize) -> Tensor<B, 2> {
        let [b, layers, hidden] = x.dims();
        assert_eq!(b, batch, "recurrent state batch size mismatch");
        assert_eq!(layers, 1, "the recurrent core is single-layer");
        assert_eq!(hidden, self.lstm_size, "recurrent state hidden size mismatch");
        x.swap_dims(0, 1).reshape([batch, hidden])
    }

    fn unpack_state(&self, state: &RnnState<B>, batch: usize, device: &B::Device) -> LstmState<B, 2> {
        let h = state
            .get("h")
            .and_then(Field::as_value)
            .cloned()
            .map(|x| self.state_to_core(x, batch))
            .unwrap_or_else(|| Tensor::zeros([batch, self.lstm_size], device));
        let c = state
            .get("c")
            .and_then(Field::as_value)
            .cloned()
            .map(|x| self.state_to_core(x, batch))
            .unwrap_or_else(|| Tensor::zeros([batch, self.lstm_size], device));
        LstmState::new(c, h)
    }

    /// Canonical time-major forward pass.
    ///
    /// * `image` - byte pixels `[T, B, C, H, W]`, rescaled to `[0, 1]` internally
    /// * `prev_action` - one-hot previous actions `[T, B, n_actions]`
    /// * `prev_reward` - previous rewards `[T, B]`
    /// * `state` - recurrent state, or `None` to start from zeros
    pub fn forward(
        &self,
        image: Tensor<B, 5, Int>,
        prev_action: Tensor<B, 3>,
        prev_reward: Tensor<B, 2>,
        state: Option<&RnnState<B>>,
    ) -> ModelOutput<B> {
        let [t, b, c, h, w] = image.dims();
        let device = image.device();

        // Byte pixels to [0, 1]; fold time and batch for the trunk.
        let img = image.float().mul_scalar(1.0 / 255.0).reshape([t * b, c, h, w]);
        let x = relu(self.maxp1.forward(self.conv1.forward(img)));
        let x = relu(self.maxp2.forward(self.conv2.forward(x)));
        let [n, cx, hx, wx] = x.dims();
        let fc_out = relu(self.fc.forward(x.reshape([n, cx * hx * wx])));

        // Unfold for the recurrent core: [T, B, F], then batch-first.
        let lstm_input = Tensor::cat(
            vec![
                fc_out.clone().reshape([t, b, self.hidden_size]),
                prev_action,
                prev_reward.reshape([t, b, 1]),
            ],
            2,
        )
        .swap_dims(0, 1);

        let init = state.map(|s| self.unpack_state(s, b, &device));
        let (lstm_out, lstm_state) = self.lstm.forward(lstm_input, init);
        let lstm_flat = lstm_out.swap_dims(0, 1).reshape([t * b, self.lstm_size]);

        let features = match self.head_wiring {
            HeadWiring::Recurrent => lstm_flat,
            HeadWiring::Convolutional => fc_out,
        };
        let pi = softmax(self.linear_pi.forward(features.clone()), 1).reshape([
            t,
            b,
            self.n_actions,
        ]);
        let value = self.linear_v.forward(features).reshape([t, b]);

        // Core state [batch, hidden] back to external [batch, layers, hidden].
        let hn = lstm_state.hidden.reshape([1, b, self.lstm_size]).swap_dims(0, 1);
        let cn = lstm_state.cell.reshape([1, b, self.lstm_size]).swap_dims(0, 1);

        ModelOutput {
            pi,
            value,
            state: rnn_state(hn, cn),
        }
    }

    /// Single-step forward over a batch (`[B, ...]` convention). Outputs
    /// come back without the synthetic time axis.
    pub fn forward_batch(
        &self,
        image: Tensor<B, 4, Int>,
        prev_action: Tensor<B, 2>,
        prev_reward: Tensor<B, 1>,
        state: Option<&RnnState<B>>,
    ) -> (Tensor<B, 2>, Tensor<B, 1>, RnnState<B>) {
        let [b, c, h, w] = image.dims();
        let out = self.forward(
            image.reshape([1, b, c, h, w]),
            prev_action.reshape([1, b, self.n_actions]),
            prev_reward.reshape([1, b]),
            state,
        );
        (
            out.pi.reshape([b, self.n_actions]),
            out.value.reshape([b]),
            out.state,
        )
    }

    /// Forward over one unbatched sample. Outputs come back without the
    /// synthetic time and batch axes.
    pub fn forward_step(
        &self,
        image: Tensor<B, 3, Int>,
        prev_action: Tensor<B, 1>,
        prev_reward: Tensor<B, 1>,
        state: Option<&RnnState<B>>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>, RnnState<B>) {
        let [c, h, w] = image.dims();
        let out = self.forward(
            image.reshape([1, 1, c, h, w]),
            prev_action.reshape([1, 1, self.n_actions]),
            prev_reward.reshape([1, 1]),
            state,
        );
        (
            out.pi.reshape([self.n_actions]),
            out.value.reshape([1]),
            out.state,
        )
    }
}

impl<B: Backend> crate::algorithms::agent::PolicyModel<B> for AtariLstmModel<B> {
    fn forward(
        &self,
        image: Tensor<B, 5, Int>,
        prev_action: Tensor<B, 3>,
        prev_reward: Tensor<B, 2>,
        state: Option<&RnnState<B>>,
    ) -> ModelOutput<B> {
        AtariLstmModel::forward(self, image, prev_action, prev_reward, state)
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn grad_sq_norm(&self, grads: &B::Gradients) -> f32
    where
        B: burn::tensor::backend::AutodiffBackend,
    {
        use crate::algorithms::agent::{linear_grad_sq_norm, param_grad_sq_norm};

        let conv = |conv: &Conv2d<B>| {
            let mut total = param_grad_sq_norm(&conv.weight, grads);
            if let Some(bias) = &conv.bias {
                total += param_grad_sq_norm(bias, grads);
            }
            total
        };
        let gate = |gate: &burn::nn::GateController<B>| {
            linear_grad_sq_norm(&gate.input_transform, grads)
                + linear_grad_sq_norm(&gate.hidden_transform, grads)
        };

        conv(&self.conv1)
            + conv(&self.conv2)
            + linear_grad_sq_norm(&self.fc, grads)
            + gate(&self.lstm.input_gate)
            + gate(&self.lstm.forget_gate)
            + gate(&self.lstm.output_gate)
            + gate(&self.lstm.cell_gate)
            + linear_grad_sq_norm(&self.linear_pi, grads)
            + linear_grad_sq_norm(&self.linear_v, grads)
    }
}
