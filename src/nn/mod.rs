//! Neural network models.

pub mod atari_lstm;

pub use atari_lstm::{
    conv2d_output_shape, rnn_state, rnn_state_schema, AtariLstmModel, AtariLstmModelConfig,
    HeadWiring, ModelOutput, RnnState,
};
