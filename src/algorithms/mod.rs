//! Algorithm components.
//!
//! - `distribution`: categorical distribution over simplex probabilities
//! - `agent`: agent seam between sample batches and policy models
//! - `returns`: sample processing (returns, advantage, validity)
//! - `a2c`: advantage actor-critic optimization

pub mod a2c;
pub mod agent;
pub mod distribution;
pub mod returns;

#[cfg(test)]
mod tests;

pub use a2c::{opt_info_schema, A2c, A2cConfig, A2cLoss, OptInfo};
pub use agent::{Agent, PolicyModel};
pub use distribution::Categorical;
pub use returns::{
    discounted_returns, opt_data_schema, process_samples, valid_from_done, OptData,
    ProcessedSamples,
};
