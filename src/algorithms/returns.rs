//! Sample processing for policy gradient losses.
//!
//! Turns a trajectory batch into the three same-shaped `[T, B]` tensors the
//! loss needs: discounted returns (bootstrapped past the batch end),
//! advantages against the value estimates stored at collection time, and a
//! validity mask derived from episode-reset flags.
//!
//! The kernels work on flat `f32`/`bool` slices in row-major `[T, B]` order;
//! tensor assembly sits on top.

use std::sync::{Arc, OnceLock};

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::core::record::{Record, RecordError, RecordSchema};
use crate::core::samples::{leaf_at, Samples};
use crate::tensor::convert::to_float_tensor;

/// Per-batch tensors handed from sample processing to the optimizer,
/// packaged as a record: `OptData(returns, advantage, valid)`.
pub type OptData<B> = Record<Tensor<B, 2>>;

/// Schema of [`OptData`].
pub fn opt_data_schema() -> Arc<RecordSchema> {
    static SCHEMA: OnceLock<Arc<RecordSchema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            RecordSchema::new("OptData", &["returns", "advantage", "valid"])
                .expect("valid schema")
        })
        .clone()
}

/// Discounted n-step returns over a `[T, B]` batch, scanned backwards from
/// the per-trajectory bootstrap values.
///
/// `returns[t] = reward[t] + discount * returns[t+1]`, with the recursion
/// reset at episode boundaries and seeded by `bootstrap` after the last
/// step.
pub fn discounted_returns(
    rewards: &[f32],
    dones: &[bool],
    bootstrap: &[f32],
    t_len: usize,
    b_len: usize,
    discount: f32,
) -> Vec<f32> {
    assert_eq!(rewards.len(), t_len * b_len);
    assert_eq!(dones.len(), t_len * b_len);
    assert_eq!(bootstrap.len(), b_len);

    let mut returns = vec![0.0f32; t_len * b_len];
    for env in 0..b_len {
        let mut running = bootstrap[env];
        for t in (0..t_len).rev() {
            let k = t * b_len + env;
            let not_done = if dones[k] { 0.0 } else { 1.0 };
            running = rewards[k] + discount * running * not_done;
            returns[k] = running;
        }
    }
    returns
}

/// Validity mask from episode-reset flags: a step is valid until the step
/// after its trajectory's first `done`.
pub fn valid_from_done(dones: &[bool], t_len: usize, b_len: usize) -> Vec<f32> {
    assert_eq!(dones.len(), t_len * b_len);

    let mut valid = vec![0.0f32; t_len * b_len];
    for env in 0..b_len {
        let mut alive = 1.0;
        for t in 0..t_len {
            let k = t * b_len + env;
            valid[k] = alive;
            if dones[k] {
                alive = 0.0;
            }
        }
    }
    valid
}

/// Result of [`process_samples`]: `[T, B]` tensors on the training backend.
#[derive(Debug, Clone)]
pub struct ProcessedSamples<B: Backend> {
    /// Discounted bootstrapped returns.
    pub returns: Tensor<B, 2>,
    /// Returns minus the value estimates stored at collection time.
    pub advantage: Tensor<B, 2>,
    /// 1 for steps inside an episode, 0 past its end.
    pub valid: Tensor<B, 2>,
}

impl<B: Backend> ProcessedSamples<B> {
    /// Package into an [`OptData`] record.
    pub fn into_record(self) -> Result<OptData<B>, RecordError> {
        Record::build(&opt_data_schema())
            .field("returns", self.returns)
            .field("advantage", self.advantage)
            .field("valid", self.valid)
            .finish()
    }
}

/// Derive returns, advantage, and validity from a trajectory batch.
pub fn process_samples<B: Backend>(
    samples: &Samples,
    discount: f32,
    device: &B::Device,
) -> Result<ProcessedSamples<B>, RecordError> {
    let reward = leaf_at(samples, "env", "reward")?;
    let shape = reward.shape().to_vec();
    if shape.len() != 2 {
        return Err(RecordError::RankMismatch { expected: 2, shape });
    }
    let (t_len, b_len) = (shape[0], shape[1]);

    let dones = leaf_at(samples, "env", "done")?.to_bool_vec()?;
    let bootstrap = leaf_at(samples, "agent", "bootstrap_value")?.to_f32_vec();
    let rewards = reward.to_f32_vec();

    let returns = discounted_returns(&rewards, &dones, &bootstrap, t_len, b_len, discount);
    let valid = valid_from_done(&dones, t_len, b_len);

    let returns: Tensor<B, 2> =
        Tensor::from_data(TensorData::new(returns, [t_len, b_len]), device);
    let valid: Tensor<B, 2> = Tensor::from_data(TensorData::new(valid, [t_len, b_len]), device);
    let value: Tensor<B, 2> = to_float_tensor(leaf_at(samples, "agent", "value")?, device)?;
    let advantage = returns.clone() - value;

    Ok(ProcessedSamples {
        returns,
        advantage,
        valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::array::BatchArray;
    use crate::core::samples::SamplesBuilder;
    use burn::backend::ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn returns_scan_backwards_from_the_bootstrap() {
        // Single trajectory: r = [1, 1, 1], bootstrap 2, discount 0.5.
        // t2: 1 + 0.5 * 2   = 2
        // t1: 1 + 0.5 * 2   = 2
        // t0: 1 + 0.5 * 2   = 2
        let r = discounted_returns(&[1.0, 1.0, 1.0], &[false; 3], &[2.0], 3, 1, 0.5);
        assert_eq!(r, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn returns_reset_at_episode_boundaries() {
        // done at t1 cuts the recursion: t1 gets its reward only.
        let r = discounted_returns(
            &[1.0, 1.0, 1.0],
            &[false, true, false],
            &[10.0],
            3,
            1,
            0.5,
        );
        // t2: 1 + 0.5 * 10 = 6; t1: 1 (done); t0: 1 + 0.5 * 1 = 1.5
        assert_eq!(r, vec![1.5, 1.0, 6.0]);
    }

    #[test]
    fn returns_handle_interleaved_trajectories() {
        // Two envs, two steps, discount 1: env0 rewards [1, 2] bootstrap 3,
        // env1 rewards [10, 20] bootstrap 30.
        let rewards = [1.0, 10.0, 2.0, 20.0];
        let r = discounted_returns(&rewards, &[false; 4], &[3.0, 30.0], 2, 2, 1.0);
        assert_eq!(r, vec![6.0, 60.0, 5.0, 50.0]);
    }

    #[test]
    fn validity_drops_after_the_first_done() {
        let v = valid_from_done(&[false, true, false, false], 4, 1);
        assert_eq!(v, vec![1.0, 1.0, 0.0, 0.0]);

        // Per-trajectory independence.
        let v = valid_from_done(&[false, true, false, false], 2, 2);
        assert_eq!(v, vec![1.0, 1.0, 1.0, 0.0]);
    }

    fn batch_with(
        rewards: Vec<f32>,
        values: Vec<f32>,
        dones: Vec<bool>,
        t: usize,
        b: usize,
    ) -> Samples {
        let n = t * b;
        SamplesBuilder::new(t, b)
            .observation(BatchArray::from_vec_u8(&[t, b, 1, 2, 2], vec![0; n * 4]).unwrap())
            .action(BatchArray::from_vec_i64(&[t, b], vec![0; n]).unwrap())
            .prev_action(BatchArray::from_vec_i64(&[t, b], vec![0; n]).unwrap())
            .value(BatchArray::from_vec_f32(&[t, b], values).unwrap())
            .bootstrap_value(BatchArray::zeros_f32(&[b]))
            .reward(BatchArray::from_vec_f32(&[t, b], rewards).unwrap())
            .prev_reward(BatchArray::zeros_f32(&[t, b]))
            .done(BatchArray::from_vec_bool(&[t, b], dones).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn process_samples_assembles_the_three_tensors() {
        let device = Default::default();
        let samples = batch_with(
            vec![1.0, 1.0, 1.0],
            vec![0.5, 0.5, 0.5],
            vec![false, false, false],
            3,
            1,
        );
        let p = process_samples::<B>(&samples, 0.0, &device).unwrap();
        // discount 0 makes returns equal rewards.
        assert_eq!(
            p.returns.clone().into_data().as_slice::<f32>().unwrap(),
            &[1.0, 1.0, 1.0]
        );
        assert_eq!(
            p.advantage.into_data().as_slice::<f32>().unwrap(),
            &[0.5, 0.5, 0.5]
        );
        assert_eq!(
            p.valid.into_data().as_slice::<f32>().unwrap(),
            &[1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn processed_samples_package_as_a_record() {
        let device = Default::default();
        let samples = batch_with(vec![0.0; 2], vec![0.0; 2], vec![false; 2], 2, 1);
        let rec = process_samples::<B>(&samples, 0.99, &device)
            .unwrap()
            .into_record()
            .unwrap();
        assert!(rec.has_field("returns"));
        assert!(rec.has_field("advantage"));
        assert!(rec.has_field("valid"));
        let names: Vec<&str> = rec.items().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["returns", "advantage", "valid"]);
    }
}
