// ============================================================
// Layer 5 — Two-Group AdamW with Token-Driven Schedule
// ============================================================
// Burn's AdamW applies one weight decay to every parameter it
// sees. Here the gradients are split by the ParamPartition and
// each half goes to its own AdamW:
//
//   decayed      → AdamW(weight_decay = cfg, betas = 0.9/0.95)
//   non-decayed  → AdamW(weight_decay = 0,   betas = 0.9/0.95)
//
// One step:
//   1. clip every gradient to a shared global L2 norm, measured
//      before clipping and reported in the StepReport
//   2. update both groups at lr = schedule(tokens)
//   3. tokens += supervised tokens of the batch
//   4. step += 1
//
// Reference: Loshchilov & Hutter (2019) Decoupled Weight Decay
//            Regularization

use burn::{
    module::{AutodiffModule, ParamId},
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::error::{GptError, Result};
use crate::ml::params::{ParamDecl, ParamPartition};
use crate::ml::schedule::LrSchedule;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamWSettings {
    pub betas:          (f32, f32),
    pub weight_decay:   f32,
    pub grad_norm_clip: f64,
}

impl Default for AdamWSettings {
    fn default() -> Self {
        Self { betas: (0.9, 0.95), weight_decay: 0.1, grad_norm_clip: 1.0 }
    }
}

/// What one optimizer step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub lr:        f64,
    pub grad_norm: f64,
}

pub struct ScheduledAdamW<B: AutodiffBackend, M: AutodiffModule<B>> {
    decayed:        OptimizerAdaptor<AdamW<B::InnerBackend>, M, B>,
    non_decayed:    OptimizerAdaptor<AdamW<B::InnerBackend>, M, B>,
    partition:      ParamPartition,
    schedule:       LrSchedule,
    grad_norm_clip: f64,
    tokens:         u64,
    step:           usize,
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> ScheduledAdamW<B, M> {
    pub fn new(schedule: LrSchedule, settings: AdamWSettings, partition: ParamPartition) -> Self {
        let adamw = |weight_decay: f32| {
            AdamWConfig::new()
                .with_beta_1(settings.betas.0)
                .with_beta_2(settings.betas.1)
                .with_epsilon(1e-8)
                .with_weight_decay(weight_decay)
                .init::<B, M>()
        };
        Self {
            decayed: adamw(settings.weight_decay),
            non_decayed: adamw(0.0),
            partition,
            schedule,
            grad_norm_clip: settings.grad_norm_clip,
            tokens: 0,
            step: 0,
        }
    }

    pub fn current_lr(&self) -> f64 {
        self.schedule.rate_at(self.tokens)
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn step(
        &mut self,
        model: M,
        grads: B::Gradients,
        batch_tokens: usize,
    ) -> Result<(M, StepReport)> {
        let mut grads = GradientsParams::from_grads(grads, &model);

        let grad_norm = global_norm::<B::InnerBackend>(&grads, &self.partition)?;
        let scale = clip_scale(grad_norm, self.grad_norm_clip);

        let decayed = take_group::<B::InnerBackend>(&mut grads, self.partition.decayed(), scale)?;
        let non_decayed =
            take_group::<B::InnerBackend>(&mut grads, self.partition.non_decayed(), scale)?;

        let lr = self.current_lr();
        let model = self.decayed.step(lr, model, decayed);
        let model = self.non_decayed.step(lr, model, non_decayed);

        self.tokens += batch_tokens as u64;
        self.step += 1;
        tracing::trace!("step {} lr={:.3e} grad_norm={:.4}", self.step, lr, grad_norm);
        Ok((model, StepReport { lr, grad_norm }))
    }
}

/// Factor that brings `grad_norm` down to `max_norm`. A non-positive
/// `max_norm` disables clipping.
fn clip_scale(grad_norm: f64, max_norm: f64) -> f64 {
    if max_norm > 0.0 && grad_norm > max_norm {
        max_norm / (grad_norm + 1e-6)
    } else {
        1.0
    }
}

fn rank_error(decl: &ParamDecl) -> GptError {
    GptError::Configuration(format!(
        "parameter '{}' has unsupported rank {}",
        decl.name,
        decl.rank()
    ))
}

fn squared_sum<B: Backend, const D: usize>(grads: &GradientsParams, id: ParamId) -> Option<f64> {
    grads
        .get::<B, D>(id)
        .map(|g| (g.clone() * g).sum().into_scalar().elem::<f64>())
}

fn global_norm<B: Backend>(grads: &GradientsParams, partition: &ParamPartition) -> Result<f64> {
    let mut total = 0.0;
    for decl in partition.iter() {
        let id = decl.id.clone();
        let sum = match decl.rank() {
            1 => squared_sum::<B, 1>(grads, id),
            2 => squared_sum::<B, 2>(grads, id),
            3 => squared_sum::<B, 3>(grads, id),
            _ => return Err(rank_error(decl)),
        };
        total += sum.unwrap_or(0.0);
    }
    Ok(total.sqrt())
}

fn transfer<B: Backend, const D: usize>(
    from: &mut GradientsParams,
    to: &mut GradientsParams,
    id: ParamId,
    scale: f64,
) {
    if let Some(grad) = from.remove::<B, D>(id.clone()) {
        let grad = if scale < 1.0 { grad.mul_scalar(scale) } else { grad };
        to.register::<B, D>(id, grad);
    }
}

/// Moves the gradients of `group` out of `grads`, scaled by `scale`.
fn take_group<B: Backend>(
    grads: &mut GradientsParams,
    group: &[ParamDecl],
    scale: f64,
) -> Result<GradientsParams> {
    let mut out = GradientsParams::new();
    for decl in group {
        let id = decl.id.clone();
        match decl.rank() {
            1 => transfer::<B, 1>(grads, &mut out, id, scale),
            2 => transfer::<B, 2>(grads, &mut out, id, scale),
            3 => transfer::<B, 3>(grads, &mut out, id, scale),
            _ => return Err(rank_error(decl)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    use super::*;

    type TestBackend = NdArray;

    fn decl(name: &str, id: &ParamId, shape: &[usize], decay: bool) -> ParamDecl {
        ParamDecl { name: name.to_string(), id: id.clone(), shape: shape.to_vec(), decay }
    }

    fn values<const D: usize>(grads: &GradientsParams, id: &ParamId) -> Vec<f32> {
        grads
            .get::<TestBackend, D>(id.clone())
            .unwrap()
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    #[test]
    fn clip_scale_only_ever_shrinks() {
        assert_eq!(clip_scale(0.5, 1.0), 1.0);
        assert_eq!(clip_scale(1.0, 1.0), 1.0);
        assert!((clip_scale(4.0, 1.0) - 0.25).abs() < 1e-6);
        assert_eq!(clip_scale(100.0, 0.0), 1.0);
    }

    #[test]
    fn norm_spans_both_groups_and_groups_are_scaled_apart() {
        let device = NdArrayDevice::Cpu;
        let (weight, bias) = (ParamId::new(), ParamId::new());
        let mut grads = GradientsParams::new();
        grads.register::<TestBackend, 2>(weight.clone(), Tensor::from_floats([[3.0, 0.0]], &device));
        grads.register::<TestBackend, 1>(bias.clone(), Tensor::from_floats([4.0], &device));
        let partition = ParamPartition::new(vec![
            decl("fc.weight", &weight, &[1, 2], true),
            decl("fc.bias", &bias, &[1], false),
        ])
        .unwrap();

        let norm = global_norm::<TestBackend>(&grads, &partition).unwrap();
        assert!((norm - 5.0).abs() < 1e-9);

        let scale = clip_scale(norm, 1.0);
        let decayed = take_group::<TestBackend>(&mut grads, partition.decayed(), scale).unwrap();
        let non_decayed =
            take_group::<TestBackend>(&mut grads, partition.non_decayed(), scale).unwrap();

        let w = values::<2>(&decayed, &weight);
        let b = values::<1>(&non_decayed, &bias);
        assert!((w[0] - 0.6).abs() < 1e-5 && w[1] == 0.0, "{w:?}");
        assert!((b[0] - 0.8).abs() < 1e-5, "{b:?}");
        assert!(decayed.get::<TestBackend, 1>(bias.clone()).is_none());
        assert!(grads.get::<TestBackend, 2>(weight).is_none());
    }

    #[test]
    fn unsupported_rank_is_a_configuration_error() {
        let id = ParamId::new();
        let partition = ParamPartition::new(vec![decl("odd", &id, &[1, 1, 1, 1], true)]).unwrap();
        let err = global_norm::<TestBackend>(&GradientsParams::new(), &partition).unwrap_err();
        assert!(matches!(err, GptError::Configuration(_)));
    }
}
