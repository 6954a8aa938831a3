//! Single optimizer steps on a tiny model: decay groups, schedule
//! ordering and gradient clipping.

mod common;

use burn::prelude::*;

use birthplace_gpt::ml::{
    model::Gpt,
    optimizer::{AdamWSettings, ScheduledAdamW},
    params::ParamPartition,
    schedule::LrSchedule,
};
use common::{assert_close, test_device, tiny_config, TrainTestBackend};

type B = TrainTestBackend;

const VOCAB: usize = 12;
const BLOCK: usize = 8;

fn ids(offset: usize) -> Tensor<B, 2, Int> {
    let ids: Vec<i32> = (0..2 * BLOCK).map(|i| ((i + offset) % VOCAB) as i32).collect();
    Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &test_device()).reshape([2, BLOCK])
}

fn loss(model: &Gpt<B>, supervised: bool) -> Tensor<B, 1> {
    let mask = if supervised {
        Tensor::<B, 2>::ones([2, BLOCK], &test_device())
    } else {
        Tensor::<B, 2>::zeros([2, BLOCK], &test_device())
    };
    let (_, loss) = model.forward_loss(ids(0), ids(1), mask).unwrap();
    loss
}

fn optimizer(model: &Gpt<B>, schedule: LrSchedule, settings: AdamWSettings) -> ScheduledAdamW<B, Gpt<B>> {
    let partition = ParamPartition::new(model.param_decls()).unwrap();
    ScheduledAdamW::new(schedule, settings, partition)
}

fn values<const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

#[test]
fn test_rate_is_read_before_tokens_advance_and_only_matrices_decay() {
    let device = test_device();
    let model = tiny_config(VOCAB, BLOCK).init::<B>(&device).unwrap();
    let schedule = LrSchedule { base_rate: 0.1, lr_decay: true, warmup_tokens: 7, final_tokens: 1_000 };
    let settings = AdamWSettings { weight_decay: 0.1, ..AdamWSettings::default() };
    let mut optim = optimizer(&model, schedule, settings);

    let head = values(model.head.weight.val());
    let gamma = values(model.ln_f.gamma.val());
    let tok_emb = values(model.tok_emb.weight.val());

    // An all-zero mask gives all-zero gradients, so only weight decay moves anything.
    let grads = loss(&model, false).backward();
    let (model, first) = optim.step(model, grads, 7).unwrap();
    assert_eq!(first.lr, 0.0);
    assert_eq!(optim.tokens(), 7);
    assert_eq!(optim.step_count(), 1);
    assert_eq!(values(model.head.weight.val()), head);

    let grads = loss(&model, false).backward();
    let (model, second) = optim.step(model, grads, 7).unwrap();
    assert_eq!(second.lr, 0.1);
    assert_eq!(optim.tokens(), 14);
    assert_eq!(optim.step_count(), 2);

    let decayed: Vec<f32> = head.iter().map(|w| w * 0.99).collect();
    assert_close(&values(model.head.weight.val()), &decayed, 1e-6);
    assert_eq!(values(model.ln_f.gamma.val()), gamma);
    assert_eq!(values(model.tok_emb.weight.val()), tok_emb);
}

#[test]
fn test_reported_norm_is_measured_before_clipping() {
    let device = test_device();
    let model = tiny_config(VOCAB, BLOCK).init::<B>(&device).unwrap();
    let schedule = LrSchedule { base_rate: 1e-2, lr_decay: false, warmup_tokens: 0, final_tokens: 0 };
    let settings = AdamWSettings { weight_decay: 0.0, grad_norm_clip: 1e-3, ..AdamWSettings::default() };

    let grads = loss(&model, true).backward();
    let head_grad = model.head.weight.val().grad(&grads).unwrap();
    let head_norm = (head_grad.clone() * head_grad).sum().into_scalar().elem::<f64>().sqrt();
    let (_, single) = optimizer(&model, schedule, settings).step(model.clone(), grads, 16).unwrap();

    let doubled = loss(&model, true).mul_scalar(2.0).backward();
    let (_, double) = optimizer(&model, schedule, settings).step(model.clone(), doubled, 16).unwrap();

    assert!(single.grad_norm > settings.grad_norm_clip);
    assert!(single.grad_norm >= head_norm - 1e-6);
    assert!((double.grad_norm - 2.0 * single.grad_norm).abs() < 1e-4 * single.grad_norm);
}

#[test]
fn test_clipping_shrinks_the_update() {
    let device = test_device();
    let model = tiny_config(VOCAB, BLOCK).init::<B>(&device).unwrap();
    let schedule = LrSchedule { base_rate: 1e-2, lr_decay: false, warmup_tokens: 0, final_tokens: 0 };
    let head = values(model.head.weight.val());

    // Adam normalises away the gradient scale unless the clipped
    // gradients fall far below its epsilon (1e-8).
    let largest_change = |clip: f64| {
        let settings = AdamWSettings { weight_decay: 0.0, grad_norm_clip: clip, ..AdamWSettings::default() };
        let grads = loss(&model, true).backward();
        let (updated, _) = optimizer(&model, schedule, settings).step(model.clone(), grads, 16).unwrap();
        values(updated.head.weight.val())
            .iter()
            .zip(&head)
            .map(|(after, before)| (after - before).abs())
            .fold(0.0f32, f32::max)
    };

    let unclipped = largest_change(0.0);
    let clipped = largest_change(1e-12);
    assert!(unclipped > 5e-3, "{unclipped}");
    assert!(clipped < 1e-5, "{clipped}");
}
