//! Backend selection.
//!
//! NdArray on the CPU by default; the `wgpu` feature switches to the
//! GPU backend. Training always wraps the inference backend in
//! `Autodiff`.

use burn::backend::Autodiff;

#[cfg(not(feature = "wgpu"))]
mod backend_impl {
    pub use burn::backend::ndarray::{NdArray, NdArrayDevice};
    pub type InferBackend = NdArray;

    pub fn get_device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

#[cfg(feature = "wgpu")]
mod backend_impl {
    pub use burn::backend::wgpu::{Wgpu, WgpuDevice};
    pub type InferBackend = Wgpu<f32, i32>;

    pub fn get_device() -> WgpuDevice {
        WgpuDevice::BestAvailable
    }
}

pub use backend_impl::{get_device, InferBackend};

pub type TrainBackend = Autodiff<InferBackend>;
