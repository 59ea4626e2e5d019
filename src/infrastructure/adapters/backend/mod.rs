//! Synthesis Backend Adapters - SynthesisBackend 的具体实现

mod fake_backend;
mod http_backend;
mod piper_backend;

pub use fake_backend::{FakeBackendConfig, FakeSynthesisBackend};
pub use http_backend::{HttpBackendConfig, HttpSynthesisBackend};
pub use piper_backend::{PiperBackend, PiperBackendConfig};
