//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod backend;
pub mod codec;
pub mod storage;

pub use backend::*;
pub use codec::SymphoniaCodec;
pub use storage::*;
