//! Storage Adapter - 单次运行的临时空间

mod run_scratch;

pub use run_scratch::{FileRunScratch, FileScratchSpace};
