//! Reference captioner and ScanRefer batch loader.
//!
//! Small enough to train on a CPU, yet it speaks every collaborator
//! contract the solver relies on, so runs work end to end.

pub mod captioner;
pub mod loader;

pub use captioner::{UnigramCaptioner, POSITION_LOGITS};
pub use loader::{category_index, ScanReferLoader, MAX_DES_LEN, OBJECT_CAT};
