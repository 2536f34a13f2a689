pub mod loader;
pub mod scanrefer;
pub mod vocabulary;

pub use loader::{Batches, DataLoader, Loaders};
pub use scanrefer::{load_records, select_scenes, ScanReferRecord, SceneSelection};
pub use vocabulary::{Vocabulary, END_TOKEN, UNK_TOKEN};
