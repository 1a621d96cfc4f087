//! Model loading, representation and evaluation

pub mod inference;
pub mod loader;
pub mod regressor;

pub use inference::InferenceEngine;
pub use loader::ArtifactLoader;
pub use regressor::{LinearModel, Node, Regressor, Tree, TreeEnsemble};
