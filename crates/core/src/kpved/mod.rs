// crates/core/src/kpved/mod.rs
//! Hierarchical KPVED classification: tree, prompts, top-down walk.

pub mod prompt;
pub mod tree;
pub mod walker;

pub use prompt::build_level_prompt;
pub use tree::{ClassifierTree, TreeError, TreeNode};
pub use walker::{
    ClassificationOutcome, ClassifierLookup, ClassifyStep, HierarchicalClassifier,
};
