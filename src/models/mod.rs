//! Machine learning models module
//!
//! Provides the regression tree, the bagged forest built from it and the
//! trainable regressor abstraction the training pipeline is written against.

mod decision_tree;
mod random_forest;
mod regressor;

pub use decision_tree::{DecisionTree, TreeConfig, TreeNode};
pub use random_forest::RandomForest;
pub use regressor::{ForestConfig, Regressor, Target};
