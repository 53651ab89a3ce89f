pub mod classifier;
pub mod query;
pub mod tree;
pub mod watcher;
