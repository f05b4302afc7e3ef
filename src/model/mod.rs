pub mod file;
pub mod structure;
pub mod tree;
