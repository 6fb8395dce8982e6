pub mod batch;
pub mod definitions;
pub mod splitter;
pub mod types;
