pub mod cache;
pub mod merge;
pub mod overrides;
pub mod refresh;
pub mod repos;
mod support;
