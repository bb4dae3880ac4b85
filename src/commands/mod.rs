pub mod classifier;
pub mod converter;
