pub mod classifier;
pub mod converter;
pub mod fs_service;
