pub mod config;
pub mod video;
