pub mod common;
pub mod config;
pub mod env;
pub mod error;
pub mod logger;
pub mod model;
pub mod params;
