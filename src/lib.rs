//! Job tracker library

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod forecast;
pub mod heatmap;
pub mod ingest;
pub mod pipeline;
pub mod posting;
pub mod search;
pub mod skills;
pub mod store;

pub use config::Config;
pub use error::{JobTrackerError, Result};
