pub mod schema;

pub use schema::{Config, DriverConfig, ExtractionConfig, OutputConfig};
