//! HTTP API handlers for royalty-recon

pub mod health;
pub mod reports;
pub mod stats;

pub use health::health_routes;
pub use reports::report_routes;
pub use stats::stats_routes;
