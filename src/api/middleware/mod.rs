pub mod cors;
pub mod metrics;

pub use cors::create_cors_layer_for_environment;
pub use metrics::metrics_middleware;
