mod annotate;
mod bounding_box;
mod codec;
mod describer;
mod detector;
mod labels;
mod ort_detector;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
