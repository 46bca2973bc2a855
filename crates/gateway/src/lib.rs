//! Web front-end for object detection: upload an image, pick a model, get
//! an annotated copy and the detected classes back.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod predict;
pub mod resolve;
pub mod routes;
pub mod server;
pub mod state;
pub mod upload;
pub mod views;

pub use config::{Config, get_configuration};
pub use error::AppError;
pub use routes::router;
pub use state::AppState;
