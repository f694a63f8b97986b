pub mod config;
pub mod decode;
pub mod error;
pub mod metrics;
pub mod overlay;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::GatewayConfig;
pub use error::{DecodeError, DetectError};
pub use routes::router;
pub use state::AppState;
