pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod state;

pub use config::{ServerConfig, WaitRange};
pub use error::{ApiError, ApiResult};
pub use handlers::build_router;
pub use registry::{JobRegistry, RegistryHealth};
pub use state::AppState;
