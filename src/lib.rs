pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod state;
pub mod utils;
pub mod views;

pub use api::ApiClient;
pub use cache::{keys, Mutation, QueryClient, QueryKey, QueryObserver, QueryState};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
