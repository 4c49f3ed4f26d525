pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{Config, get_configuration};
pub use state::AppState;
