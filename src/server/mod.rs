pub mod config;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use routes::{build_router, AppState};
pub use store::{ContentStore, StoredPhoto};
