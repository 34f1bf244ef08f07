pub mod app;
pub mod config;
pub mod ephemeris;
pub mod errors;
pub mod events;
pub mod fit;
pub mod gemini;
pub mod handlers;
pub mod models;
pub mod prompt;
pub mod retry;
pub mod scoring;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;
pub mod weather;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::load_settings;
