pub mod config;
pub mod paths;
pub mod run;
pub mod tracing;
pub mod wiring;

pub use config::{apply_env_overrides, load_config, resolve_config};
pub use paths::AppPaths;
pub use run::run_until_shutdown;
pub use wiring::build_engine;
