//! Cupom Bridge - local receipt print bridge
//!
//! Accepts print jobs from the web frontend over HTTP and forwards the
//! pre-rendered ESC/POS bytes to a network or OS-spooled printer.
//!
//! # Module layout
//!
//! ```text
//! cupom-bridge/src/
//! ├── core/          # config, state, server
//! ├── api/           # HTTP handlers
//! ├── middleware/    # CORS guard, request logging
//! ├── utils/         # errors, logger, validation
//! └── routes.rs      # router + middleware stack
//! ```

pub mod api;
pub mod core;
pub mod middleware;
pub mod routes;
pub mod utils;

pub use core::{Config, Server, ServerState};
pub use routes::{build_app, build_router};
pub use utils::logger::{init_logger_from_config, init_logger_with_file};
pub use utils::{AppError, AppResult};

/// Load `.env`, read the configuration and start logging from it
pub fn setup_environment() -> anyhow::Result<Config> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(anyhow::anyhow!("Failed to load .env: {e}"));
    }

    let config = Config::from_env();
    init_logger_from_config(&config);

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
  ___ _  _ _ __  ___ _ __
 / __| || | '_ \/ _ \ '  \
| (__| || | .__/\___/_|_|_|
 \___|\_,_|_|   bridge v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
