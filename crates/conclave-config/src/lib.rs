//! # Conclave Configuration Library
//!
//! Typed configuration for the Conclave daemon and client.
//!
//! ## Sources, lowest to highest precedence
//!
//! - Built-in defaults (`127.0.0.1:8000`, 64 KiB frames)
//! - A TOML file: an explicit path, or `<config dir>/conclave/config.toml`
//! - `CONCLAVE_HOST` / `CONCLAVE_PORT` environment variables
//! - Command-line flags, applied by the binaries themselves
//!
//! ```rust,no_run
//! use conclave_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load(None).await?;
//!     println!("listening on {}", config.server.bind_address());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod components;
mod config;
mod loader;

pub use components::*;
pub use config::*;
pub use loader::*;
