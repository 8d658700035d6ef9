//! licreg - a small license registry service
//!
//! Issues, extends, revokes and verifies software license keys stored in a
//! single `licenses` table.
//!
//! # Features
//!
//! - `server` - HTTP service (handlers, routes, database). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite)
//! licreg = { path = "../licreg" }
//!
//! # Server with PostgreSQL
//! licreg = { path = "../licreg", features = ["server", "postgres"] }
//! ```

#[cfg(all(feature = "server", not(any(feature = "sqlite", feature = "postgres"))))]
compile_error!("the `server` feature requires the `sqlite` or `postgres` feature");

// Core modules (always available)
pub mod config;
pub mod errors;
pub mod license_key;
pub mod plans;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
