//! relaygate-server: Request pipeline and write workflows
//!
//! This crate wires the policy engine to a record store:
//! - Policy service for list/get with scoping, expansion and existence hiding
//! - Relay, membership and invitation workflows with optimistic commits
//! - Configuration management
//! - Logging initialisation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             relaygate-server                │
//! ├─────────────────────────────────────────────┤
//! │  config.rs        - Configuration           │
//! │  error.rs         - Outward error taxonomy  │
//! │  observability.rs - Logging setup           │
//! │  service/         - Policy service          │
//! │    handler.rs     - Reads, commit plumbing  │
//! │    writes.rs      - Write workflows         │
//! │    keys.rs        - Ids and join keys       │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod observability;
pub mod service;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use error::{ServiceError, ServiceResult};
pub use service::{CreatedRelay, PolicyService, ServiceConfig, UserUpdate};
