//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → RoutingConfig handed to Proxy, which builds a RoutingSnapshot
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Proxy::reload builds a new snapshot and swaps it in
//!     → in-flight requests keep the snapshot they pinned
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, HealthConfig, LogFormat, ObservabilityConfig, OperationRoutes, PoolConfig,
    ProxyConfig, RouteConfig, RoutingConfig, SamplingConfig, SelectorKind,
};
pub use validation::{validate_config, validate_routing, ValidationError};
pub use watcher::ConfigWatcher;
