//! CCB Core - chart session orchestration
//!
//! Wires the slot store, the sandbox bridge and the analytics backend into a
//! running chart:
//! - [`ChartSession`] / [`SessionHandle`]: one task per chart container
//! - [`QueryOrchestrator`]: throttled, time-bounded `buildQuery` round-trips
//! - [`fetch_data`]: data requests that always yield a renderable result
//! - [`LuzmoClient`] behind the [`DatasetApi`] trait
//! - [`DatasetCatalog`], [`ThemeCatalog`] and [`BuilderConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ccb_core::{BuilderConfig, ChartSession, LuzmoClient, StaticAuth};
//!
//! let config = BuilderConfig::load("chart-builder.toml")?;
//! let client = LuzmoClient::new(&config.api)?;
//! let session = ChartSession::new(config, container, bundle, Arc::new(client.clone()),
//!     Arc::new(StaticAuth::from_client(client)))
//!     .with_manifest(manifest)
//!     .spawn();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod api;
pub mod auth;
pub mod config;
pub mod datasets;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod session;
pub mod theme;

pub use api::{
    calculate_query_duration, ApiColumn, DatasetApi, DatasetDetail, DatasetSummary, LuzmoClient,
    QueryResult, RowsData, API_VERSION,
};
pub use auth::{AuthProvider, Organization, StaticAuth, User};
pub use config::{
    ApiConfig, BuilderConfig, BundleConfig, DisplayConfig, QueryConfig, QueryStrategy,
    StalePolicy, TimingConfig, ENV_API_KEY, ENV_API_TOKEN,
};
pub use datasets::{filter_columns, transform_columns, DatasetCatalog};
pub use error::{ApiError, BuilderError, ConfigError};
pub use fetch::{
    fetch_data, load_failed_message, FetchOutcome, QueryResultInfo, LOAD_FAILED_MESSAGE,
    PREPARE_FAILED_MESSAGE,
};
pub use orchestrator::{BuildDecision, OrchestratorConfig, QueryOrchestrator};
pub use session::{ChartSession, ChartStatus, SessionHandle};
pub use theme::{AppearanceMode, ChartTheme, ThemeCatalog};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
