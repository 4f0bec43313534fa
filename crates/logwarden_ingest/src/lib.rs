//! Logwarden Ingest - Incremental Game-Server Log Ingestion
//!
//! Tails remote, append-only server logs for many (guild, server) tenants,
//! turns recognized lines into typed events, tracks player sessions and
//! mission state, and forwards each event at most once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Fetcher    │     │  Pattern    │     │  Sessions / │     │   Router    │
//! │ (SFTP pool, │────▶│  Engine     │────▶│  Missions   │────▶│ (channel →  │
//! │  local)     │     │ (line→match)│     │ (state)     │     │    sink)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲
//!                     ┌──────┴──────┐
//!                     │ Checkpoints │
//!                     │  (SQLite)   │
//!                     └─────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Tenant**: one (guild, server) pair with fully isolated state
//! - **Cold start**: first pass for a tenant; seeds state, emits nothing
//! - **Hot start**: later passes; only newly appended lines are processed
//! - **Checkpoint**: persisted line count, written before events go out

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod missions;
pub mod patterns;
pub mod remote;
pub mod router;
pub mod sessions;

// Re-exports for convenience
pub use config::{
    ChannelConfig, ChannelMap, GuildConfig, IngestConfig, ServerConfig, SshConfig, TenantConfig,
};
pub use coordinator::{Coordinator, IngestState, IngestStatus, PassSummary, TenantOutcome};
pub use error::{IngestError, Result};
pub use events::{DomainEvent, LogEvent, MissionState};
pub use fetcher::{ContentFetcher, ContentSource, FetchedLog};
pub use patterns::{PatternEngine, RawMatch};
pub use remote::{ConnectionPool, Connector, RemoteSession, RetryPolicy, SshConnector};
pub use router::{
    DefaultFormatter, EventRouter, Notification, NotificationFormatter, NotificationSink,
    PresenceDisplay, RoutingCategory, TracingPresence, TracingSink,
};
pub use sessions::{MissionBoard, SessionTracker};
