//! agentdeck client - talks to the orchestration control plane
//!
//! [`ApiClient`] wraps the REST endpoints behind a shared [`TtlCache`],
//! [`Poller`] refreshes snapshots on an interval with stale-result
//! protection, and [`DeckConfig`] / [`PrefsStore`] hold local settings.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod poller;
pub mod prefs;
pub mod token;

pub use api::ApiClient;
pub use cache::{shared_cache, CacheKey, SharedCache, TtlCache};
pub use config::{data_dir, DeckConfig, ServerConfig};
pub use error::ClientError;
pub use poller::{
    FetchStatus, GraphFeed, PollEvent, Poller, PollerConfig, PollerHandle, SnapshotSource,
    TablesFeed, TablesSnapshot,
};
pub use prefs::{PhysicsPrefs, PrefsStore, PromptTemplate, TutorialFlags};
pub use token::AdminToken;
