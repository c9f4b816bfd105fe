//! Paginated feed coordination: debounced filters, visibility-driven
//! paging, a per-filter page cache with stale-response discard, and
//! ingestion status tracking for pending items.

pub mod browse;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod item;
pub mod normalize;
pub mod observe;
pub mod output;
pub mod pager;
pub mod poller;
pub mod source;
pub mod telemetry;
pub mod util;
pub mod view;

pub use coordinator::{Completion, FeedCoordinator, FeedEvent};
pub use error::{FeedError, FetchError};
pub use filter::{FilterSet, FilterValue};
