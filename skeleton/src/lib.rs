pub mod backfiller;
pub mod config;
pub mod controller;
pub mod errors;
pub mod fetcher;
pub mod header;
pub mod metrics;
pub mod peer;
pub mod progress_store;
pub mod scheduler;
pub mod scratch;
pub mod subchain;
pub mod supervisor;

pub use config::{ConfigBuilder, SkeletonConfig};
pub use errors::SkeletonError;
pub use header::{PlainHeader, SkeletonHeader};
pub use metrics::{SkeletonCounters, SkeletonCountersSnapshot};
pub use peer::{Backfiller, ConnectionProvider, DropPeer, PeerConnection, PeerEvent, PeerId, PeerSet};
pub use progress_store::{DbProgressStore, ProgressStore};
pub use supervisor::{spawn, SkeletonHandle};
