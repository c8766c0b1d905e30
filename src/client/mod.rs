pub mod engine;
pub mod fetch;
pub mod normalize;
pub mod providers;
pub mod record;
pub mod registry;
pub mod torznab;

pub use engine::{AggregatedResults, SearchEngine, SearchSession, SessionState, SourceOutcome};
pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, HttpClientConfig, HttpFetcher};
pub use providers::{ProviderError, Safety, SourceDescriptor, SourceKind, SourceProvider};
pub use record::{Category, InfoHash, MagnetLink, Record, TorrentId};
pub use registry::SourceRegistry;
pub use torznab::{ConnectionStatus, IndexerConfig, TorznabProvider};
