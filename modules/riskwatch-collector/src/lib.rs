pub mod classify;
pub mod collect;
pub mod emergency;
pub mod error;
pub mod geo;
pub mod pacing;
pub mod publisher;
pub mod settings;
pub mod sources;
pub mod system;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod transport;

pub use collect::Collector;
pub use error::SourceError;
pub use geo::{normalize_to_geojson, GeoOutcome};
pub use pacing::{Pacing, RateLimiter};
pub use publisher::Publisher;
pub use settings::{load_settings, CollectorSettings};
pub use sources::{CollectRequest, SourceAdapter, SourceBatch};
pub use system::SupplyChainSystem;
pub use traits::{EventSink, PubSubSink};
pub use transport::{HttpTransport, ReqwestTransport};
