pub mod config;
pub mod error;
pub mod reports;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::RiskwatchError;
pub use reports::*;
pub use store::{
    CollectionSummary, CollectorCounters, ContextStore, EmergencyState, Section, SystemCounters,
    SystemHealth,
};
pub use types::*;
