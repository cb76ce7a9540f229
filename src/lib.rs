pub mod admin;
pub mod authz;
pub mod chain;
pub mod cidr;
pub mod config;
pub mod decision;
pub mod error;
pub mod limit_provider;
pub mod limiter;
pub mod metrics;
pub mod request;
pub mod store;

pub use chain::{Chain, Predicate};
pub use config::{ConfStore, GuardianConfig, Limit};
pub use decision::{Decision, DecisionEngine};
pub use error::GuardianError;
pub use request::Request;
pub use store::{Store, StoreConfig};
