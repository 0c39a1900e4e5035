pub mod config;
pub mod events;
pub mod http;
pub mod model;
pub mod query;
pub mod tracker;

pub use events::{BroadcastSink, EventSink, SinkError, SwarmEvent, SwarmEventEmitter};
pub use query::{QueryError, QueryService};
pub use tracker::{SwarmTracker, TrackerError};
