use tokio::sync::broadcast;

use crate::events::SwarmEvent;
use crate::query::QueryService;

pub struct AppState {
    pub query: QueryService,
    pub events: broadcast::Sender<SwarmEvent>,
}

impl AppState {
    pub fn new(query: QueryService, events: broadcast::Sender<SwarmEvent>) -> Self {
        Self { query, events }
    }
}
