use std::{
    collections::HashMap,
    sync::{Arc, atomic::AtomicU64},
};

use crate::{
    events::EnrichedEvent,
    queues::{BoundedQueue, IsolatedForwarder},
};

/// Event type to the inboxes subscribed to it.
pub struct Routes {
    pub table: HashMap<&'static str, Vec<Route>>,
}

pub struct Route {
    pub subscriber_id: &'static str,
    pub inbox: RouteInbox,
    pub drops_total: Arc<AtomicU64>,
}

pub enum RouteInbox {
    Bounded(Arc<BoundedQueue<Arc<EnrichedEvent>>>),
    Isolated(IsolatedForwarder<Arc<EnrichedEvent>>),
}

impl RouteInbox {
    pub fn try_deliver(&self, event: Arc<EnrichedEvent>) -> bool {
        match self {
            RouteInbox::Bounded(q) => q.push(event).is_ok(),
            RouteInbox::Isolated(fwd) => fwd.try_send(event).is_ok(),
        }
    }
}
