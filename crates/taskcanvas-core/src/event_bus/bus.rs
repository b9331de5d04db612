//! Session-scoped event bus.
//!
//! Callback subscribers run synchronously on the publishing thread; async
//! consumers take a `broadcast` receiver instead. An optional history ring keeps
//! the most recent events for diagnostics.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{CanvasEvent, EventCategory};

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = self.0.simple().to_string();
        write!(f, "sub-{}", &short[..8])
    }
}

/// Which events a callback subscriber receives.
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Events of any of the listed categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    pub fn matches(&self, event: &CanvasEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type Callback = Arc<dyn Fn(CanvasEvent) + Send + Sync>;

/// Bus sizing.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Buffered events per `broadcast` receiver before it lags.
    pub channel_capacity: usize,
    /// Events kept in the history ring; 0 disables history.
    pub history_limit: usize,
    /// Older events are evicted from the ring on the next publish.
    pub history_window: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            history_limit: 0,
            history_window: Duration::from_secs(300),
        }
    }
}

/// Failure to deliver an event.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventBusError {
    #[error("event had no receivers")]
    NoSubscribers,
}

#[derive(Debug, Default)]
struct History {
    events: VecDeque<(Instant, CanvasEvent)>,
}

impl History {
    fn record(&mut self, event: &CanvasEvent, limit: usize, window: Duration) {
        let now = Instant::now();
        self.events.push_back((now, event.clone()));
        while let Some((at, _)) = self.events.front() {
            if self.events.len() > limit || now.duration_since(*at) > window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Publish/subscribe channel shared by the services of one canvas session.
pub struct EventBus {
    sender: broadcast::Sender<CanvasEvent>,
    callbacks: RwLock<HashMap<SubscriptionId, (EventFilter, Callback)>>,
    history: Mutex<History>,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            callbacks: RwLock::new(HashMap::new()),
            history: Mutex::new(History::default()),
            config,
        }
    }

    /// Delivers `event` to matching callbacks, then to broadcast receivers.
    ///
    /// Callbacks are invoked after the subscriber table is unlocked, so a
    /// callback may publish or subscribe itself.
    ///
    /// # Returns
    ///
    /// The number of callbacks and receivers reached.
    pub fn publish(&self, event: CanvasEvent) -> Result<usize, EventBusError> {
        if self.config.history_limit > 0 {
            self.history.lock().record(
                &event,
                self.config.history_limit,
                self.config.history_window,
            );
        }

        let targets: Vec<Callback> = self
            .callbacks
            .read()
            .values()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &targets {
            callback(event.clone());
        }

        let receivers = self.sender.send(event).unwrap_or(0);
        match receivers + targets.len() {
            0 => Err(EventBusError::NoSubscribers),
            reached => Ok(reached),
        }
    }

    /// Registers a callback; keep it short, it runs on the publisher's thread.
    pub fn subscribe<F>(&self, filter: EventFilter, callback: F) -> SubscriptionId
    where
        F: Fn(CanvasEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.callbacks
            .write()
            .insert(id, (filter, Arc::new(callback)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.callbacks.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Receiver for async consumers; sees events published after this call.
    pub fn receiver(&self) -> broadcast::Receiver<CanvasEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Recorded events, optionally only those at or after `since`.
    pub fn history(&self, since: Option<Instant>) -> Vec<CanvasEvent> {
        self.history
            .lock()
            .events
            .iter()
            .filter(|(at, _)| since.is_none_or(|since| *at >= since))
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Drops every callback and the history ring.
    pub fn clear(&self) {
        self.callbacks.write().clear();
        self.history.lock().events.clear();
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .field("history_limit", &self.config.history_limit)
            .finish()
    }
}
