//! Publish/subscribe boundary between windows and the session owner.
//!
//! `SyncHub` is the shared side: it holds every window's handlers and the
//! intent queue. Each window gets its own `SyncChannel` handle with its own
//! debounce buffer, so tearing down one window cancels only its intents.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{AppError, Result};
use crate::sync::message::{EventName, InboundEvent, Intent};
use crate::util::debounce::KeyedDebouncer;

/// Which deliveries a handler accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowScope {
    /// Events addressed to this window, plus broadcasts.
    Window(String),
    /// Every event of the subscribed name.
    Any,
}

impl WindowScope {
    fn accepts(&self, target: Option<&str>) -> bool {
        match (self, target) {
            (WindowScope::Any, _) | (WindowScope::Window(_), None) => true,
            (WindowScope::Window(label), Some(target)) => label == target,
        }
    }
}

pub type Handler = Box<dyn FnMut(&InboundEvent) + Send>;

struct Registration {
    id: u64,
    name: EventName,
    scope: WindowScope,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<Registration>,
}

/// Detaches its handler when dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    name: EventName,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn event(&self) -> EventName {
        self.name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().handlers.retain(|r| r.id != self.id);
            trace!(id = self.id, event = %self.name, "handler detached");
        }
    }
}

/// Shared registry and intent queue.
#[derive(Clone)]
pub struct SyncHub {
    registry: Arc<Mutex<Registry>>,
    intents: mpsc::UnboundedSender<Intent>,
}

impl SyncHub {
    /// Create a hub and the receiving end of its intent queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Intent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                registry: Arc::new(Mutex::new(Registry::default())),
                intents: tx,
            },
            rx,
        )
    }

    /// A fresh handle for one window.
    pub fn channel(&self) -> SyncChannel {
        SyncChannel {
            registry: self.registry.clone(),
            intents: self.intents.clone(),
            pending: KeyedDebouncer::new(Duration::ZERO),
        }
    }

    /// Run every matching handler. `target` of `None` broadcasts.
    ///
    /// Handlers run under the registry lock and must not subscribe or drop
    /// subscriptions themselves.
    pub fn deliver(&self, target: Option<&str>, event: &InboundEvent) -> usize {
        let name = event.name();
        let mut registry = self.registry.lock();
        let mut delivered = 0;
        for reg in registry.handlers.iter_mut() {
            if reg.name == name && reg.scope.accepts(target) {
                (reg.handler)(event);
                delivered += 1;
            }
        }
        trace!(event = %name, ?target, delivered, "event delivered");
        delivered
    }

    pub fn handler_count(&self) -> usize {
        self.registry.lock().handlers.len()
    }
}

/// One window's view of the hub.
pub struct SyncChannel {
    registry: Arc<Mutex<Registry>>,
    intents: mpsc::UnboundedSender<Intent>,
    pending: KeyedDebouncer<String, Intent>,
}

impl SyncChannel {
    pub fn subscribe(&self, name: EventName, scope: WindowScope, handler: Handler) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push(Registration {
            id,
            name,
            scope,
            handler,
        });
        debug!(id, event = %name, "handler attached");
        Subscription {
            id,
            name,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Send an intent now.
    pub fn publish(&self, intent: Intent) -> Result<()> {
        debug!(intent = intent.name(), window = %intent.window, key = ?intent.key(), "publish");
        self.intents
            .send(intent)
            .map_err(|e| AppError::ChannelClosed(format!("intent {} not sent", e.0.name())))
    }

    /// Queue an intent under `key`; a later push with the same key replaces
    /// it and restarts the delay.
    pub fn publish_debounced(&mut self, key: impl Into<String>, intent: Intent, delay: Duration) {
        self.publish_debounced_at(key, intent, delay, Instant::now());
    }

    pub fn publish_debounced_at(
        &mut self,
        key: impl Into<String>,
        intent: Intent,
        delay: Duration,
        now: Instant,
    ) {
        self.pending.push_at(key.into(), intent, now, Some(delay));
    }

    /// Send every queued intent whose delay has elapsed.
    ///
    /// Returns the results per debounce key so callers can react to a
    /// failed send.
    pub fn flush_due(&mut self, now: Instant) -> Vec<(String, Result<()>)> {
        self.pending
            .drain_due(now)
            .into_iter()
            .map(|(key, intent)| {
                let sent = self.publish(intent);
                (key, sent)
            })
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Whether an intent is queued under `key`. The store keys searches by tab.
    pub fn has_pending(&self, key: &str) -> bool {
        self.pending.contains(&key.to_string())
    }

    pub fn cancel_pending(&mut self, key: &str) -> bool {
        self.pending.cancel(&key.to_string())
    }

    /// Drop every queued intent.
    pub fn cancel_all_pending(&mut self) -> usize {
        self.pending.cancel_where(|_| true)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::message::Command;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_handler(count: &Arc<AtomicUsize>) -> Handler {
        let count = count.clone();
        Box::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn changed() -> InboundEvent {
        InboundEvent::DirectoryTreeChanged {
            path: PathBuf::from("/p"),
        }
    }

    fn search(query: &str) -> Intent {
        Intent::new(
            "main",
            Command::ChangeTabSearch {
                key: "tab-1".into(),
                query: Some(query.into()),
            },
        )
    }

    #[test]
    fn delivers_by_name_and_scope() {
        let (hub, _rx) = SyncHub::new();
        let chan = hub.channel();
        let main = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));

        let _a = chan.subscribe(
            EventName::DirectoryTreeChanged,
            WindowScope::Window("main".into()),
            counter_handler(&main),
        );
        let _b = chan.subscribe(EventName::DirectoryTreeChanged, WindowScope::Any, counter_handler(&any));

        assert_eq!(hub.deliver(Some("main"), &changed()), 2);
        assert_eq!(hub.deliver(Some("other"), &changed()), 1);
        assert_eq!(hub.deliver(None, &changed()), 2);
        assert_eq!(
            hub.deliver(
                None,
                &InboundEvent::FileOpened {
                    path: PathBuf::from("/x")
                }
            ),
            0
        );
        assert_eq!(main.load(Ordering::SeqCst), 2);
        assert_eq!(any.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_subscription_detaches_handler() {
        let (hub, _rx) = SyncHub::new();
        let chan = hub.channel();
        let count = Arc::new(AtomicUsize::new(0));
        let sub = chan.subscribe(EventName::DirectoryTreeChanged, WindowScope::Any, counter_handler(&count));
        assert_eq!(hub.handler_count(), 1);

        drop(sub);
        assert_eq!(hub.handler_count(), 0);
        assert_eq!(hub.deliver(None, &changed()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn publish_reaches_receiver() {
        let (hub, mut rx) = SyncHub::new();
        let chan = hub.channel();
        chan.publish(Intent::new("main", Command::RestoreSession)).unwrap();
        let got = rx.try_recv().unwrap();
        assert_eq!(got.command, Command::RestoreSession);
    }

    #[test]
    fn publish_after_receiver_dropped_errors() {
        let (hub, rx) = SyncHub::new();
        drop(rx);
        let chan = hub.channel();
        let err = chan.publish(Intent::new("main", Command::OpenExplorerTab)).unwrap_err();
        assert!(matches!(err, AppError::ChannelClosed(_)));
    }

    #[test]
    fn rapid_search_sends_only_latest() {
        let (hub, mut rx) = SyncHub::new();
        let mut chan = hub.channel();
        let start = Instant::now();
        let delay = Duration::from_millis(300);

        chan.publish_debounced_at("tab-1", search("c"), delay, start);
        chan.publish_debounced_at("tab-1", search("ca"), delay, start + Duration::from_millis(50));
        chan.publish_debounced_at("tab-1", search("cat"), delay, start + Duration::from_millis(100));

        assert!(chan.flush_due(start + delay).is_empty());
        let sent = chan.flush_due(start + Duration::from_millis(400));
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.is_ok());

        assert_eq!(rx.try_recv().unwrap(), search("cat"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancelled_intents_are_never_sent() {
        let (hub, mut rx) = SyncHub::new();
        let mut chan = hub.channel();
        let start = Instant::now();
        chan.publish_debounced_at("tab-1", search("a"), Duration::from_millis(10), start);
        chan.publish_debounced_at("tab-2", search("b"), Duration::from_millis(10), start);

        assert!(chan.cancel_pending("tab-1"));
        assert_eq!(chan.cancel_all_pending(), 1);
        assert!(chan.flush_due(start + Duration::from_secs(1)).is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channels_keep_separate_buffers() {
        let (hub, _rx) = SyncHub::new();
        let mut a = hub.channel();
        let b = hub.channel();
        a.publish_debounced_at("tab-1", search("x"), Duration::from_millis(10), Instant::now());
        assert_eq!(a.pending_count(), 1);
        assert_eq!(b.pending_count(), 0);
    }
}
