//! Event fan-out.
//!
//! Global subscribers see every event and can be removed by id. Scoped
//! subscribers see one [`EventKind`] and stay for the life of the client. A
//! single consumer task delivers events synchronously, in arrival order.

use log::debug;
use parking_lot::Mutex;
use rcon_shared::{Event, EventKind, TypedEvent};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const EVENT_QUEUE_CAPACITY: usize = 100;

pub trait Subscriber: Send + Sync {
    fn receive(&self, event: &Event);
}

impl<F> Subscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn receive(&self, event: &Event) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Adapts a callback on one payload type to a [`Subscriber`].
struct Typed<T, F> {
    callback: F,
    _payload: PhantomData<fn(&T)>,
}

impl<T, F> Subscriber for Typed<T, F>
where
    T: TypedEvent,
    F: Fn(&T) + Send + Sync,
{
    fn receive(&self, event: &Event) {
        if let Some(payload) = T::from_event(event) {
            (self.callback)(payload)
        }
    }
}

#[derive(Default)]
struct Registry {
    global: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
    scoped: HashMap<EventKind, Vec<Arc<dyn Subscriber>>>,
}

#[derive(Default)]
pub struct Notifier {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: impl Subscriber + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .lock()
            .global
            .push((id, Arc::new(subscriber)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.global.len();
        registry.global.retain(|(existing, _)| *existing != id);
        registry.global.len() != before
    }

    pub fn subscribe_kind(&self, kind: EventKind, subscriber: impl Subscriber + 'static) {
        self.registry
            .lock()
            .scoped
            .entry(kind)
            .or_default()
            .push(Arc::new(subscriber));
    }

    /// Registers `callback` for the event kind whose payload is `T`.
    pub fn on<T, F>(&self, callback: F)
    where
        T: TypedEvent + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_kind(
            T::KIND,
            Typed {
                callback,
                _payload: PhantomData,
            },
        );
    }

    /// Delivers `event` to every matching subscriber. Subscribers run
    /// outside the registry lock and may themselves subscribe.
    pub fn dispatch(&self, event: &Event) {
        let targets: Vec<Arc<dyn Subscriber>> = {
            let registry = self.registry.lock();
            registry
                .global
                .iter()
                .map(|(_, s)| s.clone())
                .chain(
                    registry
                        .scoped
                        .get(&event.kind())
                        .into_iter()
                        .flatten()
                        .cloned(),
                )
                .collect()
        };
        for subscriber in targets {
            subscriber.receive(event);
        }
    }
}

/// Drains `events` into `notifier` until shutdown or until every sender is
/// gone.
pub async fn run_consumer(
    notifier: Arc<Notifier>,
    mut events: mpsc::Receiver<Event>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => notifier.dispatch(&event),
                None => break,
            },
        }
    }
    debug!("Event consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rcon_shared::event::{ConnectedEvent, KickEvent};

    fn connected(name: &str) -> Event {
        Event::Connected(ConnectedEvent {
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            player: name.to_string(),
            player_id: "1".to_string(),
        })
    }

    fn kick(name: &str) -> Event {
        Event::Kick(KickEvent {
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            player: name.to_string(),
            reason: "afk".to_string(),
        })
    }

    #[test]
    fn test_global_subscribe_and_unsubscribe() {
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = notifier.subscribe(move |event: &Event| sink.lock().push(event.kind()));

        notifier.dispatch(&connected("A"));
        notifier.dispatch(&kick("A"));
        assert_eq!(*seen.lock(), vec![EventKind::Connected, EventKind::Kick]);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.dispatch(&connected("B"));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_typed_subscription_filters_by_kind() {
        let notifier = Notifier::new();
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = names.clone();
        notifier.on(move |event: &ConnectedEvent| sink.lock().push(event.player.clone()));

        notifier.dispatch(&kick("Ignored"));
        notifier.dispatch(&connected("Alpha"));
        assert_eq!(*names.lock(), vec!["Alpha".to_string()]);
    }

    #[test]
    fn test_subscriber_may_subscribe_during_delivery() {
        let notifier = Arc::new(Notifier::new());
        let inner = notifier.clone();
        notifier.subscribe(move |_: &Event| {
            inner.subscribe_kind(EventKind::Kick, |_: &Event| {});
        });
        notifier.dispatch(&connected("A"));
    }

    #[tokio::test]
    async fn test_consumer_delivers_in_order() {
        let notifier = Arc::new(Notifier::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        notifier.subscribe(move |event: &Event| {
            if let Event::Connected(e) = event {
                sink.lock().push(e.player.clone());
            }
        });

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let consumer = tokio::spawn(run_consumer(
            notifier.clone(),
            rx,
            CancellationToken::new(),
        ));
        for name in ["A", "B", "C"] {
            tx.send(connected(name)).await.unwrap();
        }
        drop(tx);
        consumer.await.unwrap();

        assert_eq!(*seen.lock(), vec!["A", "B", "C"]);
    }
}
