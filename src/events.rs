//! Event dispatch
//!
//! Typed events with ordered subscribers. Plugins connect callbacks at
//! registration time; firing runs every live subscriber sequentially in
//! registration order. A handle can flag itself disconnected at any time
//! and is pruned lazily on the next fire, so subscriber lists are never
//! mutated mid-iteration.

use crate::network::ConnId;
use crate::protocol::ClientPacket;
use crate::server::ClassicServer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

/// Subscriber callback: full mutable access to the context plus the
/// event's payload
pub type Callback<C, T> = Box<dyn FnMut(&mut C, &T) + Send>;

/// Handle to a subscription, returned by [`Event::connect`]
#[derive(Clone)]
pub struct EventHandle {
    connected: Arc<AtomicBool>,
}

impl EventHandle {
    /// Flag this subscription for removal; it is skipped from the next
    /// fire onwards and pruned lazily
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    /// Whether the subscription is still live
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

struct Subscriber<C, T> {
    callback: Callback<C, T>,
    connected: Arc<AtomicBool>,
}

/// An event with an ordered subscriber list.
///
/// `C` is the dispatch context handed mutably to every subscriber; the
/// server instantiates it as [`ClassicServer`] so handlers can reach all
/// state and fire further events.
pub struct Event<C, T> {
    subscribers: Vec<Subscriber<C, T>>,
}

impl<C, T> Event<C, T> {
    /// Create an event with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Append a subscriber; it fires after all earlier registrations
    pub fn connect(&mut self, callback: impl FnMut(&mut C, &T) + Send + 'static) -> EventHandle {
        let connected = Arc::new(AtomicBool::new(true));
        self.subscribers.push(Subscriber {
            callback: Box::new(callback),
            connected: connected.clone(),
        });
        EventHandle { connected }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.connected.load(Ordering::Relaxed))
            .count()
    }

    /// Fire the event, running subscribers sequentially in registration
    /// order.
    ///
    /// The subscriber list is taken out of the context for the duration
    /// of the pass, so handlers may connect further subscribers (they run
    /// from the next fire) and may fire other events; re-entrant fires of
    /// the same event see an empty list. Disconnected subscribers are
    /// skipped and pruned.
    pub fn fire(context: &mut C, event: impl Fn(&mut C) -> &mut Self, arg: &T) {
        let mut subscribers = std::mem::take(&mut event(context).subscribers);

        for subscriber in &mut subscribers {
            if subscriber.connected.load(Ordering::Relaxed) {
                (subscriber.callback)(context, arg);
            }
        }

        subscribers.retain(|subscriber| subscriber.connected.load(Ordering::Relaxed));

        // Keep anything handlers registered mid-fire, in order, after the
        // surviving originals.
        let slot = event(context);
        subscribers.append(&mut slot.subscribers);
        slot.subscribers = subscribers;
    }

    /// Resolve once with the next fire's payload, then disconnect.
    pub fn wait(&mut self) -> oneshot::Receiver<T>
    where
        T: Clone + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let handle_cell: Arc<std::sync::OnceLock<EventHandle>> = Arc::new(std::sync::OnceLock::new());

        let cell = handle_cell.clone();
        let handle = self.connect(move |_context, arg: &T| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(arg.clone());
            }
            if let Some(handle) = cell.get() {
                handle.disconnect();
            }
        });
        let _ = handle_cell.set(handle);

        rx
    }
}

impl<C, T> Default for Event<C, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The events the server exposes to plugins
#[derive(Default)]
pub struct ServerEvents {
    /// Server start-up, before the listener binds
    pub starting: Event<ClassicServer, ()>,
    /// Server shut-down, before players are dropped
    pub shutdown: Event<ClassicServer, ()>,
    /// A player completed the handshake and holds a slot
    pub player_added: Event<ClassicServer, ConnId>,
    /// A player is leaving, with the removal reason
    pub player_removing: Event<ClassicServer, (ConnId, String)>,
    /// A parsed packet arrived from a client
    pub incoming_packet: Event<ClassicServer, (ConnId, ClientPacket)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Harness {
        log: Vec<String>,
        count: u32,
        plain: Event<Harness, ()>,
        tagged: Event<Harness, String>,
    }

    #[test]
    fn test_subscribers_fire_in_registration_order() {
        let mut harness = Harness::default();
        harness.plain.connect(|h, ()| h.log.push("first".to_string()));
        harness.plain.connect(|h, ()| h.log.push("second".to_string()));
        harness.plain.connect(|h, ()| h.log.push("third".to_string()));

        Event::fire(&mut harness, |h| &mut h.plain, &());

        assert_eq!(harness.log, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_disconnected_subscriber_is_skipped_and_pruned() {
        let mut harness = Harness::default();
        harness.plain.connect(|h, ()| h.count += 1);
        let handle = harness.plain.connect(|h, ()| h.count += 10);

        Event::fire(&mut harness, |h| &mut h.plain, &());
        assert_eq!(harness.count, 11);

        handle.disconnect();
        Event::fire(&mut harness, |h| &mut h.plain, &());
        assert_eq!(harness.count, 12);
        assert_eq!(harness.plain.subscriber_count(), 1);
    }

    #[test]
    fn test_event_carries_payload() {
        let mut harness = Harness::default();
        harness
            .tagged
            .connect(|h, message: &String| h.log.push(message.clone()));

        Event::fire(&mut harness, |h| &mut h.tagged, &"hello".to_string());

        assert_eq!(harness.log, vec!["hello".to_string()]);
    }

    #[test]
    fn test_mid_fire_registration_runs_next_pass() {
        let mut harness = Harness::default();
        harness.plain.connect(|h, ()| {
            h.count += 1;
            h.plain.connect(|h, ()| h.count += 100);
        });

        Event::fire(&mut harness, |h| &mut h.plain, &());
        assert_eq!(harness.count, 1);

        Event::fire(&mut harness, |h| &mut h.plain, &());
        assert_eq!(harness.count, 102);
    }

    #[tokio::test]
    async fn test_wait_resolves_once() {
        let mut harness = Harness::default();
        let rx = harness.tagged.wait();

        Event::fire(&mut harness, |h| &mut h.tagged, &"ping".to_string());
        assert_eq!(rx.await.unwrap(), "ping");

        // The waiter disconnected itself after resolving.
        Event::fire(&mut harness, |h| &mut h.tagged, &"again".to_string());
        assert_eq!(harness.tagged.subscriber_count(), 0);
    }
}
