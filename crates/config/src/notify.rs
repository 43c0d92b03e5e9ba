//! Change notification fan-out.
//!
//! Every registered channel gets each notification without the producer ever
//! blocking on a subscriber. When a channel is full the value is parked in the
//! subscriber's single-slot mailbox and handed over by one background delivery
//! thread; newer values replace parked ones, so at most one thread and one
//! value are outstanding per subscriber.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

/// How long a delivery thread blocks before re-checking its mailbox.
const DELIVERY_POLL: Duration = Duration::from_millis(50);

/// Handle returned on registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

enum Offer {
    Sent,
    Parked,
    Disconnected,
}

struct Mailbox<T> {
    pending: Option<T>,
    delivering: bool,
    closed: bool,
}

struct Listener<T> {
    id: ListenerId,
    tx: Sender<T>,
    mailbox: Mutex<Mailbox<T>>,
    deliveries: Arc<AtomicUsize>,
}

impl<T: Send + 'static> Listener<T> {
    fn offer(self: &Arc<Self>, value: T) -> Offer {
        let mut mailbox = self.mailbox.lock();
        if mailbox.closed {
            return Offer::Disconnected;
        }
        if mailbox.delivering {
            // Keep ordering: the delivery thread picks this up after its current send
            mailbox.pending = Some(value);
            return Offer::Parked;
        }

        match self.tx.try_send(value) {
            Ok(()) => Offer::Sent,
            Err(TrySendError::Full(value)) => {
                mailbox.pending = Some(value);
                mailbox.delivering = true;
                drop(mailbox);
                self.spawn_delivery();
                Offer::Parked
            }
            Err(TrySendError::Disconnected(_)) => {
                mailbox.closed = true;
                Offer::Disconnected
            }
        }
    }

    fn spawn_delivery(self: &Arc<Self>) {
        let listener = Arc::clone(self);
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(format!("prism-notify-{}", self.id.0))
            .spawn(move || {
                listener.deliver();
                listener.deliveries.fetch_sub(1, Ordering::SeqCst);
            });

        if let Err(e) = spawned {
            self.deliveries.fetch_sub(1, Ordering::SeqCst);
            // Value stays parked; the next notification retries the fast path
            self.mailbox.lock().delivering = false;
            log::error!("Failed to spawn delivery thread for listener {}: {}", self.id.0, e);
        }
    }

    /// Drain the mailbox with blocking sends until it is empty or closed.
    fn deliver(&self) {
        loop {
            let mut value = {
                let mut mailbox = self.mailbox.lock();
                match mailbox.pending.take() {
                    Some(value) if !mailbox.closed => value,
                    _ => {
                        mailbox.pending = None;
                        mailbox.delivering = false;
                        return;
                    }
                }
            };

            loop {
                match self.tx.send_timeout(value, DELIVERY_POLL) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(stale)) => {
                        let mut mailbox = self.mailbox.lock();
                        if mailbox.closed {
                            mailbox.pending = None;
                            mailbox.delivering = false;
                            return;
                        }
                        value = mailbox.pending.take().unwrap_or(stale);
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {
                        let mut mailbox = self.mailbox.lock();
                        mailbox.closed = true;
                        mailbox.pending = None;
                        mailbox.delivering = false;
                        return;
                    }
                }
            }
        }
    }

    fn close(&self) {
        let mut mailbox = self.mailbox.lock();
        mailbox.closed = true;
        mailbox.pending = None;
    }
}

/// Registry of subscriber channels keyed by channel identity.
pub struct ChangeNotifier<T> {
    listeners: Mutex<Vec<Arc<Listener<T>>>>,
    next_id: AtomicU64,
    deliveries: Arc<AtomicUsize>,
}

impl<T: Clone + Send + 'static> ChangeNotifier<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            deliveries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a channel. Registering the same channel again returns its
    /// existing id.
    pub fn add_listener(&self, tx: Sender<T>) -> ListenerId {
        let mut listeners = self.listeners.lock();
        if let Some(existing) = listeners.iter().find(|l| l.tx.same_channel(&tx)) {
            return existing.id;
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        listeners.push(Arc::new(Listener {
            id,
            tx,
            mailbox: Mutex::new(Mailbox {
                pending: None,
                delivering: false,
                closed: false,
            }),
            deliveries: Arc::clone(&self.deliveries),
        }));
        id
    }

    /// Deregister a channel. Any parked value for it is discarded.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(index) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        let listener = listeners.swap_remove(index);
        drop(listeners);
        listener.close();
        true
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Delivery threads currently blocked on a full channel.
    pub fn pending_deliveries(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    /// Fan `value` out to every registered channel without blocking.
    ///
    /// Iterates a snapshot of the registry: a listener added concurrently
    /// may or may not see this value.
    pub fn notify(&self, value: T) {
        let listeners: Vec<Arc<Listener<T>>> = self.listeners.lock().clone();

        let mut disconnected = Vec::new();
        for listener in &listeners {
            if let Offer::Disconnected = listener.offer(value.clone()) {
                disconnected.push(listener.id);
            }
        }

        if !disconnected.is_empty() {
            log::debug!("Dropping {} disconnected settings listener(s)", disconnected.len());
            self.listeners.lock().retain(|l| !disconnected.contains(&l.id));
        }
    }
}

impl<T: Clone + Send + 'static> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}
