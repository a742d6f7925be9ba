//! Per-session outbound queue.
//!
//! Room snapshots, the client count and the `connected` greeting are
//! latest-wins: a newer one replaces the queued one and moves to the back,
//! so they never count against the capacity and the newest is always
//! delivered. Everything else (audio deltas) is bounded; when full, the
//! oldest delta is evicted.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Latest-wins slot a message occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Connected,
    ClientCount,
    Room(String),
}

/// What [`Outbox::push`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    Queued,
    /// Superseded a queued message in the same slot.
    Replaced,
    /// Queued after evicting the oldest delta.
    EvictedOldest,
    /// The receiving side is gone.
    Closed,
}

struct Entry {
    slot: Option<Slot>,
    json: String,
}

struct Queue {
    items: VecDeque<Entry>,
    deltas: usize,
    capacity: usize,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    notify: Notify,
}

/// Create a queue holding at most `capacity` deltas.
pub fn outbox(capacity: usize) -> (Outbox, OutboxReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(Queue {
            items: VecDeque::new(),
            deltas: 0,
            capacity: capacity.max(1),
            closed: false,
        }),
        notify: Notify::new(),
    });
    (Outbox(Arc::clone(&shared)), OutboxReceiver(shared))
}

/// Sending half, owned by the relay. Dropping it closes the queue.
pub struct Outbox(Arc<Shared>);

impl Outbox {
    /// Queue `json`. Never blocks.
    pub fn push(&self, json: String, slot: Option<Slot>) -> Pushed {
        let pushed = {
            let mut queue = self.0.queue.lock();
            if queue.closed {
                return Pushed::Closed;
            }
            let pushed = match &slot {
                Some(slot) => match queue.items.iter().position(|e| e.slot.as_ref() == Some(slot)) {
                    Some(index) => {
                        queue.items.remove(index);
                        Pushed::Replaced
                    }
                    None => Pushed::Queued,
                },
                None if queue.deltas >= queue.capacity => {
                    if let Some(index) = queue.items.iter().position(|e| e.slot.is_none()) {
                        queue.items.remove(index);
                        queue.deltas -= 1;
                    }
                    Pushed::EvictedOldest
                }
                None => Pushed::Queued,
            };
            if slot.is_none() {
                queue.deltas += 1;
            }
            queue.items.push_back(Entry { slot, json });
            pushed
        };
        self.0.notify.notify_one();
        pushed
    }

    /// Messages waiting to be written.
    pub fn len(&self) -> usize {
        self.0.queue.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        self.0.queue.lock().closed = true;
        self.0.notify.notify_one();
    }
}

/// Receiving half, drained by the connection task.
pub struct OutboxReceiver(Arc<Shared>);

impl OutboxReceiver {
    /// Next message in order. `None` once the relay dropped the session and
    /// the queue is empty. Cancel-safe.
    pub async fn recv(&mut self) -> Option<String> {
        loop {
            let notified = self.0.notify.notified();
            {
                let mut queue = self.0.queue.lock();
                if let Some(json) = pop(&mut queue) {
                    return Some(json);
                }
                if queue.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_recv(&mut self) -> Option<String> {
        pop(&mut self.0.queue.lock())
    }
}

impl Drop for OutboxReceiver {
    fn drop(&mut self) {
        let mut queue = self.0.queue.lock();
        queue.closed = true;
        queue.items.clear();
        queue.deltas = 0;
    }
}

fn pop(queue: &mut Queue) -> Option<String> {
    let entry = queue.items.pop_front()?;
    if entry.slot.is_none() {
        queue.deltas -= 1;
    }
    Some(entry.json)
}
