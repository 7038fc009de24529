// SPDX-License-Identifier: MIT OR Apache-2.0
//! Explicit per-component change subscriptions.

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    channel: u32,
    index: u64,
}

/// Callback invoked with each emitted event
pub type Callback<E> = Box<dyn FnMut(&E)>;

/// A list of subscribers for one event type
pub struct Subscribers<E> {
    callbacks: Vec<(SubscriptionId, Callback<E>)>,
    /// Distinguishes IDs handed out by different lists of one owner
    channel: u32,
    next_index: u64,
}

impl<E> Subscribers<E> {
    /// Create an empty subscriber list
    pub fn new() -> Self {
        Self::on_channel(0)
    }

    /// Create an empty list whose IDs never match those of other channels
    pub fn on_channel(channel: u32) -> Self {
        Self {
            callbacks: Vec::new(),
            channel,
            next_index: 1,
        }
    }

    /// Register a callback
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId {
            channel: self.channel,
            index: self.next_index,
        };
        self.next_index += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        before != self.callbacks.len()
    }

    /// Call every subscriber in registration order
    pub fn emit(&mut self, event: &E) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether there are no subscribers
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Drop every subscriber
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("channel", &self.channel)
            .field("count", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut subscribers = Subscribers::<u32>::new();

        let sink = Rc::clone(&seen);
        let id = subscribers.subscribe(move |value| sink.borrow_mut().push(*value));
        subscribers.emit(&1);
        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.emit(&2);

        assert_eq!(*seen.borrow(), vec![1]);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_channels_do_not_share_ids() {
        let mut first = Subscribers::<u32>::on_channel(0);
        let mut second = Subscribers::<u32>::on_channel(1);
        let a = first.subscribe(|_| {});
        let b = second.subscribe(|_| {});
        assert_ne!(a, b);
        assert!(!second.unsubscribe(a));
        assert_eq!(second.len(), 1);
        assert!(first.unsubscribe(a));
    }
}
