//! Keyed listener lists.

use std::{collections::HashMap, hash::Hash};

pub type ListenerId = u64;

struct Listener<A> {
    id: ListenerId,
    once: bool,
    callback: Box<dyn FnMut(&A)>,
}

/// Calls every listener registered for a key, in registration order.
pub struct EventEmitter<K, A = ()> {
    listeners: HashMap<K, Vec<Listener<A>>>,
    next_id: ListenerId,
}

impl<K: Eq + Hash, A> Default for EventEmitter<K, A> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<K: Eq + Hash, A> EventEmitter<K, A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, key: K, callback: impl FnMut(&A) + 'static) -> ListenerId {
        self.add(key, callback, false)
    }

    /// Like [`on`](Self::on), but the listener is dropped after it fires.
    pub fn once(&mut self, key: K, callback: impl FnMut(&A) + 'static) -> ListenerId {
        self.add(key, callback, true)
    }

    fn add(&mut self, key: K, callback: impl FnMut(&A) + 'static, once: bool) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.entry(key).or_default().push(Listener {
            id,
            once,
            callback: Box::new(callback),
        });
        id
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn off(&mut self, key: &K, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    pub fn emit(&mut self, key: &K, args: &A) {
        let Some(list) = self.listeners.get_mut(key) else {
            return;
        };
        for listener in list.iter_mut() {
            (listener.callback)(args);
        }
        list.retain(|l| !l.once);
        if list.is_empty() {
            self.listeners.remove(key);
        }
    }

    pub fn listener_count(&self, key: &K) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn once_listeners_fire_a_single_time() {
        let hits = Rc::new(RefCell::new(0));
        let mut emitter: EventEmitter<&str, u32> = EventEmitter::new();
        let counter = hits.clone();
        emitter.once("step", move |n| *counter.borrow_mut() += n);
        emitter.emit(&"step", &2);
        emitter.emit(&"step", &2);
        assert_eq!(*hits.borrow(), 2);
        assert_eq!(emitter.listener_count(&"step"), 0);
    }

    #[test]
    fn off_removes_only_that_listener() {
        let mut emitter: EventEmitter<u8> = EventEmitter::new();
        let a = emitter.on(1, |_| {});
        emitter.on(1, |_| {});
        assert!(emitter.off(&1, a));
        assert!(!emitter.off(&1, a));
        assert_eq!(emitter.listener_count(&1), 1);
    }
}
