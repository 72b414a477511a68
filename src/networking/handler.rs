// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Handler fan-out (part of C3): every registered [`MessageHandler`] gets a
//! callback per message kind. Dispatch happens synchronously on the
//! listener's worker; a handler that needs to do slow work must hand it off
//! itself (e.g. to a channel) rather than block the listener.

use std::sync::{Arc, RwLock};

use crate::core::message::Envelope;

/// A registered listener for inbound wire messages, split by how the
/// message arrived.
pub trait MessageHandler: Send + Sync {
    /// An envelope received via UDP unicast/broadcast.
    fn on_broadcast(&self, envelope: &Envelope);
    /// An envelope received over a direct TCP connection.
    fn on_direct(&self, envelope: &Envelope);
    /// An envelope received via UDP multicast.
    fn on_multicast(&self, envelope: &Envelope);
}

/// A copy-on-write list of handlers: registration is rare and takes a
/// write lock that clones the current list; dispatch takes a read lock
/// and iterates a stable snapshot.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { handlers: RwLock::new(Vec::new()) }
    }

    /// Register a handler, appending to a fresh copy of the list.
    pub fn register(&self, handler: Arc<dyn MessageHandler>) {
        let mut guard = self.handlers.write().expect("handler registry lock");
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(handler);
        *guard = next;
    }

    /// Dispatch `envelope` as a broadcast message to every registered handler.
    pub fn dispatch_broadcast(&self, envelope: &Envelope) {
        for handler in self.snapshot() {
            handler.on_broadcast(envelope);
        }
    }

    /// Dispatch `envelope` as a direct message to every registered handler.
    pub fn dispatch_direct(&self, envelope: &Envelope) {
        for handler in self.snapshot() {
            handler.on_direct(envelope);
        }
    }

    /// Dispatch `envelope` as a multicast message to every registered handler.
    pub fn dispatch_multicast(&self, envelope: &Envelope) {
        for handler in self.snapshot() {
            handler.on_multicast(envelope);
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn MessageHandler>> {
        self.handlers.read().expect("handler registry lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        broadcasts: AtomicUsize,
        directs: AtomicUsize,
        multicasts: AtomicUsize,
    }

    impl MessageHandler for CountingHandler {
        fn on_broadcast(&self, _envelope: &Envelope) {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_direct(&self, _envelope: &Envelope) {
            self.directs.fetch_add(1, Ordering::SeqCst);
        }
        fn on_multicast(&self, _envelope: &Envelope) {
            self.multicasts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn envelope() -> Envelope {
        Envelope::new(MessageType::FetchNodes, "1.2.3.4", "pk", &()).unwrap()
    }

    #[test]
    fn dispatch_reaches_every_registered_handler() {
        let registry = HandlerRegistry::new();
        let handler = Arc::new(CountingHandler {
            broadcasts: AtomicUsize::new(0),
            directs: AtomicUsize::new(0),
            multicasts: AtomicUsize::new(0),
        });
        registry.register(handler.clone());

        registry.dispatch_broadcast(&envelope());
        registry.dispatch_direct(&envelope());
        registry.dispatch_multicast(&envelope());

        assert_eq!(handler.broadcasts.load(Ordering::SeqCst), 1);
        assert_eq!(handler.directs.load(Ordering::SeqCst), 1);
        assert_eq!(handler.multicasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registering_mid_iteration_does_not_affect_in_flight_snapshot() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(CountingHandler {
            broadcasts: AtomicUsize::new(0),
            directs: AtomicUsize::new(0),
            multicasts: AtomicUsize::new(0),
        });
        registry.register(first.clone());
        let snapshot = registry.snapshot();
        registry.register(Arc::new(CountingHandler {
            broadcasts: AtomicUsize::new(0),
            directs: AtomicUsize::new(0),
            multicasts: AtomicUsize::new(0),
        }));
        assert_eq!(snapshot.len(), 1);
    }
}
