use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::error::DispatchError;
use crate::osc::Message;
use crate::shared::Shared;

/// Callback invoked with each matching inbound message, on the receive thread.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Exact-address handler table plus an optional catch-all.
///
/// Handlers are cloned out of the lock before being called, so a handler may register or remove
/// handlers (its own included) without deadlocking.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_address: Shared<HashMap<String, Handler>>,
    catch_all: Shared<Option<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for exactly `address`, replacing any previous one.
    ///
    /// Returns true if a handler was replaced. Replacing is logged as a warning.
    pub fn register<F>(&self, address: &str, handler: F) -> bool
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let previous = self
            .by_address
            .with_mut(|map| map.insert(address.to_string(), Arc::new(handler)));
        if previous.is_some() {
            warn!("replaced existing handler for {}", address);
        }
        previous.is_some()
    }

    /// Like [`register`](Self::register) but refuses to replace an existing handler.
    pub fn try_register<F>(&self, address: &str, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.by_address.with_mut(|map| {
            if map.contains_key(address) {
                return Err(DispatchError::DuplicateHandlerAddress(address.to_string()));
            }
            map.insert(address.to_string(), Arc::new(handler));
            Ok(())
        })
    }

    /// Returns true if a handler was registered for `address`.
    pub fn unregister(&self, address: &str) -> bool {
        self.by_address
            .with_mut(|map| map.remove(address))
            .is_some()
    }

    pub fn set_catch_all<F>(&self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let previous = self
            .catch_all
            .with_mut(|slot| slot.replace(Arc::new(handler)));
        if previous.is_some() {
            warn!("replaced existing catch-all handler");
        }
    }

    pub fn clear_catch_all(&self) {
        self.catch_all.with_mut(|slot| *slot = None);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.by_address.with(|map| map.contains_key(address))
    }

    pub fn len(&self) -> usize {
        self.by_address.with(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the catch-all, then the handler registered for exactly `msg.address`.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, msg: &Message) -> usize {
        let catch_all = self.catch_all.with(|slot| slot.clone());
        let handler = self.by_address.with(|map| map.get(&msg.address).cloned());

        let mut invoked = 0;
        if let Some(catch_all) = catch_all {
            catch_all(msg);
            invoked += 1;
        }
        if let Some(handler) = handler {
            handler(msg);
            invoked += 1;
        }
        invoked
    }
}
