//! # Host transport
//!
//! The editor host exposes two global cells to this crate:
//!
//! - the **exchange slot**, written by the host with a request payload before
//!   a command runs and overwritten with the raw response body afterwards;
//! - the **error slot**, overwritten with the latest human-readable failure.
//!
//! It also answers configuration lookups by variable name. [`Host`] models
//! those interactions so the adapter and proxy can be driven by the real Vim
//! channel ([`crate::vim::VimChannel`]) or by [`MemoryHost`].

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::error::{CloudBufferError, Result};

/// Access to the editor host's exchange slot, error slot and settings.
///
/// Methods take `&self`: one binding is shared between the adapter (exchange
/// slot) and the proxy (error slot), so implementations keep their own
/// interior mutability.
pub trait Host {
    /// Current content of the exchange slot. An unset slot reads as `Null`.
    fn read_exchange(&self) -> Result<Value>;

    /// Remove whatever the exchange slot holds.
    fn clear_exchange(&self) -> Result<()>;

    /// Store a raw response body in the exchange slot, unparsed.
    fn write_exchange(&self, payload: &str) -> Result<()>;

    /// Overwrite the error slot.
    fn write_error(&self, message: &str) -> Result<()>;

    /// Look up a host configuration variable (e.g. `vim_cloud_buffer_url`).
    fn setting(&self, name: &str) -> Result<Option<String>>;
}

impl<H: Host + ?Sized> Host for &H {
    fn read_exchange(&self) -> Result<Value> {
        (**self).read_exchange()
    }
    fn clear_exchange(&self) -> Result<()> {
        (**self).clear_exchange()
    }
    fn write_exchange(&self, payload: &str) -> Result<()> {
        (**self).write_exchange(payload)
    }
    fn write_error(&self, message: &str) -> Result<()> {
        (**self).write_error(message)
    }
    fn setting(&self, name: &str) -> Result<Option<String>> {
        (**self).setting(name)
    }
}

impl<H: Host + ?Sized> Host for Rc<H> {
    fn read_exchange(&self) -> Result<Value> {
        (**self).read_exchange()
    }
    fn clear_exchange(&self) -> Result<()> {
        (**self).clear_exchange()
    }
    fn write_exchange(&self, payload: &str) -> Result<()> {
        (**self).write_exchange(payload)
    }
    fn write_error(&self, message: &str) -> Result<()> {
        (**self).write_error(message)
    }
    fn setting(&self, name: &str) -> Result<Option<String>> {
        (**self).setting(name)
    }
}

impl<H: Host + ?Sized> Host for Arc<H> {
    fn read_exchange(&self) -> Result<Value> {
        (**self).read_exchange()
    }
    fn clear_exchange(&self) -> Result<()> {
        (**self).clear_exchange()
    }
    fn write_exchange(&self, payload: &str) -> Result<()> {
        (**self).write_exchange(payload)
    }
    fn write_error(&self, message: &str) -> Result<()> {
        (**self).write_error(message)
    }
    fn setting(&self, name: &str) -> Result<Option<String>> {
        (**self).setting(name)
    }
}

// ---------------------------------------------------------------------------
// MemoryHost
// ---------------------------------------------------------------------------

/// What the exchange slot currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    Empty,
    /// A request payload placed by the host.
    Request(Value),
    /// A raw response body placed by the adapter.
    Response(String),
}

#[derive(Debug)]
struct Slots {
    exchange: Exchange,
    error: Option<String>,
    settings: HashMap<String, String>,
}

/// In-process host: both slots and the settings table live in memory.
///
/// Used when embedding the client without an editor and as the host in tests.
#[derive(Debug)]
pub struct MemoryHost {
    slots: Mutex<Slots>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                exchange: Exchange::Empty,
                error: None,
                settings: HashMap::new(),
            }),
        }
    }

    /// Builder-style setting registration.
    pub fn with_setting(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.lock().settings.insert(name.into(), value.into());
        self
    }

    /// Place a request payload in the exchange slot, as the host does before a command.
    pub fn set_request(&self, payload: Value) {
        self.lock().exchange = Exchange::Request(payload);
    }

    pub fn exchange(&self) -> Exchange {
        self.lock().exchange.clone()
    }

    /// The raw response body, if the slot holds one.
    pub fn response(&self) -> Option<String> {
        match &self.lock().exchange {
            Exchange::Response(body) => Some(body.clone()),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // A poisoned lock only means a test thread panicked mid-write; the
        // slots themselves are always in a consistent state.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Host for MemoryHost {
    fn read_exchange(&self) -> Result<Value> {
        match &self.lock().exchange {
            Exchange::Empty => Ok(Value::Null),
            Exchange::Request(payload) => Ok(payload.clone()),
            Exchange::Response(body) => Ok(Value::String(body.clone())),
        }
    }

    fn clear_exchange(&self) -> Result<()> {
        self.lock().exchange = Exchange::Empty;
        Ok(())
    }

    fn write_exchange(&self, payload: &str) -> Result<()> {
        let mut slots = self.lock();
        if slots.exchange != Exchange::Empty {
            return Err(CloudBufferError::host(
                "exchange slot must be cleared before it is written",
            ));
        }
        slots.exchange = Exchange::Response(payload.to_string());
        Ok(())
    }

    fn write_error(&self, message: &str) -> Result<()> {
        self.lock().error = Some(message.to_string());
        Ok(())
    }

    fn setting(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock().settings.get(name).cloned())
    }
}
