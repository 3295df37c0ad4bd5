//! # Resilient proxy
//!
//! ## Responsibility
//! Defers building the real [`BufferOperations`] implementation until the
//! first command, then forwards every call to that one cached instance.
//! Failures are copied into the host's error slot before they propagate.
//!
//! ## Guarantees
//! - At most one successful construction per proxy: once the adapter is
//!   built it serves every later call, including calls that fail.
//! - A failed construction caches nothing; the next call tries again.
//! - Never swallows a failure: the caller always receives the original error.
//! - The recorded message is [`CloudBufferError::host_message`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::adapter::{BufferOperations, HostAdapter};
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::host::Host;

/// Lazily-built forwarding wrapper around a [`BufferOperations`] value.
///
/// `loader` runs on the first call; `host` receives failure messages.
pub struct ResilientProxy<A, F, H> {
    loader: F,
    inner: Option<A>,
    host: H,
}

impl<A, F, H> ResilientProxy<A, F, H>
where
    A: BufferOperations,
    F: FnMut() -> Result<A>,
    H: Host,
{
    pub fn new(host: H, loader: F) -> Self {
        Self {
            loader,
            inner: None,
            host,
        }
    }

    /// Whether the wrapped value has been built.
    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// The wrapped value, once built.
    pub fn inner(&self) -> Option<&A> {
        self.inner.as_ref()
    }

    fn call<T>(&mut self, op: &'static str, f: impl FnOnce(&mut A) -> Result<T>) -> Result<T> {
        let result = self.ensure_loaded().and_then(f);
        if let Err(err) = &result {
            let message = err.host_message();
            warn!(operation = op, error = %err, "cloud-buffer operation failed");
            if let Err(record_err) = self.host.write_error(&message) {
                warn!(error = %record_err, "could not record failure in host error slot");
            }
        }
        result
    }

    fn ensure_loaded(&mut self) -> Result<&mut A> {
        let inner = match self.inner.take() {
            Some(inner) => inner,
            None => {
                debug!("building cloud-buffer adapter");
                (self.loader)()?
            }
        };
        Ok(self.inner.insert(inner))
    }
}

impl<A, F, H> BufferOperations for ResilientProxy<A, F, H>
where
    A: BufferOperations,
    F: FnMut() -> Result<A>,
    H: Host,
{
    fn add(&mut self) -> Result<String> {
        self.call("add", |a| a.add())
    }

    fn update(&mut self, id: &str) -> Result<String> {
        self.call("update", |a| a.update(id))
    }

    fn get(&mut self, id: &str) -> Result<String> {
        self.call("get", |a| a.get(id))
    }

    fn list(&mut self) -> Result<String> {
        self.call("list", |a| a.list())
    }

    fn remove(&mut self, id: &str) -> Result<String> {
        self.call("remove", |a| a.remove(id))
    }

    fn find(&mut self) -> Result<String> {
        self.call("find", |a| a.find())
    }
}

/// A proxy whose loader resolves configuration (environment first, then
/// `host`) and builds a [`HostAdapter`] over a clone of `host`.
///
/// `timeout_override`, when set, replaces whatever timeout was resolved.
pub fn host_proxy<H>(
    host: H,
    timeout_override: Option<Option<Duration>>,
) -> ResilientProxy<HostAdapter<H>, impl FnMut() -> Result<HostAdapter<H>>, H>
where
    H: Host + Clone,
{
    host_proxy_with(|name: &str| std::env::var(name).ok(), host, timeout_override)
}

/// [`host_proxy`] with `env` standing in for the process environment.
pub fn host_proxy_with<E, H>(
    env: E,
    host: H,
    timeout_override: Option<Option<Duration>>,
) -> ResilientProxy<HostAdapter<H>, impl FnMut() -> Result<HostAdapter<H>>, H>
where
    E: Fn(&str) -> Option<String>,
    H: Host + Clone,
{
    let adapter_host = host.clone();
    ResilientProxy::new(host, move || -> Result<HostAdapter<H>> {
        let mut config = GatewayConfig::resolve_with(&env, &adapter_host)?;
        if let Some(timeout) = timeout_override {
            config.timeout = timeout;
        }
        let gateway = Gateway::new(&config)?;
        Ok(HostAdapter::new(gateway, adapter_host.clone()))
    })
}
