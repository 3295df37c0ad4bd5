//! # Host adapter
//!
//! Translates between the host's exchange slot and the [`Gateway`]'s
//! argument shapes. Request payloads are read from the slot and prepared for
//! the wire; raw response bodies are published back into it.
//!
//! The slot is only touched after the HTTP call succeeds, so a failed
//! operation leaves the host's request payload exactly as it was.

use serde_json::{Map, Value};

use crate::error::{CloudBufferError, Result};
use crate::gateway::Gateway;
use crate::host::Host;

/// Sub-keys whose values travel as JSON text inside the flat query map
/// (query, fields, sort).
pub const JSON_ENCODED_PARAMS: [&str; 3] = ["q", "f", "s"];

/// The operation set shared by [`HostAdapter`] and
/// [`ResilientProxy`](crate::proxy::ResilientProxy).
///
/// Request payloads come from the host's exchange slot, so only id-scoped
/// operations take an argument. Every successful call returns the raw
/// response body it also published to the host.
pub trait BufferOperations {
    fn add(&mut self) -> Result<String>;
    fn update(&mut self, id: &str) -> Result<String>;
    fn get(&mut self, id: &str) -> Result<String>;
    fn list(&mut self) -> Result<String>;
    fn remove(&mut self, id: &str) -> Result<String>;
    fn find(&mut self) -> Result<String>;
}

/// Owns one [`Gateway`] and drives it from a [`Host`].
#[derive(Debug)]
pub struct HostAdapter<H> {
    gateway: Gateway,
    host: H,
}

impl<H: Host> HostAdapter<H> {
    pub fn new(gateway: Gateway, host: H) -> Self {
        Self { gateway, host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Read the exchange slot and prepare it for the wire.
    ///
    /// An unset slot reads as an empty mapping; anything else that is not a
    /// mapping is rejected.
    pub fn read_pending_request(&self) -> Result<Map<String, Value>> {
        match self.host.read_exchange()? {
            Value::Null => Ok(Map::new()),
            Value::Object(data) => Ok(encode_pending_request(data)),
            other => Err(CloudBufferError::InvalidRequest {
                detail: format!("exchange slot holds {}, expected a mapping", kind_of(&other)),
            }),
        }
    }

    /// Clear the exchange slot, then store `response` in it unparsed.
    pub fn publish_response(&self, response: String) -> Result<String> {
        self.host.clear_exchange()?;
        self.host.write_exchange(&response)?;
        Ok(response)
    }
}

impl<H: Host> BufferOperations for HostAdapter<H> {
    fn add(&mut self) -> Result<String> {
        let data = Value::Object(self.read_pending_request()?);
        let response = self.gateway.add(&data)?;
        self.publish_response(response)
    }

    fn update(&mut self, id: &str) -> Result<String> {
        let data = Value::Object(self.read_pending_request()?);
        let response = self.gateway.update(id, &data)?;
        self.publish_response(response)
    }

    fn get(&mut self, id: &str) -> Result<String> {
        let response = self.gateway.get(id)?;
        self.publish_response(response)
    }

    fn list(&mut self) -> Result<String> {
        let filter = self.read_pending_request()?;
        let response = self.gateway.list(&filter)?;
        self.publish_response(response)
    }

    fn remove(&mut self, id: &str) -> Result<String> {
        let response = self.gateway.remove(id)?;
        self.publish_response(response)
    }

    fn find(&mut self) -> Result<String> {
        Err(CloudBufferError::UnsupportedOperation { operation: "find" })
    }
}

/// Prepare a host request payload for the gateway.
///
/// `content` needs no re-labelling: a `serde_json` string is UTF-8 by
/// construction, and the host binding has already decoded the bytes it
/// received (lossily, see [`crate::vim`]). Each present `q`, `f` and `s`
/// value is replaced by its JSON text so it survives the flat query map as
/// a single string.
pub fn encode_pending_request(mut data: Map<String, Value>) -> Map<String, Value> {
    for key in JSON_ENCODED_PARAMS {
        if let Some(value) = data.get_mut(key) {
            if !value.is_null() {
                *value = Value::String(value.to_string());
            }
        }
    }
    data
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
