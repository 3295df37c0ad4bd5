//! # cloud-buffer
//!
//! Bridges a text-editor host to a remote document store over HTTP. Editor
//! commands create, read, update, list and delete text documents ("cloud
//! buffers") identified by opaque ids.
//!
//! Three layers, leaves first:
//!
//! 1. [`gateway::Gateway`]: blocking REST CRUD client for one collection.
//! 2. [`adapter::HostAdapter`]: moves payloads between the host's exchange
//!    slot and the gateway.
//! 3. [`proxy::ResilientProxy`]: builds the adapter on first use and records
//!    every failure in the host's error slot before returning it.
//!
//! The host side is abstracted by [`host::Host`]. [`vim::VimChannel`] binds it
//! to a Vim job channel; [`host::MemoryHost`] keeps everything in-process.
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use cloud_buffer::adapter::BufferOperations;
//! use cloud_buffer::host::MemoryHost;
//! use cloud_buffer::proxy::host_proxy;
//!
//! let host = Rc::new(
//!     MemoryHost::new()
//!         .with_setting("vim_cloud_buffer_url", "https://api.example.com/buffers")
//!         .with_setting("vim_cloud_buffer_api_key", "secret"),
//! );
//! let mut buffers = host_proxy(Rc::clone(&host), None);
//!
//! host.set_request(serde_json::json!({"content": "Foo ñ"}));
//! let created = buffers.add()?;
//! assert_eq!(host.response(), Some(created));
//! # Ok::<(), cloud_buffer::error::CloudBufferError>(())
//! ```

pub mod adapter;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod host;
pub mod proxy;
pub mod session;
pub mod vim;

pub use adapter::{BufferOperations, HostAdapter};
pub use config::GatewayConfig;
pub use error::{CloudBufferError, Result};
pub use gateway::Gateway;
pub use host::{Host, MemoryHost};
pub use proxy::ResilientProxy;
