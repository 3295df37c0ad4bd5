//! # Vim channel binding
//!
//! Runs the crate as a Vim job in `json` channel mode. Vim writes one JSON
//! message per line on our stdin; we answer on stdout.
//!
//! ## Messages from Vim
//! - `[<id>, <payload>]` with a positive id: a host command, answered with
//!   [`VimChannel::reply`].
//! - `[<id>, <value>]` with a negative id: the result of an `expr` request we
//!   sent. Vim answers `"ERROR"` when the expression fails.
//!
//! ## Messages to Vim
//! - `["expr", <expression>, <negative id>]`: evaluate and reply.
//! - `["ex", <command>]`: run an Ex command, no reply.
//!
//! The exchange slot is `g:vim_cloud_buffer_data`, the error slot
//! `v:errmsg`, and settings are `g:` variables.
//!
//! Incoming bytes are decoded lossily as UTF-8: text from a host running in
//! another encoding is re-labelled, with invalid sequences replaced rather
//! than rejected.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{CloudBufferError, Result};
use crate::host::Host;

pub const EXCHANGE_VAR: &str = "g:vim_cloud_buffer_data";
pub const ERROR_VAR: &str = "v:errmsg";

/// Vim's reply to an `expr` that could not be evaluated.
const EXPR_ERROR: &str = "ERROR";

struct ChannelState<R, W> {
    reader: R,
    writer: W,
    last_expr_id: i64,
    queued: VecDeque<(i64, Value)>,
}

/// One end of a Vim JSON channel; implements [`Host`] on top of it.
pub struct VimChannel<R, W> {
    state: RefCell<ChannelState<R, W>>,
}

impl<R: BufRead, W: Write> VimChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            state: RefCell::new(ChannelState {
                reader,
                writer,
                last_expr_id: 0,
                queued: VecDeque::new(),
            }),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        let state = self.state.into_inner();
        (state.reader, state.writer)
    }

    /// Next host command, or `None` once Vim closes the channel.
    ///
    /// Commands that arrived while an `expr` reply was pending are served
    /// first, in arrival order.
    pub fn next_request(&self) -> Result<Option<(i64, Value)>> {
        let mut state = self.state.borrow_mut();
        if let Some(queued) = state.queued.pop_front() {
            return Ok(Some(queued));
        }
        while let Some((id, payload)) = state.read_message()? {
            if id > 0 {
                return Ok(Some((id, payload)));
            }
            warn!(id, "dropping reply to an expression nobody is waiting for");
        }
        Ok(None)
    }

    /// Answer host command `id`.
    pub fn reply(&self, id: i64, payload: &Value) -> Result<()> {
        self.state.borrow_mut().send(&json!([id, payload]))
    }

    /// Run an Ex command in Vim.
    pub fn ex(&self, command: &str) -> Result<()> {
        self.state.borrow_mut().send(&json!(["ex", command]))
    }

    /// Evaluate `expression` in Vim and wait for the result.
    pub fn expr(&self, expression: &str) -> Result<Value> {
        let mut state = self.state.borrow_mut();
        state.last_expr_id -= 1;
        let expr_id = state.last_expr_id;
        state.send(&json!(["expr", expression, expr_id]))?;

        loop {
            match state.read_message()? {
                Some((id, value)) if id == expr_id => {
                    if value.as_str() == Some(EXPR_ERROR) {
                        return Err(CloudBufferError::host(format!(
                            "Vim could not evaluate {expression}"
                        )));
                    }
                    return Ok(value);
                }
                Some((id, payload)) if id > 0 => state.queued.push_back((id, payload)),
                Some((id, _)) => warn!(id, expr_id, "dropping out-of-order expression reply"),
                None => {
                    return Err(CloudBufferError::host(format!(
                        "channel closed while waiting for {expression}"
                    )))
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> ChannelState<R, W> {
    fn send(&mut self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_vec(message).map_err(CloudBufferError::host)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .and_then(|()| self.writer.flush())
            .map_err(CloudBufferError::host)
    }

    /// Next well-formed `[id, value]` message; `None` at end of input.
    fn read_message(&mut self) -> Result<Option<(i64, Value)>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut buf)
                .map_err(CloudBufferError::host)?;
            if n == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_message(line) {
                Some(message) => {
                    debug!(id = message.0, "vim message");
                    return Ok(Some(message));
                }
                None => warn!(line, "ignoring malformed channel message"),
            }
        }
    }
}

fn parse_message(line: &str) -> Option<(i64, Value)> {
    match serde_json::from_str::<Value>(line).ok()? {
        Value::Array(mut items) if items.len() == 2 => {
            let payload = items.pop()?;
            let id = items.pop()?.as_i64()?;
            Some((id, payload))
        }
        _ => None,
    }
}

impl<R: BufRead, W: Write> Host for VimChannel<R, W> {
    fn read_exchange(&self) -> Result<Value> {
        self.expr(&format!("get(g:, '{}', v:null)", global_name(EXCHANGE_VAR)))
    }

    fn clear_exchange(&self) -> Result<()> {
        self.ex(&format!("unlet! {EXCHANGE_VAR}"))
    }

    fn write_exchange(&self, payload: &str) -> Result<()> {
        self.ex(&format!("let {EXCHANGE_VAR} = {}", vim_string_literal(payload)))
    }

    fn write_error(&self, message: &str) -> Result<()> {
        self.ex(&format!("let {ERROR_VAR} = {}", vim_string_literal(message)))
    }

    fn setting(&self, name: &str) -> Result<Option<String>> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CloudBufferError::host(format!(
                "{name:?} is not a Vim variable name"
            )));
        }
        match self.expr(&format!("get(g:, '{name}', v:null)"))? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }
}

fn global_name(var: &str) -> &str {
    var.strip_prefix("g:").unwrap_or(var)
}

/// Quote `s` as a double-quoted Vim string literal.
pub fn vim_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
