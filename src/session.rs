//! Host command decoding and the request/reply loop.

use std::io::{BufRead, Write};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapter::BufferOperations;
use crate::error::{CloudBufferError, Result};
use crate::vim::VimChannel;

/// One host command, decoded from `{"op": "...", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    Add,
    Update { id: String },
    Get { id: String },
    List,
    Remove { id: String },
    Find,
}

impl Command {
    /// Decode a command; id-scoped commands must name a document.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let command: Command =
            serde_json::from_value(payload).map_err(|e| CloudBufferError::InvalidRequest {
                detail: e.to_string(),
            })?;
        if command.id().is_some_and(str::is_empty) {
            // An empty id would address the collection URL itself.
            return Err(CloudBufferError::InvalidRequest {
                detail: format!("{} needs a non-empty id", command.name()),
            });
        }
        Ok(command)
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Command::Update { id } | Command::Get { id } | Command::Remove { id } => Some(id),
            Command::Add | Command::List | Command::Find => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Add => "add",
            Command::Update { .. } => "update",
            Command::Get { .. } => "get",
            Command::List => "list",
            Command::Remove { .. } => "remove",
            Command::Find => "find",
        }
    }
}

/// Run `command` against `ops`.
pub fn dispatch<O: BufferOperations + ?Sized>(ops: &mut O, command: &Command) -> Result<String> {
    match command {
        Command::Add => ops.add(),
        Command::Update { id } => ops.update(id),
        Command::Get { id } => ops.get(id),
        Command::List => ops.list(),
        Command::Remove { id } => ops.remove(id),
        Command::Find => ops.find(),
    }
}

/// Reply sent back for a handled command.
///
/// The response body itself travels through the exchange slot, so the
/// reply only says whether the command worked.
pub fn reply_for(outcome: &Result<String>) -> Value {
    match outcome {
        Ok(_) => json!({"ok": true}),
        Err(e) => json!({"ok": false, "error": e.host_message()}),
    }
}

/// Serve host commands until Vim closes the channel.
///
/// A failed command is reported in its reply and the loop carries on; only
/// channel I/O failures end the session early. Returns the number of
/// commands handled.
pub fn serve<R, W, O>(channel: &VimChannel<R, W>, ops: &mut O) -> Result<usize>
where
    R: BufRead,
    W: Write,
    O: BufferOperations + ?Sized,
{
    let mut handled = 0;
    while let Some((id, payload)) = channel.next_request()? {
        let outcome = Command::from_payload(payload).and_then(|command| {
            info!(id, op = command.name(), "cloud-buffer command");
            dispatch(ops, &command)
        });
        if let Err(CloudBufferError::InvalidRequest { detail }) = &outcome {
            warn!(id, %detail, "rejected host command");
        }
        channel.reply(id, &reply_for(&outcome))?;
        handled += 1;
    }
    Ok(handled)
}
