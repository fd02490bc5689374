//! Action enum: user intents produced by key handling.

use radio_proto::protocol::Command;

/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Forward to the session queue.
    SendCommand(Command),
    OpenFilter,
    CloseFilter,
    Quit,
}
