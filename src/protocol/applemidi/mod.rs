//! `AppleMIDI` session control commands
//!
//! Every command starts with `0xFFFF` followed by a two-letter code:
//!
//! ```text
//! IN / OK / NO / BY : FFFF code | version | token | ssrc | [name\0]
//! CK                : FFFF "CK" | ssrc | count<<24 | ts1 (64) | ts2 (64) | ts3 (64)
//! RS                : FFFF "RS" | ssrc | seq (16) pad (16)
//! RL                : FFFF "RL" | ssrc | limit
//! ```

mod command;


pub use command::{
    COMMAND_SIGNATURE, CommandCode, ControlCommand, ControlDecodeError, MAX_NAME_LEN,
    PROTOCOL_VERSION, SessionExchange, Synchronization, bounded_name,
};
