//! Protocol module

#![allow(missing_docs)]

pub mod applemidi;
pub mod cursor;
pub mod rtp_midi;
