//! A GDB remote serial protocol stub for the emulator.
//!
//! Only a minimal subset of the protocol is understood. Retransmission requests are detected
//! but never honored.

pub mod command;
pub mod dispatch;
pub mod packet;
pub mod server;

/// The port the stub listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5050;

/// Capacity of the inbound read buffer and the largest outbound frame.
pub const PACKET_BUFFER_SIZE: usize = 2048;

/// Sent raw (not framed) by the client when the user hits Ctrl-C.
pub const BREAK_BYTE: u8 = 0x03;
