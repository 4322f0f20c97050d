//! Routes client input to the debugger and builds the replies.

use crate::{
    emu::{debugger::Debugger, EmuError},
    plat::Engine,
};

use super::{
    command::Command,
    packet::{self, Packet},
};

/// Acknowledges every delimited frame.
pub const ACK: &[u8] = b"+";

/// What we tell the client it can expect as a stop reason.
pub const SUPPORTED_FEATURES: &str = "swbreak+;hwbreak+";

/// Stopped with SIGTRAP.
pub const STOP_REPLY: &str = "S05";

/// The program exited with status 0.
pub const EXIT_REPLY: &str = "W00";

const ERROR_TABLE_FULL: &str = "E 01";

fn hex(bytes: impl IntoIterator<Item = u8>) -> String {
    bytes.into_iter().map(|b| format!("{:02x}", b)).collect()
}

/// Frames a reply payload, logging and dropping it if it doesn't fit in a packet.
pub fn frame(payload: &str) -> Option<Vec<u8>> {
    match packet::encode(payload.as_bytes()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            log::error!("not sending reply: {}", e);
            None
        }
    }
}

/// Runs a parsed command and returns the reply payload, or `None` if nothing should be sent.
///
/// # Errors
///
/// Returns [`EmuError::Finished`] if stepping ended the program.
pub fn execute<E: Engine>(dbg: &mut Debugger<E>, cmd: Command) -> Result<Option<String>, EmuError> {
    log::debug!("executing {:?}", cmd);
    let reply = match cmd {
        Command::QuerySupported => SUPPORTED_FEATURES.to_string(),
        Command::InsertBreakpoint { addr, kind } => {
            log::debug!("set breakpoint at {:08X} (kind {})", addr, kind);
            if dbg.set_breakpoint(addr) {
                "OK".to_string()
            } else {
                log::warn!("breakpoint table full, rejecting {:08X}", addr);
                ERROR_TABLE_FULL.to_string()
            }
        }
        Command::RemoveBreakpoint { addr, kind } => {
            log::debug!("clear breakpoint at {:08X} (kind {})", addr, kind);
            dbg.clear_breakpoint(addr);
            "OK".to_string()
        }
        Command::StopReason => STOP_REPLY.to_string(),
        Command::ReadRegisters => hex(dbg.registers().iter().flat_map(|r| r.to_le_bytes())),
        Command::Step => {
            dbg.step()?;
            STOP_REPLY.to_string()
        }
        Command::Continue => {
            dbg.resume();
            "OK".to_string()
        }
        Command::ReadMemory { addr, len } => {
            if !packet::fits(len as usize * 2) {
                log::error!(
                    "not sending reply: {} bytes from {:08X} won't fit in a packet",
                    len,
                    addr
                );
                return Ok(None);
            }
            let mut buf = vec![0u8; len as usize];
            dbg.read_memory(addr, &mut buf);
            hex(buf)
        }
        Command::Unknown => String::new(),
    };
    Ok(Some(reply))
}

/// Handles one read's worth of client input.
///
/// Returns everything that should be written back, in order: the `+` acknowledgment for a
/// delimited frame, followed by its framed reply. Malformed input is logged and produces no reply.
///
/// # Errors
///
/// Returns [`EmuError::Finished`] if stepping ended the program.
pub fn handle_input<E: Engine>(
    dbg: &mut Debugger<E>,
    raw: &[u8],
) -> Result<Vec<Vec<u8>>, EmuError> {
    let mut out = Vec::new();
    let payload = match packet::decode(raw) {
        Ok(Packet::Empty) => return Ok(out),
        Ok(Packet::Retransmit) => {
            log::warn!("client asked for a retransmission, which isn't implemented");
            return Ok(out);
        }
        Ok(Packet::Break) => {
            let reply = if dbg.halt() { STOP_REPLY } else { "OK" };
            out.extend(frame(reply));
            return Ok(out);
        }
        Ok(Packet::Frame(payload)) => payload,
        Err(e) => {
            log::warn!("dropping input: {} ({:?})", e, String::from_utf8_lossy(raw));
            return Ok(out);
        }
    };

    out.push(ACK.to_vec());

    match Command::parse(payload) {
        Ok(cmd) => {
            if let Some(reply) = execute(dbg, cmd)? {
                out.extend(frame(&reply));
            }
        }
        Err(e) => log::warn!("dropping packet: {}", e),
    }
    Ok(out)
}
