use nom::{
    character::complete::{char, hex_digit1},
    combinator::map_res,
    sequence::{preceded, separated_pair},
    IResult,
};
use thiserror::Error;

/// A request from the client, parsed out of a frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `qSupported`
    QuerySupported,
    /// `Z0,addr,kind`
    InsertBreakpoint { addr: u32, kind: u32 },
    /// `z0,addr,kind`
    RemoveBreakpoint { addr: u32, kind: u32 },
    /// `?`
    StopReason,
    /// `g`
    ReadRegisters,
    /// `s`
    Step,
    /// `c`
    Continue,
    /// `maddr,len`
    ReadMemory { addr: u32, len: u32 },
    /// Anything we don't implement. Answered with the empty reply.
    Unknown,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("malformed `{kind}` packet: {payload:?}")]
    Malformed { kind: &'static str, payload: String },
}

fn hex_u32(inp: &str) -> IResult<&str, u32> {
    map_res(hex_digit1, |digits: &str| u32::from_str_radix(digits, 16))(inp)
}

/// `<hex>,<hex>`
fn hex_pair(inp: &str) -> IResult<&str, (u32, u32)> {
    separated_pair(hex_u32, char(','), hex_u32)(inp)
}

/// `,<addr>,<kind>` following `Z0`/`z0`. Anything after the kind (conditions) is ignored.
fn breakpoint_args(inp: &str) -> IResult<&str, (u32, u32)> {
    preceded(char(','), hex_pair)(inp)
}

impl Command {
    /// Parses a frame payload.
    ///
    /// # Errors
    ///
    /// This function will return an error if a `Z0`, `z0` or `m` packet is missing its arguments
    /// or their separators.
    pub fn parse(payload: &[u8]) -> Result<Self, CommandError> {
        let Ok(payload) = std::str::from_utf8(payload) else {
            return Ok(Self::Unknown);
        };
        let malformed = |kind: &'static str| CommandError::Malformed {
            kind,
            payload: payload.to_string(),
        };

        if payload.starts_with("qSupported") {
            return Ok(Self::QuerySupported);
        }
        if let Some(args) = payload.strip_prefix("Z0") {
            let (_, (addr, kind)) = breakpoint_args(args).map_err(|_| malformed("Z0"))?;
            return Ok(Self::InsertBreakpoint { addr, kind });
        }
        if let Some(args) = payload.strip_prefix("z0") {
            let (_, (addr, kind)) = breakpoint_args(args).map_err(|_| malformed("z0"))?;
            return Ok(Self::RemoveBreakpoint { addr, kind });
        }

        let cmd = match payload.as_bytes().first() {
            Some(b'?') => Self::StopReason,
            Some(b'g') => Self::ReadRegisters,
            Some(b's') => Self::Step,
            Some(b'c') => Self::Continue,
            Some(b'm') => {
                let (_, (addr, len)) = hex_pair(&payload[1..]).map_err(|_| malformed("m"))?;
                Self::ReadMemory { addr, len }
            }
            _ => Self::Unknown,
        };
        Ok(cmd)
    }
}
