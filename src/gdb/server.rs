//! The TCP side of the stub: accepts one client at a time and multiplexes its requests with
//! continuous-run bursts on a single task.

use std::{
    io::{self, ErrorKind},
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

use anyhow::{Context, Result};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};

use crate::{
    emu::{debugger::Debugger, EmuError},
    plat::Engine,
};

use super::{
    dispatch::{self, EXIT_REPLY, STOP_REPLY},
    DEFAULT_PORT, PACKET_BUFFER_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Steps taken per scheduling turn while continuing.
    pub continue_burst: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            continue_burst: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    Finished,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until [`serve`][Self::serve].
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.bind, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind GDB stub to {}", addr))?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves clients one after another until the program finishes.
    ///
    /// A client that disconnects stops any run it left going, and the next client picks up the
    /// core where it was left.
    pub async fn serve<E: Engine>(&self, dbg: &mut Debugger<E>) -> Result<()> {
        loop {
            log::info!("Waiting for debugger on {}", self.local_addr()?);
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("Failed to accept debugger connection")?;
            if let Err(e) = stream.set_nodelay(true) {
                log::warn!("Couldn't disable Nagle on {}: {}", peer, e);
            }
            log::info!("Debugger connected from {}", peer);

            match self.session(stream, dbg).await? {
                SessionEnd::Disconnected => {
                    log::info!("Debugger {} disconnected", peer);
                    dbg.halt();
                }
                SessionEnd::Finished => {
                    log::info!("Program finished, closing GDB stub");
                    return Ok(());
                }
            }
        }
    }

    async fn session<E: Engine>(
        &self,
        mut stream: TcpStream,
        dbg: &mut Debugger<E>,
    ) -> Result<SessionEnd> {
        let mut buf = [0u8; PACKET_BUFFER_SIZE];
        loop {
            if dbg.is_running() {
                match dbg.step_bounded(self.config.continue_burst) {
                    Ok(true) => {
                        if let Err(e) = send(&mut stream, STOP_REPLY).await {
                            return Ok(hung_up(e));
                        }
                    }
                    Ok(false) => {}
                    Err(EmuError::Finished) => {
                        if let Err(e) = send(&mut stream, EXIT_REPLY).await {
                            log::warn!("Couldn't tell debugger the program exited: {}", e);
                        }
                        return Ok(SessionEnd::Finished);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if !dbg.is_running() {
                if let Err(e) = stream.readable().await {
                    return Ok(hung_up(e));
                }
            }

            let n = match stream.try_read(&mut buf) {
                Ok(0) => return Ok(SessionEnd::Disconnected),
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Err(e) => return Ok(hung_up(e)),
            };
            log::trace!("<- {:?}", String::from_utf8_lossy(&buf[..n]));

            match dispatch::handle_input(dbg, &buf[..n]) {
                Ok(replies) => {
                    for reply in replies {
                        if let Err(e) = write(&mut stream, &reply).await {
                            return Ok(hung_up(e));
                        }
                    }
                }
                Err(EmuError::Finished) => {
                    let sent = match write(&mut stream, dispatch::ACK).await {
                        Ok(()) => send(&mut stream, EXIT_REPLY).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sent {
                        log::warn!("Couldn't tell debugger the program exited: {}", e);
                    }
                    return Ok(SessionEnd::Finished);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn hung_up(e: io::Error) -> SessionEnd {
    log::warn!("Connection error: {}", e);
    SessionEnd::Disconnected
}

async fn send(stream: &mut TcpStream, payload: &str) -> io::Result<()> {
    match dispatch::frame(payload) {
        Some(frame) => write(stream, &frame).await,
        None => Ok(()),
    }
}

async fn write(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    log::trace!("-> {:?}", String::from_utf8_lossy(bytes));
    stream.write_all(bytes).await
}
