use std::{io::Read, net::IpAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use pspsim::{
    emu::{debugger::Debugger, emulator::Emulator, interrupt::InterruptGate, EmuError},
    gdb::{
        server::{Server, ServerConfig},
        DEFAULT_PORT,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-stepped RV32I simulator with a GDB remote stub")]
struct Args {
    /// Raw binary image to load.
    program: PathBuf,

    /// Wait for a GDB client instead of running headless.
    #[arg(long)]
    gdb: bool,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Steps per scheduling turn while the client has the program continuing.
    #[arg(long, default_value_t = 64)]
    burst: usize,

    /// Where the image is loaded and execution starts.
    #[arg(long, default_value = "0", value_parser = parse_addr)]
    load_addr: u32,

    /// RAM size in bytes.
    #[arg(long, default_value_t = 1 << 20)]
    memory: usize,

    /// Raise an interrupt for every byte read from stdin, with the byte as its keycode.
    #[arg(long)]
    stdin_interrupts: bool,

    /// Defaults to `trace` in debug builds and `info` otherwise.
    #[arg(long)]
    log_level: Option<LevelFilter>,
}

fn parse_addr(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn spawn_stdin_interrupts(gate: InterruptGate) {
    std::thread::spawn(move || {
        for byte in std::io::stdin().lock().bytes() {
            match byte {
                Ok(keycode) => gate.schedule(keycode),
                Err(e) => {
                    log::warn!("Stopped reading interrupts from stdin: {}", e);
                    break;
                }
            }
        }
    });
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = args.log_level.unwrap_or(if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    });
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let image = std::fs::read(&args.program)
        .with_context(|| format!("Failed to read program {}", args.program.display()))?;
    let mut emu = Emulator::new(args.memory, args.load_addr)?;
    emu.load(&image)?;
    log::info!(
        "Loaded {} bytes at {:08X}",
        image.len(),
        args.load_addr
    );

    let (gate, latch) = InterruptGate::new();
    if args.stdin_interrupts {
        spawn_stdin_interrupts(gate);
    }
    let mut dbg = Debugger::new(emu, latch);

    if args.gdb {
        let config = ServerConfig {
            bind: args.bind,
            port: args.port,
            continue_burst: args.burst,
        };
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(async {
            let server = Server::bind(config).await?;
            server.serve(&mut dbg).await
        })?;
    } else {
        match dbg.run_to_breakpoint() {
            Ok(()) | Err(EmuError::Finished) => {}
            Err(e) => return Err(e.into()),
        }
    }

    log::info!("All done.");
    Ok(())
}
