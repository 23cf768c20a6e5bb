use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};

use fpb_host::cli::{Cli, Command};
use fpb_host::config::HostConfig;
use fpb_host::inject::Pipeline;
use fpb_host::logger;
use fpb_host::serial::{DeviceWorker, FramedPort};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    logger::init(level);

    let mut config = HostConfig::load_or_default(&cli.config).context("loading config")?;
    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    if config.port.is_empty() {
        anyhow::bail!("no serial port configured; pass --port or set it in {}", cli.config.display());
    }

    info!("opening {} at {} baud", config.port, config.baud);
    let port = FramedPort::open(&config.port, config.baud, Duration::from_millis(config.timeout_ms))?;
    let worker = DeviceWorker::spawn(port);

    match cli.command {
        Command::Ping => {
            let reply = worker.send("--cmd ping")?;
            println!("{reply}");
        }
        Command::Info => {
            let reply = worker.send("--cmd info")?;
            println!("{reply}");
        }
        Command::Inject { elf, source, function, slot, backend } => {
            let pipeline = Pipeline::new(&worker, &config);
            let report = pipeline.inject(&elf, &source, &function, slot, backend.into())?;
            println!(
                "patched {function} ({:#010x} -> {:#010x}) into slot {}, {} bytes, {} retries",
                report.orig_addr, report.target_addr, report.slot, report.bytes_uploaded, report.retries
            );
        }
        Command::Unpatch { slot, all } => {
            let cmd = if all {
                "--cmd unpatch --all".to_string()
            } else {
                let slot = slot.context("either --slot or --all is required")?;
                format!("--cmd unpatch --comp {slot}")
            };
            let reply = worker.send(&cmd)?;
            println!("{reply}");
        }
        Command::Raw { line } => {
            let reply = worker.send(&line)?;
            println!("{reply}");
        }
        Command::Shell => run_shell(&worker)?,
    }

    Ok(())
}

fn run_shell(worker: &DeviceWorker) -> Result<()> {
    let stdin = io::stdin();
    print!("fpb> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            print!("fpb> ");
            io::stdout().flush()?;
            continue;
        }
        if line.trim() == "quit" || line.trim() == "exit" {
            break;
        }
        match worker.send(&line) {
            Ok(body) => println!("{body}"),
            Err(e) => eprintln!("error: {e}"),
        }
        print!("fpb> ");
        io::stdout().flush()?;
    }
    Ok(())
}
