//! modes-feeder: feed pre-framed Mode S hex frames through modes-core.
//!
//! Reads frames from a file or stdin on one thread, decodes and tracks on
//! another, prints every decoded message and finally the aircraft table.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use modes_core::config::{self, Config};
use modes_core::decode::me_description;
use modes_core::pipeline::{feed, unix_now};
use modes_core::{
    handoff, icao_to_string, Aircraft, DecodedMessage, MessageBody, Pipeline, SquitterData,
    CAPABILITY_NAMES,
};

mod capture;

use capture::HexFrameReader;

#[derive(Parser)]
#[command(
    name = "modes-feeder",
    version,
    about = "Mode S / ADS-B frame decoder and aircraft tracker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode hex frames from a file or stdin
    Decode {
        /// File with one hex frame per line (stdin when omitted or "-")
        file: Option<PathBuf>,

        /// Config file (default ~/.modes-decode/config.yaml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable single/two-bit error correction
        #[arg(long)]
        no_fix: bool,

        /// Track messages even when their checksum could not be validated
        #[arg(long)]
        no_crc_check: bool,

        /// Also attempt two-bit error correction (slow)
        #[arg(long)]
        aggressive: bool,

        /// Seconds of silence before an aircraft is dropped
        #[arg(long)]
        ttl: Option<f64>,

        /// Print messages as `*hex;` lines instead of field dumps
        #[arg(long)]
        raw: bool,

        /// Don't print individual messages
        #[arg(short, long)]
        quiet: bool,

        /// Print the final aircraft table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration to ~/.modes-decode/config.yaml
    InitConfig,
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            file,
            config,
            no_fix,
            no_crc_check,
            aggressive,
            ttl,
            raw,
            quiet,
            json,
        } => {
            let mut cfg = load(config)?;
            if no_fix {
                cfg.fix_errors = false;
            }
            if no_crc_check {
                cfg.check_crc = false;
            }
            if aggressive {
                cfg.aggressive = true;
            }
            if let Some(ttl) = ttl {
                cfg.aircraft_ttl = ttl;
            }
            let output = match (quiet, raw) {
                (true, _) => Output::Quiet,
                (false, true) => Output::Raw,
                (false, false) => Output::Fields,
            };
            cmd_decode(file, cfg, output, json)
        }
        Commands::ShowConfig { config } => {
            print!("{}", config::serialize_config(&load(config)?));
            Ok(())
        }
        Commands::InitConfig => {
            let path = config::save_config(&Config::default())?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn load(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => config::load_config_from(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(config::load_config()),
    }
}

#[derive(Clone, Copy)]
enum Output {
    Fields,
    Raw,
    Quiet,
}

fn cmd_decode(file: Option<PathBuf>, config: Config, output: Output, json: bool) -> Result<()> {
    info!(
        fix_errors = config.fix_errors,
        check_crc = config.check_crc,
        aggressive = config.aggressive,
        "starting decoder"
    );

    let (tx, rx) = handoff();

    let reader = thread::spawn(move || -> Result<u64> {
        match file.filter(|p| p.as_os_str() != "-") {
            Some(path) => {
                let mut source = HexFrameReader::open(&path)
                    .with_context(|| format!("opening {}", path.display()))?;
                Ok(feed(&mut source, &tx)?)
            }
            None => Ok(feed(&mut HexFrameReader::stdin(), &tx)?),
        }
    });

    let mut pipeline = Pipeline::new(config);
    let stats = pipeline.run(&rx, |msg| match output {
        Output::Fields => println!("{}", describe(msg)),
        Output::Raw => println!("{}", msg.raw_line()),
        Output::Quiet => {}
    });

    let sent = reader
        .join()
        .map_err(|_| anyhow!("reader thread panicked"))??;

    info!(
        read = sent,
        crc_ok = stats.crc_ok,
        single_bit_fixes = stats.single_bit_fixes,
        two_bit_fixes = stats.two_bit_fixes,
        recovered = stats.addresses_recovered,
        unknown = stats.unknown_addresses,
        evicted = stats.evicted,
        "done"
    );

    let snapshot = pipeline.tracker().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_table(&snapshot);
    }
    Ok(())
}

/// Multi-line human-readable dump of one message.
fn describe(msg: &DecodedMessage) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", msg.raw_line());
    let _ = writeln!(
        out,
        "CRC: {:06x} ({})",
        msg.crc,
        if msg.crc_ok { "ok" } else { "wrong" }
    );
    if let Some(fix) = msg.corrected {
        let _ = writeln!(out, "Corrected bits: {fix:?}");
    }
    let _ = writeln!(out, "DF {}: {}", msg.df, msg.df_name());
    let _ = writeln!(out, "  ICAO Address   : {}", icao_to_string(&msg.icao));

    match &msg.body {
        MessageBody::AltitudeReply(r) => {
            if let Some(status) = &r.status {
                let _ = writeln!(out, "  Flight Status  : {}", status.flight_status_name());
                let _ = writeln!(out, "  DR/UM          : {}/{}", status.downlink_request, status.utility_message);
            }
            let _ = writeln!(out, "  Altitude       : {} ft", r.altitude.feet());
        }
        MessageBody::IdentityReply(r) => {
            let _ = writeln!(out, "  Flight Status  : {}", r.status.flight_status_name());
            let _ = writeln!(out, "  Squawk         : {:04}", r.squawk);
        }
        MessageBody::AllCall { capability } => {
            let _ = writeln!(out, "  Capability     : {}", CAPABILITY_NAMES[*capability as usize & 7]);
        }
        MessageBody::ExtendedSquitter(es) => {
            let _ = writeln!(out, "  Type/Sub       : {}/{} {}", es.metype, es.mesub, me_description(es.metype, es.mesub));
            match &es.data {
                SquitterData::Identification(id) => {
                    let _ = writeln!(out, "  Identification : {} (category {})", id.flight, id.category);
                }
                SquitterData::AirbornePosition(p) => {
                    let _ = writeln!(out, "  F flag         : {}", if p.odd { "odd" } else { "even" });
                    let _ = writeln!(out, "  Altitude       : {} ft", p.altitude.feet());
                    let _ = writeln!(out, "  CPR lat/lon    : {}/{}", p.raw_lat, p.raw_lon);
                }
                SquitterData::Velocity(v) => {
                    let _ = writeln!(out, "  Speed/Heading  : {:.0} kt / {:.0}°", v.speed, v.heading);
                    if let Some(rate) = v.vertical_rate_fpm() {
                        let _ = writeln!(out, "  Vertical rate  : {rate} fpm");
                    }
                }
                SquitterData::Heading(h) => {
                    let _ = writeln!(out, "  Heading        : {:.0}° ({})", h.heading, if h.valid { "valid" } else { "invalid" });
                }
                SquitterData::Other => {}
            }
        }
        MessageBody::Other => {}
    }
    out
}

fn print_table(aircraft: &[Aircraft]) {
    let now = unix_now();
    println!(
        "{:<6} {:<8} {:>6} {:>5} {:>9} {:>10} {:>5} {:>6} {:>4}",
        "Hex", "Flight", "Alt", "Speed", "Lat", "Lon", "Track", "Msgs", "Age"
    );
    for ac in aircraft {
        let (lat, lon) = match ac.position() {
            Some((lat, lon)) => (format!("{lat:.3}"), format!("{lon:.3}")),
            None => (String::new(), String::new()),
        };
        println!(
            "{:<6} {:<8} {:>6} {:>5.0} {:>9} {:>10} {:>5.0} {:>6} {:>4.0}",
            ac.hex_addr,
            ac.flight.trim(),
            ac.altitude,
            ac.speed,
            lat,
            lon,
            ac.track,
            ac.messages,
            ac.age(now).max(0.0),
        );
    }
}
