//! Command-line interface and the validated run configuration.

use clap::{ArgAction, Parser};
use dlt_common::buffers::{RECV_CAPACITY, SEND_LEN};
use dlt_common::cadence::{EDGE_TIMEOUT_MS, SEND_INTERVAL_US, STALL_AFTER, STATUS_INTERVAL_S};
use dlt_common::gpio::SYSFS_ROOT;
use dlt_common::LANE_COUNT;
use dlt_core::LoopError;
use dlt_core::channel::{ChannelPair, LaneSpec, lane_specs};
use dlt_core::units::mib_to_bytes;
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

/// Loops fixed test frames through the AXI DMA lanes of the PL fabric and
/// verifies every byte that comes back.
#[derive(Parser, Debug)]
#[command(name = "axidma-looptest", version)]
pub struct Cli {
    /// Device id of the DMA channel used for transmitting. Defaults to the
    /// lowest numbered channel available.
    #[arg(short = 't', value_name = "DMA tx channel", requires = "rx_channel")]
    pub tx_channel: Option<i32>,

    /// Device id of the DMA channel used for receiving from the PL fabric.
    /// Defaults to the lowest numbered channel available.
    #[arg(short = 'r', value_name = "DMA rx channel", requires = "tx_channel")]
    pub rx_channel: Option<i32>,

    /// Receive buffer size in bytes. Must be at least the number of bytes
    /// received back per transfer.
    #[arg(short = 's', value_name = "Output size", conflicts_with = "output_mib")]
    pub output_size: Option<usize>,

    /// Receive buffer size in MiB (floating point). Must be at least the
    /// number of bytes received back per transfer.
    #[arg(short = 'o', value_name = "Output size MiB")]
    pub output_mib: Option<f64>,

    /// Root of the sysfs GPIO class.
    #[arg(long, default_value = SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    /// Run against the in-process software loopback instead of the hardware.
    #[arg(long)]
    pub loopback: bool,

    /// Packets per lane before the run stops; 0 runs until interrupted.
    #[arg(long, default_value_t = 0)]
    pub packets: u64,

    /// Pause between two transmissions on a lane, in microseconds.
    #[arg(long, default_value_t = SEND_INTERVAL_US)]
    pub interval_us: u64,

    /// Length of each transmitted frame in bytes.
    #[arg(long, default_value_t = SEND_LEN)]
    pub send_len: usize,

    /// Upper bound on one interrupt wait, in milliseconds.
    #[arg(long, default_value_t = EDGE_TIMEOUT_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub edge_timeout_ms: u64,

    /// Consecutive interrupt timeouts before a lane is reported as stalled.
    #[arg(long, default_value_t = STALL_AFTER)]
    pub stall_after: u32,

    /// Seconds between status lines; 0 disables them.
    #[arg(long, default_value_t = STATUS_INTERVAL_S)]
    pub status_interval: u64,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less log output (-q warnings, -qq errors only).
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

/// Which DMA engine the run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Vendor,
    Loopback,
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backend: Backend,
    pub channels: Option<ChannelPair>,
    pub lanes: [LaneSpec; LANE_COUNT],
    pub sysfs_root: PathBuf,
    pub packets: Option<u64>,
    pub interval: Duration,
    pub edge_timeout: Duration,
    pub stall_after: u32,
    pub status_interval: Option<Duration>,
    pub log_level: LevelFilter,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, LoopError> {
        let channels = match (cli.tx_channel, cli.rx_channel) {
            (Some(tx), Some(rx)) => Some(ChannelPair { tx, rx }),
            _ => None,
        };

        let recv_capacity = match (cli.output_size, cli.output_mib) {
            (Some(bytes), _) => bytes,
            (None, Some(mib)) => mib_to_bytes(mib)?,
            (None, None) => RECV_CAPACITY,
        };

        Ok(Self {
            backend: if cli.loopback {
                Backend::Loopback
            } else {
                Backend::Vendor
            },
            channels,
            lanes: lane_specs(cli.send_len, recv_capacity)?,
            sysfs_root: cli.sysfs_root.clone(),
            packets: (cli.packets > 0).then_some(cli.packets),
            interval: Duration::from_micros(cli.interval_us),
            edge_timeout: Duration::from_millis(cli.edge_timeout_ms),
            stall_after: cli.stall_after,
            status_interval: (cli.status_interval > 0)
                .then(|| Duration::from_secs(cli.status_interval)),
            log_level: log_level(cli.verbose, cli.quiet),
        })
    }

    /// Receive capacity shared by every lane.
    pub fn recv_capacity(&self) -> usize {
        self.lanes[0].recv_capacity
    }
}

fn log_level(verbose: u8, quiet: u8) -> LevelFilter {
    match (verbose, quiet) {
        (0, 0) => LevelFilter::Info,
        (1, _) => LevelFilter::Debug,
        (v, _) if v > 1 => LevelFilter::Trace,
        (_, 1) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("axidma-looptest").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        let cfg = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.backend, Backend::Vendor);
        assert_eq!(cfg.channels, None);
        assert_eq!(cfg.recv_capacity(), 10240);
        assert_eq!(cfg.lanes[0].send_len, 8192);
        assert_eq!(cfg.packets, None);
        assert_eq!(cfg.interval, Duration::from_micros(4000));
        assert_eq!(cfg.edge_timeout, Duration::from_secs(1));
        assert_eq!(cfg.status_interval, Some(Duration::from_secs(1)));
        assert_eq!(cfg.sysfs_root, PathBuf::from("/sys/class/gpio"));
        assert_eq!(cfg.log_level, LevelFilter::Info);
    }

    #[test]
    fn channel_pair_override() {
        let cli = parse(&["-t", "2", "-r", "3"]).unwrap();
        let cfg = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.channels, Some(ChannelPair { tx: 2, rx: 3 }));
    }

    #[test]
    fn lone_channel_flag_is_rejected() {
        let err = parse(&["-t", "0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        let err = parse(&["-r", "1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn size_flags_are_exclusive() {
        let err = parse(&["-s", "4096", "-o", "1.5"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn size_in_bytes_and_mib() {
        let cfg = RunConfig::from_cli(&parse(&["-s", "4096"]).unwrap()).unwrap();
        assert_eq!(cfg.recv_capacity(), 4096);
        let cfg = RunConfig::from_cli(&parse(&["-o", "0.25"]).unwrap()).unwrap();
        assert_eq!(cfg.recv_capacity(), 262_144);
        assert!(cfg.lanes.iter().all(|l| l.recv_capacity == 262_144));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let cli = parse(&["-s", "0"]).unwrap();
        assert_eq!(RunConfig::from_cli(&cli).unwrap_err(), LoopError::ZeroLength);
        let cli = parse(&["--send-len", "0"]).unwrap();
        assert_eq!(RunConfig::from_cli(&cli).unwrap_err(), LoopError::ZeroLength);
        // A leading dash may read as a flag; if it parses, the value is refused.
        if let Ok(cli) = parse(&["-o", "-1"]) {
            assert_eq!(RunConfig::from_cli(&cli).unwrap_err(), LoopError::InvalidSize);
        }
    }

    #[test]
    fn huge_sizes_are_rejected() {
        let cli = parse(&["-o", "1000000"]).unwrap();
        assert!(matches!(
            RunConfig::from_cli(&cli),
            Err(LoopError::TooLarge(_))
        ));
        let cli = parse(&["--send-len", "1000000000"]).unwrap();
        assert_eq!(
            RunConfig::from_cli(&cli).unwrap_err(),
            LoopError::TooLarge(1_000_000_000)
        );
    }

    #[test]
    fn help_is_reported_as_display_help() {
        let err = parse(&["-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let rendered = err.to_string();
        assert!(rendered.contains("-t <DMA tx channel>"));
        assert!(rendered.contains("-o <Output size MiB>"));
    }

    #[test]
    fn stray_positional_is_rejected() {
        assert!(parse(&["input.bin"]).is_err());
    }

    #[test]
    fn zero_edge_timeout_is_rejected() {
        assert!(parse(&["--edge-timeout-ms", "0"]).is_err());
    }

    #[test]
    fn finite_run_and_verbosity() {
        let cli = parse(&["--loopback", "--packets", "100", "-vv", "--status-interval", "0"]).unwrap();
        let cfg = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.backend, Backend::Loopback);
        assert_eq!(cfg.packets, Some(100));
        assert_eq!(cfg.status_interval, None);
        assert_eq!(cfg.log_level, LevelFilter::Trace);
        assert_eq!(log_level(0, 1), LevelFilter::Warn);
        assert_eq!(log_level(0, 2), LevelFilter::Error);
        assert_eq!(log_level(1, 0), LevelFilter::Debug);
    }
}
