use clap::{Arg, Command};
use log::{error, info};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process, thread};

use framecast::config::StreamConfig;
use framecast::pipeline::StreamPipeline;

fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON config file; flags below override its fields"),
        )
        .arg(
            Arg::new("dest")
                .short('d')
                .long("dest")
                .value_name("IP:PORT")
                .help("Receiver endpoint for the datagram stream"),
        )
        .arg(
            Arg::new("size")
                .short('s')
                .long("size")
                .value_name("WxH")
                .help("Output resolution, e.g. 640x640"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("RATE")
                .help("Capture pacing target in frames per second"),
        )
        .arg(
            Arg::new("bitrate")
                .short('b')
                .long("bitrate")
                .value_name("KBPS")
                .help("Encoder bitrate in kilobits per second"),
        )
        .arg(
            Arg::new("max-packet")
                .long("max-packet")
                .value_name("BYTES")
                .help("Datagram budget including the 12-byte header"),
        )
        .arg(
            Arg::new("stats-interval")
                .long("stats-interval")
                .value_name("SECONDS")
                .help("Seconds between throughput log lines"),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => match StreamConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                process::exit(2);
            }
        },
        None => StreamConfig::default(),
    };

    if let Err(e) = apply_overrides(&mut config, &matches) {
        error!("{}", e);
        process::exit(2);
    }

    // A panic on a stage thread must not leave a half-dead streamer behind.
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::Release);
    })
    .expect("Error setting Ctrl-C handler");

    let mut streamer = StreamPipeline::new();
    if let Err(e) = streamer.start(config.clone()) {
        error!("failed to start: {:#}", e);
        process::exit(1);
    }

    let stats_interval = Duration::from_secs(config.stats_interval_secs);
    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(stats_interval);
        info!("{}", streamer.stats());
    }

    info!("shutting down");
    streamer.stop();
}

/// Fold CLI flags over the loaded config.
fn apply_overrides(
    config: &mut StreamConfig,
    matches: &clap::ArgMatches,
) -> Result<(), String> {
    if let Some(dest) = matches.get_one::<String>("dest") {
        config.remote_addr = dest
            .parse()
            .map_err(|e| format!("invalid --dest '{}': {}", dest, e))?;
    }
    if let Some(size) = matches.get_one::<String>("size") {
        let (w, h) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("invalid --size '{}', expected WxH", size))?;
        config.width = w.parse().map_err(|e| format!("invalid width: {}", e))?;
        config.height = h.parse().map_err(|e| format!("invalid height: {}", e))?;
    }
    if let Some(fps) = matches.get_one::<String>("fps") {
        config.frame_rate = fps.parse().map_err(|e| format!("invalid --fps: {}", e))?;
    }
    if let Some(bitrate) = matches.get_one::<String>("bitrate") {
        config.bitrate_kbps = bitrate
            .parse()
            .map_err(|e| format!("invalid --bitrate: {}", e))?;
    }
    if let Some(size) = matches.get_one::<String>("max-packet") {
        config.max_packet_size = size
            .parse()
            .map_err(|e| format!("invalid --max-packet: {}", e))?;
    }
    if let Some(interval) = matches.get_one::<String>("stats-interval") {
        config.stats_interval_secs = interval
            .parse()
            .map_err(|e| format!("invalid --stats-interval: {}", e))?;
    }
    Ok(())
}
