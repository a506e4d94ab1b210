//! jitterplay - command-line front end
//!
//! - `simulate`: a jittery producer feeding a fixed-cadence consumer, with a report of
//!   underruns, threshold adaptation and evictions
//! - `pipe`: raw s16le on stdin, resampled f32le on stdout
//! - `play`: raw s16le on stdin, played on an output device (feature `device-output`)

use std::f64::consts::TAU;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jitterplay::audio::normalizer::SAMPLE_WIDTH;
use jitterplay::{EventMonitor, InterpolationMode, PlaybackDriver, PlayerConfig, StreamConfig};
use jitterplay_common::config::resolve_config_path;
use jitterplay_common::events::{EventBus, PlaybackState, StreamEvent, TransportState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Jitter buffer for irregularly arriving PCM chunks
#[derive(Parser, Debug)]
#[command(name = "jitterplay")]
#[command(about = "Jitter-buffered, resampled playback of streamed PCM chunks")]
#[command(version)]
struct Cli {
    /// Config file (overrides JITTERPLAY_CONFIG and the per-user config file)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sample rate of incoming chunks (Hz)
    #[arg(long, global = true)]
    input_rate: Option<u32>,

    /// Output sample rate (Hz)
    #[arg(long, global = true)]
    output_rate: Option<u32>,

    /// Interpolation mode: linear or cubic
    #[arg(long, global = true)]
    interpolation: Option<InterpolationMode>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a jittery producer against a fixed-cadence consumer and report buffer behaviour
    Simulate(SimulateArgs),
    /// Resample raw s16le from stdin to f32le on stdout
    Pipe(PipeArgs),
    /// Play raw s16le from stdin on an output device
    #[cfg(feature = "device-output")]
    Play(PlayArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Length of the session (seconds)
    #[arg(long, default_value_t = 10.0)]
    duration: f64,

    /// Audio carried by each chunk (milliseconds)
    #[arg(long, default_value_t = 20)]
    chunk_ms: u32,

    /// Samples pulled per consumer tick
    #[arg(long, default_value_t = 128)]
    frame_size: usize,

    /// Maximum random delay added to each chunk's arrival (milliseconds)
    #[arg(long, default_value_t = 30)]
    jitter_ms: u64,

    /// Probability that a chunk starts a network dropout
    #[arg(long, default_value_t = 0.01)]
    dropout_probability: f64,

    /// Length of a dropout (milliseconds)
    #[arg(long, default_value_t = 250)]
    dropout_ms: u64,

    /// Test tone frequency (Hz)
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PipeArgs {
    /// Bytes read per chunk, expressed as audio duration (milliseconds)
    #[arg(long, default_value_t = 20)]
    chunk_ms: u32,

    /// Samples pulled per tick
    #[arg(long, default_value_t = 128)]
    frame_size: usize,
}

#[cfg(feature = "device-output")]
#[derive(Args, Debug)]
struct PlayArgs {
    /// Output device name (default device if omitted or not found)
    #[arg(long)]
    device: Option<String>,

    /// Bytes read per chunk, expressed as audio duration (milliseconds)
    #[arg(long, default_value_t = 20)]
    chunk_ms: u32,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn apply_overrides(&self, stream: &mut StreamConfig) {
        if let Some(rate) = self.input_rate {
            stream.input_sample_rate = rate;
        }
        if let Some(rate) = self.output_rate {
            stream.output_sample_rate = rate;
        }
        if let Some(mode) = self.interpolation {
            stream.interpolation = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = PlayerConfig::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load config file {}", path.display()),
        None => "Invalid default configuration".to_string(),
    })?;

    init_tracing(&config.logging.level);
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    cli.apply_overrides(&mut config.stream);

    match cli.command {
        Command::Simulate(args) => simulate(config.stream, args).await,
        Command::Pipe(args) => pipe(config.stream, args).await,
        #[cfg(feature = "device-output")]
        Command::Play(args) => play(config.stream, args).await,
    }
}

/// Log to stderr so `pipe` keeps stdout clean
fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Samples per chunk of `chunk_ms` at `sample_rate`
fn chunk_samples(sample_rate: u32, chunk_ms: u32) -> usize {
    ((sample_rate as u64 * chunk_ms as u64) / 1000).max(1) as usize
}

/// Sine tone rendered as s16le chunks
struct Tone {
    phase: f64,
    step: f64,
    amplitude: f64,
}

impl Tone {
    fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / sample_rate as f64,
            amplitude: 0.5,
        }
    }

    fn chunk(&mut self, samples: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples * SAMPLE_WIDTH);
        for _ in 0..samples {
            let value = (self.phase.sin() * self.amplitude * i16::MAX as f64) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
            self.phase = (self.phase + self.step) % TAU;
        }
        bytes
    }
}

#[derive(Debug, Serialize)]
struct ThresholdChange {
    at_secs: f64,
    from: usize,
    to: usize,
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    stream_id: String,
    duration_secs: f64,
    chunks_sent: u64,
    chunks_rejected: u64,
    frames_evicted: u64,
    underruns: u64,
    buffering_secs: f64,
    starving_secs: f64,
    final_threshold: usize,
    threshold_changes: Vec<ThresholdChange>,
    output_peak: f32,
    non_finite_samples: u64,
    events_lost: u64,
}

impl SimulationReport {
    fn collect_events(&mut self, rx: &mut broadcast::Receiver<StreamEvent>, stream_secs: f64) {
        loop {
            match rx.try_recv() {
                Ok(StreamEvent::ThresholdChanged {
                    old_threshold,
                    new_threshold,
                    ..
                }) => self.threshold_changes.push(ThresholdChange {
                    at_secs: stream_secs,
                    from: old_threshold,
                    to: new_threshold,
                }),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.events_lost += n,
                Err(_) => break,
            }
        }
    }

    fn print(&self) {
        println!("Simulation report ({:.1}s, stream {})", self.duration_secs, self.stream_id);
        println!("  chunks sent:       {}", self.chunks_sent);
        println!("  chunks rejected:   {}", self.chunks_rejected);
        println!("  frames evicted:    {}", self.frames_evicted);
        println!("  underruns:         {}", self.underruns);
        println!("  buffering:         {:.2}s", self.buffering_secs);
        println!("  starving:          {:.2}s", self.starving_secs);
        println!("  final threshold:   {} frames", self.final_threshold);
        println!("  output peak:       {:.3}", self.output_peak);
        if self.non_finite_samples > 0 {
            println!("  NON-FINITE:        {}", self.non_finite_samples);
        }
        if self.threshold_changes.is_empty() {
            println!("  threshold never moved");
        } else {
            println!("  threshold changes:");
            for change in &self.threshold_changes {
                println!("    {:>7.2}s  {} -> {}", change.at_secs, change.from, change.to);
            }
        }
    }
}

async fn simulate(config: StreamConfig, args: SimulateArgs) -> Result<()> {
    let bus = EventBus::new(config.event_capacity);
    let mut events = bus.subscribe();
    let mut driver =
        PlaybackDriver::with_event_bus(config.clone(), bus.clone()).context("Invalid stream configuration")?;
    let handle = driver.handle();
    let mut monitor = driver
        .take_event_receiver()
        .map(|rx| EventMonitor::new(rx, driver.stream_id(), bus.clone()));

    let samples_per_chunk = chunk_samples(config.input_sample_rate, args.chunk_ms);
    let chunk_period = Duration::from_millis(args.chunk_ms.max(1) as u64);
    let total_chunks = (args.duration * 1000.0 / args.chunk_ms.max(1) as f64).ceil() as u64;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "Simulating {:.1}s: {} chunks of {} samples, jitter up to {}ms, dropout p={} for {}ms",
        args.duration,
        total_chunks,
        samples_per_chunk,
        args.jitter_ms,
        args.dropout_probability,
        args.dropout_ms
    );

    let start = Instant::now();
    let producer = {
        let handle = handle.clone();
        let dropout_probability = args.dropout_probability.clamp(0.0, 1.0);
        let dropout = Duration::from_millis(args.dropout_ms);
        let jitter_ms = args.jitter_ms;
        let mut tone = Tone::new(args.frequency, config.input_sample_rate);

        tokio::spawn(async move {
            let mut stalled_until: Option<Instant> = None;
            let mut sent = 0u64;
            for k in 0..total_chunks {
                let nominal = start + chunk_period.mul_f64(k as f64);
                if rng.gen_bool(dropout_probability) {
                    debug!("Dropout at chunk {} for {}ms", k, dropout.as_millis());
                    stalled_until = Some(nominal + dropout);
                }
                let jitter = Duration::from_millis(rng.gen_range(0..=jitter_ms));
                let arrival = match stalled_until {
                    Some(until) => (nominal + jitter).max(until),
                    None => nominal + jitter,
                };
                time::sleep_until(arrival).await;

                if let Err(e) = handle.ingest(&tone.chunk(samples_per_chunk)) {
                    warn!("Chunk {} rejected: {}", k, e);
                }
                sent += 1;
            }
            sent
        })
    };

    let frame_size = args.frame_size.max(1);
    let tick = Duration::from_secs_f64(frame_size as f64 / config.output_sample_rate as f64);
    let ticks = (args.duration * config.output_sample_rate as f64 / frame_size as f64).ceil() as u64;
    let tick_secs = tick.as_secs_f64();
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut report = SimulationReport {
        stream_id: driver.stream_id().to_string(),
        duration_secs: args.duration,
        ..Default::default()
    };
    let mut buffer = vec![0.0f32; frame_size];
    let mut has_played = false;

    handle.set_transport_state(TransportState::Play);
    for n in 0..ticks {
        interval.tick().await;
        driver.pull_into(&mut buffer);

        for &sample in &buffer {
            if sample.is_finite() {
                report.output_peak = report.output_peak.max(sample.abs());
            } else {
                report.non_finite_samples += 1;
            }
        }
        match driver.state() {
            PlaybackState::Playing => has_played = true,
            PlaybackState::Buffering => report.buffering_secs += tick_secs,
            PlaybackState::Starving if has_played => report.starving_secs += tick_secs,
            _ => {}
        }

        if n % 16 == 0 {
            if let Some(monitor) = monitor.as_mut() {
                monitor.drain();
            }
            report.collect_events(&mut events, driver.stream_time_secs());
        }
    }

    report.chunks_sent = producer.await.context("Producer task failed")?;
    if let Some(monitor) = monitor.as_mut() {
        monitor.drain();
    }
    report.collect_events(&mut events, driver.stream_time_secs());

    let stats = handle.queue_stats();
    report.chunks_rejected = handle.chunks_dropped();
    report.frames_evicted = stats.evicted;
    report.underruns = driver.underrun_total();
    report.final_threshold = driver.threshold();

    handle.set_transport_state(TransportState::Stop);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        report.print();
    }
    Ok(())
}

/// Fill `buf` from `reader`, returning fewer bytes only at end of input
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn pipe(mut config: StreamConfig, args: PipeArgs) -> Result<()> {
    // Offline: admit playback as soon as one chunk is queued, and keep it there
    config.min_floor = 1;
    config.min_buffer_threshold = 1;
    config.max_ceiling = 1;

    let mut driver = PlaybackDriver::new(config.clone()).context("Invalid stream configuration")?;
    let handle = driver.handle();
    handle.set_transport_state(TransportState::Play);

    let samples_per_chunk = chunk_samples(config.input_sample_rate, args.chunk_ms);
    let frame_size = args.frame_size.max(1);
    let input_rate = config.input_sample_rate as u64;
    let output_rate = config.output_sample_rate as u64;

    let mut stdin = tokio::io::stdin();
    let mut stdout = BufWriter::new(tokio::io::stdout());
    let mut chunk = vec![0u8; samples_per_chunk * SAMPLE_WIDTH];
    let mut frame = vec![0.0f32; frame_size];
    let mut encoded = Vec::with_capacity(frame_size * 4);
    let mut input_total = 0u64;
    let mut produced = 0u64;

    info!(
        "Piping s16le {}Hz -> f32le {}Hz ({} interpolation)",
        input_rate, output_rate, config.interpolation
    );

    loop {
        let filled = read_chunk(&mut stdin, &mut chunk)
            .await
            .context("Failed to read stdin")?;
        let usable = filled - filled % SAMPLE_WIDTH;
        if usable < filled {
            warn!("Ignoring trailing odd byte at end of input");
        }
        if usable == 0 {
            break;
        }

        handle.ingest(&chunk[..usable])?;
        input_total += (usable / SAMPLE_WIDTH) as u64;

        // Stay one chunk behind the input so the converter never runs dry mid-stream
        let ready = input_total.saturating_sub(samples_per_chunk as u64) * output_rate / input_rate;
        while produced + frame_size as u64 <= ready {
            driver.pull_into(&mut frame);
            write_f32le(&mut stdout, &frame, &mut encoded).await?;
            produced += frame_size as u64;
        }

        if filled < chunk.len() {
            break;
        }
    }

    let total = input_total * output_rate / input_rate;
    while produced < total {
        let n = ((total - produced) as usize).min(frame_size);
        driver.pull_into(&mut frame[..n]);
        write_f32le(&mut stdout, &frame[..n], &mut encoded).await?;
        produced += n as u64;
    }
    stdout.flush().await.context("Failed to flush stdout")?;

    info!(
        "Converted {} input samples into {} output samples",
        input_total, produced
    );
    Ok(())
}

async fn write_f32le<W: tokio::io::AsyncWrite + Unpin>(
    out: &mut W,
    samples: &[f32],
    scratch: &mut Vec<u8>,
) -> Result<()> {
    scratch.clear();
    for sample in samples {
        scratch.extend_from_slice(&sample.to_le_bytes());
    }
    out.write_all(scratch).await.context("Failed to write stdout")?;
    Ok(())
}

#[cfg(feature = "device-output")]
async fn play(mut config: StreamConfig, args: PlayArgs) -> Result<()> {
    use jitterplay::output::DeviceOutput;

    if args.list_devices {
        for name in DeviceOutput::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut output = DeviceOutput::open(args.device.as_deref()).context("Failed to open audio device")?;
    config.output_sample_rate = output.sample_rate();

    let bus = EventBus::new(config.event_capacity);
    let mut driver =
        PlaybackDriver::with_event_bus(config.clone(), bus.clone()).context("Invalid stream configuration")?;
    let handle = driver.handle();
    let monitor = driver
        .take_event_receiver()
        .map(|rx| EventMonitor::new(rx, driver.stream_id(), bus.clone()).spawn(Duration::from_millis(50)));

    output.start(driver)?;
    handle.set_transport_state(TransportState::Play);

    let chunk_period = Duration::from_millis(args.chunk_ms.max(1) as u64);
    let mut stdin = tokio::io::stdin();
    let mut chunk = vec![0u8; chunk_samples(config.input_sample_rate, args.chunk_ms) * SAMPLE_WIDTH];

    loop {
        let filled = read_chunk(&mut stdin, &mut chunk)
            .await
            .context("Failed to read stdin")?;
        let usable = filled - filled % SAMPLE_WIDTH;
        if usable == 0 {
            break;
        }

        // Pace a fast reader (file, pipe) to the playback rate instead of evicting
        while handle.depth() + 1 >= config.max_queue_size {
            time::sleep(chunk_period).await;
        }
        handle.ingest(&chunk[..usable])?;

        if filled < chunk.len() {
            break;
        }
    }

    while handle.depth() > 0 {
        time::sleep(chunk_period).await;
    }
    time::sleep(chunk_period * 4).await;

    handle.set_transport_state(TransportState::Stop);
    output.stop();
    if let Some(task) = monitor {
        task.abort();
    }

    info!(
        "Playback finished ({} device errors, {} frames evicted)",
        output.error_count(),
        handle.queue_stats().evicted
    );
    Ok(())
}
