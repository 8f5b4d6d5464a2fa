use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waav_live::core::realtime::{
    Blob, GenerationConfig, LiveClient, LiveConfig, Part, ResponseModality,
};
use waav_live::core::stt::{STT_AUDIO_MIME_TYPE, SttClient};
use waav_live::{ClientConfig, ReadyState};

/// Sample rate of the PCM input file.
const INPUT_SAMPLE_RATE: usize = 16_000;

/// Sample rate of the model's audio.
const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Model used when the config file has no `session` block.
const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-exp";

/// WaaV Live - stream audio to a live generative-media endpoint
#[derive(Parser, Debug)]
#[command(name = "waav-live")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a 16 kHz 16-bit mono file (raw PCM or WAV) and print the replies
    Stream {
        /// File to stream; `.wav` files are decoded, anything else is raw PCM
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Chunk length in milliseconds
        #[arg(long = "chunk-ms", default_value_t = 100)]
        chunk_ms: u64,

        /// Text turn to send before the audio
        #[arg(short = 't', long = "text")]
        text: Option<String>,

        /// Where to write the model's audio (WAV for `.wav`, raw PCM otherwise)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Also transcribe the model's audio on a separate connection
        #[arg(long = "transcribe")]
        transcribe: bool,

        /// Seconds to wait for the final turn after the input ends
        #[arg(long = "wait-secs", default_value_t = 10)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {}", config_path.display());
            ClientConfig::from_file(&config_path)?
        }
        None => ClientConfig::from_env()?,
    };

    match cli.command {
        Commands::Stream {
            input,
            chunk_ms,
            text,
            output,
            transcribe,
            wait_secs,
        } => {
            stream(
                &config,
                StreamArgs {
                    input,
                    chunk_ms,
                    text,
                    output,
                    transcribe,
                    wait: Duration::from_secs(wait_secs),
                },
            )
            .await
        }
    }
}

struct StreamArgs {
    input: PathBuf,
    chunk_ms: u64,
    text: Option<String>,
    output: Option<PathBuf>,
    transcribe: bool,
    wait: Duration,
}

fn default_session() -> LiveConfig {
    LiveConfig::new(DEFAULT_MODEL).with_generation_config(GenerationConfig {
        response_modalities: Some(ResponseModality::Audio),
        ..Default::default()
    })
}

async fn stream(config: &ClientConfig, args: StreamArgs) -> anyhow::Result<()> {
    if args.chunk_ms == 0 {
        anyhow::bail!("--chunk-ms must be greater than zero");
    }

    let pcm = read_input(&args.input).await?;

    let client = LiveClient::from_config(config)?;
    let signals = client.signals();

    let received_audio = Arc::new(Mutex::new(Vec::<u8>::new()));
    let turn_done = Arc::new(Notify::new());

    signals.modeltext.connect(|text: &String| println!("model: {text}"));
    signals
        .transcription
        .connect(|text: &String| println!("transcription: {text}"));
    signals.toolcall.connect(|call| {
        for function_call in &call.function_calls {
            println!("tool call: {} {}", function_call.name, function_call.args);
        }
    });
    signals.close.connect(|close| {
        if !close.is_normal() {
            warn!("Connection closed: {} {}", close.code, close.user_reason());
        }
    });
    {
        let received_audio = received_audio.clone();
        signals
            .audio
            .connect(move |data| received_audio.lock().extend_from_slice(data));
    }
    {
        let turn_done = turn_done.clone();
        signals.turncomplete.connect(move |_| turn_done.notify_one());
    }

    let stt = if args.transcribe {
        let stt = SttClient::from_config(config)?;
        stt.signals()
            .transcription
            .connect(|text: &String| println!("stt: {text}"));
        stt.signals()
            .error
            .connect(|e| warn!("Transcription flush failed: {}", e));
        stt.attach(&client);
        stt.start();
        Some(stt)
    } else {
        None
    };

    let session = config.session.clone().unwrap_or_else(default_session);
    client.connect(Some(session)).await?;

    if let Some(text) = args.text {
        client.send(vec![Part::text(text)], true).await?;
    }

    let chunk_bytes = (INPUT_SAMPLE_RATE * 2 * args.chunk_ms as usize / 1000).max(2);
    let pacing = Duration::from_millis(args.chunk_ms);
    let mut sent = 0usize;
    for chunk in pcm.chunks(chunk_bytes) {
        match client
            .send_realtime_input(vec![Blob::from_bytes(STT_AUDIO_MIME_TYPE, chunk)])
            .await
        {
            Ok(()) => sent += chunk.len(),
            Err(e) => warn!("Dropped {} bytes of input: {}", chunk.len(), e),
        }
        tokio::time::sleep(pacing).await;
    }
    info!("Streamed {} of {} input bytes", sent, pcm.len());

    if tokio::time::timeout(args.wait, turn_done.notified())
        .await
        .is_err()
    {
        warn!("No turn completed within {:?}", args.wait);
    }

    if let Some(stt) = &stt {
        stt.stop_processing_interval();
        if let Err(e) = stt.flush_and_wait(args.wait).await {
            warn!("Final transcription flush failed: {}", e);
        }
    }

    if client.ready_state() == Some(ReadyState::Open) {
        client.disconnect(None);
    }
    if let Some(stt) = stt {
        stt.dispose();
    }

    if let Some(output) = args.output {
        let audio = std::mem::take(&mut *received_audio.lock());
        write_output(&output, &audio).await?;
        println!("Wrote {} bytes of audio to {}", audio.len(), output.display());
    }

    Ok(())
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Input as little-endian 16-bit PCM bytes.
async fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !is_wav(path) {
        return tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_rate as usize != INPUT_SAMPLE_RATE
        || spec.sample_format != hound::SampleFormat::Int
    {
        anyhow::bail!(
            "{} must be 16 kHz 16-bit mono PCM (got {} Hz, {} bit, {} channel(s))",
            path.display(),
            spec.sample_rate,
            spec.bits_per_sample,
            spec.channels
        );
    }

    let mut pcm = Vec::with_capacity(reader.len() as usize * 2);
    for sample in reader.samples::<i16>() {
        pcm.extend_from_slice(&sample?.to_le_bytes());
    }
    Ok(pcm)
}

async fn write_output(path: &Path, audio: &[u8]) -> anyhow::Result<()> {
    if !is_wav(path) {
        return tokio::fs::write(path, audio)
            .await
            .with_context(|| format!("Failed to write {}", path.display()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: OUTPUT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for sample in audio.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}
