use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicebot::api::{ApiServerBuilder, ModelInfo};
use voicebot::client::{
    ConsoleCapture, HttpReplyFetcher, MicCapture, MutedOutput, SpeakerOutput, print_snapshots,
    read_commands, spawn_stdin_reader,
};
use voicebot::session::{AudioOutput, SpeechCapture};
use voicebot::voice::{
    AudioCapture, AudioPlayback, PlaybackControl, SpeechToText, calculate_energy,
};
use voicebot::{Config, OpenRouterClient, SessionDriver, Synthesizer, TextToSpeech};

/// VoiceBot - talk to a language model out loud
#[derive(Parser)]
#[command(name = "voicebot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Run the chat relay server (default)
    Serve {
        /// Port to listen on (overrides PORT / config file)
        #[arg(long)]
        port: Option<u16>,

        /// Directory with a web UI to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
    /// Start a voice conversation against a relay
    Talk {
        /// Relay base URL (overrides config)
        #[arg(long, env = "VOICEBOT_BACKEND_URL")]
        backend: Option<String>,

        /// Type messages instead of speaking them
        #[arg(long)]
        text: bool,

        /// Print replies without playing audio
        #[arg(long)]
        mute: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,voicebot=info,tower_http=info",
        1 => "info,voicebot=debug,tower_http=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Serve {
        port: None,
        static_dir: None,
    });

    match command {
        Command::Serve { port, static_dir } => serve(port, static_dir).await,
        Command::Talk {
            backend,
            text,
            mute,
        } => talk(backend, text, mute).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestTts { text } => test_tts(&text).await,
    }
}

/// Run the relay until interrupted
async fn serve(port: Option<u16>, static_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let port = port.unwrap_or(config.server.port);

    let llm = OpenRouterClient::new(config.openrouter_key()?.clone(), config.llm.clone())?;
    let tts = TextToSpeech::from_config(&config.tts, &config.api_keys)?;

    tracing::info!(
        port,
        model = %config.llm.model,
        tts = config.tts.provider.as_str(),
        "starting voicebot relay"
    );

    ApiServerBuilder::new(Arc::new(llm), Arc::new(tts), port)
        .static_dir(static_dir.or(config.server.static_dir))
        .model_info(ModelInfo {
            llm_model: config.llm.model.clone(),
            tts_provider: config.tts.provider.as_str().to_string(),
        })
        .rate_limit(config.server.rate_limit_per_minute)
        .build()
        .run()
        .await?;

    Ok(())
}

/// Run a conversation session in the terminal
#[allow(clippy::future_not_send)]
async fn talk(backend: Option<String>, text: bool, mute: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let backend = backend.unwrap_or_else(|| config.client.backend_url.clone());

    let fetcher = Arc::new(HttpReplyFetcher::new(&backend, config.client.request_timeout)?);

    let console = ConsoleCapture::new();
    let capture: Box<dyn SpeechCapture> = if text {
        Box::new(console.clone())
    } else {
        let stt = SpeechToText::from_config(&config.stt, &config.api_keys)?;
        Box::new(MicCapture::new(Arc::new(stt), config.client.listen_timeout)?)
    };

    let output: Box<dyn AudioOutput> = if mute {
        Box::new(MutedOutput)
    } else {
        Box::new(SpeakerOutput::new()?)
    };

    let (driver, handle) = SessionDriver::new(config.client.timing, capture, fetcher, output);

    tracing::info!(backend = %backend, text, mute, "starting voice session");
    println!("Commands: /start /stop /pause /resume /reset /quit");
    if text {
        println!("Type a message and press enter while listening.");
    }

    let display = tokio::spawn(print_snapshots(handle.subscribe()));
    let reader = tokio::spawn(read_commands(
        spawn_stdin_reader(),
        handle.clone(),
        text.then_some(console),
    ));
    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = handle.shutdown();
            }
        })
    };

    handle.start()?;
    driver.run().await?;

    interrupt.abort();
    reader.abort();
    drop(handle);
    let _ = display.await;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    let buffer = capture.buffer();

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = buffer.take();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;
    let sample_rate = playback.sample_rate();
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    tokio::task::spawn_blocking(move || {
        playback.play_samples_blocking(samples, &PlaybackControl::new())
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.tts, &config.api_keys)?;

    println!("Synthesizing speech ({})...", config.tts.provider.as_str());
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if let Some(head) = mp3_data.get(..4) {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            head[0], head[1], head[2], head[3]
        );
    }

    println!("Playing audio...");
    let playback = AudioPlayback::new()?;
    tokio::task::spawn_blocking(move || {
        playback.play_mp3_blocking(&mp3_data, &PlaybackControl::new())
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
