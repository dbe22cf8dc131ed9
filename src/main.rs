use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur::voice::{AudioCapture, AudioPlayback, TextToSpeech};
use murmur::{Assistant, Config};

/// Murmur - desktop voice assistant for local GGUF language models
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Directory scanned for .gguf model files (default: ./models)
    #[arg(short, long, env = "MURMUR_MODELS_DIR")]
    models_dir: Option<PathBuf>,

    /// Panel port
    #[arg(long, env = "MURMUR_PANEL_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice input/output (panel-only mode)
    #[arg(long, env = "MURMUR_DISABLE_VOICE")]
    no_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
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
    /// List model files in the models directory
    ListModels,
    /// Run a single prompt through a model without audio
    Ask {
        /// The prompt text
        prompt: String,
        /// Model file to use (default: first in the catalog)
        #[arg(short = 'f', long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,murmur=info",
        1 => "info,murmur=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.models_dir.as_deref(), cli.no_voice)?;
    if let Some(port) = cli.port {
        config.panel.port = port;
    }

    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::ListModels => list_models(&config),
            Command::Ask { prompt, model } => ask(&config, &prompt, model.as_deref()).await,
        };
    }

    tracing::info!(
        models_dir = %config.models_dir.display(),
        port = config.panel.port,
        voice = config.voice.enabled,
        "starting murmur"
    );

    let panel_port = config.panel.port;
    let assistant = Assistant::new(config)?;

    tracing::info!("murmur ready - open http://127.0.0.1:{panel_port} for the panel");

    // Run until interrupted
    assistant.run().await?;

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = AudioPlayback::new()?;

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let sample_rate = 24000_i32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.play(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new()?;
    playback.play_mp3(&mp3_data)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// List model files in the models directory
fn list_models(config: &Config) -> anyhow::Result<()> {
    let catalog = murmur::ModelCatalog::new(&config.models_dir)?;
    let models = catalog.list();

    if models.is_empty() {
        println!("No model files in {}", catalog.dir().display());
        println!("Drop .gguf files there and they will show up in the panel dropdown.");
        return Ok(());
    }

    println!("Models in {}:", catalog.dir().display());
    for model in models {
        println!("  {model}");
    }

    Ok(())
}

/// Run a single prompt through a model without audio
async fn ask(config: &Config, prompt: &str, model: Option<&str>) -> anyhow::Result<()> {
    use murmur::llm::{GgufModel, SamplingParams, render_prompt, resolve_tokenizer};

    let catalog = murmur::ModelCatalog::new(&config.models_dir)?;
    let file = match model {
        Some(name) => name.to_string(),
        None => catalog
            .list()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no model files in {}", catalog.dir().display()))?,
    };
    let path = catalog.path_of(&file)?;

    println!("Loading {file}...");
    let rendered = render_prompt(&config.llm.system_prompt, prompt);
    let params = SamplingParams::from(&config.llm);

    let reply = tokio::task::spawn_blocking(move || -> murmur::Result<String> {
        let tokenizer = resolve_tokenizer(&path)?;
        let mut model = GgufModel::load(&path, &tokenizer)?;
        model.generate(&rendered, &params)
    })
    .await??;

    println!("\n{reply}");
    Ok(())
}
