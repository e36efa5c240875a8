use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use voicelink::audio::codec::pcm16_to_float;
use voicelink::audio::playback::PlaybackScheduler;
use voicelink::audio::{AlsaSink, SourceId};
use voicelink::config::Config;
use voicelink::conversation;
use voicelink::protocol::OUTPUT_SAMPLE_RATE;
use voicelink::remote::RemoteClient;

#[derive(Parser)]
#[command(name = "voicelink", about = "Voice and multimodal chat client")]
struct Cli {
    /// Config file (TOML, optional; VOICELINK_* env vars override it)
    #[arg(short, long, default_value = "voicelink")]
    config: String,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Realtime voice conversation (default)
    Live,
    /// Text chat on stdin
    Chat,
    /// Generate an image
    Image {
        prompt: String,
        #[arg(short, long, default_value = "image.png")]
        out: PathBuf,
    },
    /// Generate a video (polls until the job finishes)
    Video {
        prompt: String,
        #[arg(short, long, default_value = "video.mp4")]
        out: PathBuf,
    },
    /// Read a line of text aloud
    Speak { text: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.mode.unwrap_or(Mode::Live) {
        Mode::Live => conversation::run(&config).await,
        Mode::Chat => chat_loop(&config).await,
        Mode::Image { prompt, out } => {
            let client = RemoteClient::new(config.service);
            let image = client.generate_image(&prompt).await?;
            std::fs::write(&out, image)?;
            println!("wrote {}", out.display());
            Ok(())
        }
        Mode::Video { prompt, out } => {
            let client = RemoteClient::new(config.service);
            let video = client.generate_video(&prompt).await?;
            std::fs::write(&out, video)?;
            println!("wrote {}", out.display());
            Ok(())
        }
        Mode::Speak { text } => speak(&config, &text).await,
    }
}

async fn chat_loop(config: &Config) -> anyhow::Result<()> {
    let client = RemoteClient::new(config.service.clone());
    let stdin = std::io::stdin();
    let mut line = String::new();

    println!("Type a message, 'quit' to exit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        // A failed exchange is reported inline; the loop keeps going.
        match client.generate_text(input).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => println!("[error: {}]", e),
        }
    }
    Ok(())
}

/// Synthesize one utterance and play it through the same scheduler the live
/// conversation uses.
async fn speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let client = RemoteClient::new(config.service.clone());
    let pcm = client.synthesize_speech(text).await?;
    let buffer = pcm16_to_float(&pcm, OUTPUT_SAMPLE_RATE, 1)?;

    let (ended_tx, mut ended_rx) = mpsc::unbounded_channel::<SourceId>();
    let sink = AlsaSink::start(&config.audio.playback_device, OUTPUT_SAMPLE_RATE, ended_tx)?;
    let mut scheduler = PlaybackScheduler::new(sink);

    let id = scheduler.schedule_fragment(buffer);
    // Wait for natural end of playback before releasing the device.
    while let Some(ended) = ended_rx.recv().await {
        scheduler.source_ended(ended);
        if ended == id {
            break;
        }
    }
    Ok(())
}
