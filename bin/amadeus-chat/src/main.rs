//! amadeus-chat – terminal client for amadeus-server.
//!
//! Reads a line, posts it to the persona's chat route and prints the
//! streamed reply. `/new` starts a fresh thread, `/history` reprints the
//! conversation, `/quit` exits.

mod client;

use std::io::Write;

use amadeus_agent::{ChatRole, Persona, Transcript};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::client::ChatClient;

#[derive(Parser, Debug)]
#[command(
    name = "amadeus-chat",
    version,
    about = "Chat with the Amadeus / Galileo GDS instructor from the terminal"
)]
struct Cli {
    /// Base URL of amadeus-server.
    #[arg(long, env = "AMADEUS_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,

    /// Instructor to talk to: `amadeus` or `galileo`.
    #[arg(short, long, default_value = "amadeus")]
    persona: Persona,

    /// Send one message, print the reply and exit.
    #[arg(short, long)]
    message: Option<String>,

    /// Log filter for diagnostics on stderr (e.g. `debug`).
    #[arg(long, env = "AMADEUS_LOG", default_value = "warn")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let http = reqwest::Client::builder()
        .user_agent(concat!("amadeus-chat/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let client = ChatClient::new(http, &cli.server, cli.persona);
    let mut transcript = Transcript::new();
    let mut stdout = std::io::stdout();

    if let Some(message) = cli.message.as_deref() {
        client.send(&mut transcript, message, &mut stdout).await?;
        return Ok(());
    }

    println!(
        "Talking to {} at {}. /new starts over, /history replays, /quit exits.\n",
        cli.persona,
        client.endpoint()
    );
    info!(thread_id = transcript.thread_id(), "session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You > ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                transcript.reset();
                info!(thread_id = transcript.thread_id(), "new thread");
                println!("Started a new conversation.\n");
            }
            "/history" => print_history(&transcript),
            message => {
                print!("{} > ", cli.persona);
                stdout.flush()?;
                client.send(&mut transcript, message, &mut stdout).await?;
                println!();
            }
        }
    }
    Ok(())
}

fn print_history(transcript: &Transcript) {
    for message in transcript.messages() {
        let who = match message.role {
            ChatRole::User => "You",
            ChatRole::Assistant => "Tutor",
        };
        println!("[{}] {who}: {}", message.timestamp.format("%H:%M:%S"), message.content);
        for call in message.tool_calls.iter().flatten() {
            let state = if call.is_loading { "pending" } else { "done" };
            println!("    {} ({state}) {}", call.name, call.args);
        }
    }
    println!();
}
