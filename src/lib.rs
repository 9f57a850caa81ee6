pub mod commands;
pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod signaling;
pub mod utils;

use crate::config::SessionConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "peerlink")]
#[command(about = "WebRTC offer/answer signaling over pasted tokens or a websocket relay")]
pub struct Cli {
    /// JSON session config (ICE servers, timeouts, trickle)
    #[arg(short, long, global = true, env = "PEERLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds to wait for the remote answer (overrides the config file)
    #[arg(long, global = true)]
    answer_timeout: Option<u64>,

    /// Turn off trickle renegotiation after connecting
    #[arg(long, global = true)]
    no_trickle: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info,webrtc=warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a call and print an offer token to hand to the callee
    Offer,

    /// Answer an offer token and print the answer token
    Answer {
        /// Token (or link ending in #token) produced by `offer`
        token: String,
    },

    /// Negotiate through a relay server
    Call {
        /// Relay websocket url, e.g. ws://127.0.0.1:9000
        #[arg(long, env = "PEERLINK_RELAY")]
        relay: String,

        /// Call to join; omitted means start a new one
        #[arg(long)]
        call_id: Option<String>,
    },

    /// Run the rendezvous relay
    RelayServer {
        #[arg(long, default_value = "0.0.0.0:9000")]
        listen: String,
    },

    /// Check that the configured STUN/TURN servers are reachable
    CheckIce,
}

impl Cli {
    fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(secs) = self.answer_timeout {
            config.answer_timeout_secs = Some(secs);
        }
        if self.no_trickle {
            config.trickle = false;
        }
        Ok(config)
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(&cli.log);

    match &cli.command {
        Command::Offer => commands::manual_api::offer(cli.session_config()?).await,
        Command::Answer { token } => {
            commands::manual_api::answer(cli.session_config()?, token).await
        }
        Command::Call { relay, call_id } => {
            commands::relay_api::call(cli.session_config()?, relay, call_id.clone()).await
        }
        Command::RelayServer { listen } => commands::relay_api::relay_server(listen).await,
        Command::CheckIce => commands::util_api::check_ice(&cli.session_config()?).await,
    }
}
