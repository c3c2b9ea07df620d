use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use howl::agent::{ActionOutcome, Agent};
use howl::fallback::FallbackEngine;
use howl::llm::Generator;
use howl::logging;
use howl::protocol::{Packet, Request, Role};
use howl::settings::Settings;

// The wire client is external: packets arrive as one JSON object per line on
// stdin and responses leave on stdout. Everything else is the engine's job.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/settings.json".to_string());
    let settings = if Path::new(&path).exists() {
        Settings::load_from_file(&path).with_context(|| format!("loading settings from {path}"))?
    } else {
        Settings::default()
    };

    logging::init(&settings).context("installing logger")?;

    // A broken generation config (missing key, unknown provider) is fatal
    // here, before the first packet, never mid-game.
    let generator = Generator::from_settings(&settings)
        .context("initializing generation client")?
        .map(Arc::new);

    run_session(Arc::new(settings), generator).await
}

async fn run_session(
    settings: Arc<Settings>,
    generator: Option<Arc<Generator>>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut agent: Option<Agent> = None;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let packet: Packet = match serde_json::from_str(line) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("undecodable packet: {}", e);
                continue;
            }
        };

        // The identity query may arrive before any game state exists.
        if packet.request == Request::Name && agent.is_none() {
            respond(&settings.agent.name)?;
            continue;
        }

        if packet.request == Request::Initialize {
            match role_from_packet(&packet) {
                Some(role) => {
                    log::info!("new game as {}", role);
                    agent = Some(Agent::with_parts(
                        Arc::clone(&settings),
                        role,
                        generator.clone(),
                        FallbackEngine::new(),
                    ));
                }
                None => {
                    log::error!("initialize packet carries no role for this agent");
                    continue;
                }
            }
        }

        let Some(current) = agent.as_mut() else {
            log::warn!("{} request before initialize; ignoring", packet.request);
            continue;
        };

        current.absorb_packet(&packet);
        match current.act().await {
            ActionOutcome::Failed(e) => log::error!("action failed: {}", e),
            outcome => {
                if let Some(response) = outcome.into_response() {
                    respond(&response)?;
                }
            }
        }

        // The game is over; the next one starts with a fresh agent.
        if packet.request == Request::Finish {
            agent = None;
        }
    }

    Ok(())
}

fn respond(response: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "{response}")?;
    stdout.flush()?;
    Ok(())
}

fn role_from_packet(packet: &Packet) -> Option<Role> {
    let info = packet.info.as_ref()?;
    info.role_map.get(&info.agent).copied()
}
