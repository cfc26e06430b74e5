use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use parlor_client::{ChatClient, IdentityError, ProfileStore, RegisterOutcome, SendError};
use parlor_store::{RemoteConfig, RemoteStore};
use parlor_sync::Timeline;
use parlor_types::MAX_DISPLAY_NAME_LEN;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,parlor_sync=debug,parlor_store=debug".into()),
        )
        .init();

    // Config
    let server_url =
        std::env::var("PARLOR_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:4000".into());
    let profile_path =
        std::env::var("PARLOR_PROFILE_PATH").unwrap_or_else(|_| "parlor-profile.db".into());

    let store = RemoteStore::new(&RemoteConfig { server_url: server_url.clone() })?;
    let profile = ProfileStore::open(&PathBuf::from(&profile_path))?;
    let client = ChatClient::new(Arc::new(store), Arc::new(profile));
    info!("using room at {}", server_url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let name = match client.ensure_identity().await? {
        Some(name) => {
            println!("Welcome back, {}.", name);
            name
        }
        None => prompt_for_name(&client, &mut lines).await?,
    };

    let session = client.join(name).await?;
    println!("You are in the room. Type to talk, /older for history, /quit to leave.");

    let mut snapshots = session.snapshots();
    let mut printed = HashSet::new();
    let mut last_error = None;
    render_new(&snapshots.borrow_and_update(), &mut printed, &mut last_error);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                render_new(&snapshots.borrow_and_update(), &mut printed, &mut last_error);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }
                if line == "/older" {
                    if session.snapshot().reached_end() {
                        println!("(no more history)");
                    } else {
                        session.load_older().await;
                    }
                    continue;
                }
                match session.send(line).await {
                    Ok(_) => {}
                    Err(SendError::Draft(e)) => println!("({})", e),
                    Err(SendError::Store(e)) => eprintln!("(send failed: {})", e),
                }
            }
        }
    }

    session.leave().await;
    println!("Left the room.");
    Ok(())
}

async fn prompt_for_name(
    client: &ChatClient,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<String> {
    loop {
        println!("Pick a display name (up to {} chars):", MAX_DISPLAY_NAME_LEN);
        let Some(candidate) = lines.next_line().await? else {
            anyhow::bail!("stdin closed before a name was chosen");
        };
        match client.register_name(&candidate).await {
            Ok(RegisterOutcome::Registered(name)) => {
                println!("Welcome, {}.", name);
                return Ok(name);
            }
            Ok(RegisterOutcome::NameTaken) => {
                println!("'{}' is taken, try another.", candidate.trim());
            }
            Err(IdentityError::InvalidName(e)) => println!("({})", e),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Print whatever has not been printed yet, oldest first, so history
/// pages and live messages both come out in reading order.
fn render_new(timeline: &Timeline, printed: &mut HashSet<String>, last_error: &mut Option<String>) {
    for message in timeline.messages().iter().rev() {
        if printed.insert(message.id.clone()) {
            println!(
                "[{}] {}: {}",
                message.created_at.format("%H:%M:%S"),
                message.author_name,
                message.text
            );
        }
    }

    let current = timeline.last_error().map(|e| e.to_string());
    if current != *last_error {
        if let Some(err) = &current {
            eprintln!("(sync problem: {})", err);
        }
        *last_error = current;
    }
}
