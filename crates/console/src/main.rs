//! `retriage-console` -- line-driven operator client for a running
//! Retriage simulation.
//!
//! Loads the active event over REST, keeps it in sync over the STOMP
//! update channel and applies operator commands typed on stdin (moves,
//! admissions, discharges, condition changes, run-state toggles and
//! step-by-step drag gestures).
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default               | Description                          |
//! |-------------------------------|----------|-----------------------|--------------------------------------|
//! | `RETRIAGE_PREFS_PATH`         | no       | `retriage-prefs.json` | Preference file (name, role, domain) |
//! | `RETRIAGE_API_BASE_URL`       | no       | `http://{domain}`     | REST origin                          |
//! | `RETRIAGE_WS_BASE_URL`        | no       | `ws://{domain}`       | WebSocket origin                     |
//! | `RETRIAGE_RECONNECT_DELAY_MS` | no       | `5000`                | Wait before reconnecting the channel |
//! | `RETRIAGE_SESSION_COOKIE`     | no       | --                    | Cookie sent with REST calls          |

use anyhow::Context;
use retriage_client::{ApiError, ClientConfig, EventChannel, Preferences, RetriageApi};
use retriage_console::commands::{self, Command, HELP};
use retriage_console::session::Session;
use retriage_core::{running_event, Role};
use retriage_sync::{EventStore, SnapshotPublisher};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "retriage_console=info,retriage_client=info,retriage_sync=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let prefs = Preferences::load(config.prefs_path.clone()).context("cannot load preferences")?;
    let endpoints = config.endpoints(prefs.domain());

    tracing::info!(
        api = %endpoints.api_base_url,
        ws = %endpoints.ws_base_url,
        user = prefs.username(),
        "Starting retriage-console",
    );

    let api = match &config.session_cookie {
        Some(cookie) => RetriageApi::with_session_cookie(endpoints.api_base_url.clone(), cookie)?,
        None => RetriageApi::new(endpoints.api_base_url.clone()),
    };
    let role = resolve_role(&api, &prefs).await;

    let cancel = CancellationToken::new();
    let (handle, mut updates, channel_task) =
        EventChannel::new(&endpoints.ws_base_url, config.reconnect_delay).spawn(cancel.clone());

    let mut session = Session::new(EventStore::new(role, handle));
    refresh(&api, &mut session).await;
    print!("{}", session.render());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            update = updates.recv() => {
                let Some(update) = update else {
                    tracing::warn!("Update channel closed");
                    break;
                };
                session.on_remote(update);
                print!("{}", session.render());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let command = match commands::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                match command {
                    Command::Quit => break,
                    Command::Help => println!("{HELP}"),
                    Command::Show => print!("{}", session.render()),
                    Command::Dismiss => {
                        session.notice_mut().dismiss();
                    }
                    Command::Refresh => {
                        refresh(&api, &mut session).await;
                        print!("{}", session.render());
                    }
                    Command::Events => list_events(&api).await,
                    Command::Intent(intent) => {
                        println!("{}", session.apply(intent));
                    }
                }
            }
        }
    }

    cancel.cancel();
    channel_task.shutdown().await;
    tracing::info!("retriage-console stopped");
    Ok(())
}

/// The session role comes from the signed-in user; without a session the
/// stored preference is used.
async fn resolve_role(api: &RetriageApi, prefs: &Preferences) -> Role {
    match api.current_user().await {
        Ok(user) => {
            tracing::info!(user = %user.display_name(), role = %user.role, "Signed in");
            user.role
        }
        Err(e) => {
            let role = prefs.role().parse().unwrap_or(Role::Guest);
            match e {
                ApiError::Unauthenticated => {
                    tracing::info!(role = %role, "No session, using stored role")
                }
                other => tracing::warn!(error = %other, role = %role, "User lookup failed, using stored role"),
            }
            role
        }
    }
}

async fn refresh<P: SnapshotPublisher>(api: &RetriageApi, session: &mut Session<P>) {
    match api.active_event().await {
        Ok(event) => session.load_initial(event),
        Err(e) => {
            tracing::warn!(error = %e, "Could not fetch the active event");
            session.notice_mut().report_network(e.to_string());
        }
    }
}

async fn list_events(api: &RetriageApi) {
    match api.list_events().await {
        Ok(events) => {
            for event in &events {
                let id = event.id.map_or_else(|| "?".to_string(), |id| id.to_string());
                println!("#{id} {} [{}]", event.name, event.status);
            }
            if let Err(e) = running_event(&events) {
                println!("warning: {e}");
            }
        }
        Err(e) => println!("error: {e}"),
    }
}
