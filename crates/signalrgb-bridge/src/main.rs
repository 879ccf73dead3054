//! SignalRGB bridge
//!
//! Runs the SignalRGB integration for one host read from a YAML file,
//! logs the light's state changes and takes commands on stdin.

mod commands;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use ha_config_entries::{
    ConfigEntries, ConfigEntrySource, FlowManager, FlowStep, ABORT_ALREADY_CONFIGURED,
};
use ha_core::const_keys::{CONF_HOST, CONF_PORT};
use ha_core::{Executor, HomeAssistant, StateMachine};
use ha_signalrgb::{SignalRgbIntegration, DOMAIN};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{Command, USAGE};
use crate::config::{config_path, BridgeConfig, CONFIG_ENV};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = BridgeConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    info!("Starting SignalRGB bridge for {}", config.unique_id());

    let hass = HomeAssistant::new(Executor::new(
        config.executor.max_workers,
        config.executor.timeout(),
    ));
    let entries = Arc::new(ConfigEntries::new(&config.config_dir));
    entries.load().await.context("loading config entries")?;

    let integration = Arc::new(SignalRgbIntegration::new(hass.clone(), config.options.clone()));
    entries.register_integration(integration.clone());
    let flows = FlowManager::new(Arc::clone(&entries));
    flows.register(DOMAIN, integration.config_flow_factory());

    import_host(&flows, &config).await?;

    let state_log = tokio::spawn(log_state_changes(Arc::clone(&hass.states)));
    let retries = entries.setup_all().await;
    info!("SignalRGB bridge is running; {}", USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => run_command(&entries, &integration, &config, command).await,
                    Err(err) => warn!("{}; {}", err, USAGE),
                },
                Ok(None) => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
                Err(err) => {
                    warn!("Failed to read stdin: {}", err);
                    stdin_open = false;
                }
            },
            result = &mut shutdown => {
                result.context("waiting for ctrl-c")?;
                break;
            }
        }
    }

    info!("Shutting down...");
    for retry in retries {
        retry.abort();
    }
    entries.unload_all().await;
    state_log.abort();
    Ok(())
}

/// Create the entry for the configured host unless it exists
async fn import_host(flows: &FlowManager, config: &BridgeConfig) -> Result<()> {
    let mut data = Map::new();
    data.insert(CONF_HOST.to_string(), Value::from(config.host.clone()));
    data.insert(CONF_PORT.to_string(), Value::from(config.port));

    let result = flows
        .async_init(DOMAIN, ConfigEntrySource::Import, Some(data))
        .await
        .context("importing configured host")?;

    match result.step {
        FlowStep::CreateEntry { title, .. } => {
            let entry_id = result.entry_id.unwrap_or_default();
            info!("Created config entry {} for {}", entry_id, title);
        }
        FlowStep::Abort { reason } if reason == ABORT_ALREADY_CONFIGURED => {
            debug!("{} is already configured", config.unique_id());
        }
        FlowStep::Abort { reason } => {
            warn!("Import of {} aborted: {}", config.unique_id(), reason);
        }
        FlowStep::Form { errors, .. } => {
            warn!("Import of {} rejected: {:?}", config.unique_id(), errors);
        }
    }
    Ok(())
}

async fn run_command(
    entries: &ConfigEntries,
    integration: &SignalRgbIntegration,
    config: &BridgeConfig,
    command: Command,
) {
    let Some(entry) = entries.get_by_unique_id(DOMAIN, &config.unique_id()) else {
        warn!("No config entry for {}", config.unique_id());
        return;
    };
    let Some(light) = integration.light(&entry.entry_id) else {
        warn!("{} is not loaded ({:?})", entry.title, entry.state);
        return;
    };

    let result = match command {
        Command::TurnOn(params) => light.turn_on(params).await,
        Command::TurnOff => light.turn_off().await,
        Command::ListEffects => light.refresh_effects().await.map(|effects| {
            info!("Effects: {}", effects.join(", "));
        }),
    };
    if let Err(err) = result {
        error!("Command failed: {}", err);
    }
}

async fn log_state_changes(states: Arc<StateMachine>) {
    let mut events = states.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => match event.new_state {
                Some(state) => info!(
                    effect = ?state.attributes.get("effect"),
                    brightness = ?state.attributes.get("brightness"),
                    "{} is {}",
                    event.entity_id,
                    state.state
                ),
                None => info!("{} removed", event.entity_id),
            },
            Err(RecvError::Lagged(skipped)) => debug!("Skipped {} state changes", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
