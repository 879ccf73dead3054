//! Light platform task
//!
//! One task owns each [`SignalRgbLight`]. Service calls reach it through a
//! [`LightHandle`] and coordinator updates through a `watch` subscription;
//! the task handles them one at a time.

use ha_core::{EntityId, HomeAssistantError};
use ha_helpers::light::TurnOnParams;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::Result;
use crate::light::SignalRgbLight;

const COMMAND_BUFFER: usize = 16;

/// Request sent to a light task
#[derive(Debug)]
pub enum LightCommand {
    TurnOn {
        params: TurnOnParams,
        reply: oneshot::Sender<Result<()>>,
    },
    TurnOff {
        reply: oneshot::Sender<Result<()>>,
    },
    RefreshEffects {
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// Cloneable handle to a running light task
#[derive(Debug, Clone)]
pub struct LightHandle {
    entity_id: EntityId,
    commands: mpsc::Sender<LightCommand>,
}

impl LightHandle {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// `light.turn_on`
    pub async fn turn_on(&self, params: TurnOnParams) -> std::result::Result<(), HomeAssistantError> {
        let (reply, response) = oneshot::channel();
        self.send(LightCommand::TurnOn { params, reply }).await?;
        Ok(self.receive(response).await??)
    }

    /// `light.turn_off`
    pub async fn turn_off(&self) -> std::result::Result<(), HomeAssistantError> {
        let (reply, response) = oneshot::channel();
        self.send(LightCommand::TurnOff { reply }).await?;
        Ok(self.receive(response).await??)
    }

    /// Reload the effect list, returning it
    pub async fn refresh_effects(&self) -> std::result::Result<Vec<String>, HomeAssistantError> {
        let (reply, response) = oneshot::channel();
        self.send(LightCommand::RefreshEffects { reply }).await?;
        self.receive(response).await
    }

    async fn send(&self, command: LightCommand) -> std::result::Result<(), HomeAssistantError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| self.stopped())
    }

    async fn receive<T>(
        &self,
        response: oneshot::Receiver<T>,
    ) -> std::result::Result<T, HomeAssistantError> {
        response.await.map_err(|_| self.stopped())
    }

    fn stopped(&self) -> HomeAssistantError {
        HomeAssistantError::ActionFailed(format!("{} is not running", self.entity_id))
    }
}

/// Start the task owning `light`
///
/// The light should already be added to the host; the task only reacts to
/// commands and coordinator updates from here on.
pub fn spawn_light(mut light: SignalRgbLight) -> (LightHandle, JoinHandle<()>) {
    let (commands, mut inbox) = mpsc::channel(COMMAND_BUFFER);
    let handle = LightHandle {
        entity_id: light.entity_id().clone(),
        commands,
    };
    let mut updates = light.coordinator().subscribe();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                command = inbox.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    handle_command(&mut light, command).await;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    trace!("Coordinator update for {}", light.entity_id());
                    light.handle_coordinator_update();
                }
            }
        }
        debug!("Light task for {} stopped", light.entity_id());
    });

    (handle, task)
}

async fn handle_command(light: &mut SignalRgbLight, command: LightCommand) {
    // A dropped reply only means the caller stopped waiting
    match command {
        LightCommand::TurnOn { params, reply } => {
            let _ = reply.send(light.turn_on(params).await);
        }
        LightCommand::TurnOff { reply } => {
            let _ = reply.send(light.turn_off().await);
        }
        LightCommand::RefreshEffects { reply } => {
            light.refresh_effect_catalog().await;
            let _ = reply.send(light.effect_list().to_vec());
        }
    }
}
