use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use sky_utils::{ResolvedSkybox, SkyboxError, SkyboxResult, SkyboxSettings};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::reconstruct::{BuiltSkybox, load_skybox};

#[derive(Resource)]
pub struct MeshAsyncResources {
    pub runtime: Arc<Runtime>,
    pub job_tx: UnboundedSender<SkyboxMeshJob>,
    pub result_rx: Mutex<UnboundedReceiver<SkyboxMeshResult>>,
}

impl FromWorld for MeshAsyncResources {
    fn from_world(_world: &mut World) -> Self {
        let runtime = Arc::new(Runtime::new().expect("Failed to create tokio runtime"));
        let (job_tx, mut job_rx) = unbounded_channel::<SkyboxMeshJob>();
        let (result_tx, result_rx) = unbounded_channel::<SkyboxMeshResult>();
        let runtime_clone = runtime.clone();

        runtime.spawn(async move {
            while let Some(job) = job_rx.recv().await {
                let result_tx = result_tx.clone();
                let entity = job.entity;
                let build = runtime_clone.spawn_blocking(move || job.build());
                runtime_clone.spawn(async move {
                    // A panicking build still reports back so the entity leaves the in-flight set.
                    let outcome = build
                        .await
                        .unwrap_or_else(|err| Err(SkyboxError::Task(err.to_string())));
                    let _ = result_tx.send(SkyboxMeshResult { entity, outcome });
                });
            }
        });

        Self {
            runtime,
            job_tx,
            result_rx: Mutex::new(result_rx),
        }
    }
}

#[derive(Resource, Default)]
pub struct MeshInFlight {
    pub skyboxes: HashSet<Entity>,
}

pub struct SkyboxMeshJob {
    pub entity: Entity,
    pub source: ResolvedSkybox,
    pub settings: SkyboxSettings,
}

impl SkyboxMeshJob {
    pub fn build(self) -> SkyboxResult<BuiltSkybox> {
        load_skybox(&self.source, &self.settings, true)
    }
}

pub struct SkyboxMeshResult {
    pub entity: Entity,
    pub outcome: SkyboxResult<BuiltSkybox>,
}
