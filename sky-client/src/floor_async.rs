use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sky_sim::{FloorBounds, HitMap, PhysicsScene, SpawnPose};
use sky_utils::{SkyboxError, SkyboxResult, SkyboxSettings};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::assembler::discover_floor;

#[derive(Resource)]
pub struct FloorAsyncResources {
    pub runtime: Arc<Runtime>,
    pub job_tx: UnboundedSender<FloorJob>,
    pub result_rx: Mutex<UnboundedReceiver<FloorResult>>,
}

impl FromWorld for FloorAsyncResources {
    fn from_world(_world: &mut World) -> Self {
        let runtime = Arc::new(Runtime::new().expect("Failed to create tokio runtime"));
        let (job_tx, mut job_rx) = unbounded_channel::<FloorJob>();
        let (result_tx, result_rx) = unbounded_channel::<FloorResult>();
        let runtime_clone = runtime.clone();

        runtime.spawn(async move {
            while let Some(job) = job_rx.recv().await {
                let result_tx = result_tx.clone();
                let entity = job.entity;
                let discovery = runtime_clone.spawn_blocking(move || job.run());
                runtime_clone.spawn(async move {
                    let outcome = discovery
                        .await
                        .map_err(|err| SkyboxError::Task(err.to_string()));
                    let _ = result_tx.send(FloorResult { entity, outcome });
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

pub struct FloorJob {
    pub entity: Entity,
    pub scene: PhysicsScene,
    pub bounds: FloorBounds,
    pub settings: SkyboxSettings,
    pub seed: u64,
}

impl FloorJob {
    fn run(self) -> (HitMap, Option<SpawnPose>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        discover_floor(&self.scene, &self.bounds, &self.settings, &mut rng)
    }
}

pub struct FloorResult {
    pub entity: Entity,
    pub outcome: SkyboxResult<(HitMap, Option<SpawnPose>)>,
}
