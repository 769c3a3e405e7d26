use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use clap::Parser;
use sky_render::SkyboxRenderPlugin;
use sky_sim::{PhysicsScene, SkySimPlugin, SpawnManager};
use sky_utils::{SkyboxDescriptor, SkyboxResult, SkyboxSettings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod assembler;
mod floor_async;
mod plugins;
mod skybox_systems;

use plugins::ClientSkyboxPlugin;
use skybox_systems::SkyboxRequest;

#[derive(Parser, Debug)]
#[command(name = "sky-client", about = "Walk around inside a depth-displaced skybox")]
struct Args {
    /// Skybox descriptor JSON: { "id", "fileUrl", "depthMapUrl" }
    descriptor: PathBuf,

    #[arg(long, default_value = "skybox.toml")]
    config: PathBuf,

    /// Seed for spawn yaw and selection.
    #[arg(long)]
    seed: Option<u64>,

    /// Build the mesh and pick a spawn point without opening a window.
    #[arg(long)]
    headless: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu=warn,naga=warn")),
        )
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> SkyboxResult<()> {
    let mut settings = SkyboxSettings::load(&args.config)?;
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    let descriptor = SkyboxDescriptor::load(&args.descriptor)?;
    let base = args.descriptor.parent().unwrap_or(Path::new("."));
    let resolved = descriptor.resolve(base);
    info!("Starting sky-client for skybox {}", resolved.id);

    if args.headless {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let seed = settings.seed.unwrap_or_else(rand::random);
        let mut spawns = SpawnManager::default();
        let assembled = runtime.block_on(assembler::assemble(
            resolved,
            settings,
            PhysicsScene::default(),
            &mut spawns,
            seed,
        ))?;
        let ticket = assembled.ticket;
        info!(
            id = %assembled.id,
            vertices = assembled.mesh.vertex_count(),
            collision = assembled.collision.is_some(),
            valid_cells = assembled.hit_map.as_ref().map_or(0, |m| m.valid_count()),
            ticket = ticket.id,
            position = ?ticket.position,
            yaw = ticket.orientation.to_euler(EulerRot::YXZ).0,
            "skybox assembled"
        );
        return Ok(());
    }

    let exit = App::new()
        .insert_resource(settings)
        .insert_resource(SkyboxRequest(resolved))
        .add_plugins(DefaultPlugins.build().disable::<LogPlugin>())
        .add_plugins((SkyboxRenderPlugin, SkySimPlugin, ClientSkyboxPlugin))
        .run();
    if let AppExit::Error(code) = exit {
        error!("app exited with code {code}");
    }
    Ok(())
}
