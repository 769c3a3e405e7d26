use std::sync::Arc;

use bevy::image::{ImageAddressMode, ImageSampler, ImageSamplerDescriptor};
use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use sky_utils::SkyboxSettings;
use tracing::{debug, info, warn};

mod async_mesh;
mod components;
pub mod depth;
pub mod reconstruct;
pub mod skybox_mesh;
pub mod sphere;
mod timing;

pub use components::{SkyboxDepthBlend, SkyboxGeometry, SkyboxSource, WorldIdentity};
pub use depth::{DepthField, DepthGrid};
pub use reconstruct::{BuiltSkybox, PanoramaPixels, load_skybox, reconstruct};
pub use skybox_mesh::{DisplacedMesh, DisplacementParams, SphereMeshBuilder};
pub use sphere::{BaseTopology, uv_sphere};
pub use timing::Timing;

pub struct SkyboxRenderPlugin;

impl Plugin for SkyboxRenderPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SkyboxSettings>()
            .init_resource::<SkyboxBuildStats>()
            .init_resource::<async_mesh::MeshAsyncResources>()
            .init_resource::<async_mesh::MeshInFlight>()
            .add_systems(
                Update,
                (enqueue_skybox_builds, apply_skybox_results, apply_depth_blend).chain(),
            );
    }
}

#[derive(Resource, Debug, Default)]
pub struct SkyboxBuildStats {
    pub built: u32,
    pub failed: u32,
    pub in_flight: u32,
    pub last_build_ms: f32,
    pub avg_build_ms: f32,
}

fn enqueue_skybox_builds(
    sources: Query<(Entity, &SkyboxSource), Added<SkyboxSource>>,
    settings: Res<SkyboxSettings>,
    async_mesh: Res<async_mesh::MeshAsyncResources>,
    mut in_flight: ResMut<async_mesh::MeshInFlight>,
    mut stats: ResMut<SkyboxBuildStats>,
) {
    for (entity, source) in &sources {
        if in_flight.skyboxes.contains(&entity) {
            continue;
        }
        let job = async_mesh::SkyboxMeshJob {
            entity,
            source: source.0.clone(),
            settings: settings.clone(),
        };
        if async_mesh.job_tx.send(job).is_ok() {
            debug!(id = %source.0.id, "queued skybox build");
            in_flight.skyboxes.insert(entity);
        }
    }
    stats.in_flight = in_flight.skyboxes.len() as u32;
}

#[allow(clippy::too_many_arguments)]
fn apply_skybox_results(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<SkyboxSettings>,
    async_mesh: Res<async_mesh::MeshAsyncResources>,
    mut in_flight: ResMut<async_mesh::MeshInFlight>,
    mut stats: ResMut<SkyboxBuildStats>,
    sources: Query<(), With<SkyboxSource>>,
) {
    let mut receiver = async_mesh
        .result_rx
        .lock()
        .expect("skybox result receiver lock poisoned");

    while let Ok(result) = receiver.try_recv() {
        in_flight.skyboxes.remove(&result.entity);

        if !sources.contains(result.entity) {
            debug!("skybox {:?} went away before its mesh finished", result.entity);
            continue;
        }

        let built = match result.outcome {
            Ok(built) => built,
            Err(err) => {
                warn!("skybox build failed for {:?}: {}", result.entity, err);
                stats.failed += 1;
                continue;
            }
        };

        let render_mesh = built
            .mesh
            .to_render_mesh(settings.far_radius, settings.dynamic_depth);
        let material = panorama_material(built.panorama, &mut images, &mut materials);
        info!(
            id = %built.id,
            vertices = built.mesh.vertex_count(),
            "skybox mesh ready in {:.1} ms",
            built.build_ms
        );

        commands.entity(result.entity).insert((
            Name::new(format!("Skybox[{}]", built.id)),
            WorldIdentity(built.id),
            Mesh3d(meshes.add(render_mesh)),
            MeshMaterial3d(material),
            SkyboxGeometry(Arc::new(built.mesh)),
            SkyboxDepthBlend {
                amount: settings.dynamic_depth,
                far_radius: settings.far_radius,
            },
        ));

        stats.built += 1;
        stats.last_build_ms = built.build_ms;
        stats.avg_build_ms = if stats.avg_build_ms == 0.0 {
            built.build_ms
        } else {
            stats.avg_build_ms * 0.9 + built.build_ms * 0.1
        };
    }
    stats.in_flight = in_flight.skyboxes.len() as u32;
}

fn panorama_material(
    panorama: Option<PanoramaPixels>,
    images: &mut Assets<Image>,
    materials: &mut Assets<StandardMaterial>,
) -> Handle<StandardMaterial> {
    let texture = panorama.map(|pixels| {
        let mut image = Image::new_fill(
            Extent3d {
                width: pixels.width,
                height: pixels.height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            &[0, 0, 0, 255],
            TextureFormat::Rgba8UnormSrgb,
            RenderAssetUsages::default(),
        );
        image.data = Some(pixels.rgba);

        let mut sampler = ImageSamplerDescriptor::linear();
        sampler.address_mode_u = ImageAddressMode::Repeat;
        sampler.address_mode_v = ImageAddressMode::ClampToEdge;
        image.sampler = ImageSampler::Descriptor(sampler);
        images.add(image)
    });

    materials.add(StandardMaterial {
        base_color: Color::WHITE,
        base_color_texture: texture,
        unlit: true,
        perceptual_roughness: 1.0,
        metallic: 0.0,
        ..default()
    })
}

fn apply_depth_blend(
    mut meshes: ResMut<Assets<Mesh>>,
    skyboxes: Query<(&SkyboxGeometry, Ref<SkyboxDepthBlend>, &Mesh3d)>,
) {
    for (geometry, blend, mesh3d) in &skyboxes {
        if blend.is_added() || !blend.is_changed() {
            continue;
        }
        if let Some(mesh) = meshes.get_mut(&mesh3d.0) {
            skybox_mesh::apply_blend(mesh, &geometry.0, blend.far_radius, blend.amount);
        }
    }
}
