use sky_utils::{ResolvedSkybox, SkyboxError, SkyboxResult, SkyboxSettings};
use tracing::debug;

use crate::depth::{DepthField, DepthGrid};
use crate::skybox_mesh::{DisplacedMesh, DisplacementParams, SphereMeshBuilder};
use crate::sphere::uv_sphere;
use crate::timing::Timing;

/// Decoded panorama, RGBA8, rows top to bottom.
#[derive(Debug, Clone)]
pub struct PanoramaPixels {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PanoramaPixels {
    pub fn open(path: &std::path::Path) -> SkyboxResult<Self> {
        if !path.exists() {
            return Err(SkyboxError::MissingAsset(path.to_path_buf()));
        }
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BuiltSkybox {
    pub id: String,
    pub mesh: DisplacedMesh,
    pub panorama: Option<PanoramaPixels>,
    pub build_ms: f32,
}

/// Depth grid to displaced mesh with the configured topology and limits.
pub fn reconstruct(grid: DepthGrid, settings: &SkyboxSettings) -> DisplacedMesh {
    let field = DepthField::new(grid);
    let topology = uv_sphere(1.0, settings.width_segments, settings.height_segments);
    SphereMeshBuilder::new(&field, DisplacementParams::from_settings(settings)).build(topology)
}

/// Blocking load of one skybox: depth decode, reconstruction and, when asked,
/// the panorama texels.
pub fn load_skybox(
    resolved: &ResolvedSkybox,
    settings: &SkyboxSettings,
    with_panorama: bool,
) -> SkyboxResult<BuiltSkybox> {
    let mut timing = Timing::start();
    let grid = DepthGrid::open(&resolved.depth_map, settings.depth_factor)?;
    debug!(
        id = %resolved.id,
        "depth grid {}x{} from {:?}",
        grid.width(),
        grid.height(),
        resolved.depth_map
    );
    timing.lap("depth decode");
    let mesh = reconstruct(grid, settings);
    timing.lap("reconstruct");
    let panorama = if with_panorama {
        let pixels = PanoramaPixels::open(&resolved.panorama)?;
        timing.lap("panorama decode");
        Some(pixels)
    } else {
        None
    };
    Ok(BuiltSkybox {
        id: resolved.id.clone(),
        mesh,
        panorama,
        build_ms: timing.ms(),
    })
}
