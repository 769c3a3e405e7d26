use std::path::{Path, PathBuf};

use bevy::ecs::resource::Resource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod error;
pub use error::{SkyboxError, SkyboxResult};

pub const SKYBOX_ASSETS_ROOT_ENV: &str = "SKYBOX_ASSETS_ROOT";

pub fn skybox_assets_root() -> PathBuf {
    if let Ok(explicit) = std::env::var(SKYBOX_ASSETS_ROOT_ENV) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return path;
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        let sibling_assets = exe_dir.join("assets");
        if sibling_assets.exists() {
            return sibling_assets;
        }
    }

    let repo_assets = Path::new(env!("CARGO_MANIFEST_DIR")).join("../sky-client/assets");
    if repo_assets.exists() {
        return repo_assets;
    }

    PathBuf::from("assets")
}

/// Skybox asset pair as published by the generator service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkyboxDescriptor {
    pub id: String,
    pub file_url: String,
    pub depth_map_url: String,
}

impl SkyboxDescriptor {
    pub fn from_json(text: &str) -> SkyboxResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> SkyboxResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let descriptor = Self::from_json(&text)?;
        debug!(id = %descriptor.id, "loaded skybox descriptor from {:?}", path);
        Ok(descriptor)
    }

    /// Resolves the panorama and depth map paths against `base`.
    pub fn resolve(&self, base: &Path) -> ResolvedSkybox {
        ResolvedSkybox {
            id: self.id.clone(),
            panorama: resolve_asset(base, &self.file_url),
            depth_map: resolve_asset(base, &self.depth_map_url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSkybox {
    pub id: String,
    pub panorama: PathBuf,
    pub depth_map: PathBuf,
}

fn resolve_asset(base: &Path, url: &str) -> PathBuf {
    let trimmed = url.strip_prefix("file://").unwrap_or(url);
    let path = Path::new(trimmed);
    if path.is_absolute() {
        // Root-relative urls ("/skyboxes/x.png") live under the assets root.
        let relative = path.strip_prefix("/").unwrap_or(path);
        let under_root = skybox_assets_root().join(relative);
        if under_root.exists() {
            return under_root;
        }
        return path.to_path_buf();
    }
    base.join(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnPolicy {
    /// Uniform pick among cells whose whole neighbourhood hit.
    #[default]
    RandomValid,
    /// The hit at the middle of the grid, valid or not.
    GridCenter,
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyboxSettings {
    pub depth_factor: f32,
    pub scale: f32,
    pub min: f32,
    pub max: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub raycast_resolution: usize,
    pub floor_radius: usize,
    pub raycast_max_distance: f32,
    pub spawn_policy: SpawnPolicy,
    pub seed: Option<u64>,
    pub physics: bool,
    pub dynamic_depth: f32,
    pub far_radius: f32,
    pub eye_height: f32,
    pub show_hit_map: bool,
}

impl Default for SkyboxSettings {
    fn default() -> Self {
        Self {
            depth_factor: 10.0,
            scale: 10.0,
            min: 0.1,
            max: 10.0,
            width_segments: 64,
            height_segments: 32,
            raycast_resolution: 128,
            floor_radius: 5,
            raycast_max_distance: 1000.0,
            spawn_policy: SpawnPolicy::RandomValid,
            seed: None,
            physics: true,
            dynamic_depth: 1.0,
            far_radius: 20.0,
            eye_height: 1.5,
            show_hit_map: false,
        }
    }
}

impl SkyboxSettings {
    pub fn from_toml(text: &str) -> SkyboxResult<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the displacement clamp and the floor grid cannot work with.
    pub fn validate(&self) -> SkyboxResult<()> {
        let floats = [
            ("depth_factor", self.depth_factor),
            ("scale", self.scale),
            ("min", self.min),
            ("max", self.max),
            ("raycast_max_distance", self.raycast_max_distance),
            ("dynamic_depth", self.dynamic_depth),
            ("far_radius", self.far_radius),
            ("eye_height", self.eye_height),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SkyboxError::InvalidConfig(format!("{name} must be finite, got {value}")));
        }
        if self.scale <= 0.0 {
            return Err(SkyboxError::InvalidConfig(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if self.min <= 0.0 {
            return Err(SkyboxError::InvalidConfig(format!(
                "min must be positive, got {}",
                self.min
            )));
        }
        if self.min > self.max {
            return Err(SkyboxError::InvalidConfig(format!(
                "min ({}) is greater than max ({})",
                self.min, self.max
            )));
        }
        if self.raycast_resolution == 0 {
            return Err(SkyboxError::InvalidConfig(
                "raycast_resolution must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Reads settings from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> SkyboxResult<Self> {
        if !path.exists() {
            info!("no skybox config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_uses_camel_case_keys() {
        let json = r#"{"id":"f2a94","fileUrl":"pano.jpg","depthMapUrl":"pano_depth.png"}"#;
        let descriptor = SkyboxDescriptor::from_json(json).unwrap();
        assert_eq!(descriptor.id, "f2a94");
        assert_eq!(descriptor.file_url, "pano.jpg");
        assert_eq!(descriptor.depth_map_url, "pano_depth.png");
    }

    #[test]
    fn descriptor_resolves_relative_paths_against_base() {
        let descriptor = SkyboxDescriptor {
            id: "a".into(),
            file_url: "pano.jpg".into(),
            depth_map_url: "file://depth/pano.png".into(),
        };
        let resolved = descriptor.resolve(Path::new("/data/skyboxes"));
        assert_eq!(resolved.panorama, PathBuf::from("/data/skyboxes/pano.jpg"));
        assert_eq!(resolved.depth_map, PathBuf::from("/data/skyboxes/depth/pano.png"));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let settings = SkyboxSettings::from_toml(
            "raycast_resolution = 64\nspawn_policy = \"grid_center\"\nseed = 7\n",
        )
        .unwrap();
        assert_eq!(settings.raycast_resolution, 64);
        assert_eq!(settings.spawn_policy, SpawnPolicy::GridCenter);
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.depth_factor, 10.0);
        assert_eq!(settings.width_segments, 64);
    }

    #[test]
    fn bad_config_is_an_error() {
        let err = SkyboxSettings::from_toml("scale = \"far\"").unwrap_err();
        assert!(matches!(err, SkyboxError::Toml(_)));
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let err = SkyboxSettings::from_toml("min = 20.0\nmax = 10.0\n").unwrap_err();
        assert!(matches!(err, SkyboxError::InvalidConfig(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for text in [
            "scale = -10.0",
            "scale = 0.0",
            "min = 0.0",
            "max = nan",
            "far_radius = inf",
            "raycast_resolution = 0",
        ] {
            let err = SkyboxSettings::from_toml(text).unwrap_err();
            assert!(matches!(err, SkyboxError::InvalidConfig(_)), "{text}");
        }
    }

    #[test]
    fn invalid_config_file_fails_to_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("skybox.toml");
        std::fs::write(&path, "min = 20.0\nmax = 10.0\n").unwrap();
        let err = SkyboxSettings::load(&path).unwrap_err();
        assert!(matches!(err, SkyboxError::InvalidConfig(_)));
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(SkyboxSettings::default().validate().is_ok());
    }

    #[test]
    fn missing_config_file_means_defaults() {
        let settings =
            SkyboxSettings::load(Path::new("/nonexistent/skybox-config.toml")).unwrap();
        assert_eq!(settings, SkyboxSettings::default());
    }
}
