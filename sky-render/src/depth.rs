use std::path::Path;

use sky_utils::{SkyboxError, SkyboxResult};
use tracing::debug;

/// Row-major depth samples decoded from a grayscale depth map.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthGrid {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DepthGrid {
    /// Decodes luminance bytes with `depth = L / 255 * depth_factor`.
    pub fn from_luminance(
        width: usize,
        height: usize,
        luminance: &[u8],
        depth_factor: f32,
    ) -> SkyboxResult<Self> {
        if width == 0 || height == 0 {
            return Err(SkyboxError::InvalidDepthMap(format!(
                "empty depth map ({width}x{height})"
            )));
        }
        if luminance.len() != width * height {
            return Err(SkyboxError::InvalidDepthMap(format!(
                "expected {} luminance bytes for {width}x{height}, got {}",
                width * height,
                luminance.len()
            )));
        }
        let data = luminance
            .iter()
            .map(|&l| l as f32 / 255.0 * depth_factor)
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decodes an encoded depth image; the red channel carries the depth.
    pub fn from_image_bytes(bytes: &[u8], depth_factor: f32) -> SkyboxResult<Self> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let luminance: Vec<u8> = rgba.pixels().map(|p| p.0[0]).collect();
        debug!("decoded depth map {}x{}", width, height);
        Self::from_luminance(width as usize, height as usize, &luminance, depth_factor)
    }

    pub fn open(path: &Path, depth_factor: f32) -> SkyboxResult<Self> {
        if !path.exists() {
            return Err(SkyboxError::MissingAsset(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_image_bytes(&bytes, depth_factor)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

/// Continuous bilinear lookup over a [`DepthGrid`].
///
/// Coordinates are edge-clamped, never wrapped: horizontal continuity across
/// the panorama seam is up to the caller.
#[derive(Debug, Clone)]
pub struct DepthField {
    grid: DepthGrid,
}

impl DepthField {
    pub fn new(grid: DepthGrid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &DepthGrid {
        &self.grid
    }

    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let width = self.grid.width;
        let height = self.grid.height;

        // Non-finite inputs collapse onto the grid edge.
        let x = finite_or_zero(u * width as f32);
        let y = finite_or_zero(v * height as f32);

        let x1 = clamp_index(x.floor(), width);
        let y1 = clamp_index(y.floor(), height);
        let x2 = clamp_index(x.floor() + 1.0, width);
        let y2 = clamp_index(y.floor() + 1.0, height);

        let q11 = self.grid.at(x1, y1);
        let q21 = self.grid.at(x2, y1);
        let q12 = self.grid.at(x1, y2);
        let q22 = self.grid.at(x2, y2);

        let (r1, r2) = if x1 == x2 {
            (q11, q12)
        } else {
            let (x1f, x2f) = (x1 as f32, x2 as f32);
            let span = x2f - x1f;
            let w1 = (x2f - x) / span;
            let w2 = (x - x1f) / span;
            (w1 * q11 + w2 * q21, w1 * q12 + w2 * q22)
        };

        if y1 == y2 {
            return r1;
        }
        let (y1f, y2f) = (y1 as f32, y2 as f32);
        let span = y2f - y1f;
        (y2f - y) / span * r1 + (y - y1f) / span * r2
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f32::MIN, f32::MAX)
    }
}

fn clamp_index(value: f32, len: usize) -> usize {
    value.clamp(0.0, (len - 1) as f32) as usize
}

/// Wraps `u` into `[0, 1)`, negative inputs included.
pub fn wrap_unit(u: f32) -> f32 {
    let wrapped = u.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs.
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(width: usize, height: usize, luminance: &[u8]) -> DepthField {
        DepthField::new(DepthGrid::from_luminance(width, height, luminance, 10.0).unwrap())
    }

    #[test]
    fn luminance_maps_linearly_to_depth() {
        let grid = DepthGrid::from_luminance(3, 1, &[0, 51, 255], 10.0).unwrap();
        assert_eq!(grid.at(0, 0), 0.0);
        assert!((grid.at(1, 0) - 2.0).abs() < 1e-6);
        assert!((grid.at(2, 0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let err = DepthGrid::from_luminance(4, 4, &[0; 15], 10.0).unwrap_err();
        assert!(matches!(err, SkyboxError::InvalidDepthMap(_)));
        assert!(DepthGrid::from_luminance(0, 4, &[], 10.0).is_err());
    }

    #[test]
    fn interpolates_between_columns() {
        // Pixel centres sit on integer coordinates: x = u * width.
        let f = field(2, 1, &[0, 255]);
        assert!((f.sample(0.25, 0.0) - 5.0).abs() < 1e-5);
        assert!((f.sample(0.0, 0.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn clamps_instead_of_wrapping() {
        let f = field(2, 2, &[0, 255, 0, 255]);
        assert!((f.sample(5.0, 0.5) - 10.0).abs() < 1e-6);
        assert!((f.sample(-3.0, 0.5) - 0.0).abs() < 1e-6);
        assert!((f.sample(0.5, -7.0) - f.sample(0.5, 0.0)).abs() < 1e-6);
    }

    #[test]
    fn degenerate_grids_never_divide_by_zero() {
        let column = field(1, 3, &[10, 20, 30]);
        let row = field(3, 1, &[10, 20, 30]);
        let single = field(1, 1, &[51]);
        for &(u, v) in &[(0.0, 0.0), (0.5, 0.5), (0.99, 0.99), (1.0, 1.0), (-1.0, 2.0)] {
            assert!(column.sample(u, v).is_finite());
            assert!(row.sample(u, v).is_finite());
            assert!((single.sample(u, v) - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn non_finite_inputs_are_total() {
        let f = field(2, 2, &[0, 64, 128, 255]);
        for &(u, v) in &[
            (f32::NAN, 0.5),
            (0.5, f32::NAN),
            (f32::INFINITY, f32::NEG_INFINITY),
        ] {
            assert!(f.sample(u, v).is_finite());
        }
    }

    #[test]
    fn seam_is_continuous_after_wrapping() {
        let luminance: Vec<u8> = (0..64u32).map(|i| (i * 7 % 256) as u8).collect();
        let f = field(8, 8, &luminance);
        for step in 0..=16 {
            let v = step as f32 / 16.0;
            assert_eq!(f.sample(wrap_unit(0.0), v), f.sample(wrap_unit(1.0), v));
        }
    }

    #[test]
    fn wrap_handles_negative_input() {
        assert!((wrap_unit(-0.25) - 0.75).abs() < 1e-6);
        assert!((wrap_unit(1.25) - 0.25).abs() < 1e-6);
        assert_eq!(wrap_unit(1.0), 0.0);
        let tiny = wrap_unit(-1e-10);
        assert!((0.0..1.0).contains(&tiny));
    }
}
