//! The medium: an ordered stack of layers, optional acoustic field maps,
//! exit detectors and the shared planar fluence accumulator.
//!
//! During a time index the medium is read-only for every walker; only the
//! driver rebinds field frames between indices. The planar array is guarded
//! by a mutex and written in bulk, once per walker, at the end of its
//! cycles.

use crate::common::{min, Float};
use crate::detector::{CircularDetector, DetectorPlane};
use crate::error::{Error, Result};
use crate::field::{ScalarField, VectorField};
use crate::geometry::{Axis, Point3f, Vector3f};
use crate::layer::Layer;
use crate::logger::Logger;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Number of radial bins; the planar array holds one extra saturation bin
/// for r >= radial_size.
pub const MAX_BINS: usize = 100;

/// Default radial range covered by the planar bins (cm).
const DEFAULT_RADIAL_SIZE: Float = 3.0;

/// The layered medium photons propagate through.
#[derive(Debug)]
pub struct Medium {
    /// Extent of the medium along x (cm).
    x_bound: Float,

    /// Extent of the medium along y (cm).
    y_bound: Float,

    /// Extent of the medium along z (cm).
    z_bound: Float,

    /// Layers sorted by depth_start, partitioning [0, z_bound].
    layers: Vec<Layer>,

    /// Exit-aperture detectors.
    detectors: Vec<CircularDetector>,

    /// Optional acoustic pressure frames.
    pressure: Option<ScalarField>,

    /// Optional acoustic displacement frames.
    displacement: Option<VectorField>,

    /// Radial range covered by the planar bins (cm).
    radial_size: Float,

    /// Width of one radial bin (cm).
    radial_bin_size: Float,

    /// Planar fluence accumulator; the last bin saturates.
    planar: Mutex<Vec<Float>>,
}

impl Medium {
    /// Create a new `Medium` with no layers, detectors or fields.
    ///
    /// * `x_bound` - Extent of the medium along x (cm).
    /// * `y_bound` - Extent of the medium along y (cm).
    /// * `z_bound` - Extent of the medium along z (cm).
    pub fn new(x_bound: Float, y_bound: Float, z_bound: Float) -> Self {
        Self {
            x_bound,
            y_bound,
            z_bound,
            layers: Vec::new(),
            detectors: Vec::new(),
            pressure: None,
            displacement: None,
            radial_size: DEFAULT_RADIAL_SIZE,
            radial_bin_size: DEFAULT_RADIAL_SIZE / MAX_BINS as Float,
            planar: Mutex::new(vec![0.0; MAX_BINS + 1]),
        }
    }

    /// Append a layer. Layers must be added top-down; `validate` checks the
    /// stack partitions the z-axis contiguously.
    ///
    /// * `layer` - The layer.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Add an exit-aperture detector.
    ///
    /// * `detector` - The detector.
    pub fn add_detector(&mut self, detector: CircularDetector) {
        self.detectors.push(detector);
    }

    /// Bind an acoustic pressure field.
    ///
    /// * `field` - The field.
    pub fn set_pressure_field(&mut self, field: ScalarField) {
        self.pressure = Some(field);
    }

    /// Bind an acoustic displacement field.
    ///
    /// * `field` - The field.
    pub fn set_displacement_field(&mut self, field: VectorField) {
        self.displacement = Some(field);
    }

    /// Override the radial range covered by the planar bins.
    ///
    /// * `radial_size` - The radial range (cm).
    pub fn set_radial_size(&mut self, radial_size: Float) {
        self.radial_size = radial_size;
        self.radial_bin_size = radial_size / MAX_BINS as Float;
    }

    /// Check the configured geometry. Fatal at initialization.
    pub fn validate(&self) -> Result<()> {
        if self.x_bound <= 0.0 || self.y_bound <= 0.0 || self.z_bound <= 0.0 {
            return Err(Error::Config(format!(
                "medium dimensions must be positive, got ({}, {}, {})",
                self.x_bound, self.y_bound, self.z_bound
            )));
        }
        if self.radial_size <= 0.0 {
            return Err(Error::Config(format!(
                "radial size must be positive, got {}",
                self.radial_size
            )));
        }
        if self.layers.is_empty() {
            return Err(Error::Config("medium has no layers".to_string()));
        }

        let mut expected_start = 0.0;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.depth_start() != expected_start {
                return Err(Error::Config(format!(
                    "layer {i} starts at {} but the layer stack reaches {expected_start}",
                    layer.depth_start()
                )));
            }
            if layer.depth_end() <= layer.depth_start() {
                return Err(Error::Config(format!(
                    "layer {i} has non-positive thickness [{}, {}]",
                    layer.depth_start(),
                    layer.depth_end()
                )));
            }
            if layer.mu_a() < 0.0 || layer.mu_s() < 0.0 {
                return Err(Error::Config(format!(
                    "layer {i} has negative optical coefficients"
                )));
            }
            if !(-1.0..=1.0).contains(&layer.anisotropy()) {
                return Err(Error::Config(format!(
                    "layer {i} anisotropy {} outside [-1, 1]",
                    layer.anisotropy()
                )));
            }
            if layer.refractive_index() < 1.0 {
                return Err(Error::Config(format!(
                    "layer {i} refractive index {} below 1",
                    layer.refractive_index()
                )));
            }
            for absorber in layer.absorbers() {
                let (lo, hi) = absorber.bounds();
                let inside_layer = lo.z >= layer.depth_start() && hi.z <= layer.depth_end();
                let inside_box = lo.x >= 0.0
                    && lo.y >= 0.0
                    && hi.x <= self.x_bound
                    && hi.y <= self.y_bound;
                if !inside_layer || !inside_box {
                    return Err(Error::Config(format!(
                        "absorber '{}' does not fit inside layer {i}",
                        absorber.label()
                    )));
                }
            }
            expected_start = layer.depth_end();
        }
        if expected_start != self.z_bound {
            return Err(Error::Config(format!(
                "layer stack ends at {expected_start} but the medium depth is {}",
                self.z_bound
            )));
        }

        for detector in &self.detectors {
            let c = detector.center();
            let on_face = match detector.plane() {
                DetectorPlane::XY => c.z == 0.0 || c.z == self.z_bound,
                DetectorPlane::XZ => c.y == 0.0 || c.y == self.y_bound,
                DetectorPlane::YZ => c.x == 0.0 || c.x == self.x_bound,
            };
            if !on_face {
                return Err(Error::Config(format!(
                    "detector at ({}, {}, {}) does not lie on a medium face",
                    c.x, c.y, c.z
                )));
            }
        }
        Ok(())
    }

    /// Returns the index of the layer at a depth. At a shared boundary the
    /// upper layer wins.
    ///
    /// * `z` - The depth.
    pub fn layer_index_of(&self, z: Float) -> usize {
        assert!(
            z >= 0.0 && z <= self.z_bound,
            "photon depth {z} outside the medium [0, {}]",
            self.z_bound
        );
        self.layers
            .iter()
            .position(|layer| layer.contains_depth(z))
            .unwrap_or_else(|| panic!("no layer found for depth {z}"))
    }

    /// Returns the layer at an index.
    ///
    /// * `index` - The layer index.
    pub fn layer(&self, index: usize) -> &Layer {
        &self.layers[index]
    }

    /// Returns the index of the layer above, or `None` at the top.
    ///
    /// * `index` - The current layer index.
    pub fn layer_above(&self, index: usize) -> Option<usize> {
        index.checked_sub(1)
    }

    /// Returns the index of the layer below, or `None` at the bottom.
    ///
    /// * `index` - The current layer index.
    pub fn layer_below(&self, index: usize) -> Option<usize> {
        if index + 1 < self.layers.len() {
            Some(index + 1)
        } else {
            None
        }
    }

    /// Returns the layers.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the extent of the medium along x (cm).
    pub fn x_bound(&self) -> Float {
        self.x_bound
    }

    /// Returns the extent of the medium along y (cm).
    pub fn y_bound(&self) -> Float {
        self.y_bound
    }

    /// Returns the extent of the medium along z (cm).
    pub fn z_bound(&self) -> Float {
        self.z_bound
    }

    /// Returns the extent of the medium along an axis (cm).
    ///
    /// * `axis` - The axis.
    pub fn bound(&self, axis: Axis) -> Float {
        match axis {
            Axis::X => self.x_bound,
            Axis::Y => self.y_bound,
            Axis::Z => self.z_bound,
        }
    }

    /// Returns the acoustic pressure at a point, if a pressure field is
    /// bound.
    ///
    /// * `p` - The point.
    pub fn pressure_at(&self, p: &Point3f) -> Option<Float> {
        self.pressure.as_ref().map(|f| f.sample(p))
    }

    /// Returns the acoustic displacement at a point, if a displacement
    /// field is bound.
    ///
    /// * `p` - The point.
    pub fn displacement_at(&self, p: &Point3f) -> Option<Vector3f> {
        self.displacement.as_ref().map(|f| f.sample(p))
    }

    /// Returns the bound displacement field.
    pub fn displacement_field(&self) -> Option<&VectorField> {
        self.displacement.as_ref()
    }

    /// Load the pressure and displacement frames for a time index. Called
    /// by the driver only, between time indices, while no walker is running.
    ///
    /// * `t` - The time index.
    pub fn bind_frames(&mut self, t: usize) -> Result<()> {
        if let Some(pressure) = self.pressure.as_mut() {
            pressure.load_frame(t)?;
        }
        if let Some(displacement) = self.displacement.as_mut() {
            displacement.load_frame(t)?;
        }
        Ok(())
    }

    /// Add energy to one planar bin. Thread-safe; out-of-range bins land in
    /// the saturation bin.
    ///
    /// * `ir`     - The radial bin index.
    /// * `energy` - The energy to add.
    pub fn planar_accumulate(&self, ir: usize, energy: Float) {
        let mut planar = self.planar.lock().unwrap();
        planar[min(ir, MAX_BINS)] += energy;
    }

    /// Merge a walker-local shadow array into the planar accumulator.
    ///
    /// * `local` - The walker-local bins; must have MAX_BINS + 1 entries.
    pub fn absorb_energy(&self, local: &[Float]) {
        debug_assert_eq!(local.len(), MAX_BINS + 1);
        let mut planar = self.planar.lock().unwrap();
        for (bin, energy) in planar.iter_mut().zip(local) {
            *bin += energy;
        }
    }

    /// Returns a snapshot of the planar accumulator.
    pub fn planar_bins(&self) -> Vec<Float> {
        self.planar.lock().unwrap().clone()
    }

    /// Returns the width of one radial bin (cm).
    pub fn radial_bin_size(&self) -> Float {
        self.radial_bin_size
    }

    /// Returns the radial range covered by the planar bins (cm).
    pub fn radial_size(&self) -> Float {
        self.radial_size
    }

    /// Returns how many detectors the segment from `p_prev` to `p_curr`
    /// passes through.
    ///
    /// * `p_prev` - Segment start.
    /// * `p_curr` - Segment end.
    pub fn detectors_crossed(&self, p_prev: &Point3f, p_curr: &Point3f) -> usize {
        self.detectors
            .iter()
            .filter(|d| d.crossed_by(p_prev, p_curr))
            .count()
    }

    /// Returns the exit-aperture detectors.
    pub fn detectors(&self) -> &[CircularDetector] {
        &self.detectors
    }

    /// Dump the planar fluence to a file, one line per radial bin:
    /// bin-center radius (fixed, 5 decimals) and planar fluence
    /// (scientific, 3 decimals), normalized by photon count, bin width and
    /// the absorption coefficient of the topmost absorbing layer. A
    /// non-absorbing top layer (air) must not poison the divisor, and a
    /// medium with no absorbing layer at all has nothing to normalize by,
    /// so the dump is skipped.
    ///
    /// * `path`      - The output file.
    /// * `n_photons` - Total photons launched.
    pub fn write_fluence(&self, path: &Path, n_photons: usize) -> Result<()> {
        let mu_a = match self.layers.iter().map(Layer::mu_a).find(|&mu_a| mu_a > 0.0) {
            Some(mu_a) => mu_a,
            None => {
                warn!("no absorbing layer; skipping the fluence dump");
                return Ok(());
            }
        };
        let planar = self.planar.lock().unwrap();
        let mut output = BufWriter::new(File::create(path)?);
        for (ir, bin) in planar.iter().enumerate() {
            let r = (ir as Float + 0.5) * self.radial_bin_size;
            let fluence = bin / n_photons as Float / self.radial_bin_size / mu_a;
            writeln!(output, "{r:.5}\t{fluence:.3e}")?;
        }
        output.flush()?;
        Ok(())
    }

    /// Write every absorber's deposited energy to the logger's absorber
    /// sink.
    ///
    /// * `logger` - The logger.
    pub fn report_absorbers(&self, logger: &Logger) -> Result<()> {
        for layer in &self.layers {
            for absorber in layer.absorbers() {
                logger.write_absorber_record(absorber.label(), absorber.deposited_energy())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer_medium() -> Medium {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.0, 0.001, 1.0, 1.0, 0.0, 0.1));
        medium.add_layer(Layer::new(0.1, 7.3, 1.33, 0.9, 0.1, 2.0));
        medium
    }

    #[test]
    fn valid_two_layer_stack() {
        assert!(two_layer_medium().validate().is_ok());
    }

    #[test]
    fn gap_in_layer_stack_is_rejected() {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.0, 0.001, 1.0, 1.0, 0.0, 0.1));
        medium.add_layer(Layer::new(0.1, 7.3, 1.33, 0.9, 0.2, 2.0));
        assert!(matches!(medium.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn short_layer_stack_is_rejected() {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.1, 7.3, 1.33, 0.9, 0.0, 1.5));
        assert!(matches!(medium.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn off_face_detector_is_rejected() {
        let mut medium = two_layer_medium();
        medium.add_detector(CircularDetector::new(
            Point3f::new(1.0, 1.0, 1.0),
            0.5,
            DetectorPlane::XY,
        ));
        assert!(matches!(medium.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn bottom_face_detector_is_accepted() {
        let mut medium = two_layer_medium();
        medium.add_detector(CircularDetector::new(
            Point3f::new(1.0, 1.0, 2.0),
            1.0,
            DetectorPlane::XY,
        ));
        assert!(medium.validate().is_ok());
    }

    #[test]
    fn shared_boundary_belongs_to_the_upper_layer() {
        let medium = two_layer_medium();
        assert_eq!(medium.layer_index_of(0.1), 0);
        assert_eq!(medium.layer_index_of(0.100001), 1);
        assert_eq!(medium.layer_index_of(0.0), 0);
        assert_eq!(medium.layer_index_of(2.0), 1);
    }

    #[test]
    #[should_panic]
    fn depth_outside_the_medium_panics() {
        two_layer_medium().layer_index_of(2.5);
    }

    #[test]
    fn layer_navigation_by_index() {
        let medium = two_layer_medium();
        assert_eq!(medium.layer_above(0), None);
        assert_eq!(medium.layer_above(1), Some(0));
        assert_eq!(medium.layer_below(0), Some(1));
        assert_eq!(medium.layer_below(1), None);
    }

    #[test]
    fn planar_accumulate_saturates() {
        let medium = two_layer_medium();
        medium.planar_accumulate(0, 0.5);
        medium.planar_accumulate(MAX_BINS + 50, 0.25);
        let bins = medium.planar_bins();
        assert_eq!(bins[0], 0.5);
        assert_eq!(bins[MAX_BINS], 0.25);
    }

    #[test]
    fn bulk_merge_adds_bins() {
        let medium = two_layer_medium();
        let mut local = vec![0.0; MAX_BINS + 1];
        local[3] = 1.5;
        medium.absorb_energy(&local);
        medium.absorb_energy(&local);
        assert_eq!(medium.planar_bins()[3], 3.0);
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("aomc-medium-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn fluence_normalizes_by_the_first_absorbing_layer() {
        // Air on top: its µa = 0 must not end up in the divisor.
        let medium = two_layer_medium();
        medium.planar_accumulate(0, 1.0);
        let path = temp_path("fluences-air-top.txt");
        medium.write_fluence(&path, 100).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), MAX_BINS + 1);
        let first: Vec<&str> = contents.lines().next().unwrap().split_whitespace().collect();
        let fluence: Float = first[1].parse().unwrap();
        assert!(fluence.is_finite());
        let expected = 1.0 / 100.0 / medium.radial_bin_size() / 0.1;
        assert!((fluence - expected).abs() < 1e-3 * expected);
        for line in contents.lines() {
            let f: Float = line.split_whitespace().nth(1).unwrap().parse().unwrap();
            assert!(f.is_finite(), "non-finite fluence in {line:?}");
        }
    }

    #[test]
    fn fluence_dump_is_skipped_without_an_absorbing_layer() {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.0, 1.0, 1.0, 0.0, 0.0, 2.0));
        medium.planar_accumulate(0, 1.0);
        let path = temp_path("fluences-no-absorber.txt");
        medium.write_fluence(&path, 100).unwrap();
        assert!(!path.exists());
    }
}
