//! Photon walker: the hop/drop/spin/roulette state machine.
//!
//! One `Photon` value is owned by one worker thread and reused for K
//! cycles. Each cycle injects a full-weight packet at the illumination
//! point, random-walks it until roulette kills it or it escapes through a
//! medium face, then resets. The walker reads the shared `Medium` without
//! locking; the only synchronization points are absorber deposits, exit
//! records and the once-per-walker merge of its shadow fluence bins.

use crate::common::{
    abs, max, min, sign, Float, INFINITY, ONE_MINUS_COS_ZERO, PI, ROULETTE_CHANCE, TWO_PI,
    WEIGHT_THRESHOLD,
};
use crate::error::Result;
use crate::fresnel;
use crate::geometry::{Axis, Point3f, Vector3f};
use crate::logger::Logger;
use crate::medium::{Medium, MAX_BINS};
use crate::rng::HybridTaus;

/// How the initial trajectory of each cycle is chosen.
#[derive(Copy, Clone, Debug)]
pub enum Source {
    /// Diffuse source: random θ and ψ with the z direction cosine pinned
    /// to 1.
    Diffuse,

    /// Collimated beam with a fixed initial direction.
    Pencil(Vector3f),
}

/// A boundary cutting the projected step short.
#[derive(Copy, Clone, Debug)]
enum BoundaryHit {
    /// An outer face of the medium box.
    Face {
        /// Axis whose face was hit.
        axis: Axis,

        /// Coordinate of the face on that axis (0 or the bound).
        plane: Float,
    },

    /// An interface between two layers.
    Interface {
        /// Depth of the interface.
        depth: Float,
    },
}

/// Energy bookkeeping for one walker, aggregated over its cycles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WalkerSummary {
    /// Completed propagation cycles.
    pub cycles: usize,

    /// Executed hops across all cycles.
    pub steps: u64,

    /// Photons that left the medium.
    pub escaped: usize,

    /// Total weight carried out of the medium.
    pub escaped_weight: Float,

    /// Photons that left through a detector aperture.
    pub exits: usize,

    /// Total weight carried out through detector apertures.
    pub exit_weight: Float,

    /// Detector exits that had interacted with an absorber.
    pub tagged_exits: usize,

    /// Photons killed by roulette.
    pub roulette_deaths: usize,

    /// Total weight lost to roulette kills.
    pub roulette_residual: Float,

    /// Total weight added by roulette survival bumps.
    pub roulette_gain: Float,

    /// Total weight lost to specular reflection at layer interfaces.
    pub specular_loss: Float,
}

impl WalkerSummary {
    /// Fold another walker's totals into this one.
    ///
    /// * `other` - The totals to fold in.
    pub fn merge(&mut self, other: &WalkerSummary) {
        self.cycles += other.cycles;
        self.steps += other.steps;
        self.escaped += other.escaped;
        self.escaped_weight += other.escaped_weight;
        self.exits += other.exits;
        self.exit_weight += other.exit_weight;
        self.tagged_exits += other.tagged_exits;
        self.roulette_deaths += other.roulette_deaths;
        self.roulette_residual += other.roulette_residual;
        self.roulette_gain += other.roulette_gain;
        self.specular_loss += other.specular_loss;
    }
}

/// The photon walker.
pub struct Photon<'a> {
    /// The shared medium, read-only for the lifetime of the walker.
    medium: &'a Medium,

    /// The shared output sinks.
    logger: &'a Logger,

    /// Walker-private random number generator.
    rng: HybridTaus,

    /// How each cycle's initial trajectory is chosen.
    source: Source,

    /// Injection point of every cycle.
    illumination: Point3f,

    /// Current position.
    pos: Point3f,

    /// Position before the last hop.
    prev_pos: Point3f,

    /// Direction cosines.
    dir: Vector3f,

    /// Packet weight.
    weight: Float,

    /// False once the packet has been terminated.
    alive: bool,

    /// True once the packet has interacted with an absorber.
    tagged: bool,

    /// Current step size.
    step: Float,

    /// Dimensionless step left over after a boundary cut the last step
    /// short, stored scaled by µt.
    step_remainder: Float,

    /// Index of the layer the photon is currently in.
    layer: usize,

    /// Accumulated optical path length, displacement-adjusted while a
    /// displacement field is bound.
    path_length: Float,

    /// Transmission angle of the most recent interface evaluation.
    transmission_angle: Float,

    /// Hops executed in the current cycle.
    num_steps: u64,

    /// Walker-local shadow of the medium's planar fluence bins.
    local_planar: Vec<Float>,

    /// Trajectory of the current cycle, when path tracing is enabled.
    trace: Option<Vec<Point3f>>,

    /// Energy bookkeeping across cycles.
    summary: WalkerSummary,
}

impl<'a> Photon<'a> {
    /// Create a new `Photon` ready to start its first cycle. The medium
    /// must already be validated.
    ///
    /// * `medium`       - The shared medium.
    /// * `logger`       - The shared output sinks.
    /// * `seeds`        - RNG seed words, each >= 128.
    /// * `illumination` - Injection point of every cycle.
    /// * `source`       - How each cycle's initial trajectory is chosen.
    /// * `trace_paths`  - Record the trajectory of every cycle.
    pub fn new(
        medium: &'a Medium,
        logger: &'a Logger,
        seeds: [u32; 4],
        illumination: Point3f,
        source: Source,
        trace_paths: bool,
    ) -> Self {
        let mut photon = Self {
            medium,
            logger,
            rng: HybridTaus::new(seeds),
            source,
            illumination,
            pos: illumination,
            prev_pos: illumination,
            dir: Vector3f::zero(),
            weight: 1.0,
            alive: true,
            tagged: false,
            step: 0.0,
            step_remainder: 0.0,
            layer: 0,
            path_length: 0.0,
            transmission_angle: 0.0,
            num_steps: 0,
            local_planar: vec![0.0; MAX_BINS + 1],
            trace: trace_paths.then(Vec::new),
            summary: WalkerSummary::default(),
        };
        photon.init_cycle();
        photon
    }

    /// Propagate the given number of full-weight packets, then merge the
    /// walker-local fluence bins into the medium. Call once per walker.
    ///
    /// * `cycles` - Packets to propagate.
    pub fn run(&mut self, cycles: usize) -> Result<WalkerSummary> {
        for _ in 0..cycles {
            while self.alive {
                self.set_step_size();
                match self.next_boundary() {
                    Some(hit) => {
                        self.hop(Some(hit));
                        self.transmit_or_reflect(hit)?;
                    }
                    None => {
                        self.hop(None);
                        self.drop_weight();
                        self.spin();
                        self.roulette();
                    }
                }
            }
            if let Some(points) = self.trace.as_ref() {
                self.logger.write_path(points)?;
            }
            self.summary.steps += self.num_steps;
            self.summary.cycles += 1;
            self.init_cycle();
        }
        self.medium.absorb_energy(&self.local_planar);
        Ok(self.summary.clone())
    }

    /// Reset the packet state for the next cycle.
    fn init_cycle(&mut self) {
        self.alive = true;
        self.weight = 1.0;
        self.tagged = false;
        self.step = 0.0;
        self.step_remainder = 0.0;
        self.path_length = 0.0;
        self.transmission_angle = 0.0;
        self.num_steps = 0;
        self.pos = self.illumination;
        self.prev_pos = self.illumination;
        self.init_trajectory();
        self.layer = self.medium.layer_index_of(self.pos.z);
        if let Some(points) = self.trace.as_mut() {
            points.clear();
            points.push(self.pos);
        }
    }

    /// Set the initial direction cosines for this cycle.
    fn init_trajectory(&mut self) {
        match self.source {
            Source::Pencil(dir) => self.dir = dir,
            Source::Diffuse => {
                let cos_theta = 2.0 * self.rng.next() - 1.0;
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
                let psi = TWO_PI * self.rng.next();
                // The z direction cosine pinned to 1 is the source
                // convention of the illumination model.
                self.dir = Vector3f::new(sin_theta * psi.cos(), sin_theta * psi.sin(), 1.0);
            }
        }
    }

    /// Returns µa + µs of the current layer at the current position.
    fn current_mu_t(&self) -> Float {
        self.medium.layer(self.layer).total_attenuation(&self.pos)
    }

    /// Draw the next step size, or convert the remainder saved at the last
    /// boundary into a step in the current medium.
    fn set_step_size(&mut self) {
        let mu_t = self.current_mu_t();
        if self.step_remainder == 0.0 {
            let rnd = self.rng.next();
            self.step = if mu_t > 0.0 { -rnd.ln() / mu_t } else { INFINITY };
        } else {
            self.step = if mu_t > 0.0 {
                self.step_remainder / mu_t
            } else {
                INFINITY
            };
            self.step_remainder = 0.0;
        }
    }

    /// Find the nearest boundary the projected step crosses, clip the step
    /// to it and save the unused remainder. Among equal distances a medium
    /// face wins over a layer interface and x wins over y over z.
    fn next_boundary(&mut self) -> Option<BoundaryHit> {
        let layer = self.medium.layer(self.layer);
        let mu_t = layer.total_attenuation(&self.pos);

        let mut nearest: Option<(Float, BoundaryHit)> = None;
        for axis in Axis::ALL {
            let d = self.dir[axis];
            if d == 0.0 {
                continue;
            }
            let p = self.pos[axis];
            let bound = self.medium.bound(axis);
            let projected = p + self.step * d;
            if projected >= bound || projected <= 0.0 {
                let (dist, plane) = if d > 0.0 {
                    ((bound - p) / d, bound)
                } else {
                    ((p / d).abs(), 0.0)
                };
                if nearest.map_or(true, |(best, _)| dist < best) {
                    nearest = Some((dist, BoundaryHit::Face { axis, plane }));
                }
            }
        }

        if self.dir.z != 0.0 {
            let depth = if self.dir.z > 0.0 {
                layer.depth_end()
            } else {
                layer.depth_start()
            };
            let dist = max(0.0, (depth - self.pos.z) / self.dir.z);
            if nearest.map_or(true, |(best, _)| dist < best) {
                nearest = Some((dist, BoundaryHit::Interface { depth }));
            }
        }

        match nearest {
            Some((dist, hit)) if self.step > dist => {
                self.step_remainder = if self.step.is_finite() && mu_t > 0.0 {
                    (self.step - dist) * mu_t
                } else {
                    0.0
                };
                self.step = dist;
                Some(hit)
            }
            _ => None,
        }
    }

    /// Move the photon along its trajectory by the current step.
    ///
    /// * `hit` - The boundary the step was clipped to, if any.
    fn hop(&mut self, hit: Option<BoundaryHit>) {
        self.num_steps += 1;
        self.prev_pos = self.pos;
        self.pos += self.step * self.dir;

        // Land exactly on the boundary plane instead of a few ulp off it.
        match hit {
            Some(BoundaryHit::Face { axis, plane }) => self.pos[axis] = plane,
            Some(BoundaryHit::Interface { depth }) => self.pos.z = depth,
            None => {}
        }

        self.path_length += self.step;
        if let Some(field) = self.medium.displacement_field() {
            let len = self.dir.length();
            if len > 0.0 {
                let du = field.sample(&self.pos) - field.sample(&self.prev_pos);
                self.path_length += du.dot(&self.dir) / len;
            }
        }

        if let Some(points) = self.trace.as_mut() {
            points.push(self.pos);
        }

        debug_assert!(
            Axis::ALL
                .iter()
                .all(|&a| self.pos[a] >= -1e-9 && self.pos[a] <= self.medium.bound(a) + 1e-9),
            "photon left the medium box at {:?}",
            self.pos
        );
    }

    /// Deposit the absorbed fraction of the packet weight at the current
    /// position: into the containing absorber, or into the walker-local
    /// planar bin.
    fn drop_weight(&mut self) {
        if !self.alive {
            return;
        }
        let layer = self.medium.layer(self.layer);
        match layer.absorber_at(&self.pos) {
            Some(absorber) => {
                let (mu_a, mu_s) = absorber.coefficients();
                let mu_t = mu_a + mu_s;
                if mu_t <= 0.0 {
                    return;
                }
                let absorbed = self.weight * (1.0 - mu_s / mu_t);
                absorber.deposit(absorbed);
                self.tagged = true;
                self.weight -= absorbed;
            }
            None => {
                let mu_a = layer.mu_a();
                let mu_s = layer.mu_s();
                let mu_t = mu_a + mu_s;
                if mu_t <= 0.0 {
                    return;
                }
                let absorbed = self.weight * (1.0 - mu_s / mu_t);
                let ir = min(
                    (abs(self.pos.z) / self.medium.radial_bin_size()) as usize,
                    MAX_BINS,
                );
                self.local_planar[ir] += absorbed;
                self.weight -= absorbed;
            }
        }
    }

    /// Sample the Henyey-Greenstein phase function and rotate the
    /// trajectory.
    fn spin(&mut self) {
        if !self.alive {
            return;
        }
        let g = self.medium.layer(self.layer).anisotropy();
        let rnd = self.rng.next();
        let cos_theta = if g == 0.0 {
            2.0 * rnd - 1.0
        } else {
            let temp = (1.0 - g * g) / (1.0 - g + 2.0 * g * rnd);
            (1.0 + g * g - temp * temp) / (2.0 * g)
        };
        let psi = TWO_PI * self.rng.next();
        self.apply_spin(cos_theta, psi);
    }

    /// Rotate the trajectory by deflection angle θ and azimuth ψ.
    ///
    /// * `cos_theta` - Cosine of the deflection angle.
    /// * `psi`       - Azimuthal angle in [0, 2π).
    fn apply_spin(&mut self, cos_theta: Float, psi: Float) {
        let sin_theta = max(0.0, 1.0 - cos_theta * cos_theta).sqrt();
        let cos_psi = psi.cos();
        let sin_psi = if psi < PI {
            (1.0 - cos_psi * cos_psi).sqrt()
        } else {
            -(1.0 - cos_psi * cos_psi).sqrt()
        };

        let (dx, dy, dz) = (self.dir.x, self.dir.y, self.dir.z);
        self.dir = if 1.0 - abs(dz) <= ONE_MINUS_COS_ZERO {
            // Close to perpendicular.
            Vector3f::new(
                sin_theta * cos_psi,
                sin_theta * sin_psi,
                cos_theta * sign(dz),
            )
        } else {
            let temp = (1.0 - dz * dz).sqrt();
            Vector3f::new(
                sin_theta * (dx * dz * cos_psi - dy * sin_psi) / temp + dx * cos_theta,
                sin_theta * (dy * dz * cos_psi + dx * sin_psi) / temp + dy * cos_theta,
                -sin_theta * cos_psi * temp + dz * cos_theta,
            )
        };
    }

    /// Give a low-weight packet a probabilistic chance of survival.
    fn roulette(&mut self) {
        if !self.alive {
            return;
        }
        if self.weight < WEIGHT_THRESHOLD {
            let rnd = self.rng.next();
            self.apply_roulette(rnd);
        }
    }

    /// Apply the roulette decision for a drawn uniform value.
    ///
    /// * `rnd` - The drawn value.
    fn apply_roulette(&mut self, rnd: Float) {
        if rnd <= ROULETTE_CHANCE {
            let bumped = self.weight / ROULETTE_CHANCE;
            self.summary.roulette_gain += bumped - self.weight;
            self.weight = bumped;
        } else {
            self.summary.roulette_deaths += 1;
            self.summary.roulette_residual += self.weight;
            self.alive = false;
        }
    }

    /// Stochastically reflect off or transmit through the boundary the
    /// photon was just moved to.
    ///
    /// * `hit` - The boundary.
    fn transmit_or_reflect(&mut self, hit: BoundaryHit) -> Result<()> {
        match hit {
            BoundaryHit::Interface { .. } => {
                let reflectance = self.layer_reflectance();
                if reflectance > self.rng.next() {
                    self.internally_reflect(Axis::Z);
                    self.drop_weight();
                    self.roulette();
                } else {
                    self.transmit_layer();
                }
            }
            BoundaryHit::Face { axis, .. } => {
                let reflectance = self.medium_reflectance(axis);
                if reflectance > self.rng.next() {
                    self.internally_reflect(axis);
                    self.drop_weight();
                    self.roulette();
                } else {
                    self.transmit_out()?;
                }
            }
        }
        Ok(())
    }

    /// Invert the direction cosine on an axis.
    ///
    /// * `axis` - The axis to reflect on.
    fn internally_reflect(&mut self, axis: Axis) {
        self.dir[axis] = -self.dir[axis];
    }

    /// Returns the reflectance at the layer interface the photon sits on,
    /// and caches the transmission angle. Moving into an optically denser
    /// layer always transmits, paying the specular weight decrement.
    fn layer_reflectance(&mut self) -> Float {
        let n1 = self.medium.layer(self.layer).refractive_index();
        let next = self
            .adjacent_layer()
            .unwrap_or_else(|| panic!("layer interface with no adjacent layer at z = {}", self.pos.z));
        let n2 = self.medium.layer(next).refractive_index();
        let cos_i = min(abs(self.dir.z), 1.0);

        if n2 > n1 {
            let incident = cos_i.acos();
            self.transmission_angle = (n1 / n2 * incident.sin()).asin();
            let loss = fresnel::specular_reflectance(n1, n2) * self.weight;
            self.weight -= loss;
            self.summary.specular_loss += loss;
            0.0
        } else {
            let event = fresnel::dielectric(cos_i, n1, n2);
            self.transmission_angle = event.transmission_angle;
            event.reflectance
        }
    }

    /// Returns the reflectance at the medium face the photon sits on, and
    /// caches the transmission angle. Outside the medium is air.
    ///
    /// * `axis` - Axis whose face was hit.
    fn medium_reflectance(&mut self, axis: Axis) -> Float {
        let n1 = self.medium.layer(self.layer).refractive_index();
        let cos_i = min(abs(self.dir[axis]), 1.0);
        let event = fresnel::dielectric(cos_i, n1, 1.0);
        self.transmission_angle = event.transmission_angle;
        event.reflectance
    }

    /// Returns the index of the layer the photon is moving into.
    fn adjacent_layer(&self) -> Option<usize> {
        if self.dir.z > 0.0 {
            self.medium.layer_below(self.layer)
        } else {
            self.medium.layer_above(self.layer)
        }
    }

    /// Cross into the adjacent layer, refracting the axial direction
    /// cosine. The step remainder is discarded so the next step is redrawn
    /// with the new layer's attenuation.
    fn transmit_layer(&mut self) {
        let next = self
            .adjacent_layer()
            .unwrap_or_else(|| panic!("layer transmission with no adjacent layer at z = {}", self.pos.z));
        self.dir.z = self.transmission_angle.cos() * sign(self.dir.z);
        self.layer = next;
        self.step_remainder = 0.0;
    }

    /// Leave the medium: test the last segment against every detector,
    /// emit an exit record on a crossing and terminate the packet.
    fn transmit_out(&mut self) -> Result<()> {
        self.summary.escaped += 1;
        self.summary.escaped_weight += self.weight;
        if self.medium.detectors_crossed(&self.prev_pos, &self.pos) > 0 {
            self.logger
                .write_exit_record(self.weight, &self.dir, self.path_length, &self.pos)?;
            self.summary.exits += 1;
            self.summary.exit_weight += self.weight;
            if self.tagged {
                self.summary.tagged_exits += 1;
            }
        }
        self.alive = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::absorber::{Absorber, AbsorberShape};
    use crate::layer::Layer;

    const TEST_SEEDS: [u32; 4] = [200, 201, 202, 203];

    fn single_layer_medium(mu_a: Float, mu_s: Float, n: Float, g: Float) -> Medium {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(mu_a, mu_s, n, g, 0.0, 2.0));
        medium.validate().unwrap();
        medium
    }

    fn air_over_tissue_medium() -> Medium {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.1));
        medium.add_layer(Layer::new(0.1, 7.3, 1.33, 0.9, 0.1, 2.0));
        medium.validate().unwrap();
        medium
    }

    fn straight_down() -> Source {
        Source::Pencil(Vector3f::new(0.0, 0.0, 1.0))
    }

    fn injection() -> Point3f {
        Point3f::new(1.0, 1.0, 1e-5)
    }

    #[test]
    fn pure_absorber_conserves_energy_per_cycle() {
        let medium = single_layer_medium(1.0, 0.0, 1.0, 0.0);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);
        let summary = photon.run(1).unwrap();

        let deposited: Float = medium.planar_bins().iter().sum();
        let balance = deposited + summary.escaped_weight + summary.roulette_residual
            - summary.roulette_gain;
        assert!(
            (balance - 1.0).abs() < 1e-12,
            "energy balance off: {balance}"
        );
    }

    #[test]
    fn pure_absorber_escape_fraction_follows_beer_lambert() {
        let medium = single_layer_medium(1.0, 0.0, 1.0, 0.0);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);
        let cycles = 4000;
        let summary = photon.run(cycles).unwrap();

        // A packet either reaches z = 2 in one draw (probability e^-2) and
        // escapes with full weight, or deposits everything inside.
        let expected = (-2.0_f64).exp();
        let fraction = summary.escaped_weight / cycles as Float;
        assert!(
            (fraction - expected).abs() < 0.02,
            "escape fraction {fraction} vs expected {expected}"
        );
    }

    #[test]
    fn specular_decrement_on_entering_a_denser_layer() {
        let medium = air_over_tissue_medium();
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.set_step_size();
        let hit = photon.next_boundary().expect("step must reach the interface");
        assert!(matches!(hit, BoundaryHit::Interface { .. }));
        photon.hop(Some(hit));
        photon.transmit_or_reflect(hit).unwrap();

        let expected_weight = 1.0 - fresnel::specular_reflectance(1.0, 1.33);
        assert!((photon.weight - expected_weight).abs() < 1e-15);
        assert_eq!(photon.layer, 1);
        assert_eq!(photon.pos.z, 0.1);
        assert_eq!(photon.dir.z, 1.0);
        assert_eq!(photon.step_remainder, 0.0);
    }

    #[test]
    fn total_internal_reflection_inverts_the_axial_direction() {
        let medium = single_layer_medium(0.0, 0.0, 1.33, 0.0);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        // Aim at z = 0 at 60°, past the critical angle asin(1/1.33) ≈ 48.75°.
        let theta = (60.0_f64).to_radians();
        photon.pos = Point3f::new(1.0, 1.0, 0.5);
        photon.prev_pos = photon.pos;
        photon.dir = Vector3f::new(theta.sin(), 0.0, -theta.cos());

        photon.set_step_size();
        let hit = photon.next_boundary().expect("step must reach the face");
        photon.hop(Some(hit));
        assert_eq!(photon.medium_reflectance(Axis::Z), 1.0);
        photon.transmit_or_reflect(hit).unwrap();

        assert!(photon.alive);
        assert_eq!(photon.summary.exits, 0);
        assert!((photon.dir.z - theta.cos()).abs() < 1e-12);
    }

    #[test]
    fn roulette_survival_bumps_and_death_kills() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.9);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.weight = 0.005;
        photon.apply_roulette(0.05);
        assert!(photon.alive);
        assert!((photon.weight - 0.05).abs() < 1e-15);

        photon.weight = 0.005;
        photon.apply_roulette(0.5);
        assert!(!photon.alive);
        assert!((photon.summary.roulette_residual - 0.005).abs() < 1e-15);
    }

    #[test]
    fn spin_preserves_the_direction_norm() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.9);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);
        photon.pos = Point3f::new(1.0, 1.0, 1.0);
        for _ in 0..10_000 {
            photon.spin();
            let norm = photon.dir.length_squared();
            assert!((norm - 1.0).abs() <= 1e-9, "|d|^2 = {norm}");
        }
    }

    #[test]
    fn zero_deflection_spin_keeps_the_trajectory() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.0);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);
        photon.dir = Vector3f::new(0.3, 0.4, (1.0_f64 - 0.25).sqrt());
        let before = photon.dir;
        photon.apply_spin(1.0, 0.0);
        assert!((photon.dir - before).length() < 1e-12);
    }

    #[test]
    fn reflecting_twice_restores_the_direction() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.9);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);
        photon.dir = Vector3f::new(0.1, -0.2, 0.97).normalize();
        let before = photon.dir;
        photon.internally_reflect(Axis::Y);
        photon.internally_reflect(Axis::Y);
        assert_eq!(photon.dir, before);
    }

    #[test]
    fn matched_interface_never_reflects() {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        medium.add_layer(Layer::new(0.1, 5.0, 1.0, 0.0, 0.0, 1.0));
        medium.add_layer(Layer::new(0.2, 3.0, 1.0, 0.0, 1.0, 2.0));
        medium.validate().unwrap();
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.pos = Point3f::new(1.0, 1.0, 1.0);
        photon.dir = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(photon.layer_reflectance(), 0.0);

        photon.dir = Vector3f::new(0.6, 0.0, 0.8);
        assert!(photon.layer_reflectance() < 1e-20);
    }

    #[test]
    fn boundary_clipping_saves_the_scaled_remainder() {
        let medium = single_layer_medium(1.0, 0.0, 1.0, 0.0);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.step = 5.0;
        let hit = photon.next_boundary().expect("step crosses the far face");
        assert!(matches!(hit, BoundaryHit::Face { axis: Axis::Z, .. }));
        let expected_dist = 2.0 - 1e-5;
        assert!((photon.step - expected_dist).abs() < 1e-12);
        assert!((photon.step_remainder - (5.0 - expected_dist)).abs() < 1e-12);
    }

    #[test]
    fn drop_inside_an_absorber_tags_and_deposits() {
        let mut medium = Medium::new(2.0, 2.0, 2.0);
        let mut layer = Layer::new(0.1, 7.3, 1.33, 0.9, 0.0, 2.0);
        layer.add_absorber(Absorber::new(
            "sphere0",
            AbsorberShape::Sphere {
                center: Point3f::new(1.0, 1.0, 1.0),
                radius: 0.5,
            },
            2.0,
            7.3,
        ));
        medium.add_layer(layer);
        medium.validate().unwrap();
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.pos = Point3f::new(1.0, 1.0, 1.0);
        photon.drop_weight();

        let expected = 1.0 * (1.0 - 7.3 / (2.0 + 7.3));
        assert!(photon.tagged);
        assert!((photon.weight - (1.0 - expected)).abs() < 1e-15);
        let absorber = &medium.layers()[0].absorbers()[0];
        assert!((absorber.deposited_energy() - expected).abs() < 1e-15);
    }

    #[test]
    fn reset_restores_the_initial_packet_state() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.9);
        let logger = Logger::new();
        let mut photon = Photon::new(&medium, &logger, TEST_SEEDS, injection(), straight_down(), false);

        photon.weight = 0.3;
        photon.tagged = true;
        photon.pos = Point3f::new(0.5, 0.5, 1.5);
        photon.step = 2.0;
        photon.step_remainder = 0.7;
        photon.path_length = 5.0;
        photon.num_steps = 42;
        photon.init_cycle();

        assert!(photon.alive);
        assert_eq!(photon.weight, 1.0);
        assert!(!photon.tagged);
        assert_eq!(photon.pos, injection());
        assert_eq!(photon.step, 0.0);
        assert_eq!(photon.step_remainder, 0.0);
        assert_eq!(photon.path_length, 0.0);
        assert_eq!(photon.num_steps, 0);
        assert_eq!(photon.layer, 0);
    }

    #[test]
    fn scattering_walk_stays_inside_the_box() {
        let medium = single_layer_medium(0.1, 7.3, 1.33, 0.9);
        let logger = Logger::new();
        let mut photon = Photon::new(
            &medium,
            &logger,
            TEST_SEEDS,
            injection(),
            Source::Diffuse,
            true,
        );
        photon.run(25).unwrap();
        // The trace of the last cycle was flushed; the live buffer holds the
        // fresh injection point only. Walk the summary instead.
        assert!(photon.summary.steps > 0);
        assert_eq!(photon.summary.cycles, 25);
        assert_eq!(
            photon.summary.escaped + photon.summary.roulette_deaths,
            photon.summary.cycles
        );
    }
}
