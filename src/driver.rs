//! Simulation driver.
//!
//! For each acoustic time index the driver rebinds the field frames, opens
//! the exit-record sink for that index, fans the photon budget out over one
//! OS thread per walker and joins them all before advancing. The driver is
//! the only thread that ever mutates the medium.

use crate::error::{Error, Result};
use crate::geometry::Point3f;
use crate::logger::Logger;
use crate::medium::Medium;
use crate::photon::{Photon, Source, WalkerSummary};
use crate::rng::MIN_SEED;
use rand::Rng;
use std::path::PathBuf;

/// Runtime knobs of one simulation run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Total photon packets per time index, split across the walkers.
    pub max_photons: usize,

    /// Worker threads (walkers).
    pub num_threads: usize,

    /// Inclusive acoustic time index range [t0, t1].
    pub time_range: (usize, usize),

    /// Injection point of every packet.
    pub injection: Point3f,

    /// How each packet's initial trajectory is chosen.
    pub source: Source,

    /// Base RNG seed words for reproducible runs; fresh entropy when absent.
    pub seed: Option<[u32; 4]>,

    /// Record every photon trajectory to the path sink (debug; slow).
    pub trace_paths: bool,

    /// Directory output files are written to.
    pub out_dir: PathBuf,
}

impl RunConfig {
    fn validate(&self, medium: &Medium) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".to_string()));
        }
        if self.max_photons < self.num_threads {
            return Err(Error::Config(format!(
                "max_photons {} smaller than num_threads {}",
                self.max_photons, self.num_threads
            )));
        }
        if self.time_range.0 > self.time_range.1 {
            return Err(Error::Config(format!(
                "time range [{}, {}] is empty",
                self.time_range.0, self.time_range.1
            )));
        }
        let p = self.injection;
        let inside = p.x >= 0.0
            && p.x <= medium.x_bound()
            && p.y >= 0.0
            && p.y <= medium.y_bound()
            && p.z >= 0.0
            && p.z <= medium.z_bound();
        if !inside {
            return Err(Error::Config(format!(
                "injection point ({}, {}, {}) outside the medium",
                p.x, p.y, p.z
            )));
        }
        Ok(())
    }
}

/// Returns the seed words for one walker: the base seed offset per walker,
/// or fresh entropy.
///
/// * `base`   - Base seed words, if configured.
/// * `walker` - Walker index.
fn walker_seeds(base: Option<[u32; 4]>, walker: usize) -> [u32; 4] {
    match base {
        Some(mut seeds) => {
            for word in &mut seeds {
                *word = word.wrapping_add(walker as u32).max(MIN_SEED);
            }
            seeds
        }
        None => {
            let mut rng = rand::thread_rng();
            [(); 4].map(|_| rng.gen_range(MIN_SEED..u32::MAX))
        }
    }
}

/// Run the simulation over the configured acoustic time range and return
/// the aggregated walker totals.
///
/// * `medium` - The medium; field frames are rebound per time index.
/// * `logger` - The shared output sinks.
/// * `config` - Runtime knobs.
pub fn run(medium: &mut Medium, logger: &Logger, config: &RunConfig) -> Result<WalkerSummary> {
    medium.validate()?;
    config.validate(medium)?;

    let cycles = config.max_photons / config.num_threads;
    let dropped = config.max_photons % config.num_threads;
    if dropped != 0 {
        warn!("photon budget not divisible by thread count; dropping {dropped} packets");
    }

    if config.trace_paths {
        logger.open_paths_file(&config.out_dir.join("photon-paths.txt"))?;
    }

    let (t0, t1) = config.time_range;
    let mut totals = WalkerSummary::default();
    for t in t0..=t1 {
        medium.bind_frames(t)?;
        logger.open_exit_file(&config.out_dir.join(format!("exit-aperture-{t}.txt")))?;
        info!(
            "time index {t}: launching {} photons on {} walkers",
            cycles * config.num_threads,
            config.num_threads
        );

        let shared: &Medium = medium;
        let frame_totals = crossbeam::scope(|scope| -> Result<WalkerSummary> {
            let mut handles = Vec::with_capacity(config.num_threads);
            for walker in 0..config.num_threads {
                let seeds = walker_seeds(config.seed, walker);
                handles.push(scope.spawn(move |_| {
                    let mut photon = Photon::new(
                        shared,
                        logger,
                        seeds,
                        config.injection,
                        config.source,
                        config.trace_paths,
                    );
                    photon.run(cycles)
                }));
            }
            let mut totals = WalkerSummary::default();
            for handle in handles {
                let summary = handle.join().expect("walker thread panicked")?;
                debug!("walker done: {summary:?}");
                totals.merge(&summary);
            }
            Ok(totals)
        })
        .expect("walker scope panicked")?;

        logger.close_exit_file()?;
        info!(
            "time index {t}: {} detector exits carrying weight {:.6}",
            frame_totals.exits, frame_totals.exit_weight
        );
        totals.merge(&frame_totals);
    }

    if config.trace_paths {
        logger.close_paths_file()?;
    }

    medium.write_fluence(&config.out_dir.join("fluences.txt"), config.max_photons)?;
    logger.open_absorber_file(&config.out_dir.join("absorber-data.txt"))?;
    medium.report_absorbers(logger)?;
    logger.close_absorber_file()?;

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_base_seed_offsets_per_walker() {
        let base = Some([200, 201, 202, 203]);
        assert_eq!(walker_seeds(base, 0), [200, 201, 202, 203]);
        assert_eq!(walker_seeds(base, 3), [203, 204, 205, 206]);
    }

    #[test]
    fn entropy_seeds_respect_the_floor() {
        for _ in 0..100 {
            assert!(walker_seeds(None, 0).iter().all(|&s| s >= MIN_SEED));
        }
    }

    #[test]
    fn zero_threads_is_a_config_error() {
        let mut medium = Medium::new(1.0, 1.0, 1.0);
        medium.add_layer(crate::layer::Layer::new(0.1, 1.0, 1.0, 0.0, 0.0, 1.0));
        let logger = Logger::new();
        let config = RunConfig {
            max_photons: 10,
            num_threads: 0,
            time_range: (0, 0),
            injection: Point3f::new(0.5, 0.5, 1e-5),
            source: Source::Diffuse,
            seed: None,
            trace_paths: false,
            out_dir: std::env::temp_dir(),
        };
        assert!(matches!(
            run(&mut medium, &logger, &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn out_of_medium_injection_is_a_config_error() {
        let mut medium = Medium::new(1.0, 1.0, 1.0);
        medium.add_layer(crate::layer::Layer::new(0.1, 1.0, 1.0, 0.0, 0.0, 1.0));
        let logger = Logger::new();
        let config = RunConfig {
            max_photons: 10,
            num_threads: 1,
            time_range: (0, 0),
            injection: Point3f::new(5.0, 0.5, 1e-5),
            source: Source::Diffuse,
            seed: None,
            trace_paths: false,
            out_dir: std::env::temp_dir(),
        };
        assert!(matches!(
            run(&mut medium, &logger, &config),
            Err(Error::Config(_))
        ));
    }
}
