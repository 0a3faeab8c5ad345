//! Process entry point: assembles the simulated scene and runs it.

#[macro_use]
extern crate log;

use aomc::absorber::{Absorber, AbsorberShape};
use aomc::app::OPTIONS;
use aomc::common::Float;
use aomc::detector::{CircularDetector, DetectorPlane};
use aomc::driver::{self, RunConfig};
use aomc::geometry::Point3f;
use aomc::layer::Layer;
use aomc::logger::Logger;
use aomc::medium::Medium;
use aomc::photon::Source;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

/// Total photon packets per acoustic time index.
const MAX_PHOTONS: usize = 10_000;

/// Acoustic time index range.
const TIME_RANGE: (usize, usize) = (0, 0);

/// The dimensions of the medium (cm).
const X_DIM: Float = 2.0;
const Y_DIM: Float = 2.0;
const Z_DIM: Float = 2.0;

fn main() {
    if OPTIONS.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    } else {
        env_logger::init();
    }

    let mut tissue = Medium::new(X_DIM, Y_DIM, Z_DIM);

    // An air layer over a single tissue layer.
    tissue.add_layer(Layer::new(0.0, 0.001, 1.0, 1.0, 0.0, 0.1));
    let mut tissue_layer = Layer::new(0.1, 7.3, 1.33, 0.9, 0.1, Z_DIM);

    // A spherical absorber embedded mid-tissue.
    tissue_layer.add_absorber(Absorber::new(
        "sphere0",
        AbsorberShape::Sphere {
            center: Point3f::new(1.0, 1.0, 1.0),
            radius: 0.6,
        },
        2.0,
        7.3,
    ));
    tissue.add_layer(tissue_layer);

    // A circular exit aperture centered on the bottom face.
    tissue.add_detector(CircularDetector::new(
        Point3f::new(X_DIM / 2.0, Y_DIM / 2.0, Z_DIM),
        1.0,
        DetectorPlane::XY,
    ));

    let num_threads = std::thread::available_parallelism().map_or(1, |n| n.get());
    let config = RunConfig {
        max_photons: MAX_PHOTONS,
        num_threads,
        time_range: TIME_RANGE,
        // Injection centered, just below the surface of the air layer.
        injection: Point3f::new(X_DIM / 2.0, Y_DIM / 2.0, 0.00001),
        source: Source::Diffuse,
        seed: None,
        trace_paths: false,
        out_dir: PathBuf::from(&OPTIONS.out_dir),
    };

    let logger = Logger::new();
    info!("launching {MAX_PHOTONS} photons on {num_threads} threads");
    let start = Instant::now();
    match driver::run(&mut tissue, &logger, &config) {
        Ok(totals) => {
            info!(
                "done in {:.2?}: {} detector exits, {} roulette deaths, {:.6} weight escaped",
                start.elapsed(),
                totals.exits,
                totals.roulette_deaths,
                totals.escaped_weight
            );
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}
