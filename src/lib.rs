//! Monte Carlo simulation of optical photon transport through a layered
//! turbid medium modulated by a pre-computed acoustic field.
//!
//! Photon packets are injected at a surface point, random-walked through
//! layers (hop/drop/spin/roulette) containing possibly embedded absorbers,
//! and logged on exit through a detector aperture so that a downstream tool
//! can synthesize the speckle pattern on a virtual CCD.

#[macro_use]
extern crate hexf;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod absorber;
pub mod app;
pub mod common;
pub mod detector;
pub mod driver;
pub mod error;
pub mod field;
pub mod fresnel;
pub mod geometry;
pub mod layer;
pub mod logger;
pub mod medium;
pub mod parallel;
pub mod photon;
pub mod rng;
