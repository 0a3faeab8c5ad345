//! Fresnel reflectance at dielectric interfaces.

use crate::common::{clamp, Float, ONE_MINUS_COS_ZERO, PI_OVER_TWO};

/// Result of evaluating a dielectric interface for unpolarized light.
#[derive(Copy, Clone, Debug)]
pub struct FresnelEvent {
    /// Fraction of intensity reflected; 1.0 on total internal reflection.
    pub reflectance: Float,

    /// Transmission angle θt from Snell's law, in radians. π/2 on total
    /// internal reflection.
    pub transmission_angle: Float,
}

/// Returns the reflectance and transmission angle at a dielectric interface.
///
/// Perpendicular incidence collapses to the specular form; an incident angle
/// at or past the critical angle yields total internal reflection.
///
/// * `cos_theta_i` - Cosine of the incident angle (magnitude of the direction
///                   cosine on the interface normal).
/// * `n1`          - Refractive index of the medium the photon is in.
/// * `n2`          - Refractive index of the medium the photon is entering.
pub fn dielectric(cos_theta_i: Float, n1: Float, n2: Float) -> FresnelEvent {
    let cos_theta_i = clamp(cos_theta_i.abs(), 0.0, 1.0);

    if 1.0 - cos_theta_i <= ONE_MINUS_COS_ZERO {
        return FresnelEvent {
            reflectance: specular_reflectance(n1, n2),
            transmission_angle: 0.0,
        };
    }

    let incident = cos_theta_i.acos();
    let sin_theta_t = n1 / n2 * incident.sin();

    // At or past the critical angle everything reflects.
    if sin_theta_t >= 1.0 {
        return FresnelEvent {
            reflectance: 1.0,
            transmission_angle: PI_OVER_TWO,
        };
    }

    let transmission = sin_theta_t.asin();
    let r = 0.5
        * (((incident - transmission).sin() / (incident + transmission).sin()).powi(2)
            + ((incident - transmission).tan() / (incident + transmission).tan()).powi(2));
    FresnelEvent {
        reflectance: r,
        transmission_angle: transmission,
    }
}

/// Returns the specular reflectance ((n1 - n2) / (n1 + n2))^2 at normal
/// incidence.
///
/// * `n1` - Refractive index of the medium the photon is in.
/// * `n2` - Refractive index of the medium the photon is entering.
#[inline(always)]
pub fn specular_reflectance(n1: Float, n2: Float) -> Float {
    ((n1 - n2) / (n1 + n2)).powi(2)
}

/// Returns the critical angle asin(n2/n1) in radians for a photon moving
/// from index `n1` toward a rarer index `n2` <= `n1`.
///
/// * `n1` - Refractive index of the medium the photon is in.
/// * `n2` - Refractive index of the medium the photon is entering.
#[inline(always)]
pub fn critical_angle(n1: Float, n2: Float) -> Float {
    debug_assert!(n2 <= n1);
    (n2 / n1).asin()
}
