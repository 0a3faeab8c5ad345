//! Layers of the medium.
//!
//! A layer is an axial slab [depth_start, depth_end] with homogeneous
//! background optical properties and an optional set of embedded absorbers.
//! Point queries are absorber-aware: inside an absorber the absorber's
//! coefficients replace the background values.

use crate::absorber::Absorber;
use crate::common::Float;
use crate::geometry::Point3f;

/// An axial slab of the medium.
#[derive(Debug)]
pub struct Layer {
    /// Background absorption coefficient (1/cm).
    mu_a: Float,

    /// Background scattering coefficient (1/cm).
    mu_s: Float,

    /// Refractive index.
    refractive_index: Float,

    /// Scattering anisotropy, the mean cosine of deflection.
    anisotropy: Float,

    /// Depth at which the layer begins.
    depth_start: Float,

    /// Depth at which the layer ends.
    depth_end: Float,

    /// Absorbers embedded in the layer, in insertion order.
    absorbers: Vec<Absorber>,
}

impl Layer {
    /// Create a new `Layer`.
    ///
    /// * `mu_a`             - Background absorption coefficient (1/cm).
    /// * `mu_s`             - Background scattering coefficient (1/cm).
    /// * `refractive_index` - Refractive index.
    /// * `anisotropy`       - Scattering anisotropy.
    /// * `depth_start`      - Depth at which the layer begins.
    /// * `depth_end`        - Depth at which the layer ends.
    pub fn new(
        mu_a: Float,
        mu_s: Float,
        refractive_index: Float,
        anisotropy: Float,
        depth_start: Float,
        depth_end: Float,
    ) -> Self {
        Self {
            mu_a,
            mu_s,
            refractive_index,
            anisotropy,
            depth_start,
            depth_end,
            absorbers: Vec::new(),
        }
    }

    /// Embed an absorber in the layer.
    ///
    /// * `absorber` - The absorber.
    pub fn add_absorber(&mut self, absorber: Absorber) {
        self.absorbers.push(absorber);
    }

    /// Returns true when the depth lies inside the layer. Closed at both
    /// ends; at a shared boundary the upper layer wins by being checked
    /// first in the medium's sorted layer stack.
    ///
    /// * `z` - The depth.
    pub fn contains_depth(&self, z: Float) -> bool {
        self.depth_start <= z && z <= self.depth_end
    }

    /// Returns the first absorber whose region contains the point.
    ///
    /// * `p` - The point.
    pub fn absorber_at(&self, p: &Point3f) -> Option<&Absorber> {
        self.absorbers.iter().find(|a| a.contains(p))
    }

    /// Returns the absorption coefficient at a point: the absorber's if one
    /// contains the point, the layer background otherwise.
    ///
    /// * `p` - The point.
    pub fn mu_a_at(&self, p: &Point3f) -> Float {
        match self.absorber_at(p) {
            Some(a) => a.coefficients().0,
            None => self.mu_a,
        }
    }

    /// Returns the scattering coefficient at a point: the absorber's if one
    /// contains the point, the layer background otherwise.
    ///
    /// * `p` - The point.
    pub fn mu_s_at(&self, p: &Point3f) -> Float {
        match self.absorber_at(p) {
            Some(a) => a.coefficients().1,
            None => self.mu_s,
        }
    }

    /// Returns the total attenuation µa + µs at a point.
    ///
    /// * `p` - The point.
    pub fn total_attenuation(&self, p: &Point3f) -> Float {
        match self.absorber_at(p) {
            Some(a) => {
                let (mu_a, mu_s) = a.coefficients();
                mu_a + mu_s
            }
            None => self.mu_a + self.mu_s,
        }
    }

    /// Returns the background absorption coefficient.
    pub fn mu_a(&self) -> Float {
        self.mu_a
    }

    /// Returns the background scattering coefficient.
    pub fn mu_s(&self) -> Float {
        self.mu_s
    }

    /// Returns the refractive index.
    pub fn refractive_index(&self) -> Float {
        self.refractive_index
    }

    /// Returns the scattering anisotropy.
    pub fn anisotropy(&self) -> Float {
        self.anisotropy
    }

    /// Returns the depth at which the layer begins.
    pub fn depth_start(&self) -> Float {
        self.depth_start
    }

    /// Returns the depth at which the layer ends.
    pub fn depth_end(&self) -> Float {
        self.depth_end
    }

    /// Returns the embedded absorbers.
    pub fn absorbers(&self) -> &[Absorber] {
        &self.absorbers
    }
}
