//! Embedded absorbers.
//!
//! An absorber is a closed region inside a single layer carrying its own
//! absorption and scattering coefficients. Deposited energy accumulates in
//! an atomic counter so concurrent walkers never lose an update.

use crate::common::Float;
use crate::geometry::Point3f;
use crate::parallel::AtomicFloat;

/// The supported absorber geometries.
#[derive(Clone, Debug)]
pub enum AbsorberShape {
    /// A sphere.
    Sphere {
        /// Center of the sphere.
        center: Point3f,

        /// Radius of the sphere.
        radius: Float,
    },

    /// A finite cylinder with its axis parallel to z.
    Cylinder {
        /// Center of the cylinder.
        center: Point3f,

        /// Radius of the cylinder.
        radius: Float,

        /// Half the cylinder's extent along z.
        half_height: Float,
    },
}

impl AbsorberShape {
    /// Returns true when the point lies inside or on the shape boundary.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point3f) -> bool {
        match self {
            Self::Sphere { center, radius } => {
                (*p - *center).length_squared() <= radius * radius
            }
            Self::Cylinder {
                center,
                radius,
                half_height,
            } => {
                let dx = p.x - center.x;
                let dy = p.y - center.y;
                dx * dx + dy * dy <= radius * radius && (p.z - center.z).abs() <= *half_height
            }
        }
    }

    /// Returns the axis-aligned bounding box as (min, max) corners.
    pub fn bounds(&self) -> (Point3f, Point3f) {
        match self {
            Self::Sphere { center, radius } => {
                let r = Point3f::new(*radius, *radius, *radius);
                (*center - r, *center + r)
            }
            Self::Cylinder {
                center,
                radius,
                half_height,
            } => {
                let r = Point3f::new(*radius, *radius, *half_height);
                (*center - r, *center + r)
            }
        }
    }
}

/// An embedded absorber with local optical properties and an atomic
/// deposited-energy counter.
#[derive(Debug)]
pub struct Absorber {
    /// Name used in the absorber report.
    label: String,

    /// The absorber geometry.
    shape: AbsorberShape,

    /// Local absorption coefficient (1/cm).
    mu_a: Float,

    /// Local scattering coefficient (1/cm).
    mu_s: Float,

    /// Total photon weight deposited inside the absorber.
    deposited: AtomicFloat,
}

impl Absorber {
    /// Create a new `Absorber`.
    ///
    /// * `label` - Name used in the absorber report.
    /// * `shape` - The absorber geometry.
    /// * `mu_a`  - Local absorption coefficient (1/cm).
    /// * `mu_s`  - Local scattering coefficient (1/cm).
    pub fn new(label: &str, shape: AbsorberShape, mu_a: Float, mu_s: Float) -> Self {
        Self {
            label: label.to_string(),
            shape,
            mu_a,
            mu_s,
            deposited: AtomicFloat::default(),
        }
    }

    /// Returns true when the point lies inside or on the absorber boundary.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point3f) -> bool {
        self.shape.contains(p)
    }

    /// Returns the local (µa, µs) pair.
    pub fn coefficients(&self) -> (Float, Float) {
        (self.mu_a, self.mu_s)
    }

    /// Deposit absorbed photon weight. Linearizable across walkers.
    ///
    /// * `energy` - The absorbed weight.
    pub fn deposit(&self, energy: Float) {
        self.deposited.add(energy);
    }

    /// Returns the total weight deposited so far.
    pub fn deposited_energy(&self) -> Float {
        self.deposited.value()
    }

    /// Returns the report label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the axis-aligned bounding box as (min, max) corners.
    pub fn bounds(&self) -> (Point3f, Point3f) {
        self.shape.bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere() -> Absorber {
        Absorber::new(
            "sphere0",
            AbsorberShape::Sphere {
                center: Point3f::new(1.0, 1.0, 1.0),
                radius: 0.5,
            },
            2.0,
            7.3,
        )
    }

    #[test]
    fn sphere_boundary_is_closed() {
        let a = sphere();
        assert!(a.contains(&Point3f::new(1.0, 1.0, 1.0)));
        assert!(a.contains(&Point3f::new(1.5, 1.0, 1.0)));
        assert!(!a.contains(&Point3f::new(1.5001, 1.0, 1.0)));
    }

    #[test]
    fn cylinder_boundary_is_closed() {
        let a = Absorber::new(
            "cyl0",
            AbsorberShape::Cylinder {
                center: Point3f::new(1.0, 1.0, 1.0),
                radius: 0.25,
                half_height: 0.5,
            },
            1.0,
            1.0,
        );
        assert!(a.contains(&Point3f::new(1.25, 1.0, 1.5)));
        assert!(!a.contains(&Point3f::new(1.25, 1.0, 1.5001)));
        assert!(!a.contains(&Point3f::new(1.3, 1.0, 1.0)));
    }

    #[test]
    fn deposits_accumulate_across_threads() {
        let a = sphere();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        a.deposit(0.125);
                    }
                });
            }
        });
        assert_eq!(a.deposited_energy(), 4.0 * 1000.0 * 0.125);
    }

    #[test]
    fn sphere_bounds() {
        let (lo, hi) = sphere().bounds();
        assert_eq!(lo, Point3f::new(0.5, 0.5, 0.5));
        assert_eq!(hi, Point3f::new(1.5, 1.5, 1.5));
    }
}
