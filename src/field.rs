//! Time-sampled acoustic field maps.
//!
//! Pressure and displacement frames are produced externally (e.g. by a
//! k-Wave run) and stored one file per time index as flat whitespace
//! separated ASCII doubles in x-fastest, then y, then z order. A map is
//! built empty with a fixed grid shape; `load_frame` replaces its contents
//! and walkers sample it read-only between loads.

use crate::common::{clamp, Float};
use crate::error::{Error, Result};
use crate::geometry::{Point3f, Vector3f};
use std::fs;
use std::path::Path;

/// A regular 3-D grid with physical extent equal to the medium.
#[derive(Clone, Debug)]
struct Grid3 {
    /// Grid size in x-direction.
    nx: usize,

    /// Grid size in y-direction.
    ny: usize,

    /// Grid size in z-direction.
    nz: usize,

    /// Grid spacing per axis (extent / size).
    delta: Vector3f,
}

impl Grid3 {
    fn new(nx: usize, ny: usize, nz: usize, extent: Vector3f) -> Self {
        assert!(nx > 0 && ny > 0 && nz > 0, "field grid must be non-empty");
        Self {
            nx,
            ny,
            nz,
            delta: Vector3f::new(
                extent.x / nx as Float,
                extent.y / ny as Float,
                extent.z / nz as Float,
            ),
        }
    }

    fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Returns the linear cell index for a cartesian point. Out-of-range
    /// coordinates clamp to the nearest cell.
    ///
    /// * `p` - The cartesian point.
    fn cell(&self, p: &Point3f) -> usize {
        let ix = clamp((p.x / self.delta.x).floor() as i64, 0, self.nx as i64 - 1) as usize;
        let iy = clamp((p.y / self.delta.y).floor() as i64, 0, self.ny as i64 - 1) as usize;
        let iz = clamp((p.z / self.delta.z).floor() as i64, 0, self.nz as i64 - 1) as usize;
        (iz * self.ny + iy) * self.nx + ix
    }
}

/// Reads one frame file and checks it holds exactly `expected` cells.
///
/// * `path`     - The frame file.
/// * `expected` - Cell count of the bound grid.
fn read_frame(path: &Path, expected: usize) -> Result<Vec<Float>> {
    let contents = fs::read_to_string(path)?;
    let mut values = Vec::with_capacity(expected);
    for token in contents.split_whitespace() {
        let v: Float = token.parse().map_err(|e| Error::FrameParse {
            path: path.display().to_string(),
            reason: format!("bad token {token:?}: {e}"),
        })?;
        values.push(v);
    }
    if values.len() != expected {
        return Err(Error::FrameSize {
            path: path.display().to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

/// A scalar field (acoustic pressure) sampled on a regular 3-D grid.
#[derive(Clone, Debug)]
pub struct ScalarField {
    grid: Grid3,

    /// Frame path prefix; time index `t` lives at `<prefix><t>.txt`.
    prefix: String,

    /// Cell values in x-fastest order.
    data: Vec<Float>,
}

impl ScalarField {
    /// Create an empty (all-zero) scalar field.
    ///
    /// * `nx`     - Grid size in x-direction.
    /// * `ny`     - Grid size in y-direction.
    /// * `nz`     - Grid size in z-direction.
    /// * `extent` - Physical extent of the grid (the medium dimensions).
    /// * `prefix` - Frame path prefix.
    pub fn new(nx: usize, ny: usize, nz: usize, extent: Vector3f, prefix: &str) -> Self {
        let grid = Grid3::new(nx, ny, nz, extent);
        let data = vec![0.0; grid.len()];
        Self {
            grid,
            prefix: prefix.to_string(),
            data,
        }
    }

    /// Replace the contents with the frame stored on disk for a time index.
    ///
    /// * `t` - The time index.
    pub fn load_frame(&mut self, t: usize) -> Result<()> {
        let path = format!("{}{}.txt", self.prefix, t);
        self.data = read_frame(Path::new(&path), self.grid.len())?;
        Ok(())
    }

    /// Sample the field at a cartesian point.
    ///
    /// * `p` - The cartesian point.
    pub fn sample(&self, p: &Point3f) -> Float {
        self.data[self.grid.cell(p)]
    }
}

/// A vector field (acoustic displacement) sampled on a regular 3-D grid.
/// Each component is stored in its own frame file, `<prefix>x<t>.txt`,
/// `<prefix>y<t>.txt` and `<prefix>z<t>.txt`.
#[derive(Clone, Debug)]
pub struct VectorField {
    grid: Grid3,

    /// Frame path prefix.
    prefix: String,

    /// Per-component cell values in x-fastest order.
    ux: Vec<Float>,
    uy: Vec<Float>,
    uz: Vec<Float>,
}

impl VectorField {
    /// Create an empty (all-zero) vector field.
    ///
    /// * `nx`     - Grid size in x-direction.
    /// * `ny`     - Grid size in y-direction.
    /// * `nz`     - Grid size in z-direction.
    /// * `extent` - Physical extent of the grid (the medium dimensions).
    /// * `prefix` - Frame path prefix.
    pub fn new(nx: usize, ny: usize, nz: usize, extent: Vector3f, prefix: &str) -> Self {
        let grid = Grid3::new(nx, ny, nz, extent);
        let n = grid.len();
        Self {
            grid,
            prefix: prefix.to_string(),
            ux: vec![0.0; n],
            uy: vec![0.0; n],
            uz: vec![0.0; n],
        }
    }

    /// Replace the contents with the three component frames for a time index.
    ///
    /// * `t` - The time index.
    pub fn load_frame(&mut self, t: usize) -> Result<()> {
        let n = self.grid.len();
        self.ux = read_frame(Path::new(&format!("{}x{}.txt", self.prefix, t)), n)?;
        self.uy = read_frame(Path::new(&format!("{}y{}.txt", self.prefix, t)), n)?;
        self.uz = read_frame(Path::new(&format!("{}z{}.txt", self.prefix, t)), n)?;
        Ok(())
    }

    /// Sample the displacement vector at a cartesian point.
    ///
    /// * `p` - The cartesian point.
    pub fn sample(&self, p: &Point3f) -> Vector3f {
        let i = self.grid.cell(p);
        Vector3f::new(self.ux[i], self.uy[i], self.uz[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    /// Writes a frame file under the system temp directory.
    fn write_frame(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aomc-field-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{contents}").unwrap();
        path
    }

    fn prefix_for(path: &Path, t: usize) -> String {
        let s = path.display().to_string();
        s.strip_suffix(&format!("{t}.txt")).unwrap().to_string()
    }

    #[test]
    fn scalar_frame_loads_in_x_fastest_order() {
        let path = write_frame("p7.txt", "1 2 3 4 5 6 7 8");
        let mut field = ScalarField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), &prefix_for(&path, 7));
        field.load_frame(7).unwrap();
        // Cell (1, 0, 0) is the second value, cell (0, 0, 1) the fifth.
        assert_eq!(field.sample(&Point3f::new(1.5, 0.5, 0.5)), 2.0);
        assert_eq!(field.sample(&Point3f::new(0.5, 0.5, 1.5)), 5.0);
    }

    #[test]
    fn out_of_range_samples_clamp_to_nearest_cell() {
        let path = write_frame("q0.txt", "1 2 3 4 5 6 7 8");
        let mut field = ScalarField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), &prefix_for(&path, 0));
        field.load_frame(0).unwrap();
        assert_eq!(field.sample(&Point3f::new(-1.0, -1.0, -1.0)), 1.0);
        assert_eq!(field.sample(&Point3f::new(5.0, 5.0, 5.0)), 8.0);
    }

    #[test]
    fn wrong_cell_count_is_rejected() {
        let path = write_frame("short3.txt", "1 2 3");
        let mut field = ScalarField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), &prefix_for(&path, 3));
        match field.load_frame(3) {
            Err(Error::FrameSize { expected, found, .. }) => {
                assert_eq!(expected, 8);
                assert_eq!(found, 3);
            }
            other => panic!("expected FrameSize error, got {other:?}"),
        }
    }

    #[test]
    fn bad_token_is_rejected() {
        let path = write_frame("bad5.txt", "1 2 x 4 5 6 7 8");
        let mut field = ScalarField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), &prefix_for(&path, 5));
        assert!(matches!(field.load_frame(5), Err(Error::FrameParse { .. })));
    }

    #[test]
    fn missing_frame_is_an_io_error() {
        let mut field = ScalarField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), "/nonexistent/frame");
        assert!(matches!(field.load_frame(0), Err(Error::Io(_))));
    }

    #[test]
    fn vector_frames_load_component_files() {
        let px = write_frame("ux2.txt", "1 1 1 1 1 1 1 1");
        write_frame("uy2.txt", "2 2 2 2 2 2 2 2");
        write_frame("uz2.txt", "3 3 3 3 3 3 3 3");
        let prefix = px.display().to_string();
        let prefix = prefix.strip_suffix("x2.txt").unwrap();
        let mut field = VectorField::new(2, 2, 2, Vector3f::new(2.0, 2.0, 2.0), prefix);
        field.load_frame(2).unwrap();
        let u = field.sample(&Point3f::new(0.5, 0.5, 0.5));
        assert_eq!(u, Vector3f::new(1.0, 2.0, 3.0));
    }
}
