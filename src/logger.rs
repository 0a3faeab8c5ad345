//! Append-only output sinks.
//!
//! An explicit `Logger` value is shared by every walker; there is no
//! singleton. Each sink owns its writer behind its own mutex, so exit
//! records from concurrent walkers serialize per write without blocking
//! writes to the other sinks. Writes to a sink that has not been opened
//! are dropped.

use crate::common::Float;
use crate::error::Result;
use crate::geometry::{Point3f, Vector3f};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// One buffered, mutex-guarded output sink.
type Sink = Mutex<Option<BufWriter<File>>>;

/// The process-wide output writer.
#[derive(Debug, Default)]
pub struct Logger {
    /// Exit records for photons leaving through a detector aperture.
    exit: Sink,

    /// Per-photon coordinate traces (debug).
    paths: Sink,

    /// Per-absorber deposited energy report (debug).
    absorbers: Sink,
}

impl Logger {
    /// Create a new `Logger` with all sinks closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open one sink, flushing and replacing any previous writer.
    fn open(sink: &Sink, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut guard = sink.lock().unwrap();
        if let Some(mut previous) = guard.take() {
            previous.flush()?;
        }
        *guard = Some(BufWriter::new(file));
        Ok(())
    }

    /// Flush and close one sink.
    fn close(sink: &Sink) -> Result<()> {
        if let Some(mut writer) = sink.lock().unwrap().take() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Open the exit-record sink.
    ///
    /// * `path` - The output file.
    pub fn open_exit_file(&self, path: &Path) -> Result<()> {
        Self::open(&self.exit, path)
    }

    /// Flush and close the exit-record sink.
    pub fn close_exit_file(&self) -> Result<()> {
        Self::close(&self.exit)
    }

    /// Append one exit record:
    /// `weight dx dy dz path_length x y z`, 9 decimal digits each.
    ///
    /// * `weight`      - Exit weight of the photon.
    /// * `direction`   - Exit direction cosines.
    /// * `path_length` - Accumulated (displaced) optical path length.
    /// * `p`           - Exit position.
    pub fn write_exit_record(
        &self,
        weight: Float,
        direction: &Vector3f,
        path_length: Float,
        p: &Point3f,
    ) -> Result<()> {
        let mut guard = self.exit.lock().unwrap();
        if let Some(writer) = guard.as_mut() {
            writeln!(
                writer,
                "{weight:.9} {:.9} {:.9} {:.9} {path_length:.9} {:.9} {:.9} {:.9}",
                direction.x, direction.y, direction.z, p.x, p.y, p.z
            )?;
        }
        Ok(())
    }

    /// Open the photon-path sink.
    ///
    /// * `path` - The output file.
    pub fn open_paths_file(&self, path: &Path) -> Result<()> {
        Self::open(&self.paths, path)
    }

    /// Flush and close the photon-path sink.
    pub fn close_paths_file(&self) -> Result<()> {
        Self::close(&self.paths)
    }

    /// Append one photon trajectory as a newline-terminated record of
    /// space-separated `x y z` triples.
    ///
    /// * `points` - The trajectory.
    pub fn write_path(&self, points: &[Point3f]) -> Result<()> {
        let mut guard = self.paths.lock().unwrap();
        if let Some(writer) = guard.as_mut() {
            for p in points {
                write!(writer, "{} {} {} ", p.x, p.y, p.z)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Open the absorber-report sink.
    ///
    /// * `path` - The output file.
    pub fn open_absorber_file(&self, path: &Path) -> Result<()> {
        Self::open(&self.absorbers, path)
    }

    /// Flush and close the absorber-report sink.
    pub fn close_absorber_file(&self) -> Result<()> {
        Self::close(&self.absorbers)
    }

    /// Append one absorber record: label and deposited energy.
    ///
    /// * `label`     - The absorber label.
    /// * `deposited` - Total deposited energy.
    pub fn write_absorber_record(&self, label: &str, deposited: Float) -> Result<()> {
        let mut guard = self.absorbers.lock().unwrap();
        if let Some(writer) = guard.as_mut() {
            writeln!(writer, "{label} {deposited:.9e}")?;
        }
        Ok(())
    }
}
