//! Plain-text PPM rendering of a network's decision surface over a 2-D grid.
//!
//! The output is a `P3` image: a header with width, height and the maximum channel value
//! 255, then one line of `R G B` triples per pixel row, top row (largest `y`) first.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{NetError, NetResult};
use crate::learner::Predictor;
use crate::network::{Network, OutputEncoding};

/// Largest image `write_decision_surface` will render.
pub const MAX_PIXELS: usize = 1 << 24;

/// Sampling grid. Pixel `(col, row)` sits at `(x_min + col * step, y_max - row * step)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub step: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            x_min: -1.0,
            x_max: 1.0,
            y_min: -1.0,
            y_max: 1.0,
            step: 0.01,
        }
    }
}

impl Grid {
    pub fn width(&self) -> usize {
        ((self.x_max - self.x_min) / self.step).round().max(0.0) as usize
    }

    pub fn height(&self) -> usize {
        ((self.y_max - self.y_min) / self.step).round().max(0.0) as usize
    }

    /// Rejects grids that are empty, inverted, not finite or larger than [`MAX_PIXELS`].
    pub fn validate(&self) -> NetResult<()> {
        let bounds = [self.x_min, self.x_max, self.y_min, self.y_max];
        if !bounds.iter().all(|b| b.is_finite()) {
            return Err(NetError::InvalidData(format!("grid bounds must be finite: {self:?}")));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(NetError::InvalidData(format!(
                "grid step must be finite and positive, got {}",
                self.step
            )));
        }
        if self.x_max <= self.x_min || self.y_max <= self.y_min {
            return Err(NetError::InvalidData(format!("grid range is empty or inverted: {self:?}")));
        }
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 || width.saturating_mul(height) > MAX_PIXELS {
            return Err(NetError::InvalidData(format!(
                "grid of {width}x{height} pixels is outside 1..={MAX_PIXELS}"
            )));
        }
        Ok(())
    }
}

/// Grey level for a prediction: class indices spread over `0..=255`, continuous outputs
/// scaled by 255.
fn shade(encoding: OutputEncoding, prediction: f64) -> u8 {
    let scale = match encoding {
        OutputEncoding::OneHot(n) if n > 1 => 255.0 / (n - 1) as f64,
        _ => 255.0,
    };
    (prediction * scale).round().clamp(0.0, 255.0) as u8
}

/// Writes the decision surface of a two-input network.
pub fn write_decision_surface<W: Write>(
    network: &Network,
    grid: &Grid,
    mut out: W,
) -> NetResult<()> {
    grid.validate()?;
    let (width, height) = (grid.width(), grid.height());
    writeln!(out, "P3\n{} {}\n255", width, height)?;
    for row in 0..height {
        let y = grid.y_max - row as f64 * grid.step;
        let mut line = String::with_capacity(width * 12);
        for col in 0..width {
            let x = grid.x_min + col as f64 * grid.step;
            let v = shade(network.encoding(), network.predict(&[x, y])?);
            if col > 0 {
                line.push(' ');
            }
            line.push_str(&format!("{v} {v} {v}"));
        }
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

pub fn export_decision_surface<P: AsRef<Path>>(
    network: &Network,
    grid: &Grid,
    path: P,
) -> NetResult<()> {
    grid.validate()?;
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let out = BufWriter::new(File::create(path)?);
    write_decision_surface(network, grid, out)
}
