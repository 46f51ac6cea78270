//! Parameter sweeps and the nested sweep walker.
//!
//! A [`Sweep`] is a finite, restartable sequence of values bound to a
//! variable name. [`walk`] visits every combination of a list of sweeps
//! depth-first, first sweep outermost.

use std::fmt;

use crate::error::{NodalError, Result};

/// How a sweep spaces its values.
#[derive(Debug, Clone, PartialEq)]
pub enum Spacing {
    /// `points` values evenly spaced from `start` to `stop`
    Linear { start: f64, stop: f64, points: usize },
    /// `points` values evenly spaced in log scale
    Logarithmic { start: f64, stop: f64, points: usize },
    /// `per_decade` values per factor of ten, starting at `start`
    Decade { start: f64, stop: f64, per_decade: usize },
    /// Explicit values
    List(Vec<f64>),
}

/// A named sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    variable: String,
    spacing: Spacing,
}

impl Sweep {
    pub fn linear(variable: &str, start: f64, stop: f64, points: usize) -> Result<Self> {
        check_finite(start, stop)?;
        check_points(points)?;
        Ok(Self::build(variable, Spacing::Linear { start, stop, points }))
    }

    pub fn logarithmic(variable: &str, start: f64, stop: f64, points: usize) -> Result<Self> {
        check_log_bounds(start, stop)?;
        check_points(points)?;
        Ok(Self::build(variable, Spacing::Logarithmic { start, stop, points }))
    }

    pub fn decade(variable: &str, start: f64, stop: f64, per_decade: usize) -> Result<Self> {
        check_log_bounds(start, stop)?;
        check_points(per_decade)?;
        Ok(Self::build(
            variable,
            Spacing::Decade {
                start,
                stop,
                per_decade,
            },
        ))
    }

    pub fn list(variable: &str, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(NodalError::invalid_param(format!(
                "sweep '{}' has no values",
                variable
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "sweep '{}' contains non-finite value {}",
                variable, v
            )));
        }
        Ok(Self::build(variable, Spacing::List(values)))
    }

    fn build(variable: &str, spacing: Spacing) -> Self {
        Self {
            variable: variable.to_string(),
            spacing,
        }
    }

    /// Name of the swept variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn spacing(&self) -> &Spacing {
        &self.spacing
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        match &self.spacing {
            Spacing::Linear { points, .. } | Spacing::Logarithmic { points, .. } => *points,
            Spacing::Decade {
                start,
                stop,
                per_decade,
            } => {
                let decades = (stop / start).log10().abs();
                // Slack keeps an exact decade boundary from being lost to rounding
                (decades * *per_decade as f64 + 1e-9).floor() as usize + 1
            }
            Spacing::List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th value.
    pub fn value(&self, i: usize) -> f64 {
        match &self.spacing {
            Spacing::Linear { start, stop, points } => {
                if *points == 1 || i == 0 {
                    *start
                } else if i + 1 == *points {
                    *stop
                } else {
                    start + (stop - start) * i as f64 / (*points - 1) as f64
                }
            }
            Spacing::Logarithmic { start, stop, points } => {
                if *points == 1 || i == 0 {
                    *start
                } else if i + 1 == *points {
                    *stop
                } else {
                    start * (stop / start).powf(i as f64 / (*points - 1) as f64)
                }
            }
            Spacing::Decade {
                start,
                stop,
                per_decade,
            } => {
                let exponent = i as f64 / *per_decade as f64;
                if stop >= start {
                    start * 10f64.powf(exponent)
                } else {
                    start / 10f64.powf(exponent)
                }
            }
            Spacing::List(values) => values[i],
        }
    }

    /// A fresh iterator over the values; every call starts over.
    pub fn values(&self) -> Values<'_> {
        Values {
            sweep: self,
            next: 0,
            len: self.len(),
        }
    }
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.spacing {
            Spacing::Linear { start, stop, points } => {
                write!(f, "{} lin {} {} {}", self.variable, points, start, stop)
            }
            Spacing::Logarithmic { start, stop, points } => {
                write!(f, "{} log {} {} {}", self.variable, points, start, stop)
            }
            Spacing::Decade {
                start,
                stop,
                per_decade,
            } => write!(f, "{} dec {} {} {}", self.variable, per_decade, start, stop),
            Spacing::List(values) => write!(f, "{} list {:?}", self.variable, values),
        }
    }
}

/// Iterator over the values of a [`Sweep`].
#[derive(Debug, Clone)]
pub struct Values<'a> {
    sweep: &'a Sweep,
    next: usize,
    len: usize,
}

impl Iterator for Values<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next >= self.len {
            return None;
        }
        let value = self.sweep.value(self.next);
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Values<'_> {}

fn check_finite(start: f64, stop: f64) -> Result<()> {
    if start.is_finite() && stop.is_finite() {
        Ok(())
    } else {
        Err(NodalError::invalid_param(format!(
            "sweep bounds must be finite, got {} and {}",
            start, stop
        )))
    }
}

fn check_log_bounds(start: f64, stop: f64) -> Result<()> {
    check_finite(start, stop)?;
    if start > 0.0 && stop > 0.0 {
        Ok(())
    } else {
        Err(NodalError::invalid_param(format!(
            "logarithmic sweep bounds must be positive, got {} and {}",
            start, stop
        )))
    }
}

fn check_points(points: usize) -> Result<()> {
    if points == 0 {
        Err(NodalError::invalid_param("sweep needs at least one point"))
    } else {
        Ok(())
    }
}

/// Callbacks driven by [`walk`].
///
/// `depth` is the position of the sweep in the list handed to [`walk`].
pub trait SweepVisitor {
    /// About to iterate the sweep at `depth`.
    fn enter(&mut self, _depth: usize, _sweep: &Sweep) -> Result<()> {
        Ok(())
    }

    /// The sweep at `depth` takes `value`.
    fn set(&mut self, depth: usize, sweep: &Sweep, value: f64) -> Result<()>;

    /// Every sweep holds a value: one full combination.
    fn end(&mut self) -> Result<()>;

    /// Finished iterating the sweep at `depth`.
    fn leave(&mut self, _depth: usize, _sweep: &Sweep) -> Result<()> {
        Ok(())
    }
}

/// Visit every combination of `sweeps`. With no sweeps, `end` fires once.
///
/// The first error returned by a callback stops the walk.
pub fn walk<V: SweepVisitor + ?Sized>(sweeps: &[Sweep], visitor: &mut V) -> Result<()> {
    walk_from(sweeps, 0, visitor)
}

fn walk_from<V: SweepVisitor + ?Sized>(
    sweeps: &[Sweep],
    depth: usize,
    visitor: &mut V,
) -> Result<()> {
    let Some(sweep) = sweeps.get(depth) else {
        return visitor.end();
    };
    visitor.enter(depth, sweep)?;
    for value in sweep.values() {
        visitor.set(depth, sweep, value)?;
        walk_from(sweeps, depth + 1, visitor)?;
    }
    visitor.leave(depth, sweep)
}
