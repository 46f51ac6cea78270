//! Small-signal frequency sweep.

use log::{debug, info, warn};

use super::{run_sweeps, Analysis, Dataset, Probe};
use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::{magnitude, phase_degrees, AcSolver, NewtonOptions, NewtonRaphson};
use crate::sweep::Sweep;

/// Frequency points and linearization choice.
#[derive(Debug, Clone)]
pub struct AcOptions {
    /// Frequencies in Hz
    pub sweep: Sweep,
    /// Linearize around the DC operating point; otherwise around the
    /// initial device state
    pub use_operating_point: bool,
}

impl AcOptions {
    pub fn new(sweep: Sweep) -> Self {
        Self {
            sweep,
            use_operating_point: true,
        }
    }

    pub fn with_operating_point(mut self, use_operating_point: bool) -> Self {
        self.use_operating_point = use_operating_point;
        self
    }
}

/// Magnitude and phase of every probe at every frequency.
#[derive(Debug, Clone)]
pub struct AcAnalysis {
    options: AcOptions,
    newton: NewtonOptions,
    sweeps: Vec<Sweep>,
    probes: Option<Vec<Probe>>,
}

impl AcAnalysis {
    pub fn new(options: AcOptions) -> Self {
        Self {
            options,
            newton: NewtonOptions::default(),
            sweeps: Vec::new(),
            probes: None,
        }
    }

    pub fn with_newton(mut self, newton: NewtonOptions) -> Self {
        self.newton = newton;
        self
    }

    pub fn with_sweep(mut self, sweep: Sweep) -> Self {
        self.sweeps.push(sweep);
        self
    }

    /// Replace the default probes. Device-output probes read NaN.
    pub fn with_probes(mut self, probes: Vec<Probe>) -> Self {
        self.probes = Some(probes);
        self
    }
}

impl Analysis for AcAnalysis {
    fn run(&mut self, circuit: &mut Circuit) -> Result<Dataset> {
        self.newton.validate()?;
        info!(
            "ac: {} unknowns, {} frequencies",
            circuit.size(),
            self.options.sweep.len()
        );

        circuit.reset()?;
        let probes = self.probes.clone().unwrap_or_else(|| Probe::unknowns(circuit));
        let mut columns = vec![("frequency".to_string(), "Hz")];
        for probe in &probes {
            columns.push((format!("|{}|", probe.name()), probe.unit()));
            columns.push((format!("∠{}", probe.name()), "deg"));
        }
        let mut dataset = Dataset::new(columns);

        let mut newton = NewtonRaphson::new(self.newton.clone());
        let mut solver = AcSolver::default();
        let frequencies = &self.options.sweep;
        let use_operating_point = self.options.use_operating_point;

        let result = run_sweeps(circuit, &self.sweeps, |circuit, title| {
            circuit.reset()?;
            if use_operating_point {
                let iterations = newton.operating_point(circuit, f64::NAN)?;
                debug!("ac operating point in {} iterations", iterations);
            }
            dataset.begin_group(title);
            for frequency in frequencies.values() {
                solver.solve(circuit, frequency)?;
                let mut row = Vec::with_capacity(2 * probes.len() + 1);
                row.push(frequency);
                for probe in &probes {
                    let z = probe.measure_ac(circuit)?;
                    row.push(magnitude(z));
                    row.push(phase_degrees(z));
                }
                dataset.push_row(row);
            }
            Ok(())
        });
        if let Err(err) = result {
            warn!("ac aborted: {}", err);
            return Err(err);
        }

        info!("ac: {} points", dataset.row_count());
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn lowpass() -> Circuit {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("ac", 1.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("C", "C1", &["out", "0"], &[("c", 1e-6.into())]).unwrap();
        c
    }

    #[test]
    fn test_lowpass_corner() {
        let corner = 1.0 / (2.0 * PI * 1e3 * 1e-6);
        let sweep = Sweep::list("frequency", vec![corner]).unwrap();
        let mut c = lowpass();
        let ds = AcAnalysis::new(AcOptions::new(sweep).with_operating_point(false))
            .run(&mut c)
            .unwrap();

        assert_eq!(ds.columns()[0].name, "frequency");
        let mag = ds.column(0, "|v(out)|").unwrap();
        let phase = ds.column(0, "∠v(out)").unwrap();
        assert_relative_eq!(mag[0], 1.0 / 2f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(phase[0], -45.0, epsilon = 1e-6);
    }

    #[test]
    fn test_decade_rolloff() {
        let sweep = Sweep::decade("frequency", 1e3, 1e5, 1).unwrap();
        let mut c = lowpass();
        let ds = AcAnalysis::new(AcOptions::new(sweep)).run(&mut c).unwrap();
        let mag = ds.column(0, "|v(out)|").unwrap();
        assert_eq!(mag.len(), 3);
        // Roughly -20 dB per decade well above the corner
        let ratio = mag[1] / mag[2];
        assert!((ratio - 10.0).abs() < 0.1, "ratio {}", ratio);
    }
}
