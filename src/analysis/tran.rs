//! Transient analysis.

use log::{info, warn};

use super::{run_sweeps, Analysis, Dataset, Probe};
use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::{NewtonOptions, TransientEngine, TransientOptions};
use crate::sweep::Sweep;

/// Time-domain run from t = 0 to the stop time, one row per step.
#[derive(Debug, Clone)]
pub struct TransientAnalysis {
    options: TransientOptions,
    newton: NewtonOptions,
    sweeps: Vec<Sweep>,
    probes: Option<Vec<Probe>>,
}

impl TransientAnalysis {
    pub fn new(options: TransientOptions) -> Self {
        Self {
            options,
            newton: NewtonOptions::default(),
            sweeps: Vec::new(),
            probes: None,
        }
    }

    /// Options for the Newton solve inside every step.
    pub fn with_newton(mut self, newton: NewtonOptions) -> Self {
        self.newton = newton;
        self
    }

    pub fn with_sweep(mut self, sweep: Sweep) -> Self {
        self.sweeps.push(sweep);
        self
    }

    pub fn with_probes(mut self, probes: Vec<Probe>) -> Self {
        self.probes = Some(probes);
        self
    }
}

impl Analysis for TransientAnalysis {
    fn run(&mut self, circuit: &mut Circuit) -> Result<Dataset> {
        let mut engine = TransientEngine::new(self.options.clone(), self.newton.clone())?;
        info!(
            "tran: {} unknowns, {} steps per run",
            circuit.size(),
            self.options.steps()
        );

        circuit.reset()?;
        let probes = self.probes.clone().unwrap_or_else(|| Probe::defaults(circuit));
        let columns =
            std::iter::once(("time", "s")).chain(probes.iter().map(|p| (p.name(), p.unit())));
        let mut dataset = Dataset::new(columns);

        let record = |circuit: &Circuit, dataset: &mut Dataset, time: f64| -> Result<()> {
            let mut row = Vec::with_capacity(probes.len() + 1);
            row.push(time);
            for probe in &probes {
                row.push(probe.measure(circuit)?);
            }
            dataset.push_row(row);
            Ok(())
        };

        let result = run_sweeps(circuit, &self.sweeps, |circuit, title| {
            circuit.reset()?;
            dataset.begin_group(title);
            engine.start(circuit)?;
            record(circuit, &mut dataset, 0.0)?;
            while engine.has_next() {
                let time = engine.step(circuit)?;
                record(circuit, &mut dataset, time)?;
            }
            Ok(())
        });
        if let Err(err) = result {
            warn!("tran aborted: {}", err);
            return Err(err);
        }

        info!("tran: {} points", dataset.row_count());
        Ok(dataset)
    }
}
