//! DC operating-point analysis, optionally swept.

use log::{info, warn};

use super::{run_sweeps, Analysis, Dataset, Probe};
use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::{NewtonOptions, NewtonRaphson};
use crate::sweep::Sweep;

/// One operating point per sweep combination.
#[derive(Debug, Clone, Default)]
pub struct DcAnalysis {
    options: NewtonOptions,
    sweeps: Vec<Sweep>,
    probes: Option<Vec<Probe>>,
}

impl DcAnalysis {
    pub fn new(options: NewtonOptions) -> Self {
        Self {
            options,
            sweeps: Vec::new(),
            probes: None,
        }
    }

    /// Add a sweep, nested inside any added before it.
    pub fn with_sweep(mut self, sweep: Sweep) -> Self {
        self.sweeps.push(sweep);
        self
    }

    /// Replace the default probes.
    pub fn with_probes(mut self, probes: Vec<Probe>) -> Self {
        self.probes = Some(probes);
        self
    }
}

impl Analysis for DcAnalysis {
    fn run(&mut self, circuit: &mut Circuit) -> Result<Dataset> {
        self.options.validate()?;
        info!("dc: {} unknowns, {} sweeps", circuit.size(), self.sweeps.len());

        circuit.reset()?;
        let probes = self.probes.clone().unwrap_or_else(|| Probe::defaults(circuit));
        let mut dataset = Dataset::new(probes.iter().map(|p| (p.name(), p.unit())));
        let mut newton = NewtonRaphson::new(self.options.clone());

        let result = run_sweeps(circuit, &self.sweeps, |circuit, title| {
            circuit.reset()?;
            newton.operating_point(circuit, f64::NAN)?;
            dataset.begin_group(title);
            let row = probes.iter().map(|p| p.measure(circuit)).collect::<Result<Vec<_>>>()?;
            dataset.push_row(row);
            Ok(())
        });
        if let Err(err) = result {
            warn!("dc aborted: {}", err);
            return Err(err);
        }

        info!("dc: {} points", dataset.row_count());
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_swept_divider() {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())]).unwrap();

        let out = Probe::voltage(&c, "out").unwrap();
        let mut dc = DcAnalysis::default()
            .with_sweep(Sweep::list("R2.r", vec![1e3, 3e3]).unwrap())
            .with_probes(vec![out]);
        let ds = dc.run(&mut c).unwrap();

        assert_eq!(ds.columns().len(), 1);
        let groups = ds.row_groups();
        assert_eq!(groups[0].title, "R2.r=1000");
        assert_relative_eq!(groups[0].rows[0][0], 5.0, epsilon = 1e-12);
        assert_eq!(groups[1].title, "R2.r=3000");
        assert_relative_eq!(groups[1].rows[0][0], 7.5, epsilon = 1e-12);
    }

    #[test]
    fn test_device_outputs_reported() {
        let mut c = Circuit::new();
        c.add_device("I", "I1", &["0", "a"], &[("dc", 2e-3.into())]).unwrap();
        c.add_device("R", "R1", &["a", "0"], &[("r", 500.0.into())]).unwrap();
        let ds = DcAnalysis::default().run(&mut c).unwrap();
        let v = ds.column(0, "v(a)").unwrap();
        let i = ds.column(0, "R1.i").unwrap();
        assert_relative_eq!(v[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(i[0], 2e-3, epsilon = 1e-15);
        assert_eq!(ds.row_groups()[0].title, "default");
    }
}
