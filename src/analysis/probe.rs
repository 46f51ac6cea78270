//! Named, unit-tagged read-only accessors over a solved circuit.

use num_complex::Complex64;

use crate::circuit::{Circuit, DeviceId, Unknown};
use crate::error::{NodalError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Ground,
    Unknown(usize),
    State { device: DeviceId, slot: usize },
}

/// A probe over a node voltage, a branch current or a device output.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    name: String,
    unit: &'static str,
    target: Target,
}

impl Probe {
    /// Voltage of a node, named `v(<node>)`.
    pub fn voltage(circuit: &Circuit, node: &str) -> Result<Self> {
        let network = circuit.network();
        let id = network.find_node(node).ok_or_else(|| NodalError::NodeNotFound {
            node: node.to_string(),
        })?;
        let target = match network.node_index(id) {
            Some(index) => Target::Unknown(index),
            None => Target::Ground,
        };
        Ok(Self {
            name: format!("v({})", network.node_name(id)),
            unit: "V",
            target,
        })
    }

    /// Branch current of a device, named `i(<device>)`.
    pub fn current(circuit: &Circuit, device: &str) -> Result<Self> {
        Ok(Self {
            name: format!("i({})", device),
            unit: "A",
            target: Target::Unknown(circuit.branch_index(device)?),
        })
    }

    /// A device output slot, named `<device>.<output>`.
    pub fn output(circuit: &Circuit, device: &str, output: &str) -> Result<Self> {
        let id = circuit.find_device(device).ok_or_else(|| NodalError::DeviceNotFound {
            device: device.to_string(),
        })?;
        let out = circuit
            .device(id)
            .class()
            .outputs
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(output))
            .ok_or_else(|| NodalError::UnknownProperty {
                property: format!("{}.{}", device, output),
            })?;
        Ok(Self {
            name: format!("{}.{}", device, out.name),
            unit: out.unit,
            target: Target::State {
                device: id,
                slot: out.slot,
            },
        })
    }

    /// One probe per MNA unknown, in index order.
    pub fn unknowns(circuit: &Circuit) -> Vec<Self> {
        circuit
            .unknowns()
            .iter()
            .enumerate()
            .map(|(index, unknown)| Self {
                name: circuit.network().describe(index),
                unit: match unknown {
                    Unknown::Voltage(_) => "V",
                    Unknown::Current(_) => "A",
                },
                target: Target::Unknown(index),
            })
            .collect()
    }

    /// Every unknown followed by every device output.
    pub fn defaults(circuit: &Circuit) -> Vec<Self> {
        let mut probes = Self::unknowns(circuit);
        for (id, device) in circuit.devices() {
            for out in device.class().outputs {
                probes.push(Self {
                    name: format!("{}.{}", device.name(), out.name),
                    unit: out.unit,
                    target: Target::State {
                        device: id,
                        slot: out.slot,
                    },
                });
            }
        }
        probes
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Value after the last DC or transient solve.
    pub fn measure(&self, circuit: &Circuit) -> Result<f64> {
        match self.target {
            Target::Ground => Ok(0.0),
            Target::Unknown(index) => circuit.solution_at(index),
            Target::State { device, slot } => Ok(circuit.device_state(device)[slot]),
        }
    }

    /// Phasor after the last AC solve; NaN for device outputs.
    pub fn measure_ac(&self, circuit: &Circuit) -> Result<Complex64> {
        match self.target {
            Target::Ground => Ok(Complex64::new(0.0, 0.0)),
            Target::Unknown(index) => circuit.ac_solution_at(index),
            Target::State { .. } => Ok(Complex64::new(f64::NAN, f64::NAN)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn divider() -> Circuit {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())]).unwrap();
        c.reset().unwrap();
        c
    }

    #[test]
    fn test_default_probe_names() {
        let c = divider();
        let names: Vec<String> = Probe::defaults(&c).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["v(in)", "i(V1)", "v(out)", "V1.v", "V1.i", "R1.v", "R1.i", "R2.v", "R2.i"]
        );
    }

    #[test]
    fn test_explicit_probes() {
        let c = divider();
        assert_eq!(Probe::voltage(&c, "out").unwrap().unit(), "V");
        assert_eq!(Probe::voltage(&c, "gnd").unwrap().measure(&c).unwrap(), 0.0);
        assert_eq!(Probe::current(&c, "V1").unwrap().name(), "i(V1)");
        assert_eq!(Probe::output(&c, "R2", "I").unwrap().name(), "R2.i");
        assert!(Probe::voltage(&c, "missing").is_err());
        assert!(Probe::current(&c, "R1").is_err());
        assert!(Probe::output(&c, "R1", "power").is_err());
    }

    #[test]
    fn test_measure_before_reset_is_an_error() {
        let mut c = Circuit::new();
        c.add_device("R", "R1", &["a", "0"], &[("r", 1.0.into())]).unwrap();
        let probe = Probe::voltage(&c, "a").unwrap();
        assert!(probe.measure(&c).is_err());
        assert!(probe.measure_ac(&c).is_err());

        c.reset().unwrap();
        assert_eq!(probe.measure(&c).unwrap(), 0.0);
        let output = Probe::output(&c, "R1", "i").unwrap();
        assert!(output.measure_ac(&c).unwrap().re.is_nan());
    }
}
