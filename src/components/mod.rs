//! Device models and the contract they implement.
//!
//! This module provides the [`Device`] trait every circuit element
//! implements, plus reference devices:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source
//! - Controlled: VCCS, VCVS
//! - Nonlinear: Diode
//!
//! A device owns its validated [`Props`] and the solution-vector indices
//! of its terminals. Everything that changes during an analysis lives in
//! the device's state vector, a fixed-length slice of the circuit's state
//! arena whose layout is declared by the device class.

mod controlled;
mod diode;
mod linear;
mod sources;

pub use controlled::{Vccs, Vcvs};
pub use diode::{limit_junction_voltage, Diode};
pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource, Waveform};

use std::fmt;

use num_complex::Complex64;

use crate::circuit::{Network, NodeId};
use crate::error::{NodalError, Result};
use crate::props::{Props, Schema};
use crate::solver::{Coefficients, Stamper};

/// Boltzmann constant over electron charge (V/K).
pub const K_OVER_Q: f64 = 8.617_333_262e-5;

/// Offset between Celsius and Kelvin.
pub const CELSIUS_TO_KELVIN: f64 = 273.15;

/// Default conductance shunted across nonlinear junctions (S).
pub const GMIN: f64 = 1e-12;

/// Stiffness of the initial-conditions solve: the conductance (S) that
/// holds a capacitor at its `ic` voltage and the resistance (Ω) that holds
/// an inductor at its `ic` current.
pub const IC_STIFFNESS: f64 = 1e9;

/// A named, unit-tagged slot of a device's state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub name: &'static str,
    pub unit: &'static str,
    pub slot: usize,
}

/// Static description of a device class.
#[derive(Debug)]
pub struct DeviceClass {
    /// Class id used by the circuit builder, e.g. `"R"`
    pub id: &'static str,
    pub title: &'static str,
    pub num_terminals: usize,
    pub schema: Schema,
    /// Length of each instance's state vector
    pub state_len: usize,
    /// Reportable state slots
    pub outputs: &'static [Output],
    /// Whether the operating point needs Newton iteration
    pub nonlinear: bool,
    /// Offsets of integration history buffers inside the state vector
    pub storage: &'static [usize],
}

/// Ambient values handed to DC and transient loads.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Solution from the previous iteration
    pub solution: &'a [f64],
    /// Simulated time; NaN outside transient analysis
    pub time: f64,
    /// Current step size; NaN selects DC behaviour
    pub time_step: f64,
    /// Circuit temperature (°C)
    pub temperature: f64,
    /// Scale applied to independent sources
    pub source_factor: f64,
    /// Conductance shunted across nonlinear junctions
    pub gmin: f64,
    /// First iteration of an operating-point solve
    pub init_junctions: bool,
    /// Start from device initial conditions instead of the solution
    pub use_ic: bool,
    /// Corrector coefficients for this step (transient only)
    pub coefficients: Option<&'a Coefficients>,
}

impl<'a> EvalContext<'a> {
    /// Context for a DC operating-point solve.
    pub fn dc(solution: &'a [f64], temperature: f64) -> Self {
        Self {
            solution,
            time: f64::NAN,
            time_step: f64::NAN,
            temperature,
            source_factor: 1.0,
            gmin: GMIN,
            init_junctions: false,
            use_ic: false,
            coefficients: None,
        }
    }

    /// Voltage of a node index; ground reads as zero.
    pub fn voltage(&self, node: Option<usize>) -> f64 {
        node.map(|i| self.solution[i]).unwrap_or(0.0)
    }

    /// Whether the device should behave as in a DC solve.
    pub fn is_dc(&self) -> bool {
        self.time_step.is_nan()
    }
}

/// Ambient values handed to AC loads.
#[derive(Debug, Clone, Copy)]
pub struct AcContext<'a> {
    /// Operating-point solution
    pub solution: &'a [f64],
    /// Frequency (Hz)
    pub frequency: f64,
    /// Angular frequency (rad/s)
    pub omega: f64,
    /// Circuit temperature (°C)
    pub temperature: f64,
}

/// The capability set every circuit element implements.
///
/// Call order per analysis: [`Device::connect`] once when the device joins
/// the circuit, [`Device::init`] at the start of every analysis, then the
/// `load_*` methods once per solver iteration and `end_*` after each
/// converged solve. `state` is always this instance's own slice.
pub trait Device: fmt::Debug {
    /// Static class description.
    fn class(&self) -> &'static DeviceClass;

    /// Instance identifier.
    fn name(&self) -> &str;

    fn props(&self) -> &Props;

    fn props_mut(&mut self) -> &mut Props;

    /// Bind terminal nodes and allocate any branch unknowns.
    fn connect(&mut self, network: &mut Network, terminals: &[NodeId]) -> Result<()>;

    /// Reset the state vector and derive coefficients from the props.
    fn init(&self, state: &mut [f64], temperature: f64) -> Result<()>;

    /// Stamp the DC (or linearized) contribution.
    fn load_dc(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper);

    /// Derive reportable quantities after a converged DC solve.
    fn end_dc(&self, _state: &mut [f64], _ctx: &EvalContext) {}

    /// Seed integration history once the initial point is known.
    fn begin_tr(&self, _state: &mut [f64], _ctx: &EvalContext) {}

    /// Stamp the transient contribution (companion model for reactive devices).
    fn load_tr(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        self.load_dc(state, ctx, stamper);
    }

    /// Update history and outputs after a converged transient solve.
    fn end_tr(&self, state: &mut [f64], ctx: &EvalContext) {
        self.end_dc(state, ctx);
    }

    /// Stamp the small-signal admittance and AC excitation.
    fn load_ac(&self, _state: &[f64], _ctx: &AcContext, _stamper: &mut dyn Stamper<Complex64>) {}
}

/// Every built-in device class.
pub static CLASSES: &[&DeviceClass] = &[
    &linear::RESISTOR,
    &linear::CAPACITOR,
    &linear::INDUCTOR,
    &sources::VOLTAGE_SOURCE,
    &sources::CURRENT_SOURCE,
    &controlled::VCCS,
    &controlled::VCVS,
    &diode::DIODE,
];

/// Look up a device class by id (case-insensitive).
pub fn lookup_class(id: &str) -> Result<&'static DeviceClass> {
    CLASSES
        .iter()
        .copied()
        .find(|class| class.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| NodalError::UnknownDeviceClass {
            class: id.to_string(),
        })
}

/// Instantiate a device of the given class from validated props.
pub fn create(class: &'static DeviceClass, name: &str, props: Props) -> Result<Box<dyn Device>> {
    props.validate_complete()?;
    let name = name.to_string();
    let device: Box<dyn Device> = match class.id {
        "R" => Box::new(Resistor::new(name, props)),
        "C" => Box::new(Capacitor::new(name, props)),
        "L" => Box::new(Inductor::new(name, props)),
        "V" => Box::new(VoltageSource::new(name, props)),
        "I" => Box::new(CurrentSource::new(name, props)),
        "G" => Box::new(Vccs::new(name, props)),
        "E" => Box::new(Vcvs::new(name, props)),
        "D" => Box::new(Diode::new(name, props)),
        other => {
            return Err(NodalError::UnknownDeviceClass {
                class: other.to_string(),
            })
        }
    };
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_class() {
        assert_eq!(lookup_class("r").unwrap().id, "R");
        assert_eq!(lookup_class("D").unwrap().num_terminals, 2);
        assert!(matches!(
            lookup_class("Q"),
            Err(NodalError::UnknownDeviceClass { .. })
        ));
    }

    #[test]
    fn test_output_slots_fit_state() {
        for class in CLASSES {
            for output in class.outputs {
                assert!(output.slot < class.state_len, "{}.{}", class.id, output.name);
            }
            for &offset in class.storage {
                assert!(offset + crate::solver::HISTORY_LEN <= class.state_len, "{}", class.id);
            }
        }
    }

    #[test]
    fn test_only_diode_is_nonlinear() {
        let nonlinear: Vec<_> = CLASSES.iter().filter(|c| c.nonlinear).map(|c| c.id).collect();
        assert_eq!(nonlinear, vec!["D"]);
    }

    #[test]
    fn test_create_requires_complete_props() {
        let class = lookup_class("R").unwrap();
        assert!(matches!(
            create(class, "R1", Props::new(class.schema)),
            Err(NodalError::MissingProperty { .. })
        ));
    }
}
