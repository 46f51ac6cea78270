//! Circuit graph structure.
//!
//! The [`Circuit`] owns the node/branch arenas, every device instance, the
//! flat state arena the devices keep their scratch values in, and the most
//! recent DC/transient and AC solutions.

use std::collections::HashMap;
use std::ops::Range;

use log::debug;
use num_complex::Complex64;

use super::network::Network;
use super::types::{DeviceId, NodeId, Unknown};
use crate::components::{self, AcContext, Device, DeviceClass, EvalContext, GMIN};
use crate::error::{NodalError, Result};
use crate::props::{PropValue, Props};
use crate::solver::{Coefficients, History, Stamper, HISTORY_LEN};

/// Default circuit temperature (°C).
pub const DEFAULT_TEMPERATURE: f64 = 27.0;

/// A parameter preset bound to a device class, stored under its name.
#[derive(Debug, Clone)]
struct Model {
    class: &'static DeviceClass,
    props: Props,
}

/// Which family of device callbacks a solve drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Operating point: `load_dc` / `end_dc`
    Dc,
    /// Time step: `load_tr` / `end_tr`
    Transient,
}

/// Per-solve values handed to every device load.
#[derive(Debug, Clone, Copy)]
pub struct Conditions<'a> {
    pub time: f64,
    pub time_step: f64,
    pub source_factor: f64,
    pub gmin: f64,
    pub init_junctions: bool,
    pub use_ic: bool,
    pub coefficients: Option<&'a Coefficients>,
}

impl Default for Conditions<'_> {
    fn default() -> Self {
        Self {
            time: f64::NAN,
            time_step: f64::NAN,
            source_factor: 1.0,
            gmin: GMIN,
            init_junctions: false,
            use_ic: false,
            coefficients: None,
        }
    }
}

impl<'a> Conditions<'a> {
    fn context<'s>(&self, solution: &'s [f64], temperature: f64) -> EvalContext<'s>
    where
        'a: 's,
    {
        EvalContext {
            solution,
            time: self.time,
            time_step: self.time_step,
            temperature,
            source_factor: self.source_factor,
            gmin: self.gmin,
            init_junctions: self.init_junctions,
            use_ic: self.use_ic,
            coefficients: self.coefficients,
        }
    }
}

#[derive(Debug)]
struct DeviceSlot {
    device: Box<dyn Device>,
    state: Range<usize>,
}

/// A complete circuit ready for simulation.
#[derive(Debug)]
pub struct Circuit {
    network: Network,
    devices: Vec<DeviceSlot>,
    device_map: HashMap<String, DeviceId>,
    models: HashMap<String, Model>,
    /// Concatenated per-device state vectors
    state: Vec<f64>,
    /// Node voltages and branch currents from the last DC/transient solve
    solution: Vec<f64>,
    /// Phasors from the last AC solve
    ac_solution: Vec<Complex64>,
    temperature: f64,
    time: f64,
    frequency: f64,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit holding only the ground node.
    pub fn new() -> Self {
        Self {
            network: Network::new(),
            devices: Vec::new(),
            device_map: HashMap::new(),
            models: HashMap::new(),
            state: Vec::new(),
            solution: Vec::new(),
            ac_solution: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            time: f64::NAN,
            frequency: f64::NAN,
        }
    }

    // ============ Construction ============

    /// Create a node, rejecting an identifier already in use.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId> {
        self.network.add_node(name)
    }

    /// Return the node with this name, creating it on first use.
    pub fn node(&mut self, name: &str) -> NodeId {
        self.network.node(name)
    }

    /// Register a model preset for a device class.
    pub fn add_model(
        &mut self,
        name: &str,
        class: &str,
        props: &[(&str, PropValue)],
    ) -> Result<()> {
        if self.models.contains_key(name) {
            return Err(NodalError::DuplicateModel {
                name: name.to_string(),
            });
        }
        let class = components::lookup_class(class)?;
        let mut values = Props::new(class.schema);
        for (key, value) in props {
            values.set(key, value.clone())?;
        }
        self.models.insert(
            name.to_string(),
            Model {
                class,
                props: values,
            },
        );
        Ok(())
    }

    /// Add a device instance and connect it to the named terminals.
    pub fn add_device(
        &mut self,
        class: &str,
        name: &str,
        terminals: &[&str],
        props: &[(&str, PropValue)],
    ) -> Result<DeviceId> {
        let class = components::lookup_class(class)?;
        self.check_instance(class, name, terminals)?;
        let mut values = Props::new(class.schema);
        for (key, value) in props {
            values.set(key, value.clone())?;
        }
        self.insert(class, name, terminals, values)
    }

    /// Add a device instance whose props start from a model preset.
    pub fn add_device_with_model(
        &mut self,
        class: &str,
        name: &str,
        terminals: &[&str],
        model: &str,
        overrides: &[(&str, PropValue)],
    ) -> Result<DeviceId> {
        let class = components::lookup_class(class)?;
        let preset = self.models.get(model).ok_or_else(|| NodalError::UndefinedModel {
            model: model.to_string(),
            device: name.to_string(),
        })?;
        if !std::ptr::eq(preset.class, class) {
            return Err(NodalError::ModelClassMismatch {
                model: model.to_string(),
                model_class: preset.class.id.to_string(),
                device: name.to_string(),
                device_class: class.id.to_string(),
            });
        }
        let mut values = preset.props.clone();
        self.check_instance(class, name, terminals)?;
        for (key, value) in overrides {
            values.set(key, value.clone())?;
        }
        self.insert(class, name, terminals, values)
    }

    fn check_instance(&self, class: &DeviceClass, name: &str, terminals: &[&str]) -> Result<()> {
        if self.device_map.contains_key(name) {
            return Err(NodalError::DuplicateDevice {
                name: name.to_string(),
            });
        }
        if terminals.len() != class.num_terminals {
            return Err(NodalError::TerminalCount {
                device: name.to_string(),
                expected: class.num_terminals,
                found: terminals.len(),
            });
        }
        Ok(())
    }

    fn insert(
        &mut self,
        class: &'static DeviceClass,
        name: &str,
        terminals: &[&str],
        props: Props,
    ) -> Result<DeviceId> {
        let mut device = components::create(class, name, props)?;
        let nodes: Vec<NodeId> = terminals.iter().map(|t| self.network.node(t)).collect();
        device.connect(&mut self.network, &nodes)?;

        let start = self.state.len();
        self.state.resize(start + class.state_len, 0.0);
        let id = DeviceId(self.devices.len());
        self.devices.push(DeviceSlot {
            device,
            state: start..start + class.state_len,
        });
        self.device_map.insert(name.to_string(), id);
        debug!("added {} {} at {:?}", class.title, name, terminals);
        Ok(id)
    }

    /// Assign a sweepable variable: `temp` or `<device>.<prop>`.
    pub fn set_parameter(&mut self, variable: &str, value: f64) -> Result<()> {
        if variable.eq_ignore_ascii_case("temp") {
            if !value.is_finite() || value <= -CELSIUS_ABSOLUTE_ZERO {
                return Err(NodalError::invalid_param(format!(
                    "temperature must be above absolute zero, got {}",
                    value
                )));
            }
            self.temperature = value;
            return Ok(());
        }
        let (device, prop) = variable.split_once('.').ok_or_else(|| NodalError::UnknownParameter {
            name: variable.to_string(),
        })?;
        let id = self.find_device(device).ok_or_else(|| NodalError::DeviceNotFound {
            device: device.to_string(),
        })?;
        self.devices[id.0].device.props_mut().set(prop, value)
    }

    // ============ Accessors ============

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Number of MNA unknowns.
    pub fn size(&self) -> usize {
        self.network.size()
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Simulated time; NaN outside transient analysis.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Analysis frequency; NaN outside AC analysis.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub(crate) fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn find_device(&self, name: &str) -> Option<DeviceId> {
        self.device_map.get(name).copied()
    }

    pub fn device(&self, id: DeviceId) -> &dyn Device {
        self.devices[id.0].device.as_ref()
    }

    /// Device instances in insertion order.
    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &dyn Device)> + '_ {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, slot)| (DeviceId(i), slot.device.as_ref()))
    }

    /// The state vector of one device.
    pub fn device_state(&self, id: DeviceId) -> &[f64] {
        &self.state[self.devices[id.0].state.clone()]
    }

    /// Whether any device needs Newton iteration.
    pub fn has_nonlinear(&self) -> bool {
        self.devices.iter().any(|slot| slot.device.class().nonlinear)
    }

    /// Node voltages and branch currents, indexed like the unknown vector.
    pub fn solution(&self) -> &[f64] {
        &self.solution
    }

    pub(crate) fn set_solution(&mut self, solution: &[f64]) {
        self.solution.clear();
        self.solution.extend_from_slice(solution);
    }

    /// One entry of the solution vector.
    pub fn solution_at(&self, index: usize) -> Result<f64> {
        self.solution.get(index).copied().ok_or_else(NodalError::not_reset)
    }

    /// AC phasors, indexed like the unknown vector.
    pub fn ac_solution(&self) -> &[Complex64] {
        &self.ac_solution
    }

    /// One entry of the AC solution vector.
    pub fn ac_solution_at(&self, index: usize) -> Result<Complex64> {
        self.ac_solution.get(index).copied().ok_or_else(NodalError::not_reset)
    }

    pub(crate) fn set_ac_solution(&mut self, solution: Vec<Complex64>) {
        self.ac_solution = solution;
    }

    /// Voltage of a named node after the last solve.
    pub fn voltage(&self, node: &str) -> Result<f64> {
        let id = self.network.find_node(node).ok_or_else(|| NodalError::NodeNotFound {
            node: node.to_string(),
        })?;
        match self.network.node_index(id) {
            Some(index) => self.solution_at(index),
            None => Ok(0.0),
        }
    }

    /// Branch current of a named device after the last solve.
    pub fn current(&self, device: &str) -> Result<f64> {
        self.solution_at(self.branch_index(device)?)
    }

    /// Solution index of the branch owned by a device.
    pub fn branch_index(&self, device: &str) -> Result<usize> {
        self.network
            .branches()
            .iter()
            .find(|b| b.name == device)
            .map(|b| b.index)
            .ok_or_else(|| NodalError::DeviceNotFound {
                device: device.to_string(),
            })
    }

    /// Human-readable name of every unknown, e.g. `v(out)` or `i(V1)`.
    pub fn unknown_names(&self) -> Vec<String> {
        (0..self.size()).map(|i| self.network.describe(i)).collect()
    }

    pub fn unknowns(&self) -> &[Unknown] {
        self.network.unknowns()
    }

    // ============ Analysis lifecycle ============

    /// Clear voltages, currents and device state, then re-derive every
    /// device from its props.
    pub fn reset(&mut self) -> Result<()> {
        let size = self.size();
        self.solution = vec![0.0; size];
        self.ac_solution = vec![Complex64::new(0.0, 0.0); size];
        self.state.fill(0.0);
        self.time = f64::NAN;
        self.frequency = f64::NAN;
        for slot in &self.devices {
            slot.device
                .init(&mut self.state[slot.state.clone()], self.temperature)?;
        }
        Ok(())
    }

    /// Stamp every device for one solver iteration.
    pub fn load(&mut self, pass: Pass, conditions: &Conditions, stamper: &mut dyn Stamper) {
        let ctx = conditions.context(&self.solution, self.temperature);
        for slot in &self.devices {
            let state = &mut self.state[slot.state.clone()];
            match pass {
                Pass::Dc => slot.device.load_dc(state, &ctx, stamper),
                Pass::Transient => slot.device.load_tr(state, &ctx, stamper),
            }
        }
    }

    /// Let every device derive its outputs from a converged solution.
    pub fn finish(&mut self, pass: Pass, conditions: &Conditions) {
        let ctx = conditions.context(&self.solution, self.temperature);
        for slot in &self.devices {
            let state = &mut self.state[slot.state.clone()];
            match pass {
                Pass::Dc => slot.device.end_dc(state, &ctx),
                Pass::Transient => slot.device.end_tr(state, &ctx),
            }
        }
    }

    /// Seed integration history from the current solution.
    pub fn begin_transient(&mut self, conditions: &Conditions) {
        let ctx = conditions.context(&self.solution, self.temperature);
        for slot in &self.devices {
            slot.device.begin_tr(&mut self.state[slot.state.clone()], &ctx);
        }
    }

    /// Stamp the small-signal network at `frequency`.
    pub fn load_ac(&mut self, frequency: f64, stamper: &mut dyn Stamper<Complex64>) {
        let ctx = AcContext {
            solution: &self.solution,
            frequency,
            omega: 2.0 * std::f64::consts::PI * frequency,
            temperature: self.temperature,
        };
        for slot in &self.devices {
            slot.device.load_ac(&self.state[slot.state.clone()], &ctx, stamper);
        }
    }

    /// Move every integration history one slot older.
    pub fn shift_histories(&mut self) {
        for slot in &self.devices {
            for &offset in slot.device.class().storage {
                let start = slot.state.start + offset;
                History::new(&mut self.state[start..start + HISTORY_LEN]).shift();
            }
        }
    }
}

/// Magnitude of absolute zero in °C.
const CELSIUS_ABSOLUTE_ZERO: f64 = components::CELSIUS_TO_KELVIN;

#[cfg(test)]
mod tests {
    use super::*;

    fn divider() -> Circuit {
        let mut c = Circuit::new();
        c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
        c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
        c.add_device("R", "R2", &["out", "gnd"], &[("r", 1e3.into())]).unwrap();
        c
    }

    #[test]
    fn test_unknown_layout() {
        let c = divider();
        assert_eq!(c.unknown_names(), vec!["v(in)", "i(V1)", "v(out)"]);
        assert_eq!(c.branch_index("V1").unwrap(), 1);
        assert_eq!(c.devices().count(), 3);
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let mut c = divider();
        assert!(matches!(
            c.add_device("R", "R1", &["a", "0"], &[("r", 1.0.into())]),
            Err(NodalError::DuplicateDevice { .. })
        ));
    }

    #[test]
    fn test_terminal_count_checked() {
        let mut c = Circuit::new();
        assert!(matches!(
            c.add_device("R", "R1", &["a"], &[("r", 1.0.into())]),
            Err(NodalError::TerminalCount {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_prop_rejected_at_construction() {
        let mut c = Circuit::new();
        let err = c
            .add_device("R", "R1", &["a", "0"], &[("r", (-1.0).into())])
            .unwrap_err();
        assert!(err.to_string().contains("'r'"));
        assert!(err.to_string().contains("> 0"));
        assert!(c.find_device("R1").is_none());
    }

    #[test]
    fn test_model_presets() {
        let mut c = Circuit::new();
        c.add_model("fast", "D", &[("is", 1e-12.into())]).unwrap();
        assert!(matches!(
            c.add_model("fast", "D", &[]),
            Err(NodalError::DuplicateModel { .. })
        ));
        let id = c
            .add_device_with_model("D", "D1", &["a", "0"], "fast", &[("n", 2.0.into())])
            .unwrap();
        let props = c.device(id).props();
        assert_eq!(props.number("is").unwrap(), 1e-12);
        assert_eq!(props.number("n").unwrap(), 2.0);

        assert!(matches!(
            c.add_device_with_model("R", "R1", &["a", "0"], "fast", &[]),
            Err(NodalError::ModelClassMismatch { .. })
        ));
        assert!(matches!(
            c.add_device_with_model("D", "D2", &["a", "0"], "slow", &[]),
            Err(NodalError::UndefinedModel { .. })
        ));
    }

    #[test]
    fn test_set_parameter() {
        let mut c = divider();
        c.set_parameter("temp", 50.0).unwrap();
        assert_eq!(c.temperature(), 50.0);
        c.set_parameter("R2.r", 3e3).unwrap();
        let r2 = c.find_device("R2").unwrap();
        assert_eq!(c.device(r2).props().number("r").unwrap(), 3e3);

        assert!(c.set_parameter("R2.r", 0.0).is_err());
        assert!(matches!(
            c.set_parameter("bogus", 1.0),
            Err(NodalError::UnknownParameter { .. })
        ));
        assert!(matches!(
            c.set_parameter("R9.r", 1.0),
            Err(NodalError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_reset_sizes_solution_and_clears_conditions() {
        let mut c = divider();
        c.set_time(1.0);
        c.reset().unwrap();
        assert_eq!(c.solution().len(), 3);
        assert!(c.time().is_nan());
        assert!(c.frequency().is_nan());
        assert_eq!(c.voltage("0").unwrap(), 0.0);
        assert!(c.voltage("nowhere").is_err());
    }

    #[test]
    fn test_reads_need_a_reset_covering_every_unknown() {
        let mut c = divider();
        assert!(c.voltage("out").is_err());
        assert!(c.current("V1").is_err());
        // Ground needs no solution entry
        assert_eq!(c.voltage("0").unwrap(), 0.0);

        c.reset().unwrap();
        assert_eq!(c.voltage("out").unwrap(), 0.0);
        c.add_device("R", "R9", &["new", "0"], &[("r", 1.0.into())]).unwrap();
        assert!(matches!(c.voltage("new"), Err(NodalError::InvalidSimulationParam { .. })));
        assert!(c.ac_solution_at(3).is_err());

        c.reset().unwrap();
        assert_eq!(c.voltage("new").unwrap(), 0.0);
    }

    #[test]
    fn test_reset_rejects_zero_capacitor() {
        let mut c = Circuit::new();
        c.add_device("C", "C1", &["a", "0"], &[("c", 0.0.into())]).unwrap();
        assert!(matches!(c.reset(), Err(NodalError::ZeroReactance { .. })));
    }
}
