//! Linear passive components: Resistor, Capacitor, Inductor.

use num_complex::Complex64;

use super::{AcContext, Device, DeviceClass, EvalContext, Output, IC_STIFFNESS};
use crate::circuit::{Network, NodeId};
use crate::error::{NodalError, Result};
use crate::props::{Bound, PropSpec, Props};
use crate::solver::{History, Stamper, HISTORY_LEN};

// ============ Resistor ============

const R_G: usize = 0;
const R_V: usize = 1;
const R_I: usize = 2;

pub static RESISTOR: DeviceClass = DeviceClass {
    id: "R",
    title: "Resistor",
    num_terminals: 2,
    schema: &[PropSpec::real("r", "Resistance (Ω)", None, &[Bound::gt(0.0)])],
    state_len: 3,
    outputs: &[
        Output { name: "v", unit: "V", slot: R_V },
        Output { name: "i", unit: "A", slot: R_I },
    ],
    nonlinear: false,
    storage: &[],
};

/// A resistor component.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
}

impl Resistor {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
        }
    }
}

impl Device for Resistor {
    fn class(&self) -> &'static DeviceClass {
        &RESISTOR
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn props(&self) -> &Props {
        &self.props
    }

    fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    fn connect(&mut self, network: &mut Network, terminals: &[NodeId]) -> Result<()> {
        self.nodes = [network.node_index(terminals[0]), network.node_index(terminals[1])];
        Ok(())
    }

    fn init(&self, state: &mut [f64], _temperature: f64) -> Result<()> {
        state.fill(0.0);
        state[R_G] = 1.0 / self.props.number("r")?;
        Ok(())
    }

    fn load_dc(&self, state: &mut [f64], _ctx: &EvalContext, stamper: &mut dyn Stamper) {
        stamper.stamp_conductance(self.nodes[0], self.nodes[1], state[R_G]);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        let v = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        state[R_V] = v;
        state[R_I] = v * state[R_G];
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        stamper.stamp_conductance(self.nodes[0], self.nodes[1], Complex64::new(state[R_G], 0.0));
    }
}

// ============ Capacitor ============

const C_C: usize = 0;
const C_V: usize = 1;
const C_I: usize = 2;
const C_HIST: usize = 3;

pub static CAPACITOR: DeviceClass = DeviceClass {
    id: "C",
    title: "Capacitor",
    num_terminals: 2,
    schema: &[
        PropSpec::real("c", "Capacitance (F)", None, &[Bound::ge(0.0)]),
        PropSpec::real("ic", "Initial voltage (V)", Some(0.0), &[]),
    ],
    state_len: C_HIST + HISTORY_LEN,
    outputs: &[
        Output { name: "v", unit: "V", slot: C_V },
        Output { name: "i", unit: "A", slot: C_I },
    ],
    nonlinear: false,
    storage: &[C_HIST],
};

/// A capacitor component.
///
/// Open circuit at DC, or a stiff Norton source at its `ic` voltage when
/// the initial conditions are solved. In transient analysis the capacitor is replaced for
/// each step by its companion model: with the corrector written as
///   v[n+1] = K + h·b0·i[n+1]/C
/// where K collects the history terms, the device stamps
///   G_eq = C / (h·b0)
/// in parallel with a current source I_eq = G_eq·K driven into its
/// positive node.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
}

impl Capacitor {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
        }
    }

    fn voltage(&self, ctx: &EvalContext) -> f64 {
        ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1])
    }

    /// Companion conductance and history term for the current step.
    fn companion(&self, state: &[f64], ctx: &EvalContext) -> Option<(f64, f64)> {
        let coeffs = ctx.coefficients?;
        let h = ctx.time_step;
        let hist = History::new(&state[C_HIST..C_HIST + HISTORY_LEN]);
        let known = coeffs.known_part(&hist, h);
        Some((state[C_C] / (h * coeffs.b0()), known))
    }
}

impl Device for Capacitor {
    fn class(&self) -> &'static DeviceClass {
        &CAPACITOR
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn props(&self) -> &Props {
        &self.props
    }

    fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    fn connect(&mut self, network: &mut Network, terminals: &[NodeId]) -> Result<()> {
        self.nodes = [network.node_index(terminals[0]), network.node_index(terminals[1])];
        Ok(())
    }

    fn init(&self, state: &mut [f64], _temperature: f64) -> Result<()> {
        let c = self.props.number("c")?;
        if c == 0.0 {
            return Err(NodalError::ZeroReactance {
                device: self.name.clone(),
                quantity: "capacitance",
            });
        }
        state.fill(0.0);
        state[C_C] = c;
        Ok(())
    }

    fn load_dc(&self, _state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        if ctx.use_ic {
            let ic = self.props.number("ic").unwrap_or(0.0);
            stamper.stamp_conductance(self.nodes[0], self.nodes[1], IC_STIFFNESS);
            stamper.stamp_current_source(self.nodes[1], self.nodes[0], IC_STIFFNESS * ic);
        }
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[C_V] = self.voltage(ctx);
        state[C_I] = 0.0;
    }

    fn begin_tr(&self, state: &mut [f64], ctx: &EvalContext) {
        let v0 = if ctx.use_ic {
            self.props.number("ic").unwrap_or(0.0)
        } else {
            self.voltage(ctx)
        };
        state[C_V] = v0;
        state[C_I] = 0.0;
        History::new(&mut state[C_HIST..C_HIST + HISTORY_LEN]).fill(ctx.time_step, v0, 0.0);
    }

    fn load_tr(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        if let Some((geq, known)) = self.companion(state, ctx) {
            stamper.stamp_conductance(self.nodes[0], self.nodes[1], geq);
            // I_eq flows from the negative to the positive node
            stamper.stamp_current_source(self.nodes[1], self.nodes[0], geq * known);
        }
    }

    fn end_tr(&self, state: &mut [f64], ctx: &EvalContext) {
        let Some(coeffs) = ctx.coefficients else {
            return self.end_dc(state, ctx);
        };
        let h = ctx.time_step;
        let v = self.voltage(ctx);
        let mut hist = History::new(&mut state[C_HIST..C_HIST + HISTORY_LEN]);
        let known = coeffs.known_part(&hist, h);
        let dvdt = coeffs.derivative(v, known, h);
        hist.set(0, h, v, dvdt);
        state[C_V] = v;
        state[C_I] = state[C_C] * dvdt;
    }

    fn load_ac(&self, state: &[f64], ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        let y = Complex64::new(0.0, ctx.omega * state[C_C]);
        stamper.stamp_conductance(self.nodes[0], self.nodes[1], y);
    }
}

// ============ Inductor ============

const L_L: usize = 0;
const L_V: usize = 1;
const L_I: usize = 2;
const L_HIST: usize = 3;

pub static INDUCTOR: DeviceClass = DeviceClass {
    id: "L",
    title: "Inductor",
    num_terminals: 2,
    schema: &[
        PropSpec::real("l", "Inductance (H)", None, &[Bound::ge(0.0)]),
        PropSpec::real("ic", "Initial current (A)", Some(0.0), &[]),
    ],
    state_len: L_HIST + HISTORY_LEN,
    outputs: &[
        Output { name: "v", unit: "V", slot: L_V },
        Output { name: "i", unit: "A", slot: L_I },
    ],
    nonlinear: false,
    storage: &[L_HIST],
};

/// An inductor component.
///
/// Requires a branch current unknown. A short circuit at DC. The
/// initial-conditions solve and every transient step share the branch
/// equation
///   v = R_eq·i - R_eq·K,  R_eq = L / (h·b0)
/// with K = `ic` and R_eq = [`IC_STIFFNESS`] for the former; in transient
/// analysis R_eq = L / (h·b0) and K collects the history terms of the
/// corrector.
#[derive(Debug, Clone)]
pub struct Inductor {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
    branch: usize,
}

impl Inductor {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
            branch: 0,
        }
    }

    fn companion(&self, state: &[f64], ctx: &EvalContext) -> Option<(f64, f64)> {
        let coeffs = ctx.coefficients?;
        let h = ctx.time_step;
        let hist = History::new(&state[L_HIST..L_HIST + HISTORY_LEN]);
        let known = coeffs.known_part(&hist, h);
        Some((state[L_L] / (h * coeffs.b0()), known))
    }

    /// v = R_eq·(i - K) across the branch.
    fn stamp_branch(&self, req: f64, known: f64, stamper: &mut dyn Stamper) {
        stamper.stamp_voltage_source(self.nodes[0], self.nodes[1], self.branch, -req * known);
        stamper.stamp_a(self.branch, self.branch, -req);
    }
}

impl Device for Inductor {
    fn class(&self) -> &'static DeviceClass {
        &INDUCTOR
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn props(&self) -> &Props {
        &self.props
    }

    fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    fn connect(&mut self, network: &mut Network, terminals: &[NodeId]) -> Result<()> {
        self.nodes = [network.node_index(terminals[0]), network.node_index(terminals[1])];
        let branch = network.alloc_branch(self.name.clone());
        self.branch = network.branch_index(branch);
        Ok(())
    }

    fn init(&self, state: &mut [f64], _temperature: f64) -> Result<()> {
        let l = self.props.number("l")?;
        if l == 0.0 {
            return Err(NodalError::ZeroReactance {
                device: self.name.clone(),
                quantity: "inductance",
            });
        }
        state.fill(0.0);
        state[L_L] = l;
        Ok(())
    }

    fn load_dc(&self, _state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        if ctx.use_ic {
            let ic = self.props.number("ic").unwrap_or(0.0);
            self.stamp_branch(IC_STIFFNESS, ic, stamper);
        } else {
            stamper.stamp_voltage_source(self.nodes[0], self.nodes[1], self.branch, 0.0);
        }
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[L_V] = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        state[L_I] = ctx.solution[self.branch];
    }

    fn begin_tr(&self, state: &mut [f64], ctx: &EvalContext) {
        let i0 = if ctx.use_ic {
            self.props.number("ic").unwrap_or(0.0)
        } else {
            ctx.solution[self.branch]
        };
        state[L_V] = 0.0;
        state[L_I] = i0;
        History::new(&mut state[L_HIST..L_HIST + HISTORY_LEN]).fill(ctx.time_step, i0, 0.0);
    }

    fn load_tr(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        match self.companion(state, ctx) {
            Some((req, known)) => self.stamp_branch(req, known, stamper),
            None => self.load_dc(state, ctx, stamper),
        }
    }

    fn end_tr(&self, state: &mut [f64], ctx: &EvalContext) {
        let Some(coeffs) = ctx.coefficients else {
            return self.end_dc(state, ctx);
        };
        let h = ctx.time_step;
        let i = ctx.solution[self.branch];
        let mut hist = History::new(&mut state[L_HIST..L_HIST + HISTORY_LEN]);
        let known = coeffs.known_part(&hist, h);
        let didt = coeffs.derivative(i, known, h);
        hist.set(0, h, i, didt);
        state[L_V] = state[L_L] * didt;
        state[L_I] = i;
    }

    fn load_ac(&self, state: &[f64], ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        let zero = Complex64::new(0.0, 0.0);
        let z = Complex64::new(0.0, -ctx.omega * state[L_L]);
        stamper.stamp_voltage_source(self.nodes[0], self.nodes[1], self.branch, zero);
        stamper.stamp_a(self.branch, self.branch, z);
    }
}
