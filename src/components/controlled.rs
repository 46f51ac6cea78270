//! Linear dependent sources: VCCS (G) and VCVS (E).
//!
//! Terminal order is `out+, out-, ctrl+, ctrl-`.

use num_complex::Complex64;

use super::{AcContext, Device, DeviceClass, EvalContext, Output};
use crate::circuit::{Network, NodeId};
use crate::error::Result;
use crate::props::{PropSpec, Props};
use crate::solver::Stamper;

fn bind(network: &Network, terminals: &[NodeId]) -> [Option<usize>; 4] {
    [
        network.node_index(terminals[0]),
        network.node_index(terminals[1]),
        network.node_index(terminals[2]),
        network.node_index(terminals[3]),
    ]
}

fn control_voltage(nodes: &[Option<usize>; 4], ctx: &EvalContext) -> f64 {
    ctx.voltage(nodes[2]) - ctx.voltage(nodes[3])
}

// ============ VCCS ============

const G_GM: usize = 0;
const G_I: usize = 1;

pub static VCCS: DeviceClass = DeviceClass {
    id: "G",
    title: "Voltage-Controlled Current Source",
    num_terminals: 4,
    schema: &[PropSpec::real("gm", "Transconductance (S)", None, &[])],
    state_len: 2,
    outputs: &[Output { name: "i", unit: "A", slot: G_I }],
    nonlinear: false,
    storage: &[],
};

/// I(out+ → out-) = gm · (V[ctrl+] - V[ctrl-])
#[derive(Debug, Clone)]
pub struct Vccs {
    name: String,
    props: Props,
    nodes: [Option<usize>; 4],
}

impl Vccs {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 4],
        }
    }
}

impl Device for Vccs {
    fn class(&self) -> &'static DeviceClass {
        &VCCS
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
        self.nodes = bind(network, terminals);
        Ok(())
    }

    fn init(&self, state: &mut [f64], _temperature: f64) -> Result<()> {
        state.fill(0.0);
        state[G_GM] = self.props.number("gm")?;
        Ok(())
    }

    fn load_dc(&self, state: &mut [f64], _ctx: &EvalContext, stamper: &mut dyn Stamper) {
        let [op, on, cp, cn] = self.nodes;
        stamper.stamp_vccs(op, on, cp, cn, state[G_GM]);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[G_I] = state[G_GM] * control_voltage(&self.nodes, ctx);
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        let [op, on, cp, cn] = self.nodes;
        stamper.stamp_vccs(op, on, cp, cn, Complex64::new(state[G_GM], 0.0));
    }
}

// ============ VCVS ============

const E_GAIN: usize = 0;
const E_V: usize = 1;
const E_I: usize = 2;

pub static VCVS: DeviceClass = DeviceClass {
    id: "E",
    title: "Voltage-Controlled Voltage Source",
    num_terminals: 4,
    schema: &[PropSpec::real("gain", "Voltage gain", None, &[])],
    state_len: 3,
    outputs: &[
        Output { name: "v", unit: "V", slot: E_V },
        Output { name: "i", unit: "A", slot: E_I },
    ],
    nonlinear: false,
    storage: &[],
};

/// V[out+] - V[out-] = gain · (V[ctrl+] - V[ctrl-])
#[derive(Debug, Clone)]
pub struct Vcvs {
    name: String,
    props: Props,
    nodes: [Option<usize>; 4],
    branch: usize,
}

impl Vcvs {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 4],
            branch: 0,
        }
    }
}

impl Device for Vcvs {
    fn class(&self) -> &'static DeviceClass {
        &VCVS
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
        self.nodes = bind(network, terminals);
        let branch = network.alloc_branch(self.name.clone());
        self.branch = network.branch_index(branch);
        Ok(())
    }

    fn init(&self, state: &mut [f64], _temperature: f64) -> Result<()> {
        state.fill(0.0);
        state[E_GAIN] = self.props.number("gain")?;
        Ok(())
    }

    fn load_dc(&self, state: &mut [f64], _ctx: &EvalContext, stamper: &mut dyn Stamper) {
        let [op, on, cp, cn] = self.nodes;
        stamper.stamp_vcvs(op, on, cp, cn, self.branch, state[E_GAIN]);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[E_V] = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        state[E_I] = ctx.solution[self.branch];
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        let [op, on, cp, cn] = self.nodes;
        stamper.stamp_vcvs(op, on, cp, cn, self.branch, Complex64::new(state[E_GAIN], 0.0));
    }
}
