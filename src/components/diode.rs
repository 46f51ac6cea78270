//! Junction diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current operating point:
//!   I ≈ I0 + G_d * (V - V0)
//!
//! where G_d = dI/dV = Is/(n*Vt) * exp(V0/(n*Vt))
//!
//! Between iterations the junction voltage is limited with the SPICE
//! `pnjlim` rule so the exponential cannot run away.

use std::f64::consts::SQRT_2;

use num_complex::Complex64;

use super::{
    AcContext, Device, DeviceClass, EvalContext, Output, CELSIUS_TO_KELVIN, GMIN, K_OVER_Q,
};
use crate::circuit::{Network, NodeId};
use crate::error::Result;
use crate::props::{Bound, PropSpec, Props};
use crate::solver::Stamper;

const D_VD: usize = 0;
const D_ID: usize = 1;
const D_GD: usize = 2;
const D_VCRIT: usize = 3;
const D_NVT: usize = 4;
const D_IS: usize = 5;

pub static DIODE: DeviceClass = DeviceClass {
    id: "D",
    title: "Diode",
    num_terminals: 2,
    schema: &[
        PropSpec::real("is", "Saturation current (A)", Some(1e-14), &[Bound::gt(0.0)]),
        PropSpec::real("n", "Emission coefficient", Some(1.0), &[Bound::gt(0.0)]),
    ],
    state_len: 6,
    outputs: &[
        Output { name: "vd", unit: "V", slot: D_VD },
        Output { name: "id", unit: "A", slot: D_ID },
        Output { name: "gd", unit: "S", slot: D_GD },
    ],
    nonlinear: true,
    storage: &[],
};

/// Limit a new junction voltage estimate against the previous one.
///
/// Above `vcrit`, a step of more than `2·vt` is replaced by a logarithmic
/// back-off from the previous value.
pub fn limit_junction_voltage(vnew: f64, vold: f64, vt: f64, vcrit: f64) -> f64 {
    if vnew > vcrit && (vnew - vold).abs() > 2.0 * vt {
        if vold > 0.0 {
            let arg = 1.0 + (vnew - vold) / vt;
            if arg > 0.0 {
                vold + vt * arg.ln()
            } else {
                vcrit
            }
        } else {
            vt * (vnew / vt).ln()
        }
    } else {
        vnew
    }
}

/// A diode component, terminals `[anode, cathode]`.
#[derive(Debug, Clone)]
pub struct Diode {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
}

impl Diode {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
        }
    }

    /// Junction current and conductance at `vd`.
    fn evaluate(state: &[f64], vd: f64) -> (f64, f64) {
        let (is, nvt) = (state[D_IS], state[D_NVT]);
        let e = (vd / nvt).exp();
        (is * (e - 1.0), is / nvt * e)
    }
}

impl Device for Diode {
    fn class(&self) -> &'static DeviceClass {
        &DIODE
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

    fn init(&self, state: &mut [f64], temperature: f64) -> Result<()> {
        let is = self.props.number("is")?;
        let nvt = self.props.number("n")? * K_OVER_Q * (temperature + CELSIUS_TO_KELVIN);
        state.fill(0.0);
        state[D_IS] = is;
        state[D_NVT] = nvt;
        state[D_VCRIT] = nvt * (nvt / (SQRT_2 * is)).ln();
        // Zero-bias small-signal conductance until a solve replaces it
        state[D_GD] = is / nvt + GMIN;
        Ok(())
    }

    fn load_dc(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        let vd = if ctx.init_junctions {
            state[D_VCRIT]
        } else {
            let raw = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
            limit_junction_voltage(raw, state[D_VD], state[D_NVT], state[D_VCRIT])
        };
        let (id, gd) = Self::evaluate(state, vd);
        let g = gd + ctx.gmin;
        let i = id + ctx.gmin * vd;
        state[D_VD] = vd;
        state[D_ID] = i;
        state[D_GD] = g;

        stamper.stamp_conductance(self.nodes[0], self.nodes[1], g);
        // I = G*V + I_eq
        stamper.stamp_current_source(self.nodes[0], self.nodes[1], i - g * vd);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        let vd = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        let (id, gd) = Self::evaluate(state, vd);
        state[D_VD] = vd;
        state[D_ID] = id + ctx.gmin * vd;
        state[D_GD] = gd + ctx.gmin;
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        stamper.stamp_conductance(self.nodes[0], self.nodes[1], Complex64::new(state[D_GD], 0.0));
    }
}
