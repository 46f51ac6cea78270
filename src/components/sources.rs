//! Independent voltage and current sources.

use std::f64::consts::PI;

use num_complex::Complex64;

use super::{AcContext, Device, DeviceClass, EvalContext, Output};
use crate::circuit::{Network, NodeId};
use crate::error::{NodalError, Result};
use crate::props::{Bound, PropSpec, Props};
use crate::solver::Stamper;

/// Time-dependent value of an independent source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    /// Constant value
    Dc(f64),
    /// `offset` up to `delay`, then a ramp over `rise` to `offset + amplitude`
    Step {
        offset: f64,
        amplitude: f64,
        delay: f64,
        rise: f64,
    },
    /// `offset + amplitude·sin(2πf(t - delay))` after `delay`
    Sin {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        delay: f64,
    },
    /// Trapezoidal pulse train with instantaneous fall
    Pulse {
        offset: f64,
        amplitude: f64,
        delay: f64,
        rise: f64,
        width: f64,
        period: f64,
    },
}

// Flat encoding inside the state vector
const W_KIND: usize = 0;
const W_OFFSET: usize = 1;
const W_AMPLITUDE: usize = 2;
const W_FREQUENCY: usize = 3;
const W_DELAY: usize = 4;
const W_RISE: usize = 5;
const W_WIDTH: usize = 6;
const W_PERIOD: usize = 7;
const WAVE_LEN: usize = 8;

impl Waveform {
    /// Build the waveform described by source props.
    pub fn from_props(props: &Props) -> Result<Self> {
        let offset = props.number("offset")?;
        let amplitude = props.number("amplitude")?;
        let delay = props.number("delay")?;
        let rise = props.number("rise")?;
        let waveform = match props.text("type")? {
            "dc" => Waveform::Dc(props.number("dc")?),
            "step" => Waveform::Step {
                offset,
                amplitude,
                delay,
                rise,
            },
            "sin" => Waveform::Sin {
                offset,
                amplitude,
                frequency: props.number("frequency")?,
                delay,
            },
            "pulse" => Waveform::Pulse {
                offset,
                amplitude,
                delay,
                rise,
                width: props.number("width")?,
                period: props.number("period")?,
            },
            other => {
                return Err(NodalError::invalid_property(
                    "type",
                    format!("unsupported waveform {:?}", other),
                ))
            }
        };
        Ok(waveform)
    }

    /// Value at time `t`; a NaN time (DC analysis) evaluates at `t = 0`.
    pub fn value(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t };
        match *self {
            Waveform::Dc(value) => value,
            Waveform::Step {
                offset,
                amplitude,
                delay,
                rise,
            } => offset + amplitude * ramp(t - delay, rise),
            Waveform::Sin {
                offset,
                amplitude,
                frequency,
                delay,
            } => {
                if t < delay {
                    offset
                } else {
                    offset + amplitude * (2.0 * PI * frequency * (t - delay)).sin()
                }
            }
            Waveform::Pulse {
                offset,
                amplitude,
                delay,
                rise,
                width,
                period,
            } => {
                if t < delay {
                    return offset;
                }
                let mut tau = t - delay;
                if period > 0.0 {
                    tau %= period;
                }
                if tau < rise + width {
                    offset + amplitude * ramp(tau, rise)
                } else {
                    offset
                }
            }
        }
    }

    fn write(&self, slots: &mut [f64]) {
        slots.fill(0.0);
        match *self {
            Waveform::Dc(value) => {
                slots[W_OFFSET] = value;
            }
            Waveform::Step {
                offset,
                amplitude,
                delay,
                rise,
            } => {
                slots[W_KIND] = 1.0;
                slots[W_OFFSET] = offset;
                slots[W_AMPLITUDE] = amplitude;
                slots[W_DELAY] = delay;
                slots[W_RISE] = rise;
            }
            Waveform::Sin {
                offset,
                amplitude,
                frequency,
                delay,
            } => {
                slots[W_KIND] = 2.0;
                slots[W_OFFSET] = offset;
                slots[W_AMPLITUDE] = amplitude;
                slots[W_FREQUENCY] = frequency;
                slots[W_DELAY] = delay;
            }
            Waveform::Pulse {
                offset,
                amplitude,
                delay,
                rise,
                width,
                period,
            } => {
                slots[W_KIND] = 3.0;
                slots[W_OFFSET] = offset;
                slots[W_AMPLITUDE] = amplitude;
                slots[W_DELAY] = delay;
                slots[W_RISE] = rise;
                slots[W_WIDTH] = width;
                slots[W_PERIOD] = period;
            }
        }
    }

    fn read(slots: &[f64]) -> Self {
        let offset = slots[W_OFFSET];
        let amplitude = slots[W_AMPLITUDE];
        let delay = slots[W_DELAY];
        let rise = slots[W_RISE];
        match slots[W_KIND] as u8 {
            1 => Waveform::Step {
                offset,
                amplitude,
                delay,
                rise,
            },
            2 => Waveform::Sin {
                offset,
                amplitude,
                frequency: slots[W_FREQUENCY],
                delay,
            },
            3 => Waveform::Pulse {
                offset,
                amplitude,
                delay,
                rise,
                width: slots[W_WIDTH],
                period: slots[W_PERIOD],
            },
            _ => Waveform::Dc(offset),
        }
    }
}

/// Fraction of a rising edge completed `t` seconds after it starts.
///
/// The edge starts strictly after `t = 0`, so a zero-delay step still reads
/// its offset at the initial operating point.
fn ramp(t: f64, rise: f64) -> f64 {
    if t <= 0.0 {
        0.0
    } else if rise > 0.0 && t < rise {
        t / rise
    } else {
        1.0
    }
}

const SOURCE_SCHEMA: &[PropSpec] = &[
    PropSpec::text("type", "Waveform", Some("dc"), &["dc", "step", "sin", "pulse"]),
    PropSpec::real("dc", "DC value", Some(0.0), &[]),
    PropSpec::real("offset", "Offset", Some(0.0), &[]),
    PropSpec::real("amplitude", "Amplitude", Some(0.0), &[]),
    PropSpec::real("frequency", "Frequency (Hz)", Some(1e3), &[Bound::gt(0.0)]),
    PropSpec::real("delay", "Delay (s)", Some(0.0), &[Bound::ge(0.0)]),
    PropSpec::real("rise", "Rise time (s)", Some(0.0), &[Bound::ge(0.0)]),
    PropSpec::real("width", "Pulse width (s)", Some(0.0), &[Bound::ge(0.0)]),
    PropSpec::real("period", "Pulse period (s)", Some(0.0), &[Bound::ge(0.0)]),
    PropSpec::real("ac", "AC magnitude", Some(0.0), &[Bound::ge(0.0)]),
    PropSpec::real("acphase", "AC phase (deg)", Some(0.0), &[]),
];

const S_V: usize = 0;
const S_I: usize = 1;
const S_AC_RE: usize = 2;
const S_AC_IM: usize = 3;
const S_WAVE: usize = 4;
const SOURCE_STATE_LEN: usize = S_WAVE + WAVE_LEN;

const SOURCE_OUTPUTS: &[Output] = &[
    Output { name: "v", unit: "V", slot: S_V },
    Output { name: "i", unit: "A", slot: S_I },
];

/// Cache the waveform and AC phasor in the state vector.
fn init_source(props: &Props, state: &mut [f64]) -> Result<()> {
    state.fill(0.0);
    Waveform::from_props(props)?.write(&mut state[S_WAVE..S_WAVE + WAVE_LEN]);
    let phasor = Complex64::from_polar(props.number("ac")?, props.number("acphase")?.to_radians());
    state[S_AC_RE] = phasor.re;
    state[S_AC_IM] = phasor.im;
    Ok(())
}

fn source_value(state: &[f64], ctx: &EvalContext) -> f64 {
    Waveform::read(&state[S_WAVE..S_WAVE + WAVE_LEN]).value(ctx.time) * ctx.source_factor
}

fn ac_phasor(state: &[f64]) -> Complex64 {
    Complex64::new(state[S_AC_RE], state[S_AC_IM])
}

// ============ Voltage Source ============

pub static VOLTAGE_SOURCE: DeviceClass = DeviceClass {
    id: "V",
    title: "Voltage Source",
    num_terminals: 2,
    schema: SOURCE_SCHEMA,
    state_len: SOURCE_STATE_LEN,
    outputs: SOURCE_OUTPUTS,
    nonlinear: false,
    storage: &[],
};

/// An independent voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = V_source
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
    branch: usize,
}

impl VoltageSource {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
            branch: 0,
        }
    }
}

impl Device for VoltageSource {
    fn class(&self) -> &'static DeviceClass {
        &VOLTAGE_SOURCE
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
        init_source(&self.props, state)
    }

    fn load_dc(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        let v = source_value(state, ctx);
        stamper.stamp_voltage_source(self.nodes[0], self.nodes[1], self.branch, v);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[S_V] = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        state[S_I] = ctx.solution[self.branch];
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        stamper.stamp_voltage_source(self.nodes[0], self.nodes[1], self.branch, ac_phasor(state));
    }
}

// ============ Current Source ============

pub static CURRENT_SOURCE: DeviceClass = DeviceClass {
    id: "I",
    title: "Current Source",
    num_terminals: 2,
    schema: SOURCE_SCHEMA,
    state_len: SOURCE_STATE_LEN,
    outputs: SOURCE_OUTPUTS,
    nonlinear: false,
    storage: &[],
};

/// An independent current source.
///
/// Current sources add directly to the RHS vector of the MNA equations.
/// The current flows from the positive terminal through the source to the
/// negative terminal.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    props: Props,
    nodes: [Option<usize>; 2],
}

impl CurrentSource {
    pub fn new(name: String, props: Props) -> Self {
        Self {
            name,
            props,
            nodes: [None; 2],
        }
    }
}

impl Device for CurrentSource {
    fn class(&self) -> &'static DeviceClass {
        &CURRENT_SOURCE
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
        init_source(&self.props, state)
    }

    fn load_dc(&self, state: &mut [f64], ctx: &EvalContext, stamper: &mut dyn Stamper) {
        let i = source_value(state, ctx);
        stamper.stamp_current_source(self.nodes[0], self.nodes[1], i);
    }

    fn end_dc(&self, state: &mut [f64], ctx: &EvalContext) {
        state[S_V] = ctx.voltage(self.nodes[0]) - ctx.voltage(self.nodes[1]);
        state[S_I] = source_value(state, ctx);
    }

    fn load_ac(&self, state: &[f64], _ctx: &AcContext, stamper: &mut dyn Stamper<Complex64>) {
        stamper.stamp_current_source(self.nodes[0], self.nodes[1], ac_phasor(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::MnaSystem;
    use approx::assert_relative_eq;

    fn source_props(values: &[(&str, crate::props::PropValue)]) -> Props {
        let mut props = Props::new(SOURCE_SCHEMA);
        for (k, v) in values {
            props.set(k, v.clone()).unwrap();
        }
        props
    }

    #[test]
    fn test_step_waveform() {
        let step = Waveform::Step {
            offset: 0.0,
            amplitude: 5.0,
            delay: 1e-3,
            rise: 1e-3,
        };
        assert_eq!(step.value(0.0), 0.0);
        assert_relative_eq!(step.value(1.5e-3), 2.5);
        assert_eq!(step.value(3e-3), 5.0);
        assert_eq!(step.value(f64::NAN), 0.0);
    }

    #[test]
    fn test_zero_delay_step_starts_at_offset() {
        let step = Waveform::Step {
            offset: 0.5,
            amplitude: 1.0,
            delay: 0.0,
            rise: 0.0,
        };
        assert_eq!(step.value(0.0), 0.5);
        assert_eq!(step.value(f64::NAN), 0.5);
        assert_eq!(step.value(1e-9), 1.5);
    }

    #[test]
    fn test_pulse_repeats() {
        let pulse = Waveform::Pulse {
            offset: 0.0,
            amplitude: 1.0,
            delay: 0.0,
            rise: 0.0,
            width: 0.5,
            period: 1.0,
        };
        assert_eq!(pulse.value(0.25), 1.0);
        assert_eq!(pulse.value(0.75), 0.0);
        assert_eq!(pulse.value(1.25), 1.0);
    }

    #[test]
    fn test_sin_waveform() {
        let sin = Waveform::Sin {
            offset: 1.0,
            amplitude: 2.0,
            frequency: 50.0,
            delay: 0.0,
        };
        assert_relative_eq!(sin.value(0.005), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_waveform_survives_state_encoding() {
        let props = source_props(&[
            ("type", "sin".into()),
            ("amplitude", 2.0.into()),
            ("frequency", 60.0.into()),
        ]);
        let mut state = vec![0.0; SOURCE_STATE_LEN];
        init_source(&props, &mut state).unwrap();
        assert_eq!(
            Waveform::read(&state[S_WAVE..]),
            Waveform::Sin {
                offset: 0.0,
                amplitude: 2.0,
                frequency: 60.0,
                delay: 0.0
            }
        );
    }

    #[test]
    fn test_source_factor_scales_voltage() {
        let mut net = Network::new();
        let a = net.node("a");
        let mut v = VoltageSource::new("V1".into(), source_props(&[("dc", 10.0.into())]));
        v.connect(&mut net, &[a, NodeId::GROUND]).unwrap();
        let mut state = vec![0.0; SOURCE_STATE_LEN];
        v.init(&mut state, 27.0).unwrap();

        let solution = vec![0.0; net.size()];
        let ctx = EvalContext {
            source_factor: 0.5,
            ..EvalContext::dc(&solution, 27.0)
        };
        let mut mna = MnaSystem::new(net.size());
        v.load_dc(&mut state, &ctx, &mut mna);
        assert_eq!(mna.rhs[1], 5.0);
    }

    #[test]
    fn test_ac_phasor_from_degrees() {
        let props = source_props(&[("ac", 2.0.into()), ("acphase", 90.0.into())]);
        let mut state = vec![0.0; SOURCE_STATE_LEN];
        init_source(&props, &mut state).unwrap();
        let phasor = ac_phasor(&state);
        assert_relative_eq!(phasor.re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(phasor.im, 2.0, epsilon = 1e-12);
    }
}
