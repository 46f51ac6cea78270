//! End-to-end scenarios through the public analysis API.

use std::f64::consts::PI;

use approx::assert_relative_eq;
use nodal_core::circuit::{Conditions, Pass};
use nodal_core::components::K_OVER_Q;
use nodal_core::solver::{NewtonRaphson, Outcome};
use nodal_core::{
    AcAnalysis, AcOptions, Analysis, Circuit, DcAnalysis, Method, NewtonOptions, NodalError, Sweep,
    TransientAnalysis, TransientOptions,
};

fn divider() -> Circuit {
    let mut c = Circuit::new();
    c.add_device("V", "V1", &["in", "0"], &[("dc", 10.0.into())]).unwrap();
    c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
    c.add_device("R", "R2", &["out", "0"], &[("r", 1e3.into())]).unwrap();
    c
}

fn rc(source: &[(&str, nodal_core::props::PropValue)]) -> Circuit {
    let mut c = Circuit::new();
    c.add_device("V", "V1", &["in", "0"], source).unwrap();
    c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
    c.add_device("C", "C1", &["out", "0"], &[("c", 1e-6.into())]).unwrap();
    c
}

#[test]
fn test_divider_operating_point() {
    let mut c = divider();
    c.reset().unwrap();
    let mut newton = NewtonRaphson::new(NewtonOptions::default());
    let outcome = newton.iterate(&mut c, Pass::Dc, &Conditions::default()).unwrap();
    assert_eq!(outcome, Outcome::Converged { iterations: 1 });
    assert_relative_eq!(c.voltage("out").unwrap(), 5.0, epsilon = 1e-12);
    assert_relative_eq!(c.current("V1").unwrap(), -5e-3, epsilon = 1e-15);

    let ds = DcAnalysis::default().run(&mut divider()).unwrap();
    assert_relative_eq!(ds.column(0, "v(out)").unwrap()[0], 5.0, epsilon = 1e-12);
}

#[test]
fn test_rc_step_response_backward_euler() {
    let mut c = rc(&[("type", "step".into()), ("amplitude", 1.0.into())]);
    let options = TransientOptions::new(5e-3, 1e-5)
        .with_method(Method::BackwardEuler)
        .with_operating_point(false);
    let ds = TransientAnalysis::new(options).run(&mut c).unwrap();

    let time = ds.column(0, "time").unwrap();
    let out = ds.column(0, "v(out)").unwrap();
    assert_eq!(time.len(), 501);
    assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);

    // Monotone approach to the source voltage, never overshooting
    for pair in out.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-12);
        assert!(pair[1] <= 1.0 + 1e-9);
    }

    // One time constant in, within half a percent of 1 - 1/e
    assert_relative_eq!(time[100], 1e-3, epsilon = 1e-12);
    assert_relative_eq!(out[100], 1.0 - (-1.0f64).exp(), max_relative = 5e-3);
    assert!(out[500] > 0.99);
}

#[test]
fn test_rc_step_response_from_operating_point() {
    // The operating point sees the step at its offset, so the capacitor
    // starts discharged
    let mut c = rc(&[("type", "step".into()), ("amplitude", 1.0.into())]);
    let options = TransientOptions::new(2e-3, 1e-5).with_method(Method::BackwardEuler);
    let ds = TransientAnalysis::new(options).run(&mut c).unwrap();

    let out = ds.column(0, "v(out)").unwrap();
    assert_eq!(out.len(), 201);
    assert_eq!(out[0], 0.0);
    assert_relative_eq!(out[100], 1.0 - (-1.0f64).exp(), max_relative = 5e-3);
    assert_relative_eq!(out[200], 1.0 - (-2.0f64).exp(), max_relative = 5e-3);
}

#[test]
fn test_initial_conditions_appear_at_time_zero() {
    let mut c = Circuit::new();
    c.add_device("C", "C1", &["a", "0"], &[("c", 1e-6.into()), ("ic", 1.0.into())]).unwrap();
    c.add_device("L", "L1", &["a", "0"], &[("l", 1e-3.into())]).unwrap();
    let options = TransientOptions::new(1e-4, 1e-6).with_operating_point(false);
    let ds = TransientAnalysis::new(options).run(&mut c).unwrap();

    let v = ds.column(0, "v(a)").unwrap();
    let i = ds.column(0, "i(L1)").unwrap();
    assert_relative_eq!(v[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(i[0], 0.0, epsilon = 1e-6);
    // Still near the peak one microsecond later; ω = 1/sqrt(LC) ≈ 3.2e4 rad/s
    assert!((v[1] - v[0]).abs() < 1e-3);
}

#[test]
fn test_rl_current_rise() {
    let mut c = Circuit::new();
    c.add_device("V", "V1", &["in", "0"], &[("type", "step".into()), ("amplitude", 1.0.into())])
        .unwrap();
    c.add_device("R", "R1", &["in", "out"], &[("r", 1e3.into())]).unwrap();
    c.add_device("L", "L1", &["out", "0"], &[("l", 1.0.into())]).unwrap();
    let ds = TransientAnalysis::new(TransientOptions::new(2e-3, 1e-5))
        .run(&mut c)
        .unwrap();

    // τ = L/R = 1 ms, final current 1 mA
    let i = ds.column(0, "i(L1)").unwrap();
    assert_eq!(i[0], 0.0);
    assert_relative_eq!(i[100], 1e-3 * (1.0 - (-1.0f64).exp()), max_relative = 1e-2);
    assert_relative_eq!(i[200], 1e-3 * (1.0 - (-2.0f64).exp()), max_relative = 1e-2);
    let v = ds.column(0, "L1.v").unwrap();
    assert_relative_eq!(v[100], (-1.0f64).exp(), max_relative = 2e-2);
}

#[test]
fn test_half_wave_rectifier() {
    let mut c = Circuit::new();
    c.add_device(
        "V",
        "V1",
        &["in", "0"],
        &[
            ("type", "sin".into()),
            ("amplitude", 5.0.into()),
            ("frequency", 1e3.into()),
        ],
    )
    .unwrap();
    c.add_device("D", "D1", &["in", "out"], &[]).unwrap();
    c.add_device("R", "R1", &["out", "0"], &[("r", 1e3.into())]).unwrap();
    let ds = TransientAnalysis::new(TransientOptions::new(1e-3, 1e-5))
        .run(&mut c)
        .unwrap();

    let out = ds.column(0, "v(out)").unwrap();
    // Positive peak at 0.25 ms, one diode drop below the source
    assert!(out[25] > 4.2 && out[25] < 4.4, "peak {}", out[25]);
    // Negative peak at 0.75 ms, blocked
    assert!(out[75].abs() < 1e-6, "blocked {}", out[75]);
    for v in &out {
        assert!(*v > -1e-6);
    }
}

#[test]
fn test_singular_step_names_its_time() {
    // At h = 10 µs backward Euler gives the capacitor C/h = 0.1 S, which a
    // -0.1 S transconductance cancels exactly; the operating point is fine
    let h = 1e-5;
    let mut c = Circuit::new();
    c.add_device("C", "C1", &["a", "0"], &[("c", 1e-6.into())]).unwrap();
    c.add_device("G", "G1", &["a", "0", "a", "0"], &[("gm", (-(1e-6 / h)).into())]).unwrap();
    let options = TransientOptions::new(1e-4, h).with_method(Method::BackwardEuler);
    let err = TransientAnalysis::new(options).run(&mut c).unwrap_err();

    match &err {
        NodalError::StepFailed { time, .. } => assert_relative_eq!(*time, h),
        other => panic!("expected a step failure, got {}", other),
    }
    assert!(err.is_singular());
}

#[test]
fn test_diode_converges_within_ten_iterations() {
    let mut c = Circuit::new();
    c.add_device("V", "V1", &["in", "0"], &[("dc", 5.0.into())]).unwrap();
    c.add_device("R", "R1", &["in", "a"], &[("r", 1e3.into())]).unwrap();
    c.add_device("D", "D1", &["a", "0"], &[]).unwrap();
    c.reset().unwrap();

    let mut newton = NewtonRaphson::new(NewtonOptions::default().with_max_iterations(10));
    let iterations = newton.operating_point(&mut c, f64::NAN).unwrap();
    assert!(iterations <= 10);

    let vd = c.voltage("a").unwrap();
    let i = (5.0 - vd) / 1e3;
    let vt = K_OVER_Q * (27.0 + 273.15);
    assert_relative_eq!(i, 1e-14 * ((vd / vt).exp() - 1.0), max_relative = 1e-2);
}

#[test]
fn test_rc_lowpass_corner_without_operating_point() {
    let corner = 1.0 / (2.0 * PI * 1e3 * 1e-6);
    let sweep = Sweep::list("frequency", vec![corner]).unwrap();
    let mut c = rc(&[("ac", 1.0.into())]);
    let ds = AcAnalysis::new(AcOptions::new(sweep).with_operating_point(false))
        .run(&mut c)
        .unwrap();

    let mag = ds.column(0, "|v(out)|").unwrap();
    assert_relative_eq!(mag[0], 1.0 / 2f64.sqrt(), epsilon = 1e-9);
    assert_relative_eq!(ds.column(0, "∠v(out)").unwrap()[0], -45.0, epsilon = 1e-6);
}

#[test]
fn test_nested_sweeps_produce_one_group_per_combination() {
    let mut c = divider();
    let ds = DcAnalysis::default()
        .with_sweep(Sweep::list("R2.r", vec![1e3, 3e3]).unwrap())
        .with_sweep(Sweep::list("temp", vec![0.0, 50.0]).unwrap())
        .run(&mut c)
        .unwrap();
    let titles: Vec<&str> = ds.row_groups().iter().map(|g| g.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "R2.r=1000, temp=0",
            "R2.r=1000, temp=50",
            "R2.r=3000, temp=0",
            "R2.r=3000, temp=50"
        ]
    );
}

#[test]
fn test_floating_node_is_singular() {
    let mut c = Circuit::new();
    c.add_device("I", "I1", &["0", "a"], &[("dc", 1e-3.into())]).unwrap();
    c.add_device("C", "C1", &["a", "0"], &[("c", 1e-6.into())]).unwrap();
    let err = DcAnalysis::default().run(&mut c).unwrap_err();
    assert!(matches!(err, NodalError::SingularMatrix { .. }), "{}", err);
}
