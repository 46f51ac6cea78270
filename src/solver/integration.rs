//! Numerical integration methods for time-domain simulation.
//!
//! Multistep formulas are written over a history of `(h, x, f)` samples,
//! where `f = dx/dt`:
//!
//! ```text
//! explicit:  x[n+1] = Σ a[i]·x[n-i] + h·Σ b[j]·f[n-j]
//! implicit:  x[n+1] = Σ a[i]·x[n-i] + h·b[0]·f[n+1] + h·Σ b[j]·f[n+1-j]   (j ≥ 1)
//! ```
//!
//! Adams-Bashforth, Adams-Moulton and Gear (BDF) coefficients are found by
//! solving the small linear system that makes each formula exact for
//! polynomials up to its order.
//!
//! Reactive devices keep their history inside their state vector; see
//! [`History`] for the layout.

use std::fmt;
use std::str::FromStr;

use super::linear::{gauss, Matrix};
use crate::error::{NodalError, Result};

/// Highest supported multistep order.
pub const MAX_ORDER: usize = 6;

/// Number of `(h, x, f)` samples kept per storage quantity.
pub const HISTORY_DEPTH: usize = MAX_ORDER + 1;

/// State-vector slots taken by one history buffer.
pub const HISTORY_LEN: usize = 3 * HISTORY_DEPTH;

/// Two successive corrected values closer than this are accepted.
pub const CORRECTOR_TOLERANCE: f64 = 1e-6;

/// Corrector iterations allowed per step.
pub const MAX_CORRECTOR_ITERATIONS: usize = 50;

/// An integration method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ForwardEuler,
    RungeKutta2,
    RungeKutta4,
    AdamsBashforth(usize),
    BackwardEuler,
    Trapezoidal,
    AdamsMoulton(usize),
    Gear(usize),
}

impl Method {
    /// Whether the method defines the new state in terms of itself.
    pub fn is_implicit(&self) -> bool {
        matches!(
            self,
            Method::BackwardEuler | Method::Trapezoidal | Method::AdamsMoulton(_) | Method::Gear(_)
        )
    }

    /// Whether the method is a linear multistep formula.
    pub fn is_multistep(&self) -> bool {
        !matches!(self, Method::RungeKutta2 | Method::RungeKutta4)
    }

    /// Order of accuracy.
    pub fn order(&self) -> usize {
        match self {
            Method::ForwardEuler | Method::BackwardEuler => 1,
            Method::RungeKutta2 | Method::Trapezoidal => 2,
            Method::RungeKutta4 => 4,
            Method::AdamsBashforth(k) | Method::AdamsMoulton(k) | Method::Gear(k) => *k,
        }
    }

    /// Reject orders outside `1..=MAX_ORDER`.
    pub fn validate(&self) -> Result<()> {
        let order = self.order();
        if (1..=MAX_ORDER).contains(&order) {
            Ok(())
        } else {
            Err(NodalError::invalid_param(format!(
                "integration order must be between 1 and {}, got {}",
                MAX_ORDER, order
            )))
        }
    }

    /// Explicit method used to predict the first corrector guess.
    pub fn predictor(&self) -> Method {
        match self.order() {
            1 => Method::ForwardEuler,
            k => Method::AdamsBashforth(k),
        }
    }

    /// Multistep coefficients at a given order (`order <= self.order()`).
    pub fn coefficients(&self, order: usize) -> Result<Coefficients> {
        match self {
            Method::ForwardEuler => Ok(Coefficients::forward_euler()),
            Method::BackwardEuler => Ok(Coefficients::backward_euler()),
            Method::Trapezoidal if order < 2 => Ok(Coefficients::backward_euler()),
            Method::Trapezoidal => Ok(Coefficients::trapezoidal()),
            Method::AdamsBashforth(_) => Coefficients::adams_bashforth(order),
            Method::AdamsMoulton(_) => Coefficients::adams_moulton(order),
            Method::Gear(_) => Coefficients::gear(order),
            Method::RungeKutta2 | Method::RungeKutta4 => Err(NodalError::invalid_param(format!(
                "{} is not a multistep method",
                self
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::ForwardEuler => write!(f, "fe"),
            Method::RungeKutta2 => write!(f, "rk2"),
            Method::RungeKutta4 => write!(f, "rk4"),
            Method::AdamsBashforth(k) => write!(f, "ab{}", k),
            Method::BackwardEuler => write!(f, "be"),
            Method::Trapezoidal => write!(f, "trap"),
            Method::AdamsMoulton(k) => write!(f, "am{}", k),
            Method::Gear(k) => write!(f, "gear{}", k),
        }
    }
}

impl FromStr for Method {
    type Err = NodalError;

    /// Parse `fe`, `rk2`, `rk4`, `be`, `trap`, `abK`, `amK` or `gearK`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let with_order = |prefix: &str, make: fn(usize) -> Method| -> Option<Result<Method>> {
            lower.strip_prefix(prefix).map(|k| {
                k.parse::<usize>()
                    .map_err(|_| NodalError::invalid_param(format!("bad method order in '{}'", s)))
                    .map(make)
            })
        };
        let method = match lower.as_str() {
            "fe" | "euler" => Method::ForwardEuler,
            "rk2" => Method::RungeKutta2,
            "rk4" => Method::RungeKutta4,
            "be" => Method::BackwardEuler,
            "trap" | "trapezoidal" => Method::Trapezoidal,
            _ => with_order("gear", Method::Gear)
                .or_else(|| with_order("ab", Method::AdamsBashforth))
                .or_else(|| with_order("am", Method::AdamsMoulton))
                .unwrap_or_else(|| {
                    Err(NodalError::invalid_param(format!(
                        "unknown integration method '{}'",
                        s
                    )))
                })?,
        };
        method.validate()?;
        Ok(method)
    }
}

/// Coefficients of one multistep formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    /// Weights of past states `x[n], x[n-1], ...`
    pub a: Vec<f64>,
    /// Weights of derivatives; `b[0]` multiplies `f[n+1]` when implicit
    pub b: Vec<f64>,
    /// Whether `b[0]` refers to the new point
    pub implicit: bool,
}

impl Coefficients {
    pub fn forward_euler() -> Self {
        Self {
            a: vec![1.0],
            b: vec![1.0],
            implicit: false,
        }
    }

    pub fn backward_euler() -> Self {
        Self {
            a: vec![1.0],
            b: vec![1.0],
            implicit: true,
        }
    }

    pub fn trapezoidal() -> Self {
        Self {
            a: vec![1.0],
            b: vec![0.5, 0.5],
            implicit: true,
        }
    }

    fn check_order(order: usize) -> Result<()> {
        if (1..=MAX_ORDER).contains(&order) {
            Ok(())
        } else {
            Err(NodalError::invalid_param(format!(
                "integration order must be between 1 and {}, got {}",
                MAX_ORDER, order
            )))
        }
    }

    /// Solve for derivative weights sampled at scaled times `times`
    /// (step = 1, `t[n] = 0`) so that `x[n+1] = x[n] + Σ b·f` holds for
    /// `x = t^m`, `m = 1..=k`.
    fn adams(times: &[f64]) -> Result<Vec<f64>> {
        let k = times.len();
        let mut m = Matrix::new(k);
        for row in 0..k {
            let power = row + 1;
            for (col, &t) in times.iter().enumerate() {
                m[(row, col)] = power as f64 * t.powi(row as i32);
            }
        }
        // x[n+1] - x[n] = 1 - 0 for every power
        let mut rhs = vec![1.0; k];
        gauss(&mut m, &mut rhs)?;
        Ok(rhs)
    }

    /// Adams-Bashforth of order `k`: derivatives at `t[n], t[n-1], ...`.
    pub fn adams_bashforth(k: usize) -> Result<Self> {
        Self::check_order(k)?;
        let times: Vec<f64> = (0..k).map(|j| -(j as f64)).collect();
        let mut a = vec![0.0; k];
        a[0] = 1.0;
        Ok(Self {
            a,
            b: Self::adams(&times)?,
            implicit: false,
        })
    }

    /// Adams-Moulton of order `k`: derivatives at `t[n+1], t[n], ...`.
    pub fn adams_moulton(k: usize) -> Result<Self> {
        Self::check_order(k)?;
        let times: Vec<f64> = (0..k).map(|j| 1.0 - j as f64).collect();
        Ok(Self {
            a: vec![1.0],
            b: Self::adams(&times)?,
            implicit: true,
        })
    }

    /// Gear (BDF) of order `k`: `k` past states and `f[n+1]`.
    pub fn gear(k: usize) -> Result<Self> {
        Self::check_order(k)?;
        // Unknowns: a[0..k] then b0. Row m enforces exactness for t^m.
        let mut m = Matrix::new(k + 1);
        for row in 0..=k {
            for i in 0..k {
                m[(row, i)] = (-(i as f64)).powi(row as i32);
            }
            m[(row, k)] = row as f64;
        }
        let mut rhs = vec![1.0; k + 1];
        gauss(&mut m, &mut rhs)?;
        let b0 = rhs[k];
        rhs.truncate(k);
        Ok(Self {
            a: rhs,
            b: vec![b0],
            implicit: true,
        })
    }

    /// Weight of `f[n+1]` (implicit formulas only).
    pub fn b0(&self) -> f64 {
        if self.implicit {
            self.b[0]
        } else {
            0.0
        }
    }

    /// Everything in the formula that does not involve the new point.
    ///
    /// For an explicit method this is the full prediction of `x[n+1]`.
    /// `hist` must already be shifted so that slot 0 is the new point.
    pub fn known_part<S: AsRef<[f64]>>(&self, hist: &History<S>, h: f64) -> f64 {
        let mut sum: f64 = self
            .a
            .iter()
            .enumerate()
            .map(|(i, a)| a * hist.x(i + 1))
            .sum();
        if self.implicit {
            for (j, b) in self.b.iter().enumerate().skip(1) {
                sum += h * b * hist.f(j);
            }
        } else {
            for (j, b) in self.b.iter().enumerate() {
                sum += h * b * hist.f(j + 1);
            }
        }
        sum
    }

    /// Derivative at the new point implied by an implicit formula.
    pub fn derivative(&self, x_new: f64, known: f64, h: f64) -> f64 {
        (x_new - known) / (h * self.b0())
    }
}

/// Coefficient sets for orders `1..=method.order()`, computed once.
///
/// Early steps lack enough history for the full order, so step `s`
/// (1-based) uses order `min(s, order)`.
#[derive(Debug, Clone)]
pub struct CoefficientTable {
    method: Method,
    sets: Vec<Coefficients>,
}

impl CoefficientTable {
    /// Precompute coefficients for a multistep method.
    pub fn new(method: Method) -> Result<Self> {
        method.validate()?;
        let sets = (1..=method.order())
            .map(|order| method.coefficients(order))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { method, sets })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Coefficients to use on step `step` (1-based).
    pub fn for_step(&self, step: usize) -> &Coefficients {
        let order = step.clamp(1, self.sets.len());
        &self.sets[order - 1]
    }
}

/// View over a `(h, x, f)` history buffer stored in a flat slice.
///
/// Slot 0 is the newest sample (the point being solved); slot `i` lies `i`
/// steps in the past. The slice must be [`HISTORY_LEN`] long.
#[derive(Debug)]
pub struct History<S> {
    slots: S,
}

impl<S: AsRef<[f64]>> History<S> {
    pub fn new(slots: S) -> Self {
        debug_assert_eq!(slots.as_ref().len(), HISTORY_LEN);
        Self { slots }
    }

    pub fn h(&self, i: usize) -> f64 {
        self.slots.as_ref()[3 * i]
    }

    pub fn x(&self, i: usize) -> f64 {
        self.slots.as_ref()[3 * i + 1]
    }

    pub fn f(&self, i: usize) -> f64 {
        self.slots.as_ref()[3 * i + 2]
    }
}

impl<S: AsRef<[f64]> + AsMut<[f64]>> History<S> {
    /// Discard the oldest sample and move every other one a slot older.
    /// Slot 0 keeps a copy of the previous newest sample.
    pub fn shift(&mut self) {
        let slots = self.slots.as_mut();
        slots.copy_within(0..3 * (HISTORY_DEPTH - 1), 3);
    }

    /// Overwrite slot `i`.
    pub fn set(&mut self, i: usize, h: f64, x: f64, f: f64) {
        let slots = self.slots.as_mut();
        slots[3 * i] = h;
        slots[3 * i + 1] = x;
        slots[3 * i + 2] = f;
    }

    /// Fill every slot with the same sample (initial condition).
    pub fn fill(&mut self, h: f64, x: f64, f: f64) {
        for i in 0..HISTORY_DEPTH {
            self.set(i, h, x, f);
        }
    }
}

/// Standalone integrator for `dx/dt = f(t, x)` over `R^m`.
///
/// Explicit methods advance directly. Implicit methods predict with the
/// matching Adams-Bashforth formula, then apply the corrector until two
/// successive values agree within [`CORRECTOR_TOLERANCE`].
#[derive(Debug, Clone)]
pub struct OdeIntegrator {
    method: Method,
    step: f64,
    corrector: Option<CoefficientTable>,
    predictor: Option<CoefficientTable>,
}

impl OdeIntegrator {
    /// Create an integrator with a fixed step.
    pub fn new(method: Method, step: f64) -> Result<Self> {
        method.validate()?;
        if !(step > 0.0 && step.is_finite()) {
            return Err(NodalError::invalid_param(format!(
                "time step must be positive, got {}",
                step
            )));
        }
        let (corrector, predictor) = if method.is_implicit() {
            (
                Some(CoefficientTable::new(method)?),
                Some(CoefficientTable::new(method.predictor())?),
            )
        } else if method.is_multistep() {
            (None, Some(CoefficientTable::new(method)?))
        } else {
            (None, None)
        };
        Ok(Self {
            method,
            step,
            corrector,
            predictor,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Integrate `steps` steps from `(t0, x0)`.
    ///
    /// Returns every sample including the initial one.
    pub fn integrate<F>(
        &self,
        t0: f64,
        x0: &[f64],
        steps: usize,
        mut f: F,
    ) -> Result<Vec<(f64, Vec<f64>)>>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        let h = self.step;
        let m = x0.len();
        let f0 = f(t0, x0);
        let mut histories: Vec<Vec<f64>> = (0..m)
            .map(|i| {
                let mut buf = vec![0.0; HISTORY_LEN];
                History::new(&mut buf[..]).fill(h, x0[i], f0[i]);
                buf
            })
            .collect();

        let mut samples = Vec::with_capacity(steps + 1);
        samples.push((t0, x0.to_vec()));
        let mut x = x0.to_vec();

        for n in 1..=steps {
            let t = t0 + (n - 1) as f64 * h;
            let t_next = t0 + n as f64 * h;

            for buf in histories.iter_mut() {
                History::new(&mut buf[..]).shift();
            }

            let x_new = match self.method {
                Method::RungeKutta2 => {
                    let k1 = f(t, &x);
                    let mid: Vec<f64> = x.iter().zip(&k1).map(|(x, k)| x + 0.5 * h * k).collect();
                    let k2 = f(t + 0.5 * h, &mid);
                    x.iter().zip(&k2).map(|(x, k)| x + h * k).collect()
                }
                Method::RungeKutta4 => {
                    let k1 = f(t, &x);
                    let x2: Vec<f64> = x.iter().zip(&k1).map(|(x, k)| x + 0.5 * h * k).collect();
                    let k2 = f(t + 0.5 * h, &x2);
                    let x3: Vec<f64> = x.iter().zip(&k2).map(|(x, k)| x + 0.5 * h * k).collect();
                    let k3 = f(t + 0.5 * h, &x3);
                    let x4: Vec<f64> = x.iter().zip(&k3).map(|(x, k)| x + h * k).collect();
                    let k4 = f(t + h, &x4);
                    (0..m)
                        .map(|i| x[i] + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
                        .collect()
                }
                _ => self.multistep(n, t_next, &histories, &mut f)?,
            };

            let f_new = f(t_next, &x_new);
            for (i, buf) in histories.iter_mut().enumerate() {
                History::new(&mut buf[..]).set(0, h, x_new[i], f_new[i]);
            }
            samples.push((t_next, x_new.clone()));
            x = x_new;
        }

        Ok(samples)
    }

    fn multistep<F>(
        &self,
        n: usize,
        t_next: f64,
        histories: &[Vec<f64>],
        f: &mut F,
    ) -> Result<Vec<f64>>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        let h = self.step;
        let predicted: Vec<f64> = match &self.predictor {
            Some(table) => {
                let coeffs = table.for_step(n);
                histories
                    .iter()
                    .map(|buf| coeffs.known_part(&History::new(&buf[..]), h))
                    .collect()
            }
            None => return Err(NodalError::invalid_param("method has no predictor")),
        };

        let corrector = match &self.corrector {
            Some(table) => table.for_step(n),
            None => return Ok(predicted),
        };

        let known: Vec<f64> = histories
            .iter()
            .map(|buf| corrector.known_part(&History::new(&buf[..]), h))
            .collect();

        let mut current = predicted;
        for _ in 0..MAX_CORRECTOR_ITERATIONS {
            let deriv = f(t_next, &current);
            let corrected: Vec<f64> = known
                .iter()
                .zip(&deriv)
                .map(|(k, d)| k + h * corrector.b0() * d)
                .collect();
            let settled = corrected
                .iter()
                .zip(&current)
                .all(|(a, b)| (a - b).abs() < CORRECTOR_TOLERANCE);
            current = corrected;
            if settled {
                return Ok(current);
            }
        }

        Err(NodalError::CorrectorFailure {
            iterations: MAX_CORRECTOR_ITERATIONS,
            time: t_next,
        })
    }
}
