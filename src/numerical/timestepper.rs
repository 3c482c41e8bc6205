//! # One-step time steppers for dy/dt = f(y)
//!
//! Every stepper owns a shared handle to the right-hand side `f` and advances
//! a state vector in place by one step of size `tau`:
//!
//! | scheme          | formula                                           | order |
//! |-----------------|---------------------------------------------------|-------|
//! | `ExplicitEuler` | y += tau f(y)                                     | 1     |
//! | `ImprovedEuler` | y += tau f(y + tau/2 f(y))                        | 2     |
//! | `ImplicitEuler` | y_new - y_old - tau f(y_new) = 0                  | 1     |
//! | `CrankNicolson` | y_new - y_old - tau/2 f(y_old) - tau/2 f(y_new) = 0 | 2   |
//!
//! Implicit schemes assemble their residual from [`FuncExpr`] building blocks
//! and solve it with [`NewtonSolver`], using the incoming state as initial guess.
//! `ImplicitEuler` builds the equation once and only updates its frozen leaves
//! between steps; `CrankNicolson` builds a fresh equation on every step.
//!
//! # Example
//! ```
//! use std::rc::Rc;
//! use nalgebra::DVector;
//! use RustedTimeSteppers::numerical::nonlinear_function::{ClosureFunction, NonlinearFunction};
//! use RustedTimeSteppers::numerical::timestepper::{CrankNicolson, TimeStepper};
//! let rhs: Rc<dyn NonlinearFunction> = Rc::new(ClosureFunction::new(1, 1,
//!     |y: &DVector<f64>, f: &mut DVector<f64>| f[0] = -y[0], "decay"));
//! let mut stepper = CrankNicolson::new(rhs).unwrap();
//! let mut y = DVector::from_vec(vec![1.0]);
//! stepper.do_step(0.1, &mut y).unwrap();
//! assert!((y[0] - 0.95 / 1.05).abs() < 1e-8);
//! ```

use crate::numerical::NR_for_steppers::{NewtonError, NewtonSolver};
use crate::numerical::nonlinear_function::{
    ConstantFunction, FuncExpr, IdentityFunction, NonlinearFunction, Parameter,
};
use log::debug;
use nalgebra::DVector;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Errors raised when a stepper cannot be constructed
#[derive(Debug, Clone, PartialEq)]
pub enum StepperError {
    /// the right-hand side must map the state space onto itself
    NonSquareRhs { dim_x: usize, dim_f: usize },
    /// the state space has dimension 0
    EmptyRhs,
    UnknownMethod(String),
    /// driver setup: at least one step is required
    NoSteps,
    /// driver setup: initial state length differs from dim_x of the rhs
    InitialStateLength { expected: usize, found: usize },
}

impl fmt::Display for StepperError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StepperError::NonSquareRhs { dim_x, dim_f } => write!(
                f,
                "right-hand side must satisfy dim_x == dim_f, got dim_x = {}, dim_f = {}",
                dim_x, dim_f
            ),
            StepperError::EmptyRhs => write!(f, "right-hand side has dimension 0"),
            StepperError::UnknownMethod(name) => write!(f, "Unknown time stepper: {}", name),
            StepperError::NoSteps => write!(f, "number of steps must be at least 1"),
            StepperError::InitialStateLength { expected, found } => write!(
                f,
                "initial state has length {}, right-hand side expects {}",
                found, expected
            ),
        }
    }
}

impl std::error::Error for StepperError {}

fn check_square(rhs: &Rc<dyn NonlinearFunction>) -> Result<usize, StepperError> {
    let (dim_x, dim_f) = (rhs.dim_x(), rhs.dim_f());
    if dim_x != dim_f {
        return Err(StepperError::NonSquareRhs { dim_x, dim_f });
    }
    if dim_f == 0 {
        return Err(StepperError::EmptyRhs);
    }
    Ok(dim_f)
}

/// Advances the state of dy/dt = f(y) by one step
pub trait TimeStepper {
    /// overwrite `y` with the state advanced by `tau`.
    /// Errors are those of the root solver (implicit schemes only).
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), NewtonError>;
    /// the right-hand side f
    fn rhs(&self) -> &Rc<dyn NonlinearFunction>;
    fn name(&self) -> &str;
}

//////////////////////////////////EXPLICIT//////////////////////////////////////////
pub struct ExplicitEuler {
    rhs: Rc<dyn NonlinearFunction>,
    vecf: DVector<f64>,
}

impl ExplicitEuler {
    pub fn new(rhs: Rc<dyn NonlinearFunction>) -> Result<Self, StepperError> {
        let dim = check_square(&rhs)?;
        Ok(ExplicitEuler {
            rhs,
            vecf: DVector::zeros(dim),
        })
    }
}

impl TimeStepper for ExplicitEuler {
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), NewtonError> {
        debug_assert_eq!(y.len(), self.vecf.len());
        self.rhs.evaluate(y, &mut self.vecf);
        y.axpy(tau, &self.vecf, 1.0);
        Ok(())
    }
    fn rhs(&self) -> &Rc<dyn NonlinearFunction> {
        &self.rhs
    }
    fn name(&self) -> &str {
        "ExplicitEuler"
    }
}

/// explicit midpoint rule
pub struct ImprovedEuler {
    rhs: Rc<dyn NonlinearFunction>,
    vecf: DVector<f64>,
}

impl ImprovedEuler {
    pub fn new(rhs: Rc<dyn NonlinearFunction>) -> Result<Self, StepperError> {
        let dim = check_square(&rhs)?;
        Ok(ImprovedEuler {
            rhs,
            vecf: DVector::zeros(dim),
        })
    }
}

impl TimeStepper for ImprovedEuler {
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), NewtonError> {
        debug_assert_eq!(y.len(), self.vecf.len());
        self.rhs.evaluate(y, &mut self.vecf);
        // midpoint d = y + tau/2 * k1
        let mut d = y.clone();
        d.axpy(tau / 2.0, &self.vecf, 1.0);
        self.rhs.evaluate(&d, &mut self.vecf);
        y.axpy(tau, &self.vecf, 1.0);
        Ok(())
    }
    fn rhs(&self) -> &Rc<dyn NonlinearFunction> {
        &self.rhs
    }
    fn name(&self) -> &str {
        "ImprovedEuler"
    }
}

//////////////////////////////////IMPLICIT//////////////////////////////////////////
/// Backward Euler. The residual y - y_old - tau*f(y) is built once and reused,
/// only `y_old` and `tau` are overwritten on each step.
pub struct ImplicitEuler {
    rhs: Rc<dyn NonlinearFunction>,
    equ: FuncExpr,
    tau: Rc<Parameter>,
    yold: Rc<ConstantFunction>,
    newton: NewtonSolver,
}

impl ImplicitEuler {
    pub fn new(rhs: Rc<dyn NonlinearFunction>) -> Result<Self, StepperError> {
        Self::with_solver(rhs, NewtonSolver::default())
    }
    pub fn with_solver(
        rhs: Rc<dyn NonlinearFunction>,
        newton: NewtonSolver,
    ) -> Result<Self, StepperError> {
        let dim = check_square(&rhs)?;
        let tau = Rc::new(Parameter::new(0.0));
        let yold = Rc::new(ConstantFunction::new(dim));
        let ynew = Rc::new(IdentityFunction::new(dim));
        let equ = FuncExpr::leaf(ynew)
            - FuncExpr::leaf(yold.clone())
            - tau.clone() * FuncExpr::leaf(rhs.clone());
        debug!("ImplicitEuler equation: {}", equ);
        Ok(ImplicitEuler {
            rhs,
            equ,
            tau,
            yold,
            newton,
        })
    }
    /// the residual equation shared by all steps
    pub fn equation(&self) -> &FuncExpr {
        &self.equ
    }
}

impl TimeStepper for ImplicitEuler {
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), NewtonError> {
        self.yold.set(y);
        self.tau.set(tau);
        self.newton.solve(&self.equ, y)?;
        Ok(())
    }
    fn rhs(&self) -> &Rc<dyn NonlinearFunction> {
        &self.rhs
    }
    fn name(&self) -> &str {
        "ImplicitEuler"
    }
}

/// Trapezoidal rule. The residual y - y_old - tau/2 f(y_old) - tau/2 f(y) is
/// assembled anew on every step from the frozen y_old and f(y_old).
pub struct CrankNicolson {
    rhs: Rc<dyn NonlinearFunction>,
    tau: Rc<Parameter>,
    yold: Rc<ConstantFunction>,
    ynew: Rc<IdentityFunction>,
    vecf: Rc<ConstantFunction>,
    newton: NewtonSolver,
}

impl CrankNicolson {
    pub fn new(rhs: Rc<dyn NonlinearFunction>) -> Result<Self, StepperError> {
        Self::with_solver(rhs, NewtonSolver::default())
    }
    pub fn with_solver(
        rhs: Rc<dyn NonlinearFunction>,
        newton: NewtonSolver,
    ) -> Result<Self, StepperError> {
        let dim = check_square(&rhs)?;
        Ok(CrankNicolson {
            rhs,
            tau: Rc::new(Parameter::new(0.0)),
            yold: Rc::new(ConstantFunction::new(dim)),
            ynew: Rc::new(IdentityFunction::new(dim)),
            vecf: Rc::new(ConstantFunction::new(dim)),
            newton,
        })
    }
}

impl TimeStepper for CrankNicolson {
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), NewtonError> {
        self.yold.set(y);
        self.rhs.evaluate(y, &mut self.vecf.get());
        self.tau.set(tau);

        let half_tau = 0.5 * self.tau.get();
        let equ = FuncExpr::leaf(self.ynew.clone())
            - FuncExpr::leaf(self.yold.clone())
            - half_tau * FuncExpr::leaf(self.vecf.clone())
            - half_tau * FuncExpr::leaf(self.rhs.clone());

        self.newton.solve(&equ, y)?;
        Ok(())
    }
    fn rhs(&self) -> &Rc<dyn NonlinearFunction> {
        &self.rhs
    }
    fn name(&self) -> &str {
        "CrankNicolson"
    }
}

//////////////////////////////////FACTORY///////////////////////////////////////////
/// Names of the available schemes, parsed from strings like "ImplicitEuler" or "BE"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum StepperKind {
    #[strum(to_string = "ExplicitEuler", serialize = "FE")]
    ExplicitEuler,
    #[strum(to_string = "ImprovedEuler", serialize = "Midpoint")]
    ImprovedEuler,
    #[strum(to_string = "ImplicitEuler", serialize = "BE")]
    ImplicitEuler,
    #[strum(to_string = "CrankNicolson", serialize = "CN")]
    CrankNicolson,
}

impl StepperKind {
    pub fn from_name(name: &str) -> Result<Self, StepperError> {
        StepperKind::from_str(name).map_err(|_| StepperError::UnknownMethod(name.to_string()))
    }
    pub fn is_implicit(&self) -> bool {
        matches!(self, StepperKind::ImplicitEuler | StepperKind::CrankNicolson)
    }
}

pub fn create_stepper(
    kind: StepperKind,
    rhs: Rc<dyn NonlinearFunction>,
) -> Result<Box<dyn TimeStepper>, StepperError> {
    create_stepper_with_solver(kind, rhs, NewtonSolver::default())
}

/// `newton` is ignored by explicit schemes
pub fn create_stepper_with_solver(
    kind: StepperKind,
    rhs: Rc<dyn NonlinearFunction>,
    newton: NewtonSolver,
) -> Result<Box<dyn TimeStepper>, StepperError> {
    let stepper: Box<dyn TimeStepper> = match kind {
        StepperKind::ExplicitEuler => Box::new(ExplicitEuler::new(rhs)?),
        StepperKind::ImprovedEuler => Box::new(ImprovedEuler::new(rhs)?),
        StepperKind::ImplicitEuler => Box::new(ImplicitEuler::with_solver(rhs, newton)?),
        StepperKind::CrankNicolson => Box::new(CrankNicolson::with_solver(rhs, newton)?),
    };
    Ok(stepper)
}
