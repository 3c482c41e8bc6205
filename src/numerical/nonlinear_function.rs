//! # Nonlinear functions and equation building blocks
//!
//! A nonlinear function maps a vector of length `dim_x` to a vector of length
//! `dim_f` and can (optionally analytically) provide its Jacobian. Right-hand
//! sides of ODE systems as well as residual equations of implicit time
//! steppers are nonlinear functions.
//!
//! ## Main structures
//! - [`NonlinearFunction`] - the trait every function implements
//! - [`ClosureFunction`] - wraps plain Rust closures (with or without jacobian)
//! - [`IdentityFunction`] - the unknown of an equation, returns its input
//! - [`ConstantFunction`] - a frozen vector which can be overwritten between solves
//! - [`Parameter`] - a frozen scalar which can be overwritten between solves
//! - [`FuncExpr`] - expression tree combining functions by `+`, `-` and scaling
//!
//! Leaves are shared through `Rc`, so writing a new value into a
//! `ConstantFunction` or a `Parameter` is seen by every expression that
//! embeds it. The expression tree itself is owned and never mutated.
//!
//! # Example
//! ```
//! use std::rc::Rc;
//! use nalgebra::{DMatrix, DVector};
//! use RustedTimeSteppers::numerical::nonlinear_function::*;
//! // G(y) = y - y_old - tau * (-y)
//! let rhs: Rc<dyn NonlinearFunction> = Rc::new(ClosureFunction::new(1, 1,
//!     |y: &DVector<f64>, f: &mut DVector<f64>| f[0] = -y[0], "decay"));
//! let y_old = Rc::new(ConstantFunction::new(1));
//! let tau = Rc::new(Parameter::new(0.1));
//! let equation = FuncExpr::leaf(Rc::new(IdentityFunction::new(1)))
//!     - FuncExpr::leaf(y_old.clone())
//!     - tau.clone() * FuncExpr::leaf(rhs);
//! y_old.set(&DVector::from_vec(vec![1.0]));
//! let mut g = DVector::zeros(1);
//! equation.evaluate(&DVector::from_vec(vec![1.0]), &mut g);
//! assert!((g[0] - 0.1).abs() < 1e-14);
//! let mut jac = DMatrix::zeros(1, 1);
//! equation.evaluate_deriv(&DVector::from_vec(vec![1.0]), &mut jac);
//! assert!((jac[(0, 0)] - 1.1).abs() < 1e-8);
//! ```

use nalgebra::{DMatrix, DVector};
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Trait for vector valued functions f: R^dim_x -> R^dim_f
pub trait NonlinearFunction {
    /// length of the argument
    fn dim_x(&self) -> usize;
    /// length of the result
    fn dim_f(&self) -> usize;
    /// writes f(x) into `f`, `f` must have length `dim_f`
    fn evaluate(&self, x: &DVector<f64>, f: &mut DVector<f64>);
    /// writes the jacobian df/dx into `df` (`dim_f` x `dim_x`).
    /// Default implementation uses central finite differences.
    fn evaluate_deriv(&self, x: &DVector<f64>, df: &mut DMatrix<f64>) {
        finite_difference_jacobian(self, x, df);
    }
    /// function name for debugging/logging
    fn name(&self) -> &str {
        "unnamed_function"
    }
}

/// Central difference approximation of the jacobian of `func` at `x`
pub fn finite_difference_jacobian<F>(func: &F, x: &DVector<f64>, df: &mut DMatrix<f64>)
where
    F: NonlinearFunction + ?Sized,
{
    let eps = 1e-6;
    let mut x_plus = x.clone();
    let mut x_minus = x.clone();
    let mut f_plus = DVector::zeros(func.dim_f());
    let mut f_minus = DVector::zeros(func.dim_f());
    for j in 0..func.dim_x() {
        let h = eps * x[j].abs().max(1.0);
        x_plus[j] = x[j] + h;
        x_minus[j] = x[j] - h;
        func.evaluate(&x_plus, &mut f_plus);
        func.evaluate(&x_minus, &mut f_minus);
        df.set_column(j, &((&f_plus - &f_minus) / (2.0 * h)));
        x_plus[j] = x[j];
        x_minus[j] = x[j];
    }
}

////////////////////////////////CLOSURES//////////////////////////////////////////
type EvalFn = Box<dyn Fn(&DVector<f64>, &mut DVector<f64>)>;
type JacFn = Box<dyn Fn(&DVector<f64>, &mut DMatrix<f64>)>;

/// Function wrapper for closures, the jacobian closure is optional
pub struct ClosureFunction {
    dim_x: usize,
    dim_f: usize,
    func: EvalFn,
    jac: Option<JacFn>,
    name: String,
}

impl ClosureFunction {
    pub fn new<F>(dim_x: usize, dim_f: usize, func: F, name: &str) -> Self
    where
        F: Fn(&DVector<f64>, &mut DVector<f64>) + 'static,
    {
        Self {
            dim_x,
            dim_f,
            func: Box::new(func),
            jac: None,
            name: name.to_string(),
        }
    }
    /// attach an analytic jacobian
    pub fn with_jacobian<J>(mut self, jac: J) -> Self
    where
        J: Fn(&DVector<f64>, &mut DMatrix<f64>) + 'static,
    {
        self.jac = Some(Box::new(jac));
        self
    }
    pub fn has_jacobian(&self) -> bool {
        self.jac.is_some()
    }
}

impl NonlinearFunction for ClosureFunction {
    fn dim_x(&self) -> usize {
        self.dim_x
    }
    fn dim_f(&self) -> usize {
        self.dim_f
    }
    fn evaluate(&self, x: &DVector<f64>, f: &mut DVector<f64>) {
        (self.func)(x, f)
    }
    fn evaluate_deriv(&self, x: &DVector<f64>, df: &mut DMatrix<f64>) {
        match &self.jac {
            Some(jac) => jac(x, df),
            None => finite_difference_jacobian(self, x, df),
        }
    }
    fn name(&self) -> &str {
        &self.name
    }
}

//////////////////////////////////LEAVES//////////////////////////////////////////
/// The unknown of an equation: f(x) = x
#[derive(Debug, Clone)]
pub struct IdentityFunction {
    dim: usize,
}

impl IdentityFunction {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl NonlinearFunction for IdentityFunction {
    fn dim_x(&self) -> usize {
        self.dim
    }
    fn dim_f(&self) -> usize {
        self.dim
    }
    fn evaluate(&self, x: &DVector<f64>, f: &mut DVector<f64>) {
        f.copy_from(x);
    }
    fn evaluate_deriv(&self, _x: &DVector<f64>, df: &mut DMatrix<f64>) {
        df.fill_with_identity();
    }
    fn name(&self) -> &str {
        "y"
    }
}

/// Frozen vector, f(x) = c. The value is overwritten with [`ConstantFunction::set`]
/// or in place through [`ConstantFunction::get`]; its length never changes.
#[derive(Debug)]
pub struct ConstantFunction {
    value: RefCell<DVector<f64>>,
}

impl ConstantFunction {
    pub fn new(dim: usize) -> Self {
        Self {
            value: RefCell::new(DVector::zeros(dim)),
        }
    }
    /// panics if `value` has a different length
    pub fn set(&self, value: &DVector<f64>) {
        self.value.borrow_mut().copy_from(value);
    }
    pub fn get(&self) -> RefMut<'_, DVector<f64>> {
        self.value.borrow_mut()
    }
    pub fn dim(&self) -> usize {
        self.value.borrow().len()
    }
}

impl NonlinearFunction for ConstantFunction {
    fn dim_x(&self) -> usize {
        self.dim()
    }
    fn dim_f(&self) -> usize {
        self.dim()
    }
    fn evaluate(&self, _x: &DVector<f64>, f: &mut DVector<f64>) {
        f.copy_from(&*self.value.borrow());
    }
    fn evaluate_deriv(&self, _x: &DVector<f64>, df: &mut DMatrix<f64>) {
        df.fill(0.0);
    }
    fn name(&self) -> &str {
        "const"
    }
}

/// Frozen scalar used as a factor in front of a function, e.g. the time step
#[derive(Debug, Default)]
pub struct Parameter {
    value: Cell<f64>,
}

impl Parameter {
    pub fn new(value: f64) -> Self {
        Self {
            value: Cell::new(value),
        }
    }
    pub fn set(&self, value: f64) {
        self.value.set(value);
    }
    pub fn get(&self) -> f64 {
        self.value.get()
    }
}

///////////////////////////////EXPRESSION TREE////////////////////////////////////
/// Expression tree of nonlinear functions.
///
/// Build it with the operators: `a + b`, `a - b`, `-a`, `c * a` (c: f64) and
/// `p * a` (p: `Rc<Parameter>`). All operands must have matching dimensions,
/// mismatches panic at construction time.
#[derive(Clone)]
pub enum FuncExpr {
    /// any function, shared with other expressions
    Leaf(Rc<dyn NonlinearFunction>),
    /// left + right
    Sum(Box<FuncExpr>, Box<FuncExpr>),
    /// left - right
    Diff(Box<FuncExpr>, Box<FuncExpr>),
    /// c * f
    Scale(f64, Box<FuncExpr>),
    /// p * f, p read at evaluation time
    ParamScale(Rc<Parameter>, Box<FuncExpr>),
}

impl FuncExpr {
    pub fn leaf(func: Rc<dyn NonlinearFunction>) -> Self {
        FuncExpr::Leaf(func)
    }
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
    fn check_dims(&self, other: &FuncExpr) {
        assert_eq!(
            (self.dim_x(), self.dim_f()),
            (other.dim_x(), other.dim_f()),
            "dimensions of {} and {} do not match",
            self,
            other
        );
    }
}

impl NonlinearFunction for FuncExpr {
    fn dim_x(&self) -> usize {
        match self {
            FuncExpr::Leaf(func) => func.dim_x(),
            FuncExpr::Sum(lhs, _) | FuncExpr::Diff(lhs, _) => lhs.dim_x(),
            FuncExpr::Scale(_, func) | FuncExpr::ParamScale(_, func) => func.dim_x(),
        }
    }
    fn dim_f(&self) -> usize {
        match self {
            FuncExpr::Leaf(func) => func.dim_f(),
            FuncExpr::Sum(lhs, _) | FuncExpr::Diff(lhs, _) => lhs.dim_f(),
            FuncExpr::Scale(_, func) | FuncExpr::ParamScale(_, func) => func.dim_f(),
        }
    }
    fn evaluate(&self, x: &DVector<f64>, f: &mut DVector<f64>) {
        match self {
            FuncExpr::Leaf(func) => func.evaluate(x, f),
            FuncExpr::Sum(lhs, rhs) => {
                lhs.evaluate(x, f);
                let mut tmp = DVector::zeros(rhs.dim_f());
                rhs.evaluate(x, &mut tmp);
                *f += tmp;
            }
            FuncExpr::Diff(lhs, rhs) => {
                lhs.evaluate(x, f);
                let mut tmp = DVector::zeros(rhs.dim_f());
                rhs.evaluate(x, &mut tmp);
                *f -= tmp;
            }
            FuncExpr::Scale(c, func) => {
                func.evaluate(x, f);
                *f *= *c;
            }
            FuncExpr::ParamScale(p, func) => {
                func.evaluate(x, f);
                *f *= p.get();
            }
        }
    }
    fn evaluate_deriv(&self, x: &DVector<f64>, df: &mut DMatrix<f64>) {
        match self {
            FuncExpr::Leaf(func) => func.evaluate_deriv(x, df),
            FuncExpr::Sum(lhs, rhs) => {
                lhs.evaluate_deriv(x, df);
                let mut tmp = DMatrix::zeros(rhs.dim_f(), rhs.dim_x());
                rhs.evaluate_deriv(x, &mut tmp);
                *df += tmp;
            }
            FuncExpr::Diff(lhs, rhs) => {
                lhs.evaluate_deriv(x, df);
                let mut tmp = DMatrix::zeros(rhs.dim_f(), rhs.dim_x());
                rhs.evaluate_deriv(x, &mut tmp);
                *df -= tmp;
            }
            FuncExpr::Scale(c, func) => {
                func.evaluate_deriv(x, df);
                *df *= *c;
            }
            FuncExpr::ParamScale(p, func) => {
                func.evaluate_deriv(x, df);
                *df *= p.get();
            }
        }
    }
    fn name(&self) -> &str {
        "expression"
    }
}

impl fmt::Display for FuncExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FuncExpr::Leaf(func) => write!(f, "{}", func.name()),
            FuncExpr::Sum(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            FuncExpr::Diff(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
            FuncExpr::Scale(c, func) => write!(f, "{} * {}", c, func),
            FuncExpr::ParamScale(p, func) => write!(f, "[{}] * {}", p.get(), func),
        }
    }
}

impl fmt::Debug for FuncExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FuncExpr({})", self)
    }
}

impl std::ops::Add for FuncExpr {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.check_dims(&rhs);
        FuncExpr::Sum(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Sub for FuncExpr {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.check_dims(&rhs);
        FuncExpr::Diff(self.boxed(), rhs.boxed())
    }
}

impl std::ops::Neg for FuncExpr {
    type Output = Self;

    fn neg(self) -> Self::Output {
        FuncExpr::Scale(-1.0, self.boxed())
    }
}

impl std::ops::Mul<FuncExpr> for f64 {
    type Output = FuncExpr;

    fn mul(self, rhs: FuncExpr) -> Self::Output {
        FuncExpr::Scale(self, rhs.boxed())
    }
}

impl std::ops::Mul<FuncExpr> for Rc<Parameter> {
    type Output = FuncExpr;

    fn mul(self, rhs: FuncExpr) -> Self::Output {
        FuncExpr::ParamScale(self, rhs.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Rc<dyn NonlinearFunction> {
        // f(x) = (x0^2, x0*x1)
        Rc::new(ClosureFunction::new(
            2,
            2,
            |x: &DVector<f64>, f: &mut DVector<f64>| {
                f[0] = x[0] * x[0];
                f[1] = x[0] * x[1];
            },
            "square",
        ))
    }

    #[test]
    fn test_finite_difference_jacobian() {
        let f = square();
        let x = DVector::from_vec(vec![2.0, 3.0]);
        let mut jac = DMatrix::zeros(2, 2);
        f.evaluate_deriv(&x, &mut jac);
        let expected = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 3.0, 2.0]);
        for (a, b) in jac.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_analytic_jacobian_is_used() {
        let f = ClosureFunction::new(
            1,
            1,
            |x: &DVector<f64>, f: &mut DVector<f64>| f[0] = x[0].sin(),
            "sin",
        )
        .with_jacobian(|_x: &DVector<f64>, df: &mut DMatrix<f64>| df[(0, 0)] = 42.0);
        assert!(f.has_jacobian());
        let mut jac = DMatrix::zeros(1, 1);
        f.evaluate_deriv(&DVector::from_vec(vec![0.3]), &mut jac);
        assert_eq!(jac[(0, 0)], 42.0);
    }

    #[test]
    fn test_leaves() {
        let x = DVector::from_vec(vec![1.5, -2.0]);
        let mut f = DVector::zeros(2);
        let mut jac = DMatrix::zeros(2, 2);

        let id = IdentityFunction::new(2);
        id.evaluate(&x, &mut f);
        assert_eq!(f, x);
        id.evaluate_deriv(&x, &mut jac);
        assert_eq!(jac, DMatrix::identity(2, 2));

        let c = ConstantFunction::new(2);
        c.set(&DVector::from_vec(vec![7.0, 8.0]));
        c.evaluate(&x, &mut f);
        assert_eq!(f, DVector::from_vec(vec![7.0, 8.0]));
        c.evaluate_deriv(&x, &mut jac);
        assert_eq!(jac, DMatrix::zeros(2, 2));
        c.get()[1] = -1.0;
        c.evaluate(&x, &mut f);
        assert_eq!(f[1], -1.0);
        assert_eq!(c.dim(), 2);
    }

    #[test]
    #[should_panic]
    fn test_constant_rejects_wrong_length() {
        let c = ConstantFunction::new(2);
        c.set(&DVector::from_vec(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_expression_evaluation() {
        // G(x) = x - c - 0.5 * p * f(x)
        let c = Rc::new(ConstantFunction::new(2));
        let p = Rc::new(Parameter::new(2.0));
        let g = FuncExpr::leaf(Rc::new(IdentityFunction::new(2)))
            - FuncExpr::leaf(c.clone())
            - 0.5 * (p.clone() * FuncExpr::leaf(square()));
        c.set(&DVector::from_vec(vec![1.0, 1.0]));
        let x = DVector::from_vec(vec![2.0, 3.0]);
        let mut res = DVector::zeros(2);
        g.evaluate(&x, &mut res);
        assert_relative_eq!(res[0], 2.0 - 1.0 - 4.0, epsilon = 1e-14);
        assert_relative_eq!(res[1], 3.0 - 1.0 - 6.0, epsilon = 1e-14);

        // leaves are shared: updating them changes the same expression
        p.set(0.0);
        c.set(&DVector::zeros(2));
        g.evaluate(&x, &mut res);
        assert_eq!(res, x);

        p.set(1.0);
        let mut jac = DMatrix::zeros(2, 2);
        g.evaluate_deriv(&x, &mut jac);
        // I - 0.5 * [[2x0, 0], [x1, x0]]
        assert_relative_eq!(jac[(0, 0)], 1.0 - 2.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(0, 1)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 0)], -1.5, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 1)], 1.0 - 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sum_and_neg() {
        let id = || FuncExpr::leaf(Rc::new(IdentityFunction::new(1)));
        let g = id() + (-id()) + 3.0 * id();
        let x = DVector::from_vec(vec![2.0]);
        let mut res = DVector::zeros(1);
        g.evaluate(&x, &mut res);
        assert_eq!(res[0], 6.0);
        assert_eq!(g.to_string(), "((y + -1 * y) + 3 * y)");
    }

    #[test]
    #[should_panic]
    fn test_dimension_mismatch_panics() {
        let _ = FuncExpr::leaf(Rc::new(IdentityFunction::new(1)))
            - FuncExpr::leaf(Rc::new(ConstantFunction::new(2)));
    }
}
