use crate::numerical::nonlinear_function::NonlinearFunction;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::fmt;

/// Error types of the Newton-Raphson solver
#[derive(Debug, Clone, PartialEq)]
pub enum NewtonError {
    /// residual norm still above tolerance after `iterations` steps
    NotConverged { iterations: usize, residual: f64 },
    /// jacobian could not be factorized
    SingularJacobian,
    /// equation is not square or the guess has the wrong length
    DimensionMismatch { dim_x: usize, dim_f: usize },
}

impl fmt::Display for NewtonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NewtonError::NotConverged {
                iterations,
                residual,
            } => write!(
                f,
                "Newton did not converge in {} iterations, residual = {}",
                iterations, residual
            ),
            NewtonError::SingularJacobian => write!(f, "Jacobian is singular"),
            NewtonError::DimensionMismatch { dim_x, dim_f } => write!(
                f,
                "Equation must be square and match the guess: dim_x = {}, dim_f = {}",
                dim_x, dim_f
            ),
        }
    }
}

impl std::error::Error for NewtonError {}

/// Newton-Raphson solver for G(x) = 0 working in place on the guess vector
///
///  x_{k+1} = x_k - J(x_k)^{-1} G(x_k)
///
/// iteration stops when ||G(x_k)|| < tolerance
///
/// The tolerance is absolute by default, so a state of magnitude 1e7 can stall
/// at a residual of about 1e-9 (round-off of the state itself) without ever
/// reaching 1e-10. With `scaled = true` the test becomes
/// ||G(x_k)|| < tolerance * max(1, ||x_k||).
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub scaled: bool,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        NewtonSolver {
            tolerance: 1e-10,
            max_iterations: 10,
            scaled: false,
        }
    }
}

impl NewtonSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        NewtonSolver {
            tolerance,
            max_iterations,
            scaled: false,
        }
    }
    /// options map with keys "tolerance", "max_iterations" and "scaled" (nonzero = on).
    /// None, missing keys or invalid values keep defaults
    pub fn from_options(options: &HashMap<String, Option<f64>>) -> Self {
        let mut solver = NewtonSolver::default();
        if let Some(Some(tolerance)) = options.get("tolerance") {
            if *tolerance > 0.0 && tolerance.is_finite() {
                solver.set_tolerance(*tolerance);
            } else {
                warn!("invalid tolerance {}, keeping {}", tolerance, solver.tolerance);
            }
        }
        if let Some(Some(max_iterations)) = options.get("max_iterations") {
            if *max_iterations >= 1.0 && max_iterations.is_finite() {
                solver.set_max_iterations(*max_iterations as usize);
            } else {
                warn!(
                    "invalid max_iterations {}, keeping {}",
                    max_iterations, solver.max_iterations
                );
            }
        }
        if let Some(Some(scaled)) = options.get("scaled") {
            solver.set_scaled(*scaled != 0.0);
        }
        solver
    }
    pub fn set_tolerance(&mut self, tolerance: f64) {
        assert!(tolerance > 0.0, "tolerance must be positive");
        self.tolerance = tolerance;
    }
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        assert!(max_iterations >= 1, "max_iterations must be at least 1");
        self.max_iterations = max_iterations;
    }
    pub fn set_scaled(&mut self, scaled: bool) {
        self.scaled = scaled;
    }

    /// Solve `func(x) = 0`. `x` is the initial guess and is overwritten with the root.
    /// Returns the number of iterations used, 0 for an empty system.
    pub fn solve(
        &self,
        func: &dyn NonlinearFunction,
        x: &mut DVector<f64>,
    ) -> Result<usize, NewtonError> {
        let (dim_x, dim_f) = (func.dim_x(), func.dim_f());
        if dim_x != dim_f || x.len() != dim_x {
            return Err(NewtonError::DimensionMismatch { dim_x, dim_f });
        }
        if dim_x == 0 {
            return Ok(0);
        }
        let mut res = DVector::zeros(dim_f);
        let mut error = f64::INFINITY;
        for i in 0..self.max_iterations {
            func.evaluate(x, &mut res);
            let mut jac = DMatrix::zeros(dim_f, dim_x);
            func.evaluate_deriv(x, &mut jac);
            let threshold = if self.scaled {
                self.tolerance * x.norm().max(1.0)
            } else {
                self.tolerance
            };
            // J*dx = G
            let dx = jac.lu().solve(&res).ok_or(NewtonError::SingularJacobian)?;
            *x -= dx;
            error = res.norm();
            debug!("Newton iteration {}, residual = {}", i, error);
            if error < threshold {
                return Ok(i + 1);
            }
        }
        warn!(
            "Newton did not converge in {} iterations, residual = {}",
            self.max_iterations, error
        );
        Err(NewtonError::NotConverged {
            iterations: self.max_iterations,
            residual: error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::nonlinear_function::ClosureFunction;
    use approx::assert_relative_eq;

    fn circle_and_line() -> ClosureFunction {
        // x^2 + y^2 - 10 = 0, x - y - 4 = 0
        ClosureFunction::new(
            2,
            2,
            |x: &DVector<f64>, f: &mut DVector<f64>| {
                f[0] = x[0] * x[0] + x[1] * x[1] - 10.0;
                f[1] = x[0] - x[1] - 4.0;
            },
            "circle_and_line",
        )
        .with_jacobian(|x: &DVector<f64>, df: &mut DMatrix<f64>| {
            df[(0, 0)] = 2.0 * x[0];
            df[(0, 1)] = 2.0 * x[1];
            df[(1, 0)] = 1.0;
            df[(1, 1)] = -1.0;
        })
    }

    #[test]
    fn test_newton_nonlinear_system() {
        let solver = NewtonSolver::new(1e-10, 50);
        let mut x = DVector::from_vec(vec![1.0, 1.0]);
        let iterations = solver.solve(&circle_and_line(), &mut x).unwrap();
        assert!(iterations > 1);
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(x[1], -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_newton_linear_equation_two_iterations() {
        // 1.1 x - 1 = 0: one step to the root, one to see a zero residual
        let f = ClosureFunction::new(
            1,
            1,
            |x: &DVector<f64>, f: &mut DVector<f64>| f[0] = 1.1 * x[0] - 1.0,
            "linear",
        )
        .with_jacobian(|_x: &DVector<f64>, df: &mut DMatrix<f64>| df[(0, 0)] = 1.1);
        let mut x = DVector::from_vec(vec![1.0]);
        let iterations = NewtonSolver::default().solve(&f, &mut x).unwrap();
        assert_eq!(iterations, 2);
        assert_relative_eq!(x[0], 1.0 / 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_newton_not_converged() {
        let solver = NewtonSolver::new(1e-10, 2);
        let mut x = DVector::from_vec(vec![1.0, 1.0]);
        let err = solver.solve(&circle_and_line(), &mut x).unwrap_err();
        match err {
            NewtonError::NotConverged { iterations, residual } => {
                assert_eq!(iterations, 2);
                assert!(residual > 1e-10);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_newton_singular_jacobian() {
        // x^2 + 1 = 0 started at the extremum
        let f = ClosureFunction::new(
            1,
            1,
            |x: &DVector<f64>, f: &mut DVector<f64>| f[0] = x[0] * x[0] + 1.0,
            "no_root",
        )
        .with_jacobian(|x: &DVector<f64>, df: &mut DMatrix<f64>| df[(0, 0)] = 2.0 * x[0]);
        let mut x = DVector::from_vec(vec![0.0]);
        let err = NewtonSolver::default().solve(&f, &mut x).unwrap_err();
        assert_eq!(err, NewtonError::SingularJacobian);
    }

    #[test]
    fn test_newton_dimension_mismatch() {
        let f = ClosureFunction::new(
            2,
            1,
            |x: &DVector<f64>, f: &mut DVector<f64>| f[0] = x[0] + x[1],
            "non_square",
        );
        let mut x = DVector::from_vec(vec![0.0, 0.0]);
        let err = NewtonSolver::default().solve(&f, &mut x).unwrap_err();
        assert_eq!(err, NewtonError::DimensionMismatch { dim_x: 2, dim_f: 1 });
        assert!(err.to_string().contains("dim_x = 2"));
    }

    #[test]
    fn test_newton_from_options() {
        let options = HashMap::from([
            ("tolerance".to_string(), Some(1e-6)),
            ("max_iterations".to_string(), None),
        ]);
        let solver = NewtonSolver::from_options(&options);
        assert_eq!(solver.tolerance, 1e-6);
        assert_eq!(solver.max_iterations, 10);
        let solver = NewtonSolver::from_options(&HashMap::new());
        assert_eq!(solver, NewtonSolver::default());
    }

    #[test]
    fn test_newton_from_options_invalid_values_keep_defaults() {
        for bad in [-3.0, 0.0, f64::NAN] {
            let options = HashMap::from([
                ("tolerance".to_string(), Some(bad)),
                ("max_iterations".to_string(), Some(bad)),
            ]);
            assert_eq!(NewtonSolver::from_options(&options), NewtonSolver::default());
        }
        let options = HashMap::from([
            ("max_iterations".to_string(), Some(25.0)),
            ("scaled".to_string(), Some(1.0)),
        ]);
        let solver = NewtonSolver::from_options(&options);
        assert_eq!(solver.max_iterations, 25);
        assert!(solver.scaled);
    }

    #[test]
    fn test_newton_empty_system() {
        let f = ClosureFunction::new(0, 0, |_x: &DVector<f64>, _f: &mut DVector<f64>| {}, "empty");
        let mut x = DVector::zeros(0);
        assert_eq!(NewtonSolver::default().solve(&f, &mut x), Ok(0));
    }

    #[test]
    fn test_newton_scaled_tolerance_for_large_root() {
        // 1.1 x - 1.1e7 = 0, root 1e7: round-off keeps ||G|| near 1e-9
        let f = ClosureFunction::new(
            1,
            1,
            |x: &DVector<f64>, f: &mut DVector<f64>| f[0] = 1.1 * x[0] - 1.1e7,
            "large_root",
        )
        .with_jacobian(|_x: &DVector<f64>, df: &mut DMatrix<f64>| df[(0, 0)] = 1.1);
        let mut solver = NewtonSolver::default();
        solver.set_scaled(true);
        let mut x = DVector::from_vec(vec![1.0]);
        let iterations = solver.solve(&f, &mut x).unwrap();
        assert!(iterations <= 3);
        assert_relative_eq!(x[0], 1e7, max_relative = 1e-14);
    }
}
