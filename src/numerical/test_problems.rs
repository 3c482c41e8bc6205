//! a collection of autonomous ODE systems with exact solutions for testing purposes

use crate::numerical::nonlinear_function::{ClosureFunction, NonlinearFunction};
use nalgebra::{DMatrix, DVector};
use std::rc::Rc;
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum TestProblem {
    /// y' = -y, y(0) = 1, y = exp(-t)
    LinearDecay,
    /// y0' = y1, y1' = -y0, y(0) = (1, 0), y = (cos t, -sin t)
    MassSpring,
    /// y' = y(1 - y), y(0) = 0.5, y = 1/(1 + exp(-t))
    Logistic,
}

impl TestProblem {
    pub fn rhs(&self) -> Rc<dyn NonlinearFunction> {
        match self {
            TestProblem::LinearDecay => Rc::new(
                ClosureFunction::new(
                    1,
                    1,
                    |y: &DVector<f64>, f: &mut DVector<f64>| f[0] = -y[0],
                    "linear_decay",
                )
                .with_jacobian(|_y: &DVector<f64>, df: &mut DMatrix<f64>| df[(0, 0)] = -1.0),
            ),
            TestProblem::MassSpring => Rc::new(
                ClosureFunction::new(
                    2,
                    2,
                    |y: &DVector<f64>, f: &mut DVector<f64>| {
                        f[0] = y[1];
                        f[1] = -y[0];
                    },
                    "mass_spring",
                )
                .with_jacobian(|_y: &DVector<f64>, df: &mut DMatrix<f64>| {
                    df.fill(0.0);
                    df[(0, 1)] = 1.0;
                    df[(1, 0)] = -1.0;
                }),
            ),
            TestProblem::Logistic => Rc::new(
                ClosureFunction::new(
                    1,
                    1,
                    |y: &DVector<f64>, f: &mut DVector<f64>| f[0] = y[0] * (1.0 - y[0]),
                    "logistic",
                )
                .with_jacobian(|y: &DVector<f64>, df: &mut DMatrix<f64>| {
                    df[(0, 0)] = 1.0 - 2.0 * y[0]
                }),
            ),
        }
    }

    pub fn y0(&self) -> DVector<f64> {
        self.exact_solution(0.0)
    }

    pub fn exact_solution(&self, t: f64) -> DVector<f64> {
        match self {
            TestProblem::LinearDecay => DVector::from_vec(vec![(-t).exp()]),
            TestProblem::MassSpring => DVector::from_vec(vec![t.cos(), -t.sin()]),
            TestProblem::Logistic => DVector::from_vec(vec![1.0 / (1.0 + (-t).exp())]),
        }
    }

    pub fn values(&self) -> Vec<String> {
        match self {
            TestProblem::MassSpring => vec!["x".to_string(), "v".to_string()],
            _ => vec!["y".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::nonlinear_function::finite_difference_jacobian;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn test_exact_solutions_satisfy_ode() {
        let t = 0.7;
        let h = 1e-6;
        for problem in TestProblem::iter() {
            let rhs = problem.rhs();
            let y = problem.exact_solution(t);
            let dydt = (problem.exact_solution(t + h) - problem.exact_solution(t - h)) / (2.0 * h);
            let mut f = DVector::zeros(rhs.dim_f());
            rhs.evaluate(&y, &mut f);
            for i in 0..f.len() {
                assert_relative_eq!(f[i], dydt[i], epsilon = 1e-8);
            }
            assert_eq!(problem.values().len(), rhs.dim_x());
        }
    }

    #[test]
    fn test_analytic_jacobians() {
        for problem in TestProblem::iter() {
            let rhs = problem.rhs();
            let n = rhs.dim_x();
            let y = problem.exact_solution(0.3);
            let mut analytic = DMatrix::zeros(n, n);
            let mut numeric = DMatrix::zeros(n, n);
            rhs.evaluate_deriv(&y, &mut analytic);
            finite_difference_jacobian(&*rhs, &y, &mut numeric);
            for (a, b) in analytic.iter().zip(numeric.iter()) {
                assert_relative_eq!(*a, *b, epsilon = 1e-7);
            }
        }
    }
}
