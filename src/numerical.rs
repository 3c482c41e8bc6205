/// nonlinear vector functions, the unknown/constant/parameter building blocks
/// and the expression tree used to assemble residual equations
/// ```
/// use std::rc::Rc;
/// use nalgebra::DVector;
/// use RustedTimeSteppers::numerical::nonlinear_function::*;
/// let c = Rc::new(ConstantFunction::new(2));
/// c.set(&DVector::from_vec(vec![1.0, 2.0]));
/// let g = FuncExpr::leaf(Rc::new(IdentityFunction::new(2))) - FuncExpr::leaf(c.clone());
/// let mut res = DVector::zeros(2);
/// g.evaluate(&DVector::from_vec(vec![1.0, 2.0]), &mut res);
/// assert_eq!(res, DVector::zeros(2));
/// ```
pub mod nonlinear_function;
/// Newton-Raphson solver working in place on the initial guess
pub mod NR_for_steppers;
/// explicit and implicit one-step schemes behind the `TimeStepper` trait
/// ```
/// use nalgebra::DVector;
/// use RustedTimeSteppers::numerical::test_problems::TestProblem;
/// use RustedTimeSteppers::numerical::timestepper::{StepperKind, create_stepper};
/// let mut stepper = create_stepper(StepperKind::ImplicitEuler, TestProblem::LinearDecay.rhs()).unwrap();
/// let mut y = DVector::from_vec(vec![1.0]);
/// stepper.do_step(0.1, &mut y).unwrap();
/// assert!((y[0] - 1.0 / 1.1).abs() < 1e-12);
/// ```
pub mod timestepper;
/// fixed step time marching loop with result export
pub mod ODE_marching;
/// ODE systems with exact solutions
pub mod test_problems;
