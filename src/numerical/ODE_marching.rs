use crate::Utils::logger::{init_logger, save_matrix_to_csv};
use crate::numerical::NR_for_steppers::NewtonSolver;
use crate::numerical::nonlinear_function::NonlinearFunction;
use crate::numerical::timestepper::{
    StepperError, StepperKind, TimeStepper, create_stepper_with_solver,
};
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use std::fmt::Display;
use std::io;
use std::rc::Rc;
use std::time::Instant;
use tabled::{builder::Builder, settings::Style};

/// Fixed step time marching of dy/dt = f(y) from t0 to t_end with one of the
/// [`StepperKind`] schemes.
/// ```
/// use RustedTimeSteppers::numerical::ODE_marching::ODEMarching;
/// use RustedTimeSteppers::numerical::test_problems::TestProblem;
/// let problem = TestProblem::MassSpring;
/// let mut marching =
///     ODEMarching::new("CN", problem.rhs(), problem.y0(), 0.0, 1.0, 100).unwrap();
/// marching.set_loglevel(Some("off".to_string()));
/// marching.solve();
/// let (t, y) = marching.get_result();
/// assert_eq!(t.len(), 101);
/// assert_eq!(y.shape(), (101, 2));
/// assert!((y[(100, 0)] - 1.0_f64.cos()).abs() < 1e-4);
/// ```
pub struct ODEMarching {
    method: StepperKind,
    stepper: Box<dyn TimeStepper>,
    y0: DVector<f64>,
    t0: f64,
    t_end: f64,
    n_steps: usize,
    t: f64,
    y: DVector<f64>,
    t_result: DVector<f64>,
    y_result: DMatrix<f64>,
    pub status: String,
    pub message: Option<String>,
    pub values: Vec<String>,
    pub arg: String,
    loglevel: Option<String>,
    calc_statistics: HashMap<String, usize>,
}

impl Display for ODEMarching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ODEMarching {{ method: {}, t0: {}, t_end: {}, n_steps: {}, t: {}, y: {:?} }}",
            self.method,
            self.t0,
            self.t_end,
            self.n_steps,
            self.t,
            self.y.as_slice()
        )
    }
}

impl ODEMarching {
    pub fn new(
        method: &str,
        rhs: Rc<dyn NonlinearFunction>,
        y0: DVector<f64>,
        t0: f64,
        t_end: f64,
        n_steps: usize,
    ) -> Result<ODEMarching, StepperError> {
        let kind = StepperKind::from_name(method)?;
        Self::with_kind(kind, rhs, y0, t0, t_end, n_steps)
    }

    pub fn with_kind(
        method: StepperKind,
        rhs: Rc<dyn NonlinearFunction>,
        y0: DVector<f64>,
        t0: f64,
        t_end: f64,
        n_steps: usize,
    ) -> Result<ODEMarching, StepperError> {
        if n_steps == 0 {
            return Err(StepperError::NoSteps);
        }
        if y0.len() != rhs.dim_x() {
            return Err(StepperError::InitialStateLength {
                expected: rhs.dim_x(),
                found: y0.len(),
            });
        }
        let values = (0..y0.len()).map(|i| format!("y{}", i)).collect();
        let stepper = create_stepper_with_solver(method, rhs, NewtonSolver::default())?;
        Ok(ODEMarching {
            method,
            stepper,
            y: y0.clone(),
            y0,
            t0,
            t_end,
            n_steps,
            t: t0,
            t_result: DVector::zeros(0),
            y_result: DMatrix::zeros(0, 0),
            status: "running".to_string(),
            message: None,
            values,
            arg: "t".to_string(),
            loglevel: Some("info".to_string()),
            calc_statistics: HashMap::new(),
        })
    }
    /// rebuild the stepper with another Newton configuration (implicit schemes)
    pub fn set_newton_solver(&mut self, newton: NewtonSolver) -> Result<(), StepperError> {
        let rhs = self.stepper.rhs().clone();
        self.stepper = create_stepper_with_solver(self.method, rhs, newton)?;
        Ok(())
    }
    pub fn set_loglevel(&mut self, loglevel: Option<String>) {
        self.loglevel = loglevel;
    }
    /// names of unknowns and of the argument, used as csv headers
    pub fn set_names(&mut self, values: Vec<String>, arg: &str) {
        assert_eq!(values.len(), self.y0.len(), "one name per unknown");
        self.values = values;
        self.arg = arg.to_string();
    }
    pub fn tau(&self) -> f64 {
        (self.t_end - self.t0) / self.n_steps as f64
    }

    pub fn main_loop(&mut self) {
        let start = Instant::now();
        self.t = self.t0;
        self.y = self.y0.clone();
        self.status = "running".to_string();
        self.message = None;
        let tau = self.tau();

        let mut y: Vec<DVector<f64>> = vec![self.y.clone()];
        let mut t: Vec<f64> = vec![self.t];
        for i in 0..self.n_steps {
            if let Err(e) = self.stepper.do_step(tau, &mut self.y) {
                warn!("{} failed at step {}, t = {}: {}", self.method, i, self.t, e);
                self.status = "failed".to_string();
                self.message = Some(e.to_string());
                break;
            }
            self.t = self.t0 + (i + 1) as f64 * tau;
            t.push(self.t);
            y.push(self.y.clone());
        }
        if self.status != "failed" {
            self.status = "finished".to_string();
        }

        let rows = y.len();
        let cols = self.y0.len();
        let mut flat_vec: Vec<f64> = Vec::new();
        for vector in y.iter() {
            flat_vec.extend(vector.iter())
        }
        self.y_result = DMatrix::from_vec(cols, rows, flat_vec).transpose();
        self.t_result = DVector::from_vec(t);

        let duration = start.elapsed();
        info!("{} took {} milliseconds to run", self.method, duration.as_millis());
        self.calc_statistics
            .insert("time, ms".to_string(), duration.as_millis() as usize);
        self.calc_statistics
            .insert("number of steps done".to_string(), rows - 1);
        self.calc_statistics
            .insert("length of y vector".to_string(), cols);
    }

    pub fn solve(&mut self) {
        init_logger(self.loglevel.as_deref(), false);
        info!("solving with {}, tau = {}", self.method, self.tau());
        self.main_loop();
        self.print_statistics();
    }

    fn print_statistics(&self) {
        let stats = self.calc_statistics.clone();
        let mut table = Builder::from(stats).build();
        table.with(Style::modern_rounded());
        info!("\n \n CALC STATISTICS ({}) \n \n {}", self.status, table.to_string());
    }

    pub fn get_result(&self) -> (DVector<f64>, DMatrix<f64>) {
        (self.t_result.clone(), self.y_result.clone())
    }
    pub fn get_statistics(&self) -> &HashMap<String, usize> {
        &self.calc_statistics
    }

    pub fn save_result(&self, filename: &str) -> io::Result<()> {
        save_matrix_to_csv(
            &self.y_result,
            &self.values,
            filename,
            &self.t_result,
            &self.arg,
        )?;
        info!("result saved to {}", filename);
        Ok(())
    }
}
