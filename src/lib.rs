//! Tape-based reverse-mode automatic differentiation with forward-mode duals.
//!
//! Operations on [`Var`] record nodes onto the thread's active [`Tape`]; a
//! reverse sweep from an output fills in adjoints. [`Dual`] carries forward
//! tangents and nests with itself and with `Var` for higher derivatives.
//!
//! ```
//! use agrad::{Tape, TapeGuard, Var};
//!
//! let mut tape = Tape::<f64>::new();
//! let guard = TapeGuard::new(&mut tape);
//! let x = Var::new(0.5);
//! let y = x * x;
//! assert_eq!(y.grad(&[x]), vec![1.0]);
//! guard.recover_memory();
//! ```

pub mod api;
pub mod arena;
pub mod config;
pub mod dual;
pub mod error;
pub mod finite_diff;
pub mod float;
pub mod node;
pub mod op;
pub mod scalar;
pub mod special;
pub mod tape;
mod traits;
pub mod var;
pub mod vector;

#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;
#[cfg(feature = "parallel")]
pub mod parallel;

pub use api::{
    derivative, fwd_gradient, fwd_hessian, fwd_jacobian, grad_tr_mat_times_hessian, gradient,
    gradient_dot_vector, hessian, hessian_times_vector, jacobian, partial_derivative,
};
pub use config::TapeConfig;
pub use dual::Dual;
pub use error::{AdError, Result};
pub use finite_diff::{finite_diff_gradient, finite_diff_hessian};
pub use float::Float;
pub use scalar::Scalar;
pub use special::{log_mix, SpecialFunctions};
pub use tape::{NestedCheckpoint, NestedScope, Tape, TapeGuard, TapeStats};
pub use var::Var;
pub use vector::{
    dot_product, dot_product_const, dot_self, log_sum_exp_slice, mean, precomputed_gradients, sum,
};

/// Type alias for forward-mode dual numbers over `f64`.
pub type Dual64 = Dual<f64>;
/// Type alias for forward-mode dual numbers over `f32`.
pub type Dual32 = Dual<f32>;
/// Type alias for reverse-mode variables over `f64`.
pub type Var64 = Var<f64>;
/// Type alias for reverse-mode variables over `f32`.
pub type Var32 = Var<f32>;
