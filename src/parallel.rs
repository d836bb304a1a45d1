//! Batched evaluation over rayon.
//!
//! Tapes are thread-local, so every rayon worker gets its own [`Tape`],
//! created once per work split and reused (recovered, not freed) across the
//! inputs that worker processes.

use rayon::prelude::*;

use crate::dual::Dual;
use crate::error::Result;
use crate::tape::{Tape, TapeGuard, TapeThreadLocal};
use crate::var::Var;

/// Value and gradient of `f` at every point of `inputs`, in parallel.
///
/// Results are in input order; the first error, if any, is returned.
pub fn gradient_batch<F, G>(f: G, inputs: &[Vec<F>]) -> Result<Vec<(F, Vec<F>)>>
where
    F: TapeThreadLocal,
    G: Fn(&[Var<F>]) -> Var<F> + Sync,
{
    inputs
        .par_iter()
        .map_init(Tape::<F>::new, |tape, x| {
            let guard = TapeGuard::new(tape);
            let out = crate::api::gradient(&f, x);
            guard.recover_memory();
            out
        })
        .collect()
}

/// Value, gradient and Hessian of `f` at every point of `inputs`, in parallel.
#[allow(clippy::type_complexity)]
pub fn hessian_batch<F, G>(f: G, inputs: &[Vec<F>]) -> Result<Vec<(F, Vec<F>, Vec<Vec<F>>)>>
where
    F: TapeThreadLocal,
    G: Fn(&[Dual<Var<F>>]) -> Dual<Var<F>> + Sync,
{
    inputs
        .par_iter()
        .map_init(Tape::<F>::new, |tape, x| {
            let guard = TapeGuard::new(tape);
            let out = crate::api::hessian(&f, x);
            guard.recover_memory();
            out
        })
        .collect()
}
