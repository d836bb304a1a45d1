//! nalgebra adapters for the gradient functionals.
//!
//! Thin wrappers accepting `DVector<F>` and returning `DVector<F>` / `DMatrix<F>`.

use nalgebra::{DMatrix, DVector};

use crate::dual::Dual;
use crate::error::Result;
use crate::tape::TapeThreadLocal;
use crate::var::Var;

fn to_matrix<F: TapeThreadLocal>(rows: Vec<Vec<F>>, ncols: usize) -> DMatrix<F> {
    let nrows = rows.len();
    let flat: Vec<F> = rows.into_iter().flatten().collect();
    DMatrix::from_row_slice(nrows, ncols, &flat)
}

/// Value and gradient, returning `(value, DVector)`.
pub fn gradient_nalgebra<F: TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Var<F>,
    x: &DVector<F>,
) -> Result<(F, DVector<F>)> {
    let (val, g) = crate::api::gradient(f, x.as_slice())?;
    Ok((val, DVector::from_vec(g)))
}

/// Value, gradient and Hessian by forward-over-reverse.
pub fn hessian_nalgebra<F: TapeThreadLocal>(
    f: impl Fn(&[Dual<Var<F>>]) -> Dual<Var<F>>,
    x: &DVector<F>,
) -> Result<(F, DVector<F>, DMatrix<F>)> {
    let n = x.len();
    let (val, grad, hess) = crate::api::hessian(f, x.as_slice())?;
    Ok((val, DVector::from_vec(grad), to_matrix(hess, n)))
}

/// Values and Jacobian `J[i][j] = ∂f_i/∂x_j` of a multi-output function.
pub fn jacobian_nalgebra<F: TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Vec<Var<F>>,
    x: &DVector<F>,
) -> Result<(DVector<F>, DMatrix<F>)> {
    let n = x.len();
    let (vals, jac) = crate::api::jacobian(f, x.as_slice())?;
    Ok((DVector::from_vec(vals), to_matrix(jac, n)))
}
