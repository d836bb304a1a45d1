//! Differentiation functionals.
//!
//! Reverse-mode functionals record on the thread's active tape when there is
//! one (inside a nested scope, so the enclosing evaluation is untouched) and
//! on a scratch tape otherwise. Forward-mode functionals need no tape.

use crate::dual::Dual;
use crate::error::{AdError, Result};
use crate::scalar::Scalar;
use crate::tape::{self, ActiveNested, Tape, TapeGuard, TapeThreadLocal};
use crate::var::Var;

/// Run `body` with a tape active: the current one, or a fresh scratch tape.
fn on_tape<F: TapeThreadLocal, R>(body: impl FnOnce() -> Result<R>) -> Result<R> {
    if tape::is_active::<F>() {
        body()
    } else {
        let mut scratch = Tape::<F>::new();
        let _guard = TapeGuard::new(&mut scratch);
        body()
    }
}

/// Zero the adjoints visible to the current scope, seed `root`, sweep, and
/// read the adjoints of `wrt`.
fn sweep<F: TapeThreadLocal>(root: &Var<F>, wrt: &[Var<F>]) -> Result<Vec<F>> {
    tape::try_with_active_tape(|t: &mut Tape<F>| {
        if t.is_nested() {
            t.set_zero_all_adjoints_nested()?;
        } else {
            t.set_zero_all_adjoints();
        }
        t.grad(root.index(), root.epoch())?;
        t.adjoints(wrt)
    })?
}

fn independents<F: TapeThreadLocal>(x: &[F]) -> Result<Vec<Var<F>>> {
    x.iter().map(|&v| Var::try_new(v)).collect()
}

fn check_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(AdError::SizeMismatch {
            context,
            expected,
            actual,
        })
    }
}

fn unit<T: Scalar>(i: usize, j: usize) -> T {
    if i == j {
        T::one()
    } else {
        T::zero()
    }
}

// ══════════════════════════════════════════════
//  Reverse mode
// ══════════════════════════════════════════════

/// Value and gradient of `f : R^n → R` by reverse mode.
///
/// ```
/// let (v, g) = agrad::gradient(|x: &[agrad::Var<f64>]| {
///     x[0] * x[0] + x[1] * x[1]
/// }, &[3.0, 4.0]).unwrap();
/// assert_eq!(v, 25.0);
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn gradient<F: TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Var<F>,
    x: &[F],
) -> Result<(F, Vec<F>)> {
    on_tape::<F, _>(|| {
        let _scope = ActiveNested::<F>::open()?;
        let xs = independents(x)?;
        let y = f(&xs);
        let g = sweep(&y, &xs)?;
        Ok((y.val(), g))
    })
}

/// Values and Jacobian of `f : R^n → R^m` by reverse mode, one sweep per
/// output. `J[i][j] = ∂f_i/∂x_j`.
pub fn jacobian<F: TapeThreadLocal>(
    f: impl FnOnce(&[Var<F>]) -> Vec<Var<F>>,
    x: &[F],
) -> Result<(Vec<F>, Vec<Vec<F>>)> {
    on_tape::<F, _>(|| {
        let _scope = ActiveNested::<F>::open()?;
        let xs = independents(x)?;
        let ys = f(&xs);
        let values = ys.iter().map(Var::val).collect();
        let jac = ys
            .iter()
            .map(|y| sweep(y, &xs))
            .collect::<Result<Vec<_>>>()?;
        Ok((values, jac))
    })
}

/// Value, gradient and Hessian of `f : R^n → R` by forward-over-reverse.
///
/// Column `j` comes from one reverse sweep of the tangent of `f` evaluated
/// with unit tangent `e_j`; each column runs in its own nested scope.
pub fn hessian<F: TapeThreadLocal>(
    f: impl Fn(&[Dual<Var<F>>]) -> Dual<Var<F>>,
    x: &[F],
) -> Result<(F, Vec<F>, Vec<Vec<F>>)> {
    let n = x.len();
    on_tape::<F, _>(|| {
        if n == 0 {
            let _scope = ActiveNested::<F>::open()?;
            let y = f(&[]);
            return Ok((y.re.val(), Vec::new(), Vec::new()));
        }
        let mut value = F::zero();
        let mut grad = vec![F::zero(); n];
        let mut hess = vec![vec![F::zero(); n]; n];
        for j in 0..n {
            let _scope = ActiveNested::<F>::open()?;
            let vars = independents(x)?;
            let xs: Vec<Dual<Var<F>>> = vars
                .iter()
                .enumerate()
                .map(|(i, &v)| Dual::new(v, unit(i, j)))
                .collect();
            let y = f(&xs);
            value = y.re.val();
            grad[j] = y.eps.val();
            let col = sweep(&y.eps, &vars)?;
            for (row, h) in hess.iter_mut().zip(col) {
                row[j] = h;
            }
        }
        Ok((value, grad, hess))
    })
}

/// Value and Hessian-vector product `H(x) v`, from one reverse sweep of the
/// directional derivative along `v`.
pub fn hessian_times_vector<F: TapeThreadLocal>(
    f: impl FnOnce(&[Dual<Var<F>>]) -> Dual<Var<F>>,
    x: &[F],
    v: &[F],
) -> Result<(F, Vec<F>)> {
    check_len("hessian_times_vector", x.len(), v.len())?;
    on_tape::<F, _>(|| {
        let _scope = ActiveNested::<F>::open()?;
        let vars = independents(x)?;
        let xs: Vec<Dual<Var<F>>> = vars
            .iter()
            .zip(v)
            .map(|(&xi, &vi)| Dual::new(xi, Var::constant(vi)))
            .collect();
        let y = f(&xs);
        let hv = sweep(&y.eps, &vars)?;
        Ok((y.re.val(), hv))
    })
}

/// Gradient of `tr(M H(x))` with respect to `x`, where `H` is the Hessian of
/// `f` and `m[i][j] = M_ij`. Needs third derivatives, so `f` is evaluated on
/// `Dual<Dual<Var>>`.
pub fn grad_tr_mat_times_hessian<F: TapeThreadLocal>(
    f: impl Fn(&[Dual<Dual<Var<F>>>]) -> Dual<Dual<Var<F>>>,
    x: &[F],
    m: &[Vec<F>],
) -> Result<Vec<F>> {
    let n = x.len();
    check_len("grad_tr_mat_times_hessian", n, m.len())?;
    for row in m {
        check_len("grad_tr_mat_times_hessian", n, row.len())?;
    }
    on_tape::<F, _>(|| {
        let _scope = ActiveNested::<F>::open()?;
        let vars = independents(x)?;
        let mut trace = Var::constant(F::zero());
        // tr(M H) = Σ_i e_iᵀ H (M column i)
        for i in 0..n {
            let xs: Vec<Dual<Dual<Var<F>>>> = vars
                .iter()
                .enumerate()
                .map(|(k, &xk)| {
                    Dual::new(
                        Dual::new(xk, unit(k, i)),
                        Dual::constant(Var::constant(m[k][i])),
                    )
                })
                .collect();
            let y = f(&xs);
            trace = trace + y.eps.eps;
        }
        sweep(&trace, &vars)
    })
}

// ══════════════════════════════════════════════
//  Forward mode
// ══════════════════════════════════════════════

/// Value and derivative of a scalar function `f : R → R`.
pub fn derivative<F: Scalar>(f: impl FnOnce(Dual<F>) -> Dual<F>, x: F) -> (F, F) {
    let y = f(Dual::variable(x));
    (y.re, y.eps)
}

/// Value and the partial derivative of `f` along coordinate `index`.
pub fn partial_derivative<F: Scalar>(
    f: impl FnOnce(&[Dual<F>]) -> Dual<F>,
    x: &[F],
    index: usize,
) -> Result<(F, F)> {
    if index >= x.len() {
        return Err(AdError::IndexOutOfRange {
            index,
            len: x.len(),
        });
    }
    let xs: Vec<Dual<F>> = x
        .iter()
        .enumerate()
        .map(|(i, &xi)| Dual::new(xi, unit(i, index)))
        .collect();
    let y = f(&xs);
    Ok((y.re, y.eps))
}

/// Value and directional derivative `∇f(x) · v`, in one forward pass.
pub fn gradient_dot_vector<F: Scalar>(
    f: impl FnOnce(&[Dual<F>]) -> Dual<F>,
    x: &[F],
    v: &[F],
) -> Result<(F, F)> {
    check_len("gradient_dot_vector", x.len(), v.len())?;
    let xs: Vec<Dual<F>> = x
        .iter()
        .zip(v)
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let y = f(&xs);
    Ok((y.re, y.eps))
}

/// Value and gradient of `f : R^n → R` with `n` forward passes.
pub fn fwd_gradient<F: Scalar>(f: impl Fn(&[Dual<F>]) -> Dual<F>, x: &[F]) -> (F, Vec<F>) {
    let n = x.len();
    let mut value = f(&x.iter().map(|&xi| Dual::constant(xi)).collect::<Vec<_>>()).re;
    let mut grad = Vec::with_capacity(n);
    for j in 0..n {
        let xs: Vec<Dual<F>> = x
            .iter()
            .enumerate()
            .map(|(k, &xk)| Dual::new(xk, unit(k, j)))
            .collect();
        let y = f(&xs);
        value = y.re;
        grad.push(y.eps);
    }
    (value, grad)
}

/// Values and Jacobian of `f : R^n → R^m` with `n` forward passes.
///
/// Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`.
pub fn fwd_jacobian<F: Scalar>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
) -> (Vec<F>, Vec<Vec<F>>) {
    let n = x.len();

    // First pass to get output dimension and values.
    let const_inputs: Vec<Dual<F>> = x.iter().map(|&xi| Dual::constant(xi)).collect();
    let const_outputs = f(&const_inputs);
    let m = const_outputs.len();
    let values: Vec<F> = const_outputs.iter().map(|d| d.re).collect();

    let mut jac = vec![vec![F::zero(); n]; m];
    for j in 0..n {
        let inputs: Vec<Dual<F>> = x
            .iter()
            .enumerate()
            .map(|(k, &xk)| Dual::new(xk, unit(k, j)))
            .collect();
        let outputs = f(&inputs);
        for (row, out) in jac.iter_mut().zip(outputs.iter()) {
            row[j] = out.eps;
        }
    }

    (values, jac)
}

/// Value, gradient and Hessian of `f : R^n → R` by forward-over-forward.
///
/// Each `(i, j)` entry with `i <= j` takes one pass with tangents `e_i` and
/// `e_j`; the lower triangle is mirrored.
pub fn fwd_hessian<F: Scalar>(
    f: impl Fn(&[Dual<Dual<F>>]) -> Dual<Dual<F>>,
    x: &[F],
) -> (F, Vec<F>, Vec<Vec<F>>) {
    let n = x.len();
    let lift = |i: usize, j: usize| -> Vec<Dual<Dual<F>>> {
        x.iter()
            .enumerate()
            .map(|(k, &xk)| Dual::new(Dual::new(xk, unit(k, i)), Dual::new(unit(k, j), F::zero())))
            .collect()
    };
    if n == 0 {
        let y = f(&[]);
        return (y.re.re, Vec::new(), Vec::new());
    }
    let mut value = F::zero();
    let mut grad = vec![F::zero(); n];
    let mut hess = vec![vec![F::zero(); n]; n];
    for i in 0..n {
        for j in i..n {
            let y = f(&lift(i, j));
            value = y.re.re;
            if i == j {
                grad[i] = y.re.eps;
            }
            hess[i][j] = y.eps.eps;
            hess[j][i] = y.eps.eps;
        }
    }
    (value, grad, hess)
}
