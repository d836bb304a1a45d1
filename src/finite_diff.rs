//! Finite-difference validators.
//!
//! Pure numerical cross-checks for AD results. They evaluate `f` on plain
//! floats and never touch a tape.

use crate::float::Float;

/// Gradient by the sixth-order central stencil
/// `(f(x+3h) - 9f(x+2h) + 45f(x+h) - 45f(x-h) + 9f(x-2h) - f(x-3h)) / 60h`.
///
/// Returns `(f(x), ∇f(x))`.
pub fn finite_diff_gradient<F: Float>(f: impl Fn(&[F]) -> F, x: &[F], epsilon: F) -> (F, Vec<F>) {
    let mut xs = x.to_vec();
    let value = f(&xs);
    let mut grad = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let mut at = |k: f64| {
            xs[i] = x[i] + F::lit(k) * epsilon;
            f(&xs)
        };
        let d = at(3.0) - F::lit(9.0) * at(2.0) + F::lit(45.0) * at(1.0)
            - F::lit(45.0) * at(-1.0)
            + F::lit(9.0) * at(-2.0)
            - at(-3.0);
        xs[i] = x[i];
        grad.push(d / (F::lit(60.0) * epsilon));
    }
    (value, grad)
}

/// Hessian by the fourth-order central stencil
/// `(-g(x+2h) + 8g(x+h) - 8g(x-h) + g(x-2h)) / 12h` applied to
/// finite-difference gradients `g`, then symmetrised.
///
/// Returns `(f(x), ∇f(x), H)`.
pub fn finite_diff_hessian<F: Float>(
    f: impl Fn(&[F]) -> F,
    x: &[F],
    epsilon: F,
) -> (F, Vec<F>, Vec<Vec<F>>) {
    let n = x.len();
    let (value, grad) = finite_diff_gradient(&f, x, epsilon);
    let mut xs = x.to_vec();
    // cols[i] = ∂g/∂x_i
    let mut cols = Vec::with_capacity(n);
    for i in 0..n {
        let mut g_at = |k: f64| {
            xs[i] = x[i] + F::lit(k) * epsilon;
            finite_diff_gradient(&f, &xs, epsilon).1
        };
        let (gp2, gp1, gm1, gm2) = (g_at(2.0), g_at(1.0), g_at(-1.0), g_at(-2.0));
        xs[i] = x[i];
        let denom = F::lit(12.0) * epsilon;
        let col: Vec<F> = (0..n)
            .map(|j| (-gp2[j] + F::lit(8.0) * gp1[j] - F::lit(8.0) * gm1[j] + gm2[j]) / denom)
            .collect();
        cols.push(col);
    }
    let half = F::lit(0.5);
    let hess = (0..n)
        .map(|i| (0..n).map(|j| half * (cols[i][j] + cols[j][i])).collect())
        .collect();
    (value, grad, hess)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_of_cubic_is_exact_to_roundoff() {
        let f = |x: &[f64]| x[0].powi(3) + 2.0 * x[0] * x[1];
        let (v, g) = finite_diff_gradient(f, &[1.5, -0.5], 1e-3);
        assert!((v - (3.375 - 1.5)).abs() < 1e-14);
        assert!((g[0] - (3.0 * 2.25 - 1.0)).abs() < 1e-8);
        assert!((g[1] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn hessian_is_symmetric() {
        let f = |x: &[f64]| (x[0] * x[1]).sin() + x[1] * x[1] * x[0];
        let (_, _, h) = finite_diff_hessian(f, &[0.3, 0.7], 1e-3);
        assert_eq!(h[0][1], h[1][0]);
    }
}
