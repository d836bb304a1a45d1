//! Special functions on plain floats, duals and tape variables.

use approx::assert_relative_eq;
use agrad::{log_mix, Dual, SpecialFunctions, Tape, TapeGuard, Var};

fn reverse_partials(f: impl FnOnce(Var<f64>, Var<f64>) -> Var<f64>, a: f64, b: f64) -> [f64; 2] {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(a);
    let y = Var::new(b);
    let g = f(x, y).grad(&[x, y]);
    [g[0], g[1]]
}

fn reverse_derivative(f: impl FnOnce(Var<f64>) -> Var<f64>, a: f64) -> f64 {
    reverse_partials(|x, _| f(x), a, 0.0)[0]
}

fn forward_derivative(f: impl FnOnce(Dual<f64>) -> Dual<f64>, a: f64) -> f64 {
    f(Dual::variable(a)).eps
}

#[test]
fn log_sum_exp_softmax_identity() {
    let [da, db] = reverse_partials(|a, b| a.log_sum_exp(b), 2.0, 3.0);
    let z = 2.0f64.exp() + 3.0f64.exp();
    assert_relative_eq!(da, 2.0f64.exp() / z, max_relative = 1e-14);
    assert_relative_eq!(db, 3.0f64.exp() / z, max_relative = 1e-14);
}

#[test]
fn log_sum_exp_large_arguments() {
    let v = 800.0f64.log_sum_exp(800.0);
    assert_relative_eq!(v, 800.0 + 2.0f64.ln(), max_relative = 1e-15);
    let [da, db] = reverse_partials(|a, b| a.log_sum_exp(b), 800.0, 800.0);
    assert_relative_eq!(da, 0.5, max_relative = 1e-15);
    assert_relative_eq!(db, 0.5, max_relative = 1e-15);
}

#[test]
fn log_sum_exp_infinite_operands() {
    let inf = f64::INFINITY;
    assert_eq!(reverse_partials(|a, b| a.log_sum_exp(b), inf, 1.0), [1.0, 0.0]);
    assert_eq!(reverse_partials(|a, b| a.log_sum_exp(b), 1.0, inf), [0.0, 1.0]);
    assert_eq!(reverse_partials(|a, b| a.log_sum_exp(b), 1.0, -inf), [1.0, 0.0]);

    let y = Dual::new(inf, 1.0).log_sum_exp(Dual::new(1.0, 0.0));
    assert_eq!(y.re, inf);
    assert_eq!(y.eps, 1.0);
    let y = Dual::new(-inf, 1.0).log_sum_exp(Dual::new(1.0, 2.0));
    assert_eq!(y.re, 1.0);
    assert_eq!(y.eps, 2.0);
}

#[test]
fn log_diff_exp_partials() {
    let (a, b) = (1.5f64, 0.5f64);
    let v = a.log_diff_exp(b);
    assert_relative_eq!(v, (a.exp() - b.exp()).ln(), max_relative = 1e-14);
    let [da, db] = reverse_partials(|x, y| x.log_diff_exp(y), a, b);
    let d = a.exp() - b.exp();
    assert_relative_eq!(da, a.exp() / d, max_relative = 1e-13);
    assert_relative_eq!(db, -b.exp() / d, max_relative = 1e-13);
}

#[test]
fn inv_logit_and_logit_are_inverse() {
    for x in [-30.0, -2.0, 0.0, 0.3, 5.0] {
        let p = f64::inv_logit(x);
        assert_relative_eq!(p.logit(), x, epsilon = 1e-12, max_relative = 1e-9);
    }
    let d = reverse_derivative(|x| x.inv_logit(), 0.0);
    assert_relative_eq!(d, 0.25, max_relative = 1e-15);
    let d = reverse_derivative(|x| x.logit(), 0.25);
    assert_relative_eq!(d, 1.0 / (0.25 * 0.75), max_relative = 1e-14);
}

#[test]
fn log1p_exp_is_stable() {
    assert_relative_eq!(1000.0f64.log1p_exp(), 1000.0, max_relative = 1e-15);
    assert!((-1000.0f64).log1p_exp() >= 0.0);
    let d = reverse_derivative(|x| x.log1p_exp(), 1.2);
    assert_relative_eq!(d, f64::inv_logit(1.2), max_relative = 1e-14);
}

#[test]
fn log1m_exp_derivative() {
    let x = -0.7f64;
    let d = reverse_derivative(|v| v.log1m_exp(), x);
    assert_relative_eq!(d, -x.exp() / (1.0 - x.exp()), max_relative = 1e-13);
}

#[test]
fn fdim_is_piecewise() {
    assert_eq!(3.0f64.fdim(1.0), 2.0);
    assert_eq!(1.0f64.fdim(3.0), 0.0);
    assert_eq!(reverse_partials(|a, b| a.fdim(b), 3.0, 1.0), [1.0, -1.0]);
    assert_eq!(reverse_partials(|a, b| a.fdim(b), 1.0, 3.0), [0.0, 0.0]);
}

#[test]
fn square_records_one_node() {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    let x = Var::new(3.0f64);
    let y = x.square();
    assert_eq!(guard.len(), 2);
    assert_eq!(y.grad(&[x]), vec![6.0]);
}

#[test]
fn reverse_and_forward_agree() {
    type Pair = (fn(Var<f64>) -> Var<f64>, fn(Dual<f64>) -> Dual<f64>);
    let table: [Pair; 5] = [
        (|x| x.inv_logit(), |x| x.inv_logit()),
        (|x| x.logit(), |x| x.logit()),
        (|x| x.log1p_exp(), |x| x.log1p_exp()),
        (|x| (x - 1.0).log1m_exp(), |x| (x - 1.0).log1m_exp()),
        (|x| x.square(), |x| x.square()),
    ];
    for x in [0.1, 0.45, 0.8] {
        for (rev, fwd) in table {
            let r = reverse_derivative(rev, x);
            let f = forward_derivative(fwd, x);
            assert_relative_eq!(r, f, max_relative = 1e-13);
        }
    }
}

#[test]
fn log_mix_on_every_scalar() {
    let (theta, l1, l2) = (0.3f64, -1.2f64, 0.4f64);
    let expected = (theta * l1.exp() + (1.0 - theta) * l2.exp()).ln();
    assert_relative_eq!(log_mix(theta, l1, l2), expected, max_relative = 1e-14);

    // d/dtheta = (e^l1 - e^l2) / mix
    let mix = expected.exp();
    let d = forward_derivative(
        |t| log_mix(t, Dual::constant(l1), Dual::constant(l2)),
        theta,
    );
    assert_relative_eq!(d, (l1.exp() - l2.exp()) / mix, max_relative = 1e-13);

    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let t = Var::new(theta);
    let a = Var::new(l1);
    let b = Var::new(l2);
    let g = log_mix(t, a, b).grad(&[t, a, b]);
    assert_relative_eq!(g[0], (l1.exp() - l2.exp()) / mix, max_relative = 1e-13);
    assert_relative_eq!(g[1], theta * l1.exp() / mix, max_relative = 1e-13);
    assert_relative_eq!(g[2], (1.0 - theta) * l2.exp() / mix, max_relative = 1e-13);
}
