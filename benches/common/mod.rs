#![allow(dead_code)]

use agrad::{Scalar, SpecialFunctions};

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = T::from_lit(1.0);
    let hundred = T::from_lit(100.0);
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Rastrigin ─────────────────────────────────────────────────────────────
// f(x) = 10n + Σ[x_i² - 10·cos(2π·x_i)]

pub fn rastrigin<T: Scalar>(x: &[T]) -> T {
    let ten = T::from_lit(10.0);
    let two_pi = T::from_lit(2.0 * std::f64::consts::PI);
    let mut sum = ten * T::from_lit(x.len() as f64);
    for &xi in x {
        sum = sum + xi * xi - ten * (two_pi * xi).cos();
    }
    sum
}

// ─── Logistic regression log likelihood ────────────────────────────────────
// Σ_i log inv_logit(±(a + b·t_i)) with deterministic data, x = [a, b].

pub fn logistic_log_lik<T: Scalar>(x: &[T]) -> T {
    let mut sum = T::zero();
    for i in 0..200 {
        let t = T::from_lit(0.01 * i as f64 - 1.0);
        let eta = x[0] + x[1] * t;
        let eta = if i % 3 == 0 { eta } else { -eta };
        sum = sum - (-eta).log1p_exp();
    }
    sum
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}

pub fn make_direction(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.1 * (i + 1) as f64).collect()
}
