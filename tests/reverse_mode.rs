use approx::assert_relative_eq;
use agrad::{Tape, TapeGuard, Var};
use num_traits::Float;

/// Derivative of a single-variable function by one reverse sweep.
fn reverse_grad(f: impl FnOnce(Var<f64>) -> Var<f64>, x_val: f64) -> f64 {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    let x = Var::new(x_val);
    let y = f(x);
    let g = y.grad(&[x]);
    guard.recover_memory();
    g[0]
}

/// Central finite difference for comparison.
fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-7;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

fn check_reverse_elemental(
    f_rev: impl FnOnce(Var<f64>) -> Var<f64>,
    f_f64: impl Fn(f64) -> f64,
    x: f64,
    tol: f64,
) {
    let grad = reverse_grad(f_rev, x);
    let expected = finite_diff(&f_f64, x);
    assert_relative_eq!(grad, expected, max_relative = tol);
}

// ── Basics ──

#[test]
fn square_at_one_half() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(0.5);
    let y = x * x;
    assert_eq!(y.val(), 0.25);
    assert_eq!(y.grad(&[x]), vec![1.0]);
}

#[test]
fn diamond_sums_both_paths() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(0.7);
    let y = x.sin();
    let z = x * x;
    let w = y + z;
    let g = w.grad(&[x]);
    assert_relative_eq!(g[0], 0.7f64.cos() + 1.4, max_relative = 1e-14);
}

#[test]
fn shared_intermediate_used_three_times() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(1.3);
    let e = x.exp();
    let w: Var<f64> = e * e + e * 3.0 - e;
    // w = e^2x + 2e^x
    let g = w.grad(&[x]);
    let expected = 2.0 * (2.6f64).exp() + 2.0 * 1.3f64.exp();
    assert_relative_eq!(g[0], expected, max_relative = 1e-13);
}

#[test]
fn long_sequential_chain() {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    for n in [1usize, 2, 10, 100, 1000] {
        let x = Var::new(0.3);
        let mut y = x;
        for _ in 0..n {
            y = y * 1.001 + 0.01;
        }
        let g = y.grad(&[x]);
        assert_relative_eq!(g[0], 1.001f64.powi(n as i32), max_relative = 1e-12);
        guard.recover_memory();
    }
}

#[test]
fn chain_of_sines_matches_symbolic() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x0 = 0.4f64;
    let x = Var::new(x0);
    let mut y = x;
    let mut v = x0;
    let mut d = 1.0;
    for _ in 0..1000 {
        d *= v.cos();
        v = v.sin();
        y = y.sin();
    }
    assert_relative_eq!(y.val(), v, max_relative = 1e-14);
    assert_relative_eq!(y.grad(&[x])[0], d, max_relative = 1e-10);
}

#[test]
fn multiple_independents() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(2.0);
    let y = Var::new(3.0);
    let z = Var::new(-1.5);
    let f = x * y * z + (x / y).ln();
    let g = f.grad(&[x, y, z]);
    assert_relative_eq!(g[0], 3.0 * -1.5 + 1.0 / 2.0, max_relative = 1e-14);
    assert_relative_eq!(g[1], 2.0 * -1.5 - 1.0 / 3.0, max_relative = 1e-14);
    assert_relative_eq!(g[2], 6.0, max_relative = 1e-14);
}

#[test]
fn independent_not_on_path_has_zero_gradient() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(2.0);
    let y = Var::new(3.0);
    let f = x * x;
    assert_eq!(f.grad(&[x, y]), vec![4.0, 0.0]);
}

#[test]
fn grad_twice_gives_same_result() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(1.1);
    let f = x.exp() * x;
    let first = f.grad(&[x]);
    let second = f.grad(&[x]);
    assert_eq!(first, second);
}

#[test]
fn constant_root_has_zero_gradient() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(1.0);
    let c = Var::constant(4.0);
    assert_eq!(c.grad(&[x]), vec![0.0]);
}

// ── Arithmetic ──

#[test]
fn add_sub_mul_div() {
    check_reverse_elemental(|x| x + x * 2.0, |x| x + x * 2.0, 1.7, 1e-7);
    check_reverse_elemental(|x| 5.0 - x, |x| 5.0 - x, 1.7, 1e-7);
    check_reverse_elemental(|x| x * x * x, |x| x * x * x, -1.2, 1e-7);
    check_reverse_elemental(|x| 1.0 / x, |x| 1.0 / x, 0.8, 1e-7);
    check_reverse_elemental(|x| x / 4.0, |x| x / 4.0, 0.8, 1e-7);
}

#[test]
fn compound_assignment() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(2.0);
    let mut y = x;
    y += x;
    y *= x;
    y -= 1.0;
    y /= 2.0;
    // y = (2x * x - 1) / 2 = x^2 - 1/2
    assert_eq!(y.val(), 3.5);
    assert_relative_eq!(y.grad(&[x])[0], 4.0, max_relative = 1e-14);
}

#[test]
fn negation() {
    assert_eq!(reverse_grad(|x| -x * 3.0, 2.0), -3.0);
}

#[test]
fn rem_partials() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let a = Var::new(7.5);
    let b = Var::new(2.0);
    let r = a % b;
    assert_eq!(r.val(), 1.5);
    let g = r.grad(&[a, b]);
    assert_eq!(g, vec![1.0, -3.0]);
}

#[test]
fn fused_multiply_add() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let a = Var::new(2.0);
    let b = Var::new(3.0);
    let c = Var::new(5.0);
    let r = a.mul_add(b, c);
    assert_eq!(r.val(), 11.0);
    assert_eq!(r.grad(&[a, b, c]), vec![3.0, 2.0, 1.0]);

    let k = a.mul_add(Var::constant(4.0), c);
    assert_eq!(k.grad(&[a, c]), vec![4.0, 1.0]);
}

// ── Elementary functions ──

#[test]
fn exponentials_and_logs() {
    check_reverse_elemental(|x| x.exp(), |x| x.exp(), 0.9, 1e-7);
    check_reverse_elemental(|x| x.exp2(), |x| x.exp2(), 0.9, 1e-7);
    check_reverse_elemental(|x| x.exp_m1(), |x| x.exp_m1(), 0.1, 1e-7);
    check_reverse_elemental(|x| x.ln(), |x| x.ln(), 2.5, 1e-7);
    check_reverse_elemental(|x| x.log2(), |x| x.log2(), 2.5, 1e-7);
    check_reverse_elemental(|x| x.log10(), |x| x.log10(), 2.5, 1e-7);
    check_reverse_elemental(|x| x.ln_1p(), |x| x.ln_1p(), 0.3, 1e-7);
}

#[test]
fn powers_and_roots() {
    check_reverse_elemental(|x| x.sqrt(), |x| x.sqrt(), 2.0, 1e-7);
    check_reverse_elemental(|x| x.cbrt(), |x| x.cbrt(), 2.0, 1e-7);
    check_reverse_elemental(|x| x.powi(5), |x| x.powi(5), 1.3, 1e-7);
    check_reverse_elemental(|x| x.powi(-2), |x| x.powi(-2), 1.3, 1e-7);
    check_reverse_elemental(|x| x.recip(), |x| x.recip(), 1.3, 1e-7);
    check_reverse_elemental(
        |x| x.powf(Var::constant(2.5)),
        |x| x.powf(2.5),
        1.3,
        1e-7,
    );
}

#[test]
fn powi_at_most_negative_exponent() {
    let n = f64::from(i32::MIN);
    assert_eq!(reverse_grad(|x| x.powi(i32::MIN), 1.0), n);
    assert_eq!(reverse_grad(|x| x.powi(i32::MIN), -1.0), -n);
}

#[test]
fn powf_with_both_operands_tracked() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let a = Var::new(2.0f64);
    let b = Var::new(3.0f64);
    let r = a.powf(b);
    let g = r.grad(&[a, b]);
    assert_relative_eq!(g[0], 3.0 * 4.0, max_relative = 1e-14);
    assert_relative_eq!(g[1], 8.0 * 2.0f64.ln(), max_relative = 1e-14);
}

#[test]
fn trigonometric() {
    check_reverse_elemental(|x| x.sin(), |x| x.sin(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.cos(), |x| x.cos(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.tan(), |x| x.tan(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.asin(), |x| x.asin(), 0.4, 1e-7);
    check_reverse_elemental(|x| x.acos(), |x| x.acos(), 0.4, 1e-7);
    check_reverse_elemental(|x| x.atan(), |x| x.atan(), 0.4, 1e-7);
    check_reverse_elemental(
        |x| x.atan2(Var::constant(1.5)),
        |x| x.atan2(1.5),
        0.4,
        1e-7,
    );
}

#[test]
fn hyperbolic() {
    check_reverse_elemental(|x| x.sinh(), |x| x.sinh(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.cosh(), |x| x.cosh(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.tanh(), |x| x.tanh(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.asinh(), |x| x.asinh(), 0.6, 1e-7);
    check_reverse_elemental(|x| x.acosh(), |x| x.acosh(), 1.6, 1e-7);
    check_reverse_elemental(|x| x.atanh(), |x| x.atanh(), 0.6, 1e-7);
}

#[test]
fn hypot_partials() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let a = Var::new(3.0);
    let b = Var::new(4.0);
    let h = a.hypot(b);
    assert_eq!(h.val(), 5.0);
    let g = h.grad(&[a, b]);
    assert_relative_eq!(g[0], 0.6, max_relative = 1e-14);
    assert_relative_eq!(g[1], 0.8, max_relative = 1e-14);
}

// ── Non-smooth ──

#[test]
fn abs_derivative_is_zero_at_zero() {
    assert_eq!(reverse_grad(|x| x.abs(), 0.0), 0.0);
    assert_eq!(reverse_grad(|x| x.abs(), -2.0), -1.0);
    assert_eq!(reverse_grad(|x| x.abs(), 2.0), 1.0);
}

#[test]
fn piecewise_constant_functions_have_zero_derivative() {
    assert_eq!(reverse_grad(|x| x.floor() + x, 1.7), 1.0);
    assert_eq!(reverse_grad(|x| x.ceil() * x, 1.7), 2.0);
    assert_eq!(reverse_grad(|x| x.round(), 1.7), 0.0);
    assert_eq!(reverse_grad(|x| x.trunc(), -1.7), 0.0);
    assert_eq!(reverse_grad(|x| x.signum(), -1.7), 0.0);
}

#[test]
fn max_min_return_the_winning_handle() {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    let a = Var::new(1.0);
    let b = Var::new(2.0);
    let before = guard.len();
    let hi = a.max(b);
    let lo = a.min(b);
    assert_eq!(guard.len(), before);
    assert_eq!(hi.index(), b.index());
    assert_eq!(lo.index(), a.index());
    assert_eq!(hi.grad(&[a, b]), vec![0.0, 1.0]);
}

#[test]
fn nan_operand_loses_max() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let a = Var::new(f64::NAN);
    let b = Var::new(2.0);
    assert_eq!(a.max(b).val(), 2.0);
    assert_eq!(b.max(a).val(), 2.0);
    assert_eq!(a.min(b).val(), 2.0);
}

// ── Constants and mixed operands ──

#[test]
fn constants_do_not_touch_the_tape() {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    let a = Var::constant(2.0);
    let b = Var::constant(3.0);
    let c = (a * b).exp() + a.sin();
    assert!(c.is_constant());
    assert_eq!(guard.len(), 0);
}

#[test]
fn mixed_scalar_operands() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(3.0);
    let y: Var<f64> = 2.0 * x + x / 2.0 - 1.0 / x + (4.0 - x) * 3.0;
    let g = y.grad(&[x]);
    assert_relative_eq!(g[0], 2.0 + 0.5 + 1.0 / 9.0 - 3.0, max_relative = 1e-14);
}

#[test]
fn comparisons_use_values() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(1.0);
    let y = Var::new(2.0);
    assert!(x < y);
    assert!(x == 1.0);
    assert!(y > 1.5);
    assert!(x != y);
}

#[test]
fn float_32_tape_is_separate() {
    let mut tape = Tape::<f32>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(3.0f32);
    let y = x * x;
    assert_eq!(y.grad(&[x]), vec![6.0f32]);
    assert!(!agrad::tape::is_active::<f64>());
}

// ── Adjoint control ──

#[test]
fn accumulating_sweeps_without_zeroing() {
    let mut tape = Tape::<f64>::new();
    let guard = TapeGuard::new(&mut tape);
    let x = Var::new(2.0);
    let y = x * x;
    guard.set_zero_all_adjoints();
    guard.grad(&y).unwrap();
    guard.grad(&y).unwrap();
    assert_eq!(guard.adjoints(&[x]).unwrap(), vec![8.0]);
    guard.set_zero_all_adjoints();
    assert_eq!(x.adj(), 0.0);
}

#[test]
fn free_function_driver() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Var::new(2.0);
    let y = x.ln() * x;
    agrad::tape::set_zero_all_adjoints::<f64>();
    agrad::tape::grad(&y).unwrap();
    assert_relative_eq!(x.adj(), 2.0f64.ln() + 1.0, max_relative = 1e-14);
}

#[test]
fn seeded_sweep_scales_gradient() {
    let mut tape = Tape::<f64>::new();
    let x = tape.push_var(3.0).unwrap();
    let e = tape.epoch();
    let y = tape
        .push_op(
            9.0,
            agrad::node::Op::Binary(x, x, agrad::op::BinaryOp::Mul),
        )
        .unwrap();
    tape.set_adjoint(y, e, 0.5).unwrap();
    tape.grad_seeded(y, e).unwrap();
    assert_eq!(tape.adjoint(x, e).unwrap(), 3.0);
}
