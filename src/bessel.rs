//! Cylindrical Bessel functions of the first kind
//!
//! Rational approximations for |x| < 8 and the asymptotic expansion beyond
//! (Numerical Recipes coefficients, absolute error below 1e-8).

use std::f64::consts::{FRAC_2_PI, FRAC_PI_4};

const FRAC_3PI_4: f64 = 3. * FRAC_PI_4;

const J0_P: [f64; 6] = [
    57568490574.0,
    -13362590354.0,
    651619640.7,
    -11214424.18,
    77392.33017,
    -184.9052456,
];
const J0_Q: [f64; 6] = [
    57568490411.0,
    1029532985.0,
    9494680.718,
    59272.64853,
    267.8532712,
    1.0,
];
const J0_ASYMP_P: [f64; 5] = [
    1.0,
    -0.1098628627e-2,
    0.2734510407e-4,
    -0.2073370639e-5,
    0.2093887211e-6,
];
const J0_ASYMP_Q: [f64; 5] = [
    -0.1562499995e-1,
    0.1430488765e-3,
    -0.6911147651e-5,
    0.7621095161e-6,
    -0.934935152e-7,
];

const J1_P: [f64; 6] = [
    72362614232.0,
    -7895059235.0,
    242396853.1,
    -2972611.439,
    15704.48260,
    -30.16036606,
];
const J1_Q: [f64; 6] = [
    144725228442.0,
    2300535178.0,
    18583304.74,
    99447.43394,
    376.9991397,
    1.0,
];
const J1_ASYMP_P: [f64; 5] = [
    1.0,
    0.183105e-2,
    -0.3516396496e-4,
    0.2457520174e-5,
    -0.240337019e-6,
];
const J1_ASYMP_Q: [f64; 5] = [
    0.04687499995,
    -0.2002690873e-3,
    0.8449199096e-5,
    -0.88228987e-6,
    0.105787412e-6,
];

/// Horner evaluation of `c[0] + c[1]y + c[2]y^2 + ...`
fn polevl(y: f64, c: &[f64]) -> f64 {
    c.iter().rev().fold(0f64, |s, &c| s * y + c)
}

/// Zeroth order Bessel function of the first kind
pub fn j0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        polevl(y, &J0_P) / polevl(y, &J0_Q)
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - FRAC_PI_4;
        let p0 = polevl(y, &J0_ASYMP_P);
        let q0 = z * polevl(y, &J0_ASYMP_Q);
        (FRAC_2_PI / ax).sqrt() * (xx.cos() * p0 - xx.sin() * q0)
    }
}

/// First order Bessel function of the first kind
pub fn j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        x * polevl(y, &J1_P) / polevl(y, &J1_Q)
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - FRAC_3PI_4;
        let p0 = polevl(y, &J1_ASYMP_P);
        let q0 = z * polevl(y, &J1_ASYMP_Q);
        let value = (FRAC_2_PI / ax).sqrt() * (xx.cos() * p0 - xx.sin() * q0);
        if x < 0.0 {
            -value
        } else {
            value
        }
    }
}
