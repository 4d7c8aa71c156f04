//! The expression function registry.
//!
//! An immutable process-wide table built once on first use. The parser
//! resolves call sites against it, so an unknown function is a parse-time
//! configuration error rather than an evaluation surprise.
//!
//! `log` is base-2, matching the dashboard expression language; `ln`,
//! `log2`, and `log10` cover the other bases explicitly. The special
//! functions (`erf`, `erfc`, `lgamma`, `tgamma`) use the classic
//! Abramowitz-Stegun and Lanczos approximations, accurate to well below
//! display precision.

use std::collections::HashMap;
use std::f64::consts::PI;

use chrono::Utc;
use once_cell::sync::Lazy;

/// One registered expression function.
pub struct FunctionDef {
    /// Number of arguments the function takes.
    pub arity: usize,
    /// The implementation.
    pub eval: fn(&[f64]) -> f64,
}

static REGISTRY: Lazy<HashMap<&'static str, FunctionDef>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut unary = |name: &'static str, eval: fn(&[f64]) -> f64| {
        table.insert(name, FunctionDef { arity: 1, eval });
    };
    unary("exp", |args| arg(args).exp());
    unary("log", |args| arg(args).log2());
    unary("ln", |args| arg(args).ln());
    unary("exp2", |args| arg(args).exp2());
    unary("log2", |args| arg(args).log2());
    unary("exp10", |args| 10f64.powf(arg(args)));
    unary("log10", |args| arg(args).log10());
    unary("sqrt", |args| arg(args).sqrt());
    unary("cbrt", |args| arg(args).cbrt());
    unary("erf", |args| erf(arg(args)));
    unary("erfc", |args| 1.0 - erf(arg(args)));
    unary("lgamma", |args| lgamma(arg(args)));
    unary("tgamma", |args| tgamma(arg(args)));
    unary("sin", |args| arg(args).sin());
    unary("cos", |args| arg(args).cos());
    unary("tan", |args| arg(args).tan());
    unary("asin", |args| arg(args).asin());
    unary("acos", |args| arg(args).acos());
    unary("atan", |args| arg(args).atan());
    unary("degrees", |args| arg(args).to_degrees());
    unary("radians", |args| arg(args).to_radians());
    table.insert(
        "now",
        FunctionDef {
            arity: 0,
            eval: |_| now_seconds(),
        },
    );
    table
});

fn arg(args: &[f64]) -> f64 {
    args.first().copied().unwrap_or(f64::NAN)
}

fn now_seconds() -> f64 {
    let timestamp = Utc::now().timestamp();
    timestamp as f64
}

/// Looks up a function by name.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    REGISTRY.get(name)
}

/// Abramowitz-Stegun 7.1.26 rational approximation, |error| < 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Lanczos approximation with g = 7 and 9 coefficients.
const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

fn tgamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula; sin(pi x) is zero at the non-positive
        // integers, where gamma has poles.
        PI / ((PI * x).sin() * tgamma(1.0 - x))
    } else {
        let x = x - 1.0;
        let mut acc = LANCZOS[0];
        for (i, coefficient) in LANCZOS.iter().enumerate().skip(1) {
            acc += coefficient / (x + i as f64);
        }
        let t = x + LANCZOS_G + 0.5;
        (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * acc
    }
}

fn lgamma(x: f64) -> f64 {
    if x < 0.5 {
        (PI / (PI * x).sin().abs()).ln() - lgamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut acc = LANCZOS[0];
        for (i, coefficient) in LANCZOS.iter().enumerate().skip(1) {
            acc += coefficient / (x + i as f64);
        }
        let t = x + LANCZOS_G + 0.5;
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn call(name: &str, x: f64) -> f64 {
        let def = lookup(name).expect("registered function");
        (def.eval)(&[x])
    }

    #[test_case("exp", 1.0, std::f64::consts::E; "exp of one")]
    #[test_case("ln", std::f64::consts::E, 1.0; "ln of e")]
    #[test_case("log2", 8.0, 3.0; "log2 of eight")]
    #[test_case("log10", 1000.0, 3.0; "log10 of thousand")]
    #[test_case("exp2", 3.0, 8.0; "exp2 of three")]
    #[test_case("exp10", 2.0, 100.0; "exp10 of two")]
    #[test_case("sqrt", 16.0, 4.0; "sqrt of sixteen")]
    #[test_case("cbrt", 27.0, 3.0; "cbrt of twenty seven")]
    #[test_case("degrees", std::f64::consts::PI, 180.0; "pi radians in degrees")]
    #[test_case("radians", 180.0, std::f64::consts::PI; "half turn in radians")]
    fn elementary_functions(name: &str, x: f64, expected: f64) {
        assert!((call(name, x) - expected).abs() < 1e-9);
    }

    #[test]
    fn log_is_base_two() {
        assert!((call("log", 8.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn trig_functions() {
        assert!((call("sin", 0.0)).abs() < 1e-12);
        assert!((call("cos", 0.0) - 1.0).abs() < 1e-12);
        assert!((call("tan", 0.0)).abs() < 1e-12);
        assert!((call("asin", 1.0) - PI / 2.0).abs() < 1e-12);
        assert!((call("acos", 1.0)).abs() < 1e-12);
        assert!((call("atan", 1.0) - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn erf_known_values() {
        assert!(call("erf", 0.0).abs() < 1e-7);
        assert!((call("erf", 1.0) - 0.842_700_792_949_714_9).abs() < 1e-6);
        assert!((call("erf", -1.0) + 0.842_700_792_949_714_9).abs() < 1e-6);
        assert!((call("erfc", 1.0) - 0.157_299_207_050_285_13).abs() < 1e-6);
    }

    #[test]
    fn gamma_known_values() {
        // gamma(n) = (n-1)! on the positive integers.
        assert!((call("tgamma", 5.0) - 24.0).abs() < 1e-8);
        assert!((call("tgamma", 0.5) - PI.sqrt()).abs() < 1e-9);
        assert!((call("lgamma", 5.0) - 24f64.ln()).abs() < 1e-9);
        assert!(call("lgamma", 1.0).abs() < 1e-9);
    }

    #[test]
    fn now_returns_wall_clock_seconds() {
        let def = lookup("now").expect("registered function");
        assert_eq!(def.arity, 0);
        let now = (def.eval)(&[]);
        // Well past 2020 and well before 2100.
        assert!(now > 1.577e9);
        assert!(now < 4.1e9);
    }

    #[test]
    fn unknown_function_is_absent() {
        assert!(lookup("frobnicate").is_none());
    }
}
