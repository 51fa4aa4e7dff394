//! Min-max normalization and Pearson correlation.
//!
//! Degenerate inputs get explicit handling instead of NaN propagation: a
//! zero-variance series normalizes to itself unchanged, and a
//! correlation over empty or zero-variance input reports
//! [`Correlation::Undefined`] for the caller to message.

use polars::prelude::*;

use crate::error::Result;

/// Outcome of a correlation computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    /// Pearson r with its two-sided p-value
    Defined { r: f64, p: f64 },
    /// Empty input or zero variance on either side
    Undefined,
}

/// Min-max scale a series to [0, 1].
///
/// A zero-variance series (max equals min) is returned unchanged rather
/// than zero-filled. That mirrors the long-standing behavior downstream
/// consumers expect, even though unscaled values then feed correlations
/// expecting [0, 1] input; see DESIGN.md for the flag on this.
pub fn normalize(series: &Series) -> Result<Series> {
    let values = series.cast(&DataType::Float64)?;
    let ca = values.f64()?;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in ca.into_iter().flatten() {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() || min == max {
        return Ok(series.clone());
    }

    let span = max - min;
    let scaled = Float64Chunked::from_iter_options(
        series.name().clone(),
        ca.into_iter().map(|v| v.map(|x| (x - min) / span)),
    );
    Ok(scaled.into_series())
}

/// Pearson correlation over the rows where both series are non-null.
///
/// Fewer than two paired rows, or zero variance on either side, yields
/// [`Correlation::Undefined`]. The p-value is the two-sided significance
/// of r under the t-distribution with n - 2 degrees of freedom.
pub fn pearson(a: &Series, b: &Series) -> Result<Correlation> {
    let a = a.cast(&DataType::Float64)?;
    let b = b.cast(&DataType::Float64)?;

    let pairs: Vec<(f64, f64)> = a
        .f64()?
        .into_iter()
        .zip(b.f64()?)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return Ok(Correlation::Undefined);
    }

    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return Ok(Correlation::Undefined);
    }

    let r = (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0);
    let p = two_sided_p(r, n);
    Ok(Correlation::Defined { r, p })
}

/// Two-sided p-value of a Pearson r via the t-distribution
fn two_sided_p(r: f64, n: usize) -> f64 {
    let dof = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    // Zero degrees of freedom carries no significance information
    if dof <= 0.0 {
        return 1.0;
    }
    let t2 = r * r * dof / denom;
    incomplete_beta(dof / 2.0, 0.5, dof / (dof + t2))
}

/// Regularized incomplete beta function I_x(a, b)
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cf(a, b, x) / a
    } else {
        1.0 - front * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Continued-fraction expansion for the incomplete beta (Lentz's method)
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln(Γ(x))
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for coeff in COEFFS {
        y += 1.0;
        ser += coeff / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(name: &str, values: &[f64]) -> Series {
        Float64Chunked::from_slice(name.into(), values).into_series()
    }

    #[test]
    fn test_normalize_scales_to_unit_interval() {
        let normalized = normalize(&series("v", &[10.0, 20.0, 30.0])).unwrap();
        let values: Vec<Option<f64>> = normalized.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn test_normalize_zero_variance_returns_input_unchanged() {
        let input = series("v", &[7.0, 7.0, 7.0]);
        let normalized = normalize(&input).unwrap();
        let values: Vec<Option<f64>> = normalized.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(7.0), Some(7.0), Some(7.0)]);
    }

    #[test]
    fn test_normalize_preserves_nulls() {
        let input = Float64Chunked::from_iter_options(
            "v".into(),
            [Some(0.0), None, Some(10.0)].into_iter(),
        )
        .into_series();
        let normalized = normalize(&input).unwrap();
        let values: Vec<Option<f64>> = normalized.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(0.0), None, Some(1.0)]);
    }

    #[test]
    fn test_pearson_identical_series() {
        let a = series("a", &[1.0, 2.0, 3.0, 4.0]);
        match pearson(&a, &a).unwrap() {
            Correlation::Defined { r, p } => {
                assert!((r - 1.0).abs() < 1e-12);
                assert!(p < 1e-9);
            }
            Correlation::Undefined => panic!("expected defined correlation"),
        }
    }

    #[test]
    fn test_pearson_anticorrelated_series() {
        let a = series("a", &[1.0, 2.0, 3.0]);
        let b = series("b", &[3.0, 2.0, 1.0]);
        match pearson(&a, &b).unwrap() {
            Correlation::Defined { r, .. } => assert!((r + 1.0).abs() < 1e-12),
            Correlation::Undefined => panic!("expected defined correlation"),
        }
    }

    #[test]
    fn test_pearson_constant_series_undefined() {
        let a = series("a", &[1.0, 2.0, 3.0]);
        let b = series("b", &[5.0, 5.0, 5.0]);
        assert_eq!(pearson(&a, &b).unwrap(), Correlation::Undefined);
    }

    #[test]
    fn test_pearson_empty_and_single_row_undefined() {
        let empty = series("a", &[]);
        assert_eq!(pearson(&empty, &empty).unwrap(), Correlation::Undefined);

        let one = series("a", &[1.0]);
        assert_eq!(pearson(&one, &one).unwrap(), Correlation::Undefined);
    }

    #[test]
    fn test_pearson_skips_rows_with_nulls() {
        let a = Float64Chunked::from_iter_options(
            "a".into(),
            [Some(1.0), None, Some(2.0), Some(3.0)].into_iter(),
        )
        .into_series();
        let b = Float64Chunked::from_iter_options(
            "b".into(),
            [Some(1.0), Some(9.0), Some(2.0), Some(3.0)].into_iter(),
        )
        .into_series();
        match pearson(&a, &b).unwrap() {
            Correlation::Defined { r, .. } => assert!((r - 1.0).abs() < 1e-12),
            Correlation::Undefined => panic!("expected defined correlation"),
        }
    }

    #[test]
    fn test_p_value_with_zero_degrees_of_freedom() {
        // n = 2 and |r| < 1 would otherwise put 0/0 into the beta function
        assert_eq!(two_sided_p(0.9, 2), 1.0);
        assert!(!two_sided_p(0.5, 2).is_nan());
    }

    #[test]
    fn test_pearson_known_p_value() {
        // r = 0.8 over 4 points; with 2 degrees of freedom the two-sided
        // p has the closed form 1 - sqrt(1 - 0.36) = 0.2
        let a = series("a", &[1.0, 2.0, 3.0, 4.0]);
        let b = series("b", &[1.0, 2.0, 4.0, 3.0]);
        match pearson(&a, &b).unwrap() {
            Correlation::Defined { r, p } => {
                assert!((r - 0.8).abs() < 1e-12);
                assert!((p - 0.2).abs() < 1e-9);
            }
            Correlation::Undefined => panic!("expected defined correlation"),
        }
    }
}
