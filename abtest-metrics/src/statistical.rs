use abtest_core::{CoreError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use statrs::statistics::Statistics;

/// Largest sample the Shapiro-Wilk approximation is calibrated for.
pub const SHAPIRO_WILK_MAX_N: usize = 5000;

/// Samples at or below this size (per side) use the exact Mann-Whitney
/// null distribution when there are no ties.
const MANN_WHITNEY_EXACT_MAX_N: usize = 8;

// Royston (1992, 1995) polynomial coefficients, algorithm AS R94
const SW_C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const SW_C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const SW_C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const SW_C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const SW_C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const SW_C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const SW_G: [f64; 2] = [-2.273, 0.459];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticalResult {
    pub statistic: f64,
    pub p_value: f64,
}

pub struct StatisticalAnalyzer;

impl StatisticalAnalyzer {
    /// Upper tail `1 - CDF(chi2)` of the chi-square distribution.
    pub fn chi_square_upper_tail(chi2: f64, degrees_of_freedom: f64) -> Result<f64> {
        if !chi2.is_finite() || chi2 < 0.0 {
            return Err(CoreError::NumericInstability(format!(
                "chi-square statistic must be finite and non-negative, got {}",
                chi2
            )));
        }

        let dist = ChiSquared::new(degrees_of_freedom).map_err(|e| {
            CoreError::NumericInstability(format!(
                "invalid chi-square degrees of freedom {}: {}",
                degrees_of_freedom, e
            ))
        })?;

        Ok((1.0 - dist.cdf(chi2)).clamp(0.0, 1.0))
    }

    /// Pearson chi-square goodness-of-fit test with `k - 1` degrees of freedom.
    pub fn chi_square_goodness_of_fit(observed: &[f64], expected: &[f64]) -> Result<StatisticalResult> {
        if observed.len() != expected.len() {
            return Err(CoreError::MalformedInput(format!(
                "observed has {} categories but expected has {}",
                observed.len(),
                expected.len()
            )));
        }
        if observed.len() < 2 {
            return Err(CoreError::DegenerateSrm(format!(
                "chi-square test needs at least 2 categories, got {}",
                observed.len()
            )));
        }
        if expected.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(CoreError::NumericInstability(
                "expected counts must be finite and positive".to_string(),
            ));
        }

        let chi2: f64 = observed
            .iter()
            .zip(expected)
            .map(|(o, e)| (o - e).powi(2) / e)
            .sum();
        let df = (observed.len() - 1) as f64;

        Ok(StatisticalResult {
            statistic: chi2,
            p_value: Self::chi_square_upper_tail(chi2, df)?,
        })
    }

    /// Shapiro-Wilk normality test (Royston's AS R94 approximation).
    ///
    /// Valid for 3 to 5000 observations. Constant samples have no defined
    /// W statistic and are reported as [`CoreError::NumericInstability`].
    pub fn shapiro_wilk(sample: &[f64]) -> Result<StatisticalResult> {
        let n = sample.len();
        if !(3..=SHAPIRO_WILK_MAX_N).contains(&n) {
            return Err(CoreError::NumericInstability(format!(
                "Shapiro-Wilk requires between 3 and {} observations, got {}",
                SHAPIRO_WILK_MAX_N, n
            )));
        }
        ensure_finite("Shapiro-Wilk", sample)?;

        let mut x = sample.to_vec();
        x.sort_by(f64::total_cmp);

        let range = x[n - 1] - x[0];
        if range < 1e-300 {
            return Err(CoreError::NumericInstability(
                "Shapiro-Wilk is undefined for a sample with zero range".to_string(),
            ));
        }

        if n == 3 {
            return Ok(shapiro_wilk_three(&x));
        }

        let normal = standard_normal()?;
        let half = n / 2;
        let a = shapiro_wilk_coefficients(&normal, n, half)?;

        let mean = x.iter().sum::<f64>() / n as f64;
        let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
        let sa: f64 = (0..half).map(|i| a[i] * (x[n - 1 - i] - x[i])).sum();
        let w = ((sa * sa) / ss).min(1.0);

        Ok(StatisticalResult {
            statistic: w,
            p_value: shapiro_wilk_p_value(&normal, w, n).clamp(0.0, 1.0),
        })
    }

    /// Two-sided two-proportion Z-test with pooled variance.
    ///
    /// The statistic is positive when the first proportion is the larger one.
    pub fn proportions_z_test(successes: [f64; 2], observations: [usize; 2]) -> Result<StatisticalResult> {
        if observations.iter().any(|&n| n == 0) {
            return Err(CoreError::NumericInstability(
                "proportion test needs at least one observation per group".to_string(),
            ));
        }
        for (s, &n) in successes.iter().zip(&observations) {
            if !s.is_finite() || *s < 0.0 || *s > n as f64 {
                return Err(CoreError::NumericInstability(format!(
                    "success count {} is outside [0, {}]",
                    s, n
                )));
            }
        }

        let n1 = observations[0] as f64;
        let n2 = observations[1] as f64;
        let p1 = successes[0] / n1;
        let p2 = successes[1] / n2;
        let pooled = (successes[0] + successes[1]) / (n1 + n2);
        let variance = pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2);

        if variance <= 0.0 {
            return Err(CoreError::NumericInstability(format!(
                "pooled proportion is {}; the Z statistic is undefined for a constant outcome",
                pooled
            )));
        }

        let z = (p1 - p2) / variance.sqrt();
        let normal = standard_normal()?;

        Ok(StatisticalResult {
            statistic: z,
            p_value: (2.0 * normal.sf(z.abs())).clamp(0.0, 1.0),
        })
    }

    /// Welch's unequal-variance two-sample t-test, two-sided.
    pub fn welch_t_test(sample1: &[f64], sample2: &[f64]) -> Result<StatisticalResult> {
        if sample1.len() < 2 || sample2.len() < 2 {
            return Err(CoreError::NumericInstability(format!(
                "t-test requires at least 2 observations per sample, got {} and {}",
                sample1.len(),
                sample2.len()
            )));
        }
        ensure_finite("t-test", sample1)?;
        ensure_finite("t-test", sample2)?;

        let n1 = sample1.len() as f64;
        let n2 = sample2.len() as f64;
        let se1 = sample1.variance() / n1;
        let se2 = sample2.variance() / n2;
        let se = se1 + se2;

        if se <= 0.0 {
            return Err(CoreError::NumericInstability(
                "t-test is undefined when both samples have zero variance".to_string(),
            ));
        }

        let t_stat = (sample1.mean() - sample2.mean()) / se.sqrt();

        // Welch-Satterthwaite approximation
        let df = se.powi(2) / (se1.powi(2) / (n1 - 1.0) + se2.powi(2) / (n2 - 1.0));
        let t_dist = StudentsT::new(0.0, 1.0, df).map_err(|e| {
            CoreError::NumericInstability(format!("invalid Welch degrees of freedom {}: {}", df, e))
        })?;

        Ok(StatisticalResult {
            statistic: t_stat,
            p_value: (2.0 * t_dist.sf(t_stat.abs())).clamp(0.0, 1.0),
        })
    }

    /// Two-sided Mann-Whitney U test.
    ///
    /// The statistic is U of `sample1`. The p-value is exact when the smaller
    /// sample has at most 8 observations and there are no ties; otherwise a
    /// tie- and continuity-corrected normal approximation is used.
    pub fn mann_whitney_u(sample1: &[f64], sample2: &[f64]) -> Result<StatisticalResult> {
        if sample1.is_empty() || sample2.is_empty() {
            return Err(CoreError::NumericInstability(
                "Mann-Whitney U requires non-empty samples".to_string(),
            ));
        }
        ensure_finite("Mann-Whitney U", sample1)?;
        ensure_finite("Mann-Whitney U", sample2)?;

        let n1 = sample1.len();
        let n2 = sample2.len();

        let mut combined: Vec<(f64, bool)> = sample1
            .iter()
            .map(|&x| (x, true))
            .chain(sample2.iter().map(|&x| (x, false)))
            .collect();
        combined.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Assign average ranks to tie groups
        let mut rank_sum1 = 0.0;
        let mut tie_term = 0.0;
        let mut i = 0;
        while i < combined.len() {
            let mut j = i;
            while j < combined.len() && combined[j].0 == combined[i].0 {
                j += 1;
            }
            let rank = (i + j + 1) as f64 / 2.0;
            rank_sum1 += rank * combined[i..j].iter().filter(|(_, first)| *first).count() as f64;
            let t = (j - i) as f64;
            tie_term += t * t * t - t;
            i = j;
        }

        let n1f = n1 as f64;
        let n2f = n2 as f64;
        let u1 = rank_sum1 - n1f * (n1f + 1.0) / 2.0;
        let u2 = n1f * n2f - u1;
        let u = u1.max(u2);

        let p_value = if tie_term == 0.0 && n1.min(n2) <= MANN_WHITNEY_EXACT_MAX_N {
            2.0 * mann_whitney_exact_sf(u, n1, n2)
        } else {
            let n = n1f + n2f;
            let sigma_sq = n1f * n2f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
            if sigma_sq <= 0.0 || !sigma_sq.is_finite() {
                return Err(CoreError::NumericInstability(
                    "Mann-Whitney U variance is zero; every observation is tied".to_string(),
                ));
            }
            let z = (u - n1f * n2f / 2.0 - 0.5) / sigma_sq.sqrt();
            2.0 * standard_normal()?.sf(z)
        };

        Ok(StatisticalResult {
            statistic: u1,
            p_value: p_value.clamp(0.0, 1.0),
        })
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| CoreError::NumericInstability(e.to_string()))
}

fn ensure_finite(test: &str, sample: &[f64]) -> Result<()> {
    if sample.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(CoreError::NumericInstability(format!(
            "{} received a non-finite observation",
            test
        )))
    }
}

/// Evaluate `c[0] + c[1]*x + c[2]*x^2 + ...`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &coef| acc * x + coef)
}

fn shapiro_wilk_three(x: &[f64]) -> StatisticalResult {
    let mean = (x[0] + x[1] + x[2]) / 3.0;
    let ss: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let numerator = std::f64::consts::FRAC_1_SQRT_2 * (x[2] - x[0]);
    let w = (numerator * numerator / ss).clamp(0.75, 1.0);

    // Exact null distribution for n = 3
    let p = 1.0 - (6.0 / std::f64::consts::PI) * w.sqrt().acos();

    StatisticalResult {
        statistic: w,
        p_value: p.clamp(0.0, 1.0),
    }
}

fn shapiro_wilk_coefficients(normal: &Normal, n: usize, half: usize) -> Result<Vec<f64>> {
    let nf = n as f64;

    // Blom approximation of the expected normal order statistics (lower half)
    let m: Vec<f64> = (0..half)
        .map(|i| normal.inverse_cdf((i as f64 + 1.0 - 0.375) / (nf + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / nf.sqrt();

    let a1 = poly(&SW_C1, rsn) - m[0] / ssumm2;
    let mut a = vec![0.0; half];

    let (corrected, fac_sq, one_minus) = if n <= 5 {
        (1, summ2 - 2.0 * m[0].powi(2), 1.0 - 2.0 * a1.powi(2))
    } else {
        let a2 = poly(&SW_C2, rsn) - m[1] / ssumm2;
        a[1] = a2;
        (
            2,
            summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2),
            1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2),
        )
    };

    if fac_sq <= 0.0 || one_minus <= 0.0 {
        return Err(CoreError::NumericInstability(format!(
            "Shapiro-Wilk coefficients are degenerate for n = {}",
            n
        )));
    }

    let fac = (fac_sq / one_minus).sqrt();
    a[0] = a1;
    for i in corrected..half {
        a[i] = -m[i] / fac;
    }

    Ok(a)
}

fn shapiro_wilk_p_value(normal: &Normal, w: f64, n: usize) -> f64 {
    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return 1.0;
    }
    let y = w1.ln();
    let nf = n as f64;

    let z = if n <= 11 {
        let gamma = poly(&SW_G, nf);
        if y >= gamma {
            return 0.0;
        }
        let transformed = -(gamma - y).ln();
        (transformed - poly(&SW_C3, nf)) / poly(&SW_C4, nf).exp()
    } else {
        let ln_n = nf.ln();
        (y - poly(&SW_C5, ln_n)) / poly(&SW_C6, ln_n).exp()
    };

    normal.sf(z)
}

/// `P(U >= u)` under the exact null distribution of U.
///
/// The counts of rank arrangements per U value are the coefficients of the
/// Gaussian binomial `[n1 + n2 choose n1]_q`, built as
/// `prod_{i=1..m} (1 - q^(n+i)) / (1 - q^i)` with `m = min(n1, n2)`.
fn mann_whitney_exact_sf(u: f64, n1: usize, n2: usize) -> f64 {
    let m = n1.min(n2);
    let n = n1.max(n2);
    let len = m * n + 1;

    let mut counts = vec![0.0_f64; len];
    counts[0] = 1.0;
    for i in 1..=m {
        let shift = n + i;
        for k in (shift..len).rev() {
            counts[k] -= counts[k - shift];
        }
        for k in i..len {
            counts[k] += counts[k - i];
        }
    }

    let total: f64 = counts.iter().sum();
    let start = u.ceil().max(0.0) as usize;
    if start >= len {
        return 0.0;
    }
    counts[start..].iter().sum::<f64>() / total
}
