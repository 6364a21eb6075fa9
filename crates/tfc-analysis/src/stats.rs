//! Descriptive statistics and Student-t inference over `f64` samples.
//!
//! The t-distribution CDF is evaluated through the regularised incomplete
//! beta function (modified Lentz continued fraction) and a Lanczos
//! approximation of `ln Γ`; quantiles are found by bisection on the CDF.

use serde::Serialize;

use crate::error::AnalysisError;

const CONFIDENCE: f64 = 0.95;
const SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator). Zero for one sample.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// 95% confidence interval for the mean. A single point when n = 1.
    pub ci_95: (f64, f64),
}

impl Summary {
    /// `None` for an empty sample.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len();
        let mean = mean(samples);
        let std = sample_variance(samples).sqrt();

        let ci_95 = if n > 1 {
            let sem = std / (n as f64).sqrt();
            let half = t_quantile(0.5 + CONFIDENCE / 2.0, (n - 1) as f64) * sem;
            (mean - half, mean + half)
        } else {
            (mean, mean)
        };

        Some(Self {
            n,
            mean,
            std,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            median: median(samples),
            ci_95,
        })
    }
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Unbiased variance; zero for fewer than two samples.
pub fn sample_variance(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(samples);
    samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `q`-th percentile (0..=100) with linear interpolation between ranks.
pub fn percentile(samples: &[f64], q: f64) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// `(mean_a - mean_b) / sqrt((var_a + var_b) / 2)`.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    let pooled = ((sample_variance(a) + sample_variance(b)) / 2.0).sqrt();
    (mean(a) - mean(b)) / pooled
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alternative {
    /// mean(a) > mean(b)
    Greater,
    /// mean(a) < mean(b)
    Less,
    TwoSided,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTest {
    pub alternative: Alternative,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub significant_at_0_05: bool,
    pub effect_size_cohens_d: f64,
}

/// Pooled-variance two-sample Student t-test of `a` against `b`.
///
/// Identical constant samples give an undefined statistic (NaN); a nonzero
/// mean difference with zero spread gives an infinite one.
pub fn two_sample_t_test(
    a: &[f64],
    b: &[f64],
    alternative: Alternative,
) -> Result<TTest, AnalysisError> {
    let (n1, n2) = (a.len(), b.len());
    if n1 == 0 || n2 == 0 || n1 + n2 < 3 {
        return Err(AnalysisError::InsufficientData(format!(
            "t-test needs both samples non-empty and at least 3 values, got {n1} and {n2}"
        )));
    }

    let df = (n1 + n2 - 2) as f64;
    let pooled_var = ((n1 - 1) as f64 * sample_variance(a) + (n2 - 1) as f64 * sample_variance(b)) / df;
    let se = (pooled_var * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    let diff = mean(a) - mean(b);

    let t = if se > 0.0 {
        diff / se
    } else if diff > 0.0 {
        f64::INFINITY
    } else if diff < 0.0 {
        f64::NEG_INFINITY
    } else {
        f64::NAN
    };

    let p_value = match alternative {
        Alternative::Greater => student_t_cdf(-t, df),
        Alternative::Less => student_t_cdf(t, df),
        Alternative::TwoSided => 2.0 * student_t_cdf(-t.abs(), df),
    };

    Ok(TTest {
        alternative,
        t_statistic: t,
        degrees_of_freedom: df,
        p_value,
        significant_at_0_05: p_value < SIGNIFICANCE,
        effect_size_cohens_d: cohens_d(a, b),
    })
}

/// CDF of Student's t with `df` degrees of freedom.
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return if t > 0.0 { 1.0 } else { 0.0 };
    }
    let x = df / (df + t * t);
    let tail = 0.5 * regularized_incomplete_beta(df / 2.0, 0.5, x);
    if t >= 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse CDF of Student's t.
pub fn t_quantile(p: f64, df: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || df <= 0.0 {
        return f64::NAN;
    }
    if p == 0.5 {
        return 0.0;
    }
    if p < 0.5 {
        return -t_quantile(1.0 - p, df);
    }
    if p == 1.0 {
        return f64::INFINITY;
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    while student_t_cdf(hi, df) < p && hi < 1e12 {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// `ln Γ(x)` for `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEF[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `I_x(a, b)`.
pub fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
