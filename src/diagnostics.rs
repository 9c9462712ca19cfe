use serde::{Deserialize, Serialize};

const SINGULAR_EPS: f64 = 1e-12;

/// Wald statistics for one fitted coefficient, on the standardised scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientStat {
    pub column: String,
    pub coefficient: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub columns: Vec<String>,
    pub correlation: Vec<Vec<f64>>,
    /// `None` for constant columns, or for every column when the
    /// correlation matrix is singular.
    pub vif: Vec<Option<f64>>,
    /// Intercept first; empty when the information matrix cannot be inverted.
    pub coefficients: Vec<CoefficientStat>,
}

impl Diagnostics {
    /// Column pairs with `|r| >= threshold`, strongest first.
    pub fn correlated_pairs(&self, threshold: f64) -> Vec<(&str, &str, f64)> {
        let mut out = Vec::new();
        for (i, row) in self.correlation.iter().enumerate() {
            for (j, r) in row.iter().enumerate().skip(i + 1) {
                if r.abs() >= threshold {
                    out.push((self.columns[i].as_str(), self.columns[j].as_str(), *r));
                }
            }
        }
        out.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        out
    }
}

/// Pearson correlation in [-1, 1]. Returns 0.0 on degenerate input.
pub fn pearson_corr(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

fn column(rows: &[Vec<f64>], idx: usize) -> Vec<f64> {
    rows.iter().map(|r| r[idx]).collect()
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

pub fn correlation_matrix(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    let cols = (0..width).map(|j| column(rows, j)).collect::<Vec<_>>();
    (0..width)
        .map(|i| {
            (0..width)
                .map(|j| {
                    if i == j && !is_constant(&cols[i]) {
                        1.0
                    } else {
                        pearson_corr(&cols[i], &cols[j])
                    }
                })
                .collect()
        })
        .collect()
}

/// Variance inflation factors from the inverse correlation matrix of the
/// non-constant columns.
pub fn variance_inflation(rows: &[Vec<f64>], width: usize) -> Vec<Option<f64>> {
    let varying = (0..width)
        .filter(|j| !is_constant(&column(rows, *j)))
        .collect::<Vec<_>>();
    let mut out = vec![None; width];
    if varying.is_empty() {
        return out;
    }
    let corr = correlation_matrix(rows, width);
    let sub = varying
        .iter()
        .map(|i| varying.iter().map(|j| corr[*i][*j]).collect())
        .collect();
    let Some(inv) = invert(sub) else {
        return out;
    };
    for (pos, j) in varying.iter().enumerate() {
        out[*j] = Some(inv[pos][pos]);
    }
    out
}

/// Standard errors come from the inverse of the penalised information
/// matrix `X'WX + n*l2*I` (no penalty on the intercept).
pub fn coefficient_stats(
    columns: &[String],
    rows: &[Vec<f64>],
    coeffs: &[f64],
    intercept: f64,
    l2: f64,
) -> Vec<CoefficientStat> {
    let k = coeffs.len() + 1;
    let mut info = vec![vec![0.0; k]; k];
    for x in rows {
        let z = intercept + x.iter().zip(coeffs).map(|(v, w)| v * w).sum::<f64>();
        let p = 1.0 / (1.0 + (-z).exp());
        let weight = p * (1.0 - p);
        let mut design = Vec::with_capacity(k);
        design.push(1.0);
        design.extend_from_slice(x);
        for a in 0..k {
            for b in 0..k {
                info[a][b] += weight * design[a] * design[b];
            }
        }
    }
    let n = rows.len() as f64;
    for (j, row) in info.iter_mut().enumerate().skip(1) {
        row[j] += n * l2;
    }
    let Some(cov) = invert(info) else {
        return Vec::new();
    };

    let names = std::iter::once("intercept").chain(columns.iter().map(String::as_str));
    let values = std::iter::once(intercept).chain(coeffs.iter().copied());
    names
        .zip(values)
        .enumerate()
        .map(|(j, (name, coefficient))| {
            let std_error = cov[j][j].max(0.0).sqrt();
            let z = if std_error > 0.0 {
                coefficient / std_error
            } else {
                0.0
            };
            CoefficientStat {
                column: name.to_string(),
                coefficient,
                std_error,
                z,
                p_value: (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0),
            }
        })
        .collect()
}

/// Gauss-Jordan elimination with partial pivoting.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect::<Vec<Vec<f64>>>();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < SINGULAR_EPS {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let d = a[col][col];
        for j in 0..n {
            a[col][j] /= d;
            inv[col][j] /= d;
        }
        let pivot_row = a[col].clone();
        let pivot_inv = inv[col].clone();
        for i in 0..n {
            if i == col {
                continue;
            }
            let f = a[i][col];
            if f == 0.0 {
                continue;
            }
            for j in 0..n {
                a[i][j] -= f * pivot_row[j];
                inv[i][j] -= f * pivot_inv[j];
            }
        }
    }
    Some(inv)
}

/// Standard normal CDF approximation (Abramowitz-Stegun).
pub fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();
    0.5 * (1.0 + sign * y)
}
