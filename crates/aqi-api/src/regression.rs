//! Ordinary least squares with an intercept, solved through the normal
//! equations.

const PIVOT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    /// `[intercept, b1, .., bn]`
    coefficients: Vec<f64>,
}

impl LinearModel {
    /// Fit `y ~ b0 + Σ bi·xi`. A feature that is constant or a combination
    /// of earlier ones gets coefficient zero. Returns `None` when there are
    /// fewer samples than coefficients.
    pub fn fit<const N: usize>(features: &[[f64; N]], targets: &[f64]) -> Option<Self> {
        let k = N + 1;
        if features.len() != targets.len() || features.len() < k {
            return None;
        }

        // Augmented [XᵀX | Xᵀy].
        let mut m = vec![vec![0.0; k + 1]; k];
        for (x, &y) in features.iter().zip(targets) {
            let row: Vec<f64> = std::iter::once(1.0).chain(x.iter().copied()).collect();
            for i in 0..k {
                for j in 0..k {
                    m[i][j] += row[i] * row[j];
                }
                m[i][k] += row[i] * y;
            }
        }

        solve(m).map(|coefficients| Self { coefficients })
    }

    pub fn predict<const N: usize>(&self, x: &[f64; N]) -> f64 {
        self.coefficients[0]
            + self.coefficients[1..]
                .iter()
                .zip(x)
                .map(|(b, v)| b * v)
                .sum::<f64>()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

/// Symmetric elimination on the augmented `k x (k+1)` normal equations.
/// `XᵀX` is positive semi-definite, so a vanishing diagonal means the whole
/// remaining row and column vanish too: that coefficient is pinned to zero.
fn solve(mut m: Vec<Vec<f64>>) -> Option<Vec<f64>> {
    let k = m.len();
    let scale: Vec<f64> = (0..k).map(|i| m[i][i].abs().max(1.0)).collect();
    let mut dropped = vec![false; k];

    for col in 0..k {
        if m[col][col] <= PIVOT_EPSILON * scale[col] {
            dropped[col] = true;
            continue;
        }
        for row in col + 1..k {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..=k {
                m[row][c] -= factor * m[col][c];
            }
        }
    }

    let mut x = vec![0.0; k];
    for row in (0..k).rev() {
        if dropped[row] {
            continue;
        }
        let tail: f64 = (row + 1..k).map(|c| m[row][c] * x[c]).sum();
        x[row] = (m[row][k] - tail) / m[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Simple linear trend over equally spaced samples, as `(intercept, slope)`
/// with `x = 0, 1, ..`.
pub fn linear_trend(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [] => None,
        [only] => Some((*only, 0.0)),
        _ => {
            let xs: Vec<[f64; 1]> = (0..values.len()).map(|i| [i as f64]).collect();
            let model = LinearModel::fit(&xs, values)?;
            Some((model.coefficients[0], model.coefficients[1]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn recovers_exact_linear_data() {
        // y = 3 + 2a - b + 0.5c
        let xs: Vec<[f64; 3]> = vec![
            [1.0, 0.0, 2.0],
            [2.0, 1.0, 0.0],
            [0.0, 3.0, 1.0],
            [4.0, 2.0, 5.0],
            [3.0, 7.0, 2.0],
            [5.0, 1.0, 9.0],
        ];
        let ys: Vec<f64> = xs
            .iter()
            .map(|x| 3.0 + 2.0 * x[0] - x[1] + 0.5 * x[2])
            .collect();

        let model = LinearModel::fit(&xs, &ys).unwrap();
        let expected = [3.0, 2.0, -1.0, 0.5];
        for (got, want) in model.coefficients().iter().zip(expected) {
            assert!(close(*got, want), "{got} != {want}");
        }
        assert!(close(model.predict(&[1.0, 1.0, 1.0]), 4.5));
    }

    #[test]
    fn too_few_rows() {
        let xs = [[1.0, 2.0], [2.0, 3.0]];
        assert!(LinearModel::fit(&xs, &[1.0, 2.0]).is_none());
    }

    #[test]
    fn duplicated_feature_is_zeroed() {
        // Second feature is a copy of the first.
        let xs = [[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let model = LinearModel::fit(&xs, &[3.0, 5.0, 7.0, 9.0]).unwrap();
        let b = model.coefficients();
        assert!(close(b[0], 1.0));
        assert!(close(b[1], 2.0));
        assert_eq!(b[2], 0.0);
        assert!(close(model.predict(&[10.0, 10.0]), 21.0));
    }

    #[test]
    fn constant_feature_is_zeroed() {
        // y = 1 + 2a - b, with c always 0 and d always 7
        let xs: Vec<[f64; 4]> = vec![
            [1.0, 0.0, 0.0, 7.0],
            [2.0, 1.0, 0.0, 7.0],
            [0.0, 3.0, 0.0, 7.0],
            [4.0, 2.0, 0.0, 7.0],
            [3.0, 7.0, 0.0, 7.0],
            [5.0, 1.0, 0.0, 7.0],
        ];
        let ys: Vec<f64> = xs.iter().map(|x| 1.0 + 2.0 * x[0] - x[1]).collect();

        let model = LinearModel::fit(&xs, &ys).unwrap();
        assert!(close(model.predict(&[2.0, 2.0, 0.0, 7.0]), 3.0));
        assert_eq!(model.coefficients()[3], 0.0);
        assert_eq!(model.coefficients()[4], 0.0);
    }

    #[test]
    fn trend() {
        let (b0, b1) = linear_trend(&[10.0, 12.0, 14.0, 16.0]).unwrap();
        assert!(close(b0, 10.0));
        assert!(close(b1, 2.0));
        assert_eq!(linear_trend(&[42.0]), Some((42.0, 0.0)));
        assert_eq!(linear_trend(&[]), None);
    }
}
