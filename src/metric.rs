use super::*;

/// Closed set of point-to-point distances.
///
/// Only [`Metric::Euclidean`] and [`Metric::Taxicab`] satisfy the triangle
/// inequality, so only they may drive the [`Pruned`] engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    Cosine,
    Taxicab,
}

impl Metric {
    /// Distance between two rows of equal width.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> Energy {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Euclidean => Self::euclidean(a, b),
            Self::Cosine => Self::cosine(a, b),
            Self::Taxicab => Self::taxicab(a, b),
        }
    }

    /// Whether d(a, c) <= d(a, b) + d(b, c) holds for every triple.
    pub fn is_metric(&self) -> bool {
        matches!(self, Self::Euclidean | Self::Taxicab)
    }

    fn euclidean(a: &[f64], b: &[f64]) -> Energy {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x - y)
            .map(|d| d * d)
            .sum::<Energy>()
            .sqrt()
    }

    fn taxicab(a: &[f64], b: &[f64]) -> Energy {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .sum::<Energy>()
    }

    /// 1 - cos(a, b). Zero vectors are treated as orthogonal to everything.
    fn cosine(a: &[f64], b: &[f64]) -> Energy {
        let (dot, aa, bb) = a
            .iter()
            .zip(b.iter())
            .fold((0., 0., 0.), |(dot, aa, bb), (x, y)| {
                (dot + x * y, aa + x * x, bb + y * y)
            });
        let norm = (aa * bb).sqrt();
        if norm == 0. { 1. } else { 1. - dot / norm }
    }
}

impl TryFrom<&str> for Metric {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "eucl" | "euclidean" => Ok(Self::Euclidean),
            "cos" | "cosine" => Ok(Self::Cosine),
            "taxi" | "taxicab" => Ok(Self::Taxicab),
            other => Err(Error::config(format!("unknown distance metric '{}'", other))),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Euclidean => write!(f, "eucl"),
            Self::Cosine => write!(f, "cos"),
            Self::Taxicab => write!(f, "taxi"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_is_pythagorean() {
        assert_eq!(Metric::Euclidean.distance(&[0., 0.], &[3., 4.]), 5.);
    }

    #[test]
    fn taxicab_sums_absolute_differences() {
        assert_eq!(Metric::Taxicab.distance(&[1., -1.], &[-2., 3.]), 7.);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_zero() {
        let d = Metric::Cosine.distance(&[1., 2., 3.], &[2., 4., 6.]);
        assert!(d.abs() < 1e-12);
        assert_eq!(Metric::Cosine.distance(&[0., 0.], &[1., 1.]), 1.);
    }

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!(Metric::try_from("eucl").unwrap(), Metric::Euclidean);
        assert_eq!(Metric::try_from("Cosine").unwrap(), Metric::Cosine);
        assert_eq!(Metric::try_from("taxi").unwrap(), Metric::Taxicab);
        assert!(matches!(Metric::try_from("hamming"), Err(Error::Config(_))));
    }
}
