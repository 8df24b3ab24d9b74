use super::*;

/// How the initial centroids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Init {
    /// Every row joins a uniformly random cluster; means follow from membership.
    Random,
    /// `k` distinct rows become the centroids.
    Forgy,
    /// D²-weighted seeding, one `KMSPP_INIT` phase per chosen center.
    #[default]
    KmeansPP,
    /// Centroids are supplied by the caller.
    None,
}

impl TryFrom<&str> for Init {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "forgy" => Ok(Self::Forgy),
            "kmeanspp" | "kmeans++" => Ok(Self::KmeansPP),
            "none" => Ok(Self::None),
            other => Err(Error::config(format!("unknown init method '{}'", other))),
        }
    }
}

impl std::fmt::Display for Init {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::Forgy => write!(f, "forgy"),
            Self::KmeansPP => write!(f, "kmeanspp"),
            Self::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_method() {
        for init in [Init::Random, Init::Forgy, Init::KmeansPP, Init::None] {
            assert_eq!(Init::try_from(init.to_string().as_str()).unwrap(), init);
        }
        assert!(matches!(Init::try_from("spectral"), Err(Error::Config(_))));
    }
}
