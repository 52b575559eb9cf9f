use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

const SCHEME: &str = "models:/";

/// Which version of a registered model a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelSelector {
    Alias(String),
    Version(u32),
}

/// Symbolic model reference: `models:/<name>@<alias>` or `models:/<name>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    pub name: String,
    pub selector: ModelSelector,
}

impl ModelRef {
    pub fn alias(name: &str, alias: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: ModelSelector::Alias(alias.to_string()),
        }
    }

    pub fn version(name: &str, version: u32) -> Self {
        Self {
            name: name.to_string(),
            selector: ModelSelector::Version(version),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidReference(uri.to_string());
        let rest = uri.strip_prefix(SCHEME).ok_or_else(invalid)?;

        let (name, selector) = if let Some((name, alias)) = rest.split_once('@') {
            (name, ModelSelector::Alias(alias.to_string()))
        } else if let Some((name, version)) = rest.split_once('/') {
            let version = version.parse::<u32>().map_err(|_| invalid())?;
            (name, ModelSelector::Version(version))
        } else {
            return Err(invalid());
        };

        let valid_part = |s: &str| {
            !s.is_empty()
                && !s.starts_with('.')
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid_part(name) {
            return Err(invalid());
        }
        if let ModelSelector::Alias(alias) = &selector {
            if !valid_part(alias) {
                return Err(invalid());
            }
        }

        Ok(Self {
            name: name.to_string(),
            selector,
        })
    }
}

impl FromStr for ModelRef {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelRef::parse(s)
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            ModelSelector::Alias(alias) => write!(f, "{SCHEME}{}@{alias}", self.name),
            ModelSelector::Version(v) => write!(f, "{SCHEME}{}/{v}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_reference() {
        let r = ModelRef::parse("models:/listing-price-predictor@champion").unwrap();
        assert_eq!(r, ModelRef::alias("listing-price-predictor", "champion"));
        assert_eq!(r.to_string(), "models:/listing-price-predictor@champion");
    }

    #[test]
    fn parses_version_reference() {
        let r: ModelRef = "models:/price/3".parse().unwrap();
        assert_eq!(r.selector, ModelSelector::Version(3));
    }

    #[test]
    fn rejects_malformed_references() {
        for bad in [
            "price@champion",
            "models:/",
            "models:/price",
            "models:/price/three",
            "models:/@champion",
            "models:/../etc@x",
            "models:/price@",
        ] {
            assert!(ModelRef::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
