//! Collection presets.
//!
//! Each preset pins the CQL product area, the `Source` label written into
//! every record, the manifestation preference and the per-run cap the
//! deployment was tuned for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Treaty database (`c.product-area==vd`)
    #[default]
    Verdragenbank,
    /// Disciplinary law rulings (`c.product-area==tuchtrecht`)
    Tuchtrecht,
}

impl Collection {
    pub fn product_area(&self) -> &'static str {
        match self {
            Collection::Verdragenbank => "vd",
            Collection::Tuchtrecht => "tuchtrecht",
        }
    }

    /// Value of the `Source` column.
    pub fn label(&self) -> &'static str {
        match self {
            Collection::Verdragenbank => "Verdragenbank",
            Collection::Tuchtrecht => "Tuchtrecht",
        }
    }

    /// File name prefix for shards.
    pub fn shard_prefix(&self) -> &'static str {
        match self {
            Collection::Verdragenbank => "verdragenbank",
            Collection::Tuchtrecht => "tuchtrecht",
        }
    }

    pub fn default_max_records(&self) -> usize {
        match self {
            Collection::Verdragenbank => 250,
            Collection::Tuchtrecht => 10_000,
        }
    }

    /// `gzd:itemUrl` manifestations in order of preference.
    ///
    /// Only `xml*` manifestations have their full text extracted.
    pub fn manifestations(&self) -> &'static [&'static str] {
        match self {
            Collection::Verdragenbank => &["xml-nl", "xml", "pdf"],
            Collection::Tuchtrecht => &["xml", "pdf"],
        }
    }

    /// Base CQL query without the modification filter.
    pub fn base_query(&self) -> String {
        format!("c.product-area=={}", self.product_area())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shard_prefix())
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "verdragenbank" | "vd" => Ok(Collection::Verdragenbank),
            "tuchtrecht" => Ok(Collection::Tuchtrecht),
            other => Err(AppError::config(format!("unknown collection '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(Collection::Verdragenbank.base_query(), "c.product-area==vd");
        assert_eq!(Collection::Tuchtrecht.default_max_records(), 10_000);
        assert_eq!(Collection::Verdragenbank.manifestations()[0], "xml-nl");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("VD".parse::<Collection>().unwrap(), Collection::Verdragenbank);
        assert_eq!(
            " tuchtrecht ".parse::<Collection>().unwrap(),
            Collection::Tuchtrecht
        );
        assert!("rechtspraak".parse::<Collection>().is_err());
    }
}
