//! Rank-ordered feature importance.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Feature name → attribution magnitude, ordered by decreasing magnitude.
///
/// Every value is non-negative and finite-or-zero; ties keep the order in
/// which the features were supplied. Serializes as a JSON object whose keys
/// appear in rank order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureImportance {
    ranked: Vec<(String, f64)>,
}

impl FeatureImportance {
    /// Build a ranking from signed attributions.
    ///
    /// Magnitudes are absolute values (NaN counts as zero). A repeated name
    /// keeps its first position and takes the last value.
    pub fn from_attributions<I, S>(attributions: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut ranked: Vec<(String, f64)> = Vec::new();
        for (name, value) in attributions {
            let name = name.into();
            let magnitude = if value.is_nan() { 0.0 } else { value.abs() };
            match ranked.iter_mut().find(|(n, _)| *n == name) {
                Some((_, slot)) => *slot = magnitude,
                None => ranked.push((name, magnitude)),
            }
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self { ranked }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.ranked.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ranked.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranked.iter().map(|(n, _)| n.as_str())
    }

    /// The `n` most important features.
    pub fn top(&self, n: usize) -> &[(String, f64)] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    pub fn into_ranked(self) -> Vec<(String, f64)> {
        self.ranked
    }
}

impl fmt::Display for FeatureImportance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.ranked.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}. {name}: {value:.4}", i + 1)?;
        }
        Ok(())
    }
}

impl Serialize for FeatureImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ranked.len()))?;
        for (name, value) in &self.ranked {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureImportance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RankingVisitor;

        impl<'de> Visitor<'de> for RankingVisitor {
            type Value = FeatureImportance;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of feature name to importance")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(FeatureImportance::from_attributions(entries))
            }
        }

        deserializer.deserialize_map(RankingVisitor)
    }
}
