use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use log::warn;
use serde::Deserialize;

/// News sentiment attached to a candidate. Missing coverage is a normal
/// state and never blocks a trade decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentiment {
    /// Score in [-1.0, 1.0], negative bearish, positive bullish.
    Scored(f64),
    Unavailable,
}

impl Sentiment {
    pub fn from_raw(raw: Option<f64>) -> Self {
        match raw {
            Some(value) if value.is_finite() => Sentiment::Scored(value.clamp(-1.0, 1.0)),
            Some(_) => Sentiment::Unavailable,
            None => Sentiment::Unavailable,
        }
    }

    /// Numeric score; unavailable coverage maps to neutral.
    pub fn score(&self) -> f64 {
        match self {
            Sentiment::Scored(value) => *value,
            Sentiment::Unavailable => 0.0,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Sentiment::Scored(value) if *value >= 0.2 => format!("bullish ({value:+.2})"),
            Sentiment::Scored(value) if *value <= -0.2 => format!("bearish ({value:+.2})"),
            Sentiment::Scored(value) => format!("neutral ({value:+.2})"),
            Sentiment::Unavailable => "no coverage".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentFile {
    #[serde(flatten)]
    scores: BTreeMap<String, f64>,
}

/// Per-symbol sentiment scores loaded from a JSON map file. An absent
/// file yields an empty map rather than an error.
#[derive(Debug, Default)]
pub struct SentimentMap {
    scores: BTreeMap<String, f64>,
}

impl SentimentMap {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading sentiment file {}", path.display()))?;
        match serde_json::from_str::<SentimentFile>(&raw) {
            Ok(file) => Ok(Self {
                scores: file
                    .scores
                    .into_iter()
                    .map(|(symbol, score)| (symbol.to_uppercase(), score))
                    .collect(),
            }),
            Err(err) => {
                warn!("sentiment file {} unreadable: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn get(&self, symbol: &str) -> Sentiment {
        Sentiment::from_raw(self.scores.get(symbol).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_scores_neutral() {
        assert_eq!(Sentiment::Unavailable.score(), 0.0);
        assert_eq!(Sentiment::from_raw(None), Sentiment::Unavailable);
        assert_eq!(Sentiment::from_raw(Some(f64::NAN)), Sentiment::Unavailable);
    }

    #[test]
    fn scores_are_clamped() {
        assert_eq!(Sentiment::from_raw(Some(3.0)), Sentiment::Scored(1.0));
        assert_eq!(Sentiment::from_raw(Some(-3.0)), Sentiment::Scored(-1.0));
        assert_eq!(Sentiment::from_raw(Some(0.4)), Sentiment::Scored(0.4));
    }

    #[test]
    fn labels_cover_bands() {
        assert!(Sentiment::Scored(0.5).label().starts_with("bullish"));
        assert!(Sentiment::Scored(-0.5).label().starts_with("bearish"));
        assert!(Sentiment::Scored(0.05).label().starts_with("neutral"));
        assert_eq!(Sentiment::Unavailable.label(), "no coverage");
    }

    #[test]
    fn map_load_tolerates_missing_file() {
        let map = SentimentMap::load(Path::new("/nonexistent/sentiment.json")).unwrap();
        assert_eq!(map.get("AAPL"), Sentiment::Unavailable);
    }

    #[test]
    fn map_uppercases_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentiment.json");
        std::fs::write(&path, r#"{"aapl": 0.3}"#).unwrap();
        let map = SentimentMap::load(&path).unwrap();
        assert_eq!(map.get("AAPL"), Sentiment::Scored(0.3));
    }
}
