//! Market trend analysis shared by the CEO styles.

use crate::collaborators::MarketSignals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Expand,
    Consolidate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketAnalysis {
    pub trend: Trend,
    /// Distance of the mean signal from neutral, in `[0, 1]`.
    pub confidence: f64,
    /// Population standard deviation of the signals.
    pub volatility: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Copy)]
pub struct MarketAnalyzer {
    expand_threshold: f64,
}

impl Default for MarketAnalyzer {
    fn default() -> Self {
        Self {
            expand_threshold: 0.6,
        }
    }
}

impl MarketAnalyzer {
    pub fn new(expand_threshold: f64) -> Self {
        Self { expand_threshold }
    }

    pub fn analyze(&self, signals: &MarketSignals) -> MarketAnalysis {
        if signals.is_empty() {
            return MarketAnalysis {
                trend: Trend::Bearish,
                confidence: 0.0,
                volatility: 0.0,
                recommendation: Recommendation::Consolidate,
            };
        }

        let n = signals.len() as f64;
        let mean = signals.values().sum::<f64>() / n;
        let variance = signals.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        MarketAnalysis {
            trend: if mean > 0.5 {
                Trend::Bullish
            } else {
                Trend::Bearish
            },
            confidence: ((mean - 0.5).abs() * 2.0).min(1.0),
            volatility: variance.sqrt(),
            recommendation: if mean > self.expand_threshold {
                Recommendation::Expand
            } else {
                Recommendation::Consolidate
            },
        }
    }
}
