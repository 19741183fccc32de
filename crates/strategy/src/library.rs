use optdesk_core::descriptor::{StrategyDescriptor, StrategyId};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::evaluator::StrategyEvaluator;
use crate::{
    bb_squeeze, cpr_breakout, ema_cross_rsi, ma_crossover, momentum_vwap_rsi,
    opening_range_breakout, prev_day_breakout, rsi_divergence, supertrend_macd,
    volatility_cluster, volume_spread,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    #[error("strategy '{0}' is already registered")]
    Duplicate(StrategyId),

    #[error("unknown strategy '{0}'")]
    Unknown(String),

    #[error("strategy '{0}' does not accept custom parameters")]
    FixedParameters(StrategyId),
}

/// Builds an evaluator for a descriptor carrying custom parameters.
pub type EvaluatorFactory = fn(StrategyDescriptor) -> Arc<dyn StrategyEvaluator>;

struct Entry {
    evaluator: Arc<dyn StrategyEvaluator>,
    factory: Option<EvaluatorFactory>,
}

/// Registry of available strategies keyed by id.
#[derive(Default)]
pub struct StrategyLibrary {
    entries: BTreeMap<StrategyId, Entry>,
}

/// Names used by the recommendation agent, mapped to library ids.
const ALIASES: &[(&str, &str)] = &[
    ("gemini_default", cpr_breakout::ID),
    ("volume_spread", volume_spread::ID),
    ("vsa", volume_spread::ID),
    ("breakout_prev_day_hl", prev_day_breakout::ID),
    ("volatility_cluster", volatility_cluster::ID),
    ("bb_squeeze", bb_squeeze::ID),
    ("orb", opening_range_breakout::ID),
    ("supertrend", supertrend_macd::ID),
];

impl StrategyLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with every built-in evaluator at its default parameters.
    #[must_use]
    pub fn with_builtins() -> Self {
        let builtins: [(StrategyDescriptor, EvaluatorFactory); 11] = [
            (cpr_breakout::CprBreakout::default_descriptor(), |d| {
                Arc::new(cpr_breakout::CprBreakout::new(d))
            }),
            (ema_cross_rsi::EmaCrossRsi::default_descriptor(), |d| {
                Arc::new(ema_cross_rsi::EmaCrossRsi::new(d))
            }),
            (ma_crossover::MaCrossover::default_descriptor(), |d| {
                Arc::new(ma_crossover::MaCrossover::new(d))
            }),
            (
                volatility_cluster::VolatilityClusterReversal::default_descriptor(),
                |d| Arc::new(volatility_cluster::VolatilityClusterReversal::new(d)),
            ),
            (volume_spread::VolumeSpreadAnalysis::default_descriptor(), |d| {
                Arc::new(volume_spread::VolumeSpreadAnalysis::new(d))
            }),
            (rsi_divergence::RsiDivergence::default_descriptor(), |d| {
                Arc::new(rsi_divergence::RsiDivergence::new(d))
            }),
            (prev_day_breakout::PrevDayBreakout::default_descriptor(), |d| {
                Arc::new(prev_day_breakout::PrevDayBreakout::new(d))
            }),
            (momentum_vwap_rsi::MomentumVwapRsi::default_descriptor(), |d| {
                Arc::new(momentum_vwap_rsi::MomentumVwapRsi::new(d))
            }),
            (bb_squeeze::BbSqueezeBreakout::default_descriptor(), |d| {
                Arc::new(bb_squeeze::BbSqueezeBreakout::new(d))
            }),
            (supertrend_macd::SupertrendMacd::default_descriptor(), |d| {
                Arc::new(supertrend_macd::SupertrendMacd::new(d))
            }),
            (
                opening_range_breakout::OpeningRangeBreakout::default_descriptor(),
                |d| Arc::new(opening_range_breakout::OpeningRangeBreakout::new(d)),
            ),
        ];

        let mut library = Self::new();
        for (descriptor, factory) in builtins {
            library.entries.insert(
                descriptor.id().clone(),
                Entry {
                    evaluator: factory(descriptor),
                    factory: Some(factory),
                },
            );
        }
        library
    }

    /// Adds an evaluator under its descriptor id. Its parameters are fixed.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the id is taken.
    pub fn register(&mut self, evaluator: Arc<dyn StrategyEvaluator>) -> Result<(), LibraryError> {
        self.insert(evaluator, None)
    }

    /// Adds an evaluator that can be rebuilt with custom parameters.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the id is taken.
    pub fn register_with_factory(
        &mut self,
        descriptor: StrategyDescriptor,
        factory: EvaluatorFactory,
    ) -> Result<(), LibraryError> {
        self.insert(factory(descriptor), Some(factory))
    }

    fn insert(
        &mut self,
        evaluator: Arc<dyn StrategyEvaluator>,
        factory: Option<EvaluatorFactory>,
    ) -> Result<(), LibraryError> {
        let id = evaluator.descriptor().id().clone();
        if self.entries.contains_key(&id) {
            return Err(LibraryError::Duplicate(id));
        }
        debug!(strategy = %id, "Registered strategy");
        self.entries.insert(id, Entry { evaluator, factory });
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &StrategyId) -> Option<Arc<dyn StrategyEvaluator>> {
        self.entries.get(id).map(|e| Arc::clone(&e.evaluator))
    }

    /// Registered descriptors, ordered by id.
    #[must_use]
    pub fn descriptors(&self) -> Vec<StrategyDescriptor> {
        self.entries
            .values()
            .map(|e| e.evaluator.descriptor().clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks a strategy up by a loosely formatted name (`"EMA_Cross_RSI"`,
    /// `"ema cross rsi"`, `"Gemini_Default"`).
    ///
    /// # Errors
    ///
    /// Returns `Unknown` if nothing matches.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn StrategyEvaluator>, LibraryError> {
        let normalized = name
            .trim()
            .to_lowercase()
            .replace([' ', '-'], "_");
        let id = ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map_or(normalized.as_str(), |(_, id)| *id);

        self.get(&StrategyId::new(id))
            .ok_or_else(|| LibraryError::Unknown(name.to_string()))
    }

    /// Evaluator for `descriptor`, rebuilt when its parameters differ from the
    /// registered ones.
    ///
    /// # Errors
    ///
    /// Returns `Unknown` for an unregistered id, or `FixedParameters` if the
    /// parameters differ and the strategy has no factory.
    pub fn evaluator_for(
        &self,
        descriptor: &StrategyDescriptor,
    ) -> Result<Arc<dyn StrategyEvaluator>, LibraryError> {
        let entry = self
            .entries
            .get(descriptor.id())
            .ok_or_else(|| LibraryError::Unknown(descriptor.id().to_string()))?;

        if entry.evaluator.descriptor() == descriptor {
            return Ok(Arc::clone(&entry.evaluator));
        }
        let factory = entry
            .factory
            .ok_or_else(|| LibraryError::FixedParameters(descriptor.id().clone()))?;
        Ok(factory(descriptor.clone()))
    }
}
