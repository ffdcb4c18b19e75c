//! Exchange rate derivation over observed conversion edges
//!
//! Rates between two currencies are rarely observed directly; they are
//! derived by walking every simple path through the graph of observed
//! conversions and picking the path whose edges are freshest on average.
//! Reverse edges are generated when the graph is built and never persisted.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use serde::Serialize;
use summa_math::{Rational, RationalError, Timestamp};

use crate::account::CurrencyId;

/// Errors that can occur during rate derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// No chain of observed conversions connects the two currencies
    NoConversionPath {
        /// The currency the conversion starts from
        source: CurrencyId,
        /// The currency the conversion should end at
        destination: CurrencyId,
    },
    /// An edge was constructed with a zero or negative value
    NonPositiveRate,
    /// Arithmetic failure while composing a rate
    Rational(RationalError),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::NoConversionPath {
                source,
                destination,
            } => write!(
                f,
                "No conversion path from currency {source} to currency {destination}"
            ),
            ExchangeError::NonPositiveRate => {
                write!(f, "Exchange values must be strictly positive")
            }
            ExchangeError::Rational(e) => write!(f, "Rate arithmetic failed: {e}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExchangeError::Rational(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RationalError> for ExchangeError {
    fn from(e: RationalError) -> Self {
        ExchangeError::Rational(e)
    }
}

/// Result type for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// A directed, timestamped conversion observation
///
/// `source_value` units of the source currency equal `destination_value`
/// units of the destination currency, as observed at `observed_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateInfo {
    /// Currency the observation converts from
    pub source_currency_id: CurrencyId,
    /// Units of the source currency
    pub source_value: Rational,
    /// Currency the observation converts to
    pub destination_currency_id: CurrencyId,
    /// Units of the destination currency
    pub destination_value: Rational,
    /// When the conversion was observed
    pub observed_at: Timestamp,
}

impl ExchangeRateInfo {
    /// Create an observation; both values must be strictly positive
    pub fn new(
        source_currency_id: CurrencyId,
        source_value: Rational,
        destination_currency_id: CurrencyId,
        destination_value: Rational,
        observed_at: Timestamp,
    ) -> ExchangeResult<Self> {
        if !source_value.is_positive() || !destination_value.is_positive() {
            return Err(ExchangeError::NonPositiveRate);
        }
        Ok(Self {
            source_currency_id,
            source_value,
            destination_currency_id,
            destination_value,
            observed_at,
        })
    }

    /// The generated opposite-direction observation
    fn reversed(&self) -> Self {
        Self {
            source_currency_id: self.destination_currency_id,
            source_value: self.destination_value.clone(),
            destination_currency_id: self.source_currency_id,
            destination_value: self.source_value.clone(),
            observed_at: self.observed_at,
        }
    }

    /// Conversion ratio of this single edge
    fn ratio(&self) -> ExchangeResult<Rational> {
        Ok(self.destination_value.divide(&self.source_value)?)
    }
}

/// A derived conversion ratio between two currencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedRate {
    /// Currency the rate converts from
    pub source: CurrencyId,
    /// Currency the rate converts to
    pub destination: CurrencyId,
    /// One unit of the source currency in destination units
    pub value: Rational,
}

/// Derives rates between currencies for one calculation run
///
/// Holds the observed edges plus their generated reverses and memoizes
/// every derived `(source, destination)` pair. The reference time is fixed
/// for the lifetime of the instance; the cache is only sound under a single
/// reference time, so callers build one graph per derivation session.
pub struct ExchangeRateGraph {
    edges_by_source: HashMap<CurrencyId, Vec<ExchangeRateInfo>>,
    reference_time: Timestamp,
    cache: HashMap<(CurrencyId, CurrencyId), Rational>,
}

impl ExchangeRateGraph {
    /// Build a graph from observed edges, generating reverse edges
    pub fn new(edges: Vec<ExchangeRateInfo>, reference_time: Timestamp) -> Self {
        let mut edges_by_source: HashMap<CurrencyId, Vec<ExchangeRateInfo>> = HashMap::new();
        for edge in edges {
            let reverse = edge.reversed();
            edges_by_source.entry(edge.source_currency_id).or_default().push(edge);
            edges_by_source.entry(reverse.source_currency_id).or_default().push(reverse);
        }
        Self { edges_by_source, reference_time, cache: HashMap::new() }
    }

    /// Derive the conversion rate from one currency to another
    ///
    /// Identity derivations return one. Every simple path between the two
    /// currencies is enumerated; the winner has the lowest mean edge age,
    /// with equal means broken in favor of the path holding the single
    /// freshest observation. The winning path's edge ratios multiply into
    /// the returned rate, which is memoized per currency pair.
    pub fn derive_rate(
        &mut self,
        source: CurrencyId,
        destination: CurrencyId,
    ) -> ExchangeResult<Rational> {
        if source == destination {
            return Ok(Rational::one());
        }
        if let Some(rate) = self.cache.get(&(source, destination)) {
            debug!("rate cache hit for {} -> {}", source, destination);
            return Ok(rate.clone());
        }

        let paths = simple_paths(&self.edges_by_source, source, destination);
        if paths.is_empty() {
            return Err(ExchangeError::NoConversionPath { source, destination });
        }
        debug!("{} candidate path(s) from {} to {}", paths.len(), source, destination);

        let mut best: Option<(Rational, Timestamp, &Vec<&ExchangeRateInfo>)> = None;
        for path in &paths {
            let mean = self.mean_age(path)?;
            let freshest = newest_observation(path);
            let replace = match &best {
                None => true,
                Some((best_mean, best_freshest, _)) => match mean.cmp(best_mean) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Equal => freshest > *best_freshest,
                    std::cmp::Ordering::Greater => false,
                },
            };
            if replace {
                best = Some((mean, freshest, path));
            }
        }

        let (_, _, winner) = best.ok_or(ExchangeError::NoConversionPath { source, destination })?;
        let mut rate = Rational::one();
        for edge in winner {
            rate = rate.multiply(&edge.ratio()?);
        }
        let rate = rate.simplify();
        self.cache.insert((source, destination), rate.clone());
        Ok(rate)
    }

    /// Every known non-identity rate as `(source, destination, value)`
    ///
    /// Directly observed pairs that were never derived are derived on
    /// demand; previously derived pairs come from the cache. Results are
    /// ordered by currency pair.
    pub fn export_rates(&mut self) -> ExchangeResult<Vec<DerivedRate>> {
        let mut pairs: Vec<(CurrencyId, CurrencyId)> = Vec::new();
        for (source, edges) in &self.edges_by_source {
            for edge in edges {
                pairs.push((*source, edge.destination_currency_id));
            }
        }
        for (source, destination) in self.cache.keys() {
            pairs.push((*source, *destination));
        }

        let mut exported: BTreeMap<(CurrencyId, CurrencyId), Rational> = BTreeMap::new();
        for (source, destination) in pairs {
            if source == destination || exported.contains_key(&(source, destination)) {
                continue;
            }
            let value = self.derive_rate(source, destination)?;
            exported.insert((source, destination), value);
        }

        Ok(exported
            .into_iter()
            .map(|((source, destination), value)| DerivedRate { source, destination, value })
            .collect())
    }

    /// Mean age of a path's edges relative to the reference time, exact
    fn mean_age(&self, path: &[&ExchangeRateInfo]) -> ExchangeResult<Rational> {
        let total_seconds: i64 =
            path.iter().map(|e| (self.reference_time - e.observed_at).num_seconds()).sum();
        Ok(Rational::from_i64(total_seconds).divide(&Rational::from_i64(path.len() as i64))?)
    }
}

/// The most recent observation timestamp along a path
fn newest_observation(path: &[&ExchangeRateInfo]) -> Timestamp {
    path.iter()
        .map(|e| e.observed_at)
        .max()
        .unwrap_or_else(|| chrono::DateTime::UNIX_EPOCH.with_timezone(&summa_math::DEFAULT_TIMEZONE))
}

/// All simple paths between two currencies
///
/// Depth-first over the adjacency lists; a currency never repeats within a
/// path, which bounds the recursion depth at the distinct-currency count.
fn simple_paths<'a>(
    edges_by_source: &'a HashMap<CurrencyId, Vec<ExchangeRateInfo>>,
    source: CurrencyId,
    destination: CurrencyId,
) -> Vec<Vec<&'a ExchangeRateInfo>> {
    let mut found = Vec::new();
    let mut visited = HashSet::from([source]);
    let mut path = Vec::new();
    extend_path(edges_by_source, source, destination, &mut visited, &mut path, &mut found);
    found
}

fn extend_path<'a>(
    edges_by_source: &'a HashMap<CurrencyId, Vec<ExchangeRateInfo>>,
    current: CurrencyId,
    destination: CurrencyId,
    visited: &mut HashSet<CurrencyId>,
    path: &mut Vec<&'a ExchangeRateInfo>,
    found: &mut Vec<Vec<&'a ExchangeRateInfo>>,
) {
    let Some(outgoing) = edges_by_source.get(&current) else {
        return;
    };
    for edge in outgoing {
        let next = edge.destination_currency_id;
        if visited.contains(&next) {
            continue;
        }
        path.push(edge);
        if next == destination {
            found.push(path.clone());
        } else {
            visited.insert(next);
            extend_path(edges_by_source, next, destination, visited, path, found);
            visited.remove(&next);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use summa_math::day_start;

    fn ts(year: i32, month: u32, day: u32) -> Timestamp {
        day_start(NaiveDate::from_ymd_opt(year, month, day).unwrap()).unwrap()
    }

    fn edge(
        source: CurrencyId,
        destination: CurrencyId,
        rate: i64,
        observed_at: Timestamp,
    ) -> ExchangeRateInfo {
        ExchangeRateInfo::new(
            source,
            Rational::one(),
            destination,
            Rational::from_i64(rate),
            observed_at,
        )
        .unwrap()
    }

    #[test]
    fn test_identity_rate_is_one() {
        let mut graph = ExchangeRateGraph::new(vec![edge(1, 2, 2, ts(2023, 1, 1))], ts(2024, 1, 1));
        assert_eq!(graph.derive_rate(1, 1).unwrap(), Rational::one());
        assert_eq!(graph.derive_rate(2, 2).unwrap(), Rational::one());
    }

    #[test]
    fn test_direct_rate_and_reverse_consistency() {
        let observed = ts(2023, 1, 1);
        let mut graph = ExchangeRateGraph::new(vec![edge(1, 2, 2, observed)], ts(2024, 1, 1));
        let forward = graph.derive_rate(1, 2).unwrap();
        let backward = graph.derive_rate(2, 1).unwrap();
        assert_eq!(forward, Rational::from_i64(2));
        assert_eq!(backward, Rational::from_ratio(1, 2).unwrap());
        assert_eq!(forward.multiply(&backward).simplify(), Rational::one());
    }

    #[test]
    fn test_path_composition() {
        let observed = ts(2023, 1, 1);
        let mut graph = ExchangeRateGraph::new(
            vec![edge(1, 2, 2, observed), edge(2, 3, 2, observed)],
            ts(2024, 1, 1),
        );
        assert_eq!(graph.derive_rate(1, 3).unwrap(), Rational::from_i64(4));
    }

    #[test]
    fn test_no_conversion_path() {
        let mut graph = ExchangeRateGraph::new(vec![edge(1, 2, 2, ts(2023, 1, 1))], ts(2024, 1, 1));
        assert_eq!(
            graph.derive_rate(1, 9),
            Err(ExchangeError::NoConversionPath { source: 1, destination: 9 })
        );
    }

    #[test]
    fn test_fresher_mean_wins() {
        // Two direct observations of the same pair; only the newer one counts.
        let mut graph = ExchangeRateGraph::new(
            vec![edge(1, 2, 3, ts(2022, 1, 1)), edge(1, 2, 5, ts(2023, 6, 1))],
            ts(2024, 1, 1),
        );
        assert_eq!(graph.derive_rate(1, 2).unwrap(), Rational::from_i64(5));
    }

    #[test]
    fn test_equal_mean_tie_breaks_on_freshest_edge() {
        // Reference 2024-01-01. Path via 3: both edges 2023-01-01, ages
        // 365d + 365d, mean 365d, product 4. Path via 4: edges 2022-01-02
        // (729d) and 2023-12-31 (1d), same 365d mean, product 9. The second
        // path holds the strictly newest observation and must win.
        let mut graph = ExchangeRateGraph::new(
            vec![
                edge(1, 3, 2, ts(2023, 1, 1)),
                edge(3, 2, 2, ts(2023, 1, 1)),
                edge(1, 4, 3, ts(2022, 1, 2)),
                edge(4, 2, 3, ts(2023, 12, 31)),
            ],
            ts(2024, 1, 1),
        );
        assert_eq!(graph.derive_rate(1, 2).unwrap(), Rational::from_i64(9));
    }

    #[test]
    fn test_mean_not_sum_keeps_longer_fresh_chains() {
        // Direct edge is stale (300d old); the two-hop chain averages 10d.
        // Summing ages would pick the single stale edge; the mean must not.
        let mut graph = ExchangeRateGraph::new(
            vec![
                edge(1, 2, 7, ts(2023, 3, 7)),
                edge(1, 3, 2, ts(2023, 12, 22)),
                edge(3, 2, 2, ts(2023, 12, 22)),
            ],
            ts(2024, 1, 1),
        );
        assert_eq!(graph.derive_rate(1, 2).unwrap(), Rational::from_i64(4));
    }

    #[test]
    fn test_derivation_is_memoized() {
        let mut graph = ExchangeRateGraph::new(vec![edge(1, 2, 2, ts(2023, 1, 1))], ts(2024, 1, 1));
        let first = graph.derive_rate(1, 2).unwrap();
        let second = graph.derive_rate(1, 2).unwrap();
        assert_eq!(first, second);
        assert!(graph.cache.contains_key(&(1, 2)));
    }

    #[test]
    fn test_export_rates_covers_direct_and_generated_pairs() {
        let mut graph = ExchangeRateGraph::new(vec![edge(1, 2, 2, ts(2023, 1, 1))], ts(2024, 1, 1));
        let rates = graph.export_rates().unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0], DerivedRate { source: 1, destination: 2, value: Rational::from_i64(2) });
        assert_eq!(
            rates[1],
            DerivedRate { source: 2, destination: 1, value: Rational::from_ratio(1, 2).unwrap() }
        );
    }

    #[test]
    fn test_non_positive_edge_rejected() {
        assert_eq!(
            ExchangeRateInfo::new(1, Rational::zero(), 2, Rational::one(), ts(2023, 1, 1)),
            Err(ExchangeError::NonPositiveRate)
        );
    }
}
