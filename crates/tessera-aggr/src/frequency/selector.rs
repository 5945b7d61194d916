#![forbid(unsafe_code)]

use crate::config::StrategyOverride;
use crate::error::{AggrError, AggrResult};
use tessera_columnar::{ValueKind, ValueRange};

/// Largest dense counter table a frequency aggregate allocates.
pub const MAX_TABLE_CELLS: usize = 1 << 31;

/// How value frequencies are counted per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One counter per (group, value ordinal) in `range`.
    Table { range: ValueRange },
    /// An ordered map per group from value to count.
    Set,
}

/// Picks the counting strategy for `n` elements of kind `kind` with countable
/// range `range`, spread over `groups` groups.
///
/// A table costs `v·p` counters (v values, p groups) and one pass; a set costs
/// a map insertion per element. The table wins while `v ≤ n / p`. Bit values
/// with at most four patterns always count in a table.
pub fn select_strategy(
    operator: &str,
    n: usize,
    range: Option<ValueRange>,
    kind: ValueKind,
    groups: usize,
    strategy: StrategyOverride,
) -> AggrResult<Strategy> {
    let p = groups.max(1);
    let cells = range.map(|r| r.len().checked_mul(p));

    let chosen = match (strategy, range, cells) {
        (StrategyOverride::Set, _, _) => Strategy::Set,
        (StrategyOverride::Table, None, _) => {
            return Err(AggrError::UnboundedValues {
                operator: operator.to_string(),
            })
        }
        (StrategyOverride::Table, Some(range), Some(Some(cells))) if cells <= MAX_TABLE_CELLS => {
            Strategy::Table { range }
        }
        (StrategyOverride::Table, Some(range), _) => {
            return Err(AggrError::capacity(
                operator,
                format!("counter table of {} values by {p} groups", range.len()),
                MAX_TABLE_CELLS as u64,
            ))
        }
        (StrategyOverride::Auto, Some(range), Some(Some(cells))) if cells <= MAX_TABLE_CELLS => {
            let tiny = matches!(kind, ValueKind::Bits(1 | 2));
            if tiny || range.len() <= n / p {
                Strategy::Table { range }
            } else {
                Strategy::Set
            }
        }
        (StrategyOverride::Auto, _, _) => Strategy::Set,
    };

    log::debug!(
        "{operator}: {chosen:?} strategy (n={n}, v={}, p={groups})",
        range.map_or_else(|| "unbounded".to_string(), |r| r.len().to_string()),
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_columnar::ScalarKind;

    const INT: ValueKind = ValueKind::Scalar(ScalarKind::Int32);

    #[test]
    fn crossover_is_at_n_over_p() {
        let r = Some(ValueRange::new(0, 10));
        let auto = StrategyOverride::Auto;
        assert!(matches!(select_strategy("modus", 100, r, INT, 10, auto).unwrap(), Strategy::Table { .. }));
        assert_eq!(select_strategy("modus", 99, r, INT, 10, auto).unwrap(), Strategy::Set);
    }

    #[test]
    fn unbounded_values_count_in_a_set() {
        let kind = ValueKind::Scalar(ScalarKind::Float64);
        let auto = StrategyOverride::Auto;
        assert_eq!(select_strategy("modus", 1000, None, kind, 1, auto).unwrap(), Strategy::Set);
    }

    #[test]
    fn small_bit_values_always_use_a_table() {
        let r = Some(ValueRange::new(0, 4));
        let auto = StrategyOverride::Auto;
        let chosen = select_strategy("modus", 1, r, ValueKind::Bits(2), 1000, auto).unwrap();
        assert_eq!(chosen, Strategy::Table { range: ValueRange::new(0, 4) });
    }

    #[test]
    fn forced_table_needs_a_bounded_range() {
        let err = select_strategy("modus", 5, None, INT, 1, StrategyOverride::Table).unwrap_err();
        assert!(matches!(err, AggrError::UnboundedValues { .. }));
        assert!(err.is_precondition());

        let huge = Some(ValueRange::new(0, 1 << 40));
        let err = select_strategy("modus", 5, huge, INT, 2, StrategyOverride::Table).unwrap_err();
        assert!(matches!(err, AggrError::Capacity { .. }));
    }

    #[test]
    fn forced_set_ignores_the_cost_model() {
        let r = Some(ValueRange::new(0, 2));
        let chosen = select_strategy("modus", 1000, r, ValueKind::Bits(1), 1, StrategyOverride::Set).unwrap();
        assert_eq!(chosen, Strategy::Set);
    }
}
