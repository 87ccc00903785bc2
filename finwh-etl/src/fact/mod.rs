//! Per (entity, date) fact rows.
//!
//! [FactWriter] is the in-transaction view of one day's fact rows for the
//! entities of a batch. It decides create / update / no-op against the
//! prefetched rows and buffers the writes until the next flush.
mod account_balance;
mod loan_balance;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::staging::{Change, Staged, WorkingSet};

pub use account_balance::*;
pub use loan_balance::*;

/// Source and reporting currency value of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactAmounts {
    pub amount: Decimal,
    pub amount_reporting: Decimal,
}

pub struct FactWriter<K> {
    facts: WorkingSet<K, FactAmounts>,
}

impl<K: Ord + Clone> FactWriter<K> {
    pub fn new(existing: impl IntoIterator<Item = (K, FactAmounts)>) -> Self {
        Self {
            facts: WorkingSet::with_known(existing),
        }
    }

    /// Amounts must already be normalised to the reporting currency.
    pub fn upsert_fact(&mut self, key: K, amounts: FactAmounts) -> Change {
        match self.facts.get(&key) {
            None => {
                self.facts.stage_insert(key, amounts);
                Change::Created
            }
            Some(current) if *current == amounts => Change::Unchanged,
            Some(_) => {
                self.facts.stage_update(key, amounts);
                Change::Updated
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&FactAmounts> {
        self.facts.get(key)
    }

    pub fn has_pending(&self) -> bool {
        self.facts.has_pending()
    }

    pub fn take_staged(&mut self) -> Staged<K, FactAmounts> {
        self.facts.take_staged()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn amounts(amount: Decimal) -> FactAmounts {
        FactAmounts {
            amount,
            amount_reporting: amount * dec!(2),
        }
    }

    #[test]
    fn create_then_update_then_noop() {
        let mut writer = FactWriter::<i64>::new(vec![(1, amounts(dec!(5)))]);

        assert_eq!(writer.upsert_fact(2, amounts(dec!(1))), Change::Created);
        assert_eq!(writer.upsert_fact(1, amounts(dec!(5.0))), Change::Unchanged);
        assert_eq!(writer.upsert_fact(1, amounts(dec!(6))), Change::Updated);

        let staged = writer.take_staged();
        assert_eq!(staged.inserts, vec![(2, amounts(dec!(1)))]);
        assert_eq!(staged.updates, vec![(1, amounts(dec!(6)))]);
        assert!(!writer.has_pending());
        assert_eq!(writer.upsert_fact(1, amounts(dec!(6))), Change::Unchanged);
    }
}
