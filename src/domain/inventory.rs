//! Copy-counter rules for loan writes
//!
//! Every insert, update or delete of a loan is reduced to a list of
//! [`CounterEffect`]s on `books.available_copies`. The loan service applies
//! them inside the same transaction as the loan write.

use crate::models::LoanStatus;

/// The parts of a loan row that drive the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanSide {
    pub book_id: i32,
    pub status: LoanStatus,
}

impl LoanSide {
    pub fn new(book_id: i32, status: LoanStatus) -> Self {
        Self { book_id, status }
    }

    fn on_loan(&self) -> bool {
        self.status == LoanStatus::OnLoan
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterEffect {
    /// Take one copy off the shelf; fails when none is available.
    Acquire { book_id: i32 },
    /// Put one copy back on the shelf.
    Release { book_id: i32 },
}

impl CounterEffect {
    pub fn book_id(&self) -> i32 {
        match self {
            CounterEffect::Acquire { book_id } | CounterEffect::Release { book_id } => *book_id,
        }
    }

    pub fn delta(&self) -> i32 {
        match self {
            CounterEffect::Acquire { .. } => -1,
            CounterEffect::Release { .. } => 1,
        }
    }
}

/// Counter effects of moving a loan row from `old` to `new`.
///
/// `old == None` is an insert, `new == None` a delete. Releases always come
/// before acquires so that a failed acquire leaves nothing half-applied
/// once the transaction rolls back.
///
/// Status pairs involving `overdue` never move the counter, including
/// `overdue -> returned`.
pub fn counter_effects(old: Option<LoanSide>, new: Option<LoanSide>) -> Vec<CounterEffect> {
    match (old, new) {
        (None, None) => Vec::new(),
        (None, Some(new)) => {
            if new.on_loan() {
                vec![CounterEffect::Acquire {
                    book_id: new.book_id,
                }]
            } else {
                Vec::new()
            }
        }
        (Some(old), None) => {
            if old.on_loan() {
                vec![CounterEffect::Release {
                    book_id: old.book_id,
                }]
            } else {
                Vec::new()
            }
        }
        (Some(old), Some(new)) if old.book_id != new.book_id => {
            let mut effects = Vec::with_capacity(2);
            if old.on_loan() {
                effects.push(CounterEffect::Release {
                    book_id: old.book_id,
                });
            }
            if new.on_loan() {
                effects.push(CounterEffect::Acquire {
                    book_id: new.book_id,
                });
            }
            effects
        }
        (Some(old), Some(new)) => match (old.status, new.status) {
            (LoanStatus::OnLoan, LoanStatus::Returned) => vec![CounterEffect::Release {
                book_id: old.book_id,
            }],
            (LoanStatus::Returned, LoanStatus::OnLoan) => vec![CounterEffect::Acquire {
                book_id: new.book_id,
            }],
            _ => Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    const ON_LOAN: LoanStatus = LoanStatus::OnLoan;
    const RETURNED: LoanStatus = LoanStatus::Returned;
    const OVERDUE: LoanStatus = LoanStatus::Overdue;

    fn side(book_id: i32, status: LoanStatus) -> Option<LoanSide> {
        Some(LoanSide::new(book_id, status))
    }

    #[test]
    fn insert_on_loan_acquires() {
        assert_eq!(
            counter_effects(None, side(1, ON_LOAN)),
            vec![CounterEffect::Acquire { book_id: 1 }]
        );
        assert!(counter_effects(None, side(1, RETURNED)).is_empty());
        assert!(counter_effects(None, side(1, OVERDUE)).is_empty());
    }

    #[test]
    fn delete_only_releases_on_loan_rows() {
        assert_eq!(
            counter_effects(side(3, ON_LOAN), None),
            vec![CounterEffect::Release { book_id: 3 }]
        );
        assert!(counter_effects(side(3, RETURNED), None).is_empty());
        assert!(counter_effects(side(3, OVERDUE), None).is_empty());
    }

    #[test]
    fn status_changes_on_same_book() {
        assert_eq!(
            counter_effects(side(1, ON_LOAN), side(1, RETURNED)),
            vec![CounterEffect::Release { book_id: 1 }]
        );
        assert_eq!(
            counter_effects(side(1, RETURNED), side(1, ON_LOAN)),
            vec![CounterEffect::Acquire { book_id: 1 }]
        );
        assert!(counter_effects(side(1, ON_LOAN), side(1, OVERDUE)).is_empty());
        assert!(counter_effects(side(1, OVERDUE), side(1, RETURNED)).is_empty());
        assert!(counter_effects(side(1, OVERDUE), side(1, ON_LOAN)).is_empty());
        assert!(counter_effects(side(1, ON_LOAN), side(1, ON_LOAN)).is_empty());
    }

    #[test]
    fn moving_an_active_loan_releases_then_acquires() {
        assert_eq!(
            counter_effects(side(1, ON_LOAN), side(2, ON_LOAN)),
            vec![
                CounterEffect::Release { book_id: 1 },
                CounterEffect::Acquire { book_id: 2 },
            ]
        );
        assert_eq!(
            counter_effects(side(1, RETURNED), side(2, ON_LOAN)),
            vec![CounterEffect::Acquire { book_id: 2 }]
        );
        assert!(counter_effects(side(1, OVERDUE), side(2, RETURNED)).is_empty());
    }

    fn status() -> impl Strategy<Value = LoanStatus> {
        prop_oneof![Just(ON_LOAN), Just(RETURNED), Just(OVERDUE)]
    }

    fn loan_side() -> impl Strategy<Value = Option<LoanSide>> {
        prop::option::of((1i32..4, status()).prop_map(|(b, s)| LoanSide::new(b, s)))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: no transition moves any single book's counter by more
        /// than one copy, and copies are only taken for rows entering
        /// `on_loan` and only returned for rows leaving it.
        #[test]
        fn effects_stay_within_one_copy_per_book(old in loan_side(), new in loan_side()) {
            let effects = counter_effects(old, new);

            let mut net: HashMap<i32, i32> = HashMap::new();
            for effect in &effects {
                *net.entry(effect.book_id()).or_insert(0) += effect.delta();
            }
            for delta in net.values() {
                prop_assert!((-1..=1).contains(delta));
            }

            for effect in &effects {
                match effect {
                    CounterEffect::Acquire { book_id } => {
                        let new = new.expect("acquire needs a new row");
                        prop_assert_eq!(new.status, LoanStatus::OnLoan);
                        prop_assert_eq!(new.book_id, *book_id);
                    }
                    CounterEffect::Release { book_id } => {
                        let old = old.expect("release needs an old row");
                        prop_assert_eq!(old.status, LoanStatus::OnLoan);
                        prop_assert_eq!(old.book_id, *book_id);
                    }
                }
            }

            let first_acquire = effects
                .iter()
                .position(|e| matches!(e, CounterEffect::Acquire { .. }));
            let last_release = effects
                .iter()
                .rposition(|e| matches!(e, CounterEffect::Release { .. }));
            if let (Some(a), Some(r)) = (first_acquire, last_release) {
                prop_assert!(r < a);
            }
        }

        /// Property: a row that stays `on_loan` on the same book, or never
        /// touches `on_loan`, leaves the counter alone.
        #[test]
        fn steady_rows_have_no_effect(book in 1i32..4, s in status()) {
            prop_assert!(counter_effects(Some(LoanSide::new(book, s)), Some(LoanSide::new(book, s))).is_empty());
        }
    }
}
