use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::primitives::AccountId;

pub const DEFAULT_OWNER: &str = "unknown";
pub const DEFAULT_STATUS: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub account_id: AccountId,
    pub account_name: String,
    pub currency: String,
    pub status: String,
    pub owner_id: String,
    pub creation_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// Tracked attributes as resolved from one incoming record. `None` means the
/// record did not carry the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountAttributes {
    pub account_name: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub owner_id: Option<String>,
}

impl Account {
    pub fn new(
        account_id: AccountId,
        attributes: &AccountAttributes,
        default_currency: &str,
        creation_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id,
            account_name: attributes
                .account_name
                .clone()
                .unwrap_or_else(|| format!("Account {account_id}")),
            currency: attributes
                .currency
                .clone()
                .unwrap_or_else(|| default_currency.to_string()),
            status: attributes
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            owner_id: attributes
                .owner_id
                .clone()
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            creation_date,
            updated_at: now,
        }
    }

    /// Applies every supplied attribute that differs from the stored one.
    /// Returns whether anything changed; `updated_at` only moves if so.
    pub fn apply(&mut self, attributes: &AccountAttributes, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        changed |= set_if_differs(&mut self.account_name, &attributes.account_name);
        changed |= set_if_differs(&mut self.currency, &attributes.currency);
        changed |= set_if_differs(&mut self.status, &attributes.status);
        changed |= set_if_differs(&mut self.owner_id, &attributes.owner_id);
        if changed {
            self.updated_at = now;
        }
        changed
    }
}

fn set_if_differs(current: &mut String, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if value != current => {
            *current = value.clone();
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()
    }

    #[test]
    fn new_account_defaults() {
        let now = Utc::now();
        let account = Account::new(
            AccountId::from(42),
            &AccountAttributes::default(),
            "BYN",
            day(),
            now,
        );
        assert_eq!(account.account_name, "Account 42");
        assert_eq!(account.currency, "BYN");
        assert_eq!(account.status, "active");
        assert_eq!(account.owner_id, "unknown");
        assert_eq!(account.creation_date, day());
    }

    #[test]
    fn apply_is_a_noop_for_identical_values() {
        let created = Utc::now();
        let attributes = AccountAttributes {
            account_name: Some("Main".to_string()),
            currency: Some("USD".to_string()),
            ..Default::default()
        };
        let mut account = Account::new(AccountId::from(1), &attributes, "BYN", day(), created);
        let later = created + chrono::Duration::seconds(5);

        assert!(!account.apply(&attributes, later));
        assert!(!account.apply(&AccountAttributes::default(), later));
        assert_eq!(account.updated_at, created);

        let renamed = AccountAttributes {
            account_name: Some("Savings".to_string()),
            ..Default::default()
        };
        assert!(account.apply(&renamed, later));
        assert_eq!(account.account_name, "Savings");
        assert_eq!(account.currency, "USD");
        assert_eq!(account.updated_at, later);
    }
}
