use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::primitives::DateId;

/// One calendar day of the `dim_date` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DateDimension {
    pub date_id: DateId,
    pub date: NaiveDate,
    pub day: i32,
    pub month: i32,
    pub year: i32,
    pub day_name: String,
    pub month_name: String,
    pub is_weekend: bool,
    pub is_holiday: bool,
    pub quarter: i32,
}

impl DateDimension {
    pub fn for_date(date: NaiveDate) -> Self {
        let month = date.month() as i32;
        Self {
            date_id: DateId::from_date(date),
            date,
            day: date.day() as i32,
            month,
            year: date.year(),
            day_name: date.format("%A").to_string(),
            month_name: date.format("%B").to_string(),
            is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            is_holiday: false,
            quarter: (month - 1) / 3 + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_attributes() {
        let row = DateDimension::for_date(NaiveDate::from_ymd_opt(2025, 11, 15).unwrap());
        assert_eq!(row.date_id.as_i32(), 20251115);
        assert_eq!((row.day, row.month, row.year), (15, 11, 2025));
        assert_eq!(row.day_name, "Saturday");
        assert_eq!(row.month_name, "November");
        assert!(row.is_weekend);
        assert!(!row.is_holiday);
        assert_eq!(row.quarter, 4);
    }

    #[test]
    fn quarters_and_weekdays() {
        let quarter = |m| DateDimension::for_date(NaiveDate::from_ymd_opt(2024, m, 1).unwrap()).quarter;
        assert_eq!(
            (1..=12).map(quarter).collect::<Vec<_>>(),
            vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]
        );
        let monday = DateDimension::for_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(monday.day_name, "Monday");
        assert!(!monday.is_weekend);
    }
}
