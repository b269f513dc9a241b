use crate::error::ModelError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Scope of a reconciliation run. Absent fields are unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilters {
    pub scouter_name: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl JobFilters {
    pub fn for_scouter(name: impl Into<String>) -> Self {
        Self {
            scouter_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to)
            && from > to
        {
            return Err(ModelError::InvalidFilters(format!(
                "dateFrom {from} is after dateTo {to}"
            )));
        }
        if let Some(name) = &self.scouter_name
            && name.trim().is_empty()
        {
            return Err(ModelError::InvalidFilters(
                "scouterName must not be blank".into(),
            ));
        }
        Ok(())
    }

    /// Whether a date falls inside the closed `[date_from, date_to]` range.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }

    pub fn matches_scouter(&self, name: Option<&str>) -> bool {
        match &self.scouter_name {
            None => true,
            Some(expected) => name.is_some_and(|n| n.trim().eq_ignore_ascii_case(expected.trim())),
        }
    }

    /// Two scopes overlap when they could select the same record.
    pub fn overlaps(&self, other: &JobFilters) -> bool {
        let scouters_meet = match (&self.scouter_name, &other.scouter_name) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => true,
        };

        let starts_before_other_ends = match (self.date_from, other.date_to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        };
        let other_starts_before_end = match (other.date_from, self.date_to) {
            (Some(from), Some(to)) => from <= to,
            _ => true,
        };

        scouters_meet && starts_before_other_ends && other_starts_before_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn different_scouters_never_overlap() {
        let a = JobFilters::for_scouter("anna");
        let b = JobFilters::for_scouter("boris");
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&JobFilters::default()));
    }

    #[test]
    fn disjoint_date_ranges_do_not_overlap() {
        let jan = JobFilters::default().between(Some(d(2024, 1, 1)), Some(d(2024, 1, 31)));
        let feb = JobFilters::default().between(Some(d(2024, 2, 1)), Some(d(2024, 2, 29)));
        let open = JobFilters::default().between(Some(d(2024, 1, 31)), None);
        assert!(!jan.overlaps(&feb));
        assert!(jan.overlaps(&open));
        assert!(feb.overlaps(&open));
    }

    #[test]
    fn rejects_inverted_range() {
        let bad = JobFilters::default().between(Some(d(2024, 2, 1)), Some(d(2024, 1, 1)));
        assert!(bad.validate().is_err());
        assert!(JobFilters::default().validate().is_ok());
    }

    #[test]
    fn contains_date_uses_closed_range() {
        let f = JobFilters::default().between(Some(d(2024, 1, 1)), Some(d(2024, 1, 31)));
        assert!(f.contains_date(d(2024, 1, 1)));
        assert!(f.contains_date(d(2024, 1, 31)));
        assert!(!f.contains_date(d(2024, 2, 1)));
    }
}
