use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Primary key of website and application versions (a positive small integer).
pub type VersionId = u16;

/// Unique slug identifying one registered view.
pub type ViewCode = String;

/// Shared deprecation behaviour of every versioned entity.
///
/// `deprecated_at` is the only stored state; everything else is derived at
/// evaluation time against an explicit `now`.
pub trait Deprecatable {
    fn deprecated_at(&self) -> Option<DateTime<Utc>>;

    /// True once the deprecation timestamp is set and strictly in the past.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.deprecated_at(), Some(at) if now > at)
    }

    /// "Shown as deprecated": a deprecation date was set, whether or not it passed.
    fn is_flagged_deprecated(&self) -> bool {
        self.deprecated_at().is_some()
    }
}

/// Free-text search over the fields an admin listing exposes.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    /// Case-insensitive substring match on any field; a blank query matches everything.
    fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Filter used by administrative listings, mirrors the "Is Deprecated" filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeprecatedFilter {
    Yes,
    No,
}

impl DeprecatedFilter {
    pub fn matches<T: Deprecatable>(&self, item: &T, now: DateTime<Utc>) -> bool {
        match self {
            DeprecatedFilter::Yes => matches!(item.deprecated_at(), Some(at) if at < now),
            DeprecatedFilter::No => match item.deprecated_at() {
                None => true,
                Some(at) => at > now,
            },
        }
    }
}

/// Requested deprecation state for a batch action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Deprecate,
    Republish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    struct Stamp(Option<DateTime<Utc>>);

    impl Deprecatable for Stamp {
        fn deprecated_at(&self) -> Option<DateTime<Utc>> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    struct Labels(&'static str, &'static str);

    impl Searchable for Labels {
        fn search_fields(&self) -> Vec<&str> {
            vec![self.0, self.1]
        }
    }

    #[test]
    fn search_ignores_case_and_blank_queries() {
        let labels = Labels("2.1.0", "Dark Mode");
        assert!(labels.matches_search("dark"));
        assert!(labels.matches_search(" MODE "));
        assert!(labels.matches_search("2.1"));
        assert!(labels.matches_search(""));
        assert!(!labels.matches_search("light"));
    }

    #[test]
    fn expiry_is_strictly_in_the_past() {
        assert!(!Stamp(None).is_expired(now()));
        assert!(!Stamp(Some(now())).is_expired(now()));
        assert!(!Stamp(Some(now() + Duration::days(1))).is_expired(now()));
        assert!(Stamp(Some(now() - Duration::seconds(1))).is_expired(now()));
    }

    #[test]
    fn flagged_ignores_time() {
        assert!(Stamp(Some(now() + Duration::days(30))).is_flagged_deprecated());
        assert!(!Stamp(None).is_flagged_deprecated());
    }

    #[test]
    fn deprecated_filter_splits_on_now() {
        let past = Stamp(Some(now() - Duration::days(1)));
        let future = Stamp(Some(now() + Duration::days(1)));
        let never = Stamp(None);

        assert!(DeprecatedFilter::Yes.matches(&past, now()));
        assert!(!DeprecatedFilter::Yes.matches(&future, now()));
        assert!(!DeprecatedFilter::Yes.matches(&never, now()));

        assert!(!DeprecatedFilter::No.matches(&past, now()));
        assert!(DeprecatedFilter::No.matches(&future, now()));
        assert!(DeprecatedFilter::No.matches(&never, now()));
    }
}
