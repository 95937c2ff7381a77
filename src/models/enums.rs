use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(SubjectKind {
    Service => "service",
    Disease => "disease",
});

str_enum!(Granularity {
    Daily => "daily",
    Monthly => "monthly",
});

str_enum!(EventStatus {
    Pending => "pending",
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
    Confirmed => "confirmed",
    Recovered => "recovered",
    RuledOut => "ruled_out",
});

str_enum!(DataQuality {
    Insufficient => "insufficient",
    Moderate => "moderate",
    High => "high",
});

str_enum!(AccuracyInterpretation {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

impl Granularity {
    /// Number of steps in one repeating cycle: a week of days, a year of months.
    pub fn seasonal_period(&self) -> usize {
        match self {
            Self::Daily => 7,
            Self::Monthly => 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn round_trips_through_db_strings() {
        assert_eq!(EventStatus::from_str("no_show").unwrap(), EventStatus::NoShow);
        assert_eq!(EventStatus::NoShow.as_str(), "no_show");
        assert_eq!(Granularity::from_str("monthly").unwrap(), Granularity::Monthly);
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = SubjectKind::from_str("barangay").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_db_strings() {
        let json = serde_json::to_string(&AccuracyInterpretation::Excellent).unwrap();
        assert_eq!(json, "\"excellent\"");
        let status: EventStatus = serde_json::from_str("\"ruled_out\"").unwrap();
        assert_eq!(status, EventStatus::RuledOut);
    }

    #[test]
    fn seasonal_period_by_granularity() {
        assert_eq!(Granularity::Daily.seasonal_period(), 7);
        assert_eq!(Granularity::Monthly.seasonal_period(), 12);
    }
}
