// Grouping key derivation
// Two observations share an aggregate record when their keys are equal
//
// Numan Thabit 2025 Nov

use crate::aggregate::accumulator::ObservationKind;
use crate::params::{Params, Severity};
use std::fmt;

/// Canonical string identifying one (tag, parameters) series.
///
/// The parameter map is serialized through its ordered backing map, so key
/// order never influences the result. Whole-number floats are keyed as the
/// equal integer, so `1.0` and `1` land in the same series. Severity and observation kind are part
/// of the key: a `warn` counter and an `info` counter on the same tag stay
/// separate records, as do a counter and a measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingKey(String);

impl GroupingKey {
    pub fn derive(tag: &str, params: &Params, severity: Severity, kind: ObservationKind) -> Self {
        let params = params.canonical();
        let encoded = serde_json::to_string(&(tag, &params, severity, kind.as_str()))
            // unreachable for string-keyed scalar maps
            .unwrap_or_else(|_| format!("{tag}|{params:?}|{severity}|{}", kind.as_str()));
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tag: &str, params: Params) -> GroupingKey {
        GroupingKey::derive(tag, &params, Severity::Info, ObservationKind::Value)
    }

    #[test]
    fn parameter_order_is_irrelevant() {
        let a = key("t", Params::new().with("a", 1).with("b", 2));
        let b = key("t", Params::new().with("b", 2).with("a", 1));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_parameters_have_their_own_stable_key() {
        let empty = key("t", Params::new());
        assert_eq!(empty, key("t", Params::default()));
        assert_ne!(empty, key("t", Params::new().with("a", 1)));
    }

    #[test]
    fn any_difference_changes_the_key() {
        let base = key("t", Params::new().with("a", 1));
        assert_ne!(base, key("u", Params::new().with("a", 1)));
        assert_ne!(base, key("t", Params::new().with("a", 2)));
        assert_ne!(base, key("t", Params::new().with("b", 1)));
        assert_ne!(base, key("t", Params::new().with("a", "1")));
    }

    #[test]
    fn whole_float_and_integer_share_a_key() {
        assert_eq!(
            key("t", Params::new().with("a", 1.0)),
            key("t", Params::new().with("a", 1))
        );
        assert_ne!(
            key("t", Params::new().with("a", 1.5)),
            key("t", Params::new().with("a", 1))
        );
    }

    #[test]
    fn severity_and_kind_separate_series() {
        let params = Params::new();
        let info = GroupingKey::derive("t", &params, Severity::Info, ObservationKind::Event);
        let warn = GroupingKey::derive("t", &params, Severity::Warn, ObservationKind::Event);
        let value = GroupingKey::derive("t", &params, Severity::Info, ObservationKind::Value);
        assert_ne!(info, warn);
        assert_ne!(info, value);
    }
}
