//! Compiles the operator's `--abort-condition` occurrences into a
//! DNF formula and checks it against the abort-state map on every
//! polling tick (spec.md §4.4).

mod grammar;
mod predicate;

pub use predicate::{Direction, Predicate, SignalPolicy};

use chatdl_core::state::AbortState;
use chatdl_core::{Clock, Error};
use std::collections::HashSet;
use std::path::Path;

/// A compiled abort formula: `condition_groups` are ORed, each
/// group's predicates are ANDed; `signal_overrides` are the
/// `<signal_name>:{default|enable|disable}` directives extracted out
/// for the Signal Router (they are never evaluated as conditions).
#[derive(Debug, Clone, Default)]
pub struct Formula {
    condition_groups: Vec<Vec<Predicate>>,
    signal_overrides: Vec<(String, SignalPolicy)>,
}

impl Formula {
    /// Parses one `Formula` from the operator's repeated
    /// `--abort-condition` occurrences, each a single condition
    /// group.
    pub fn parse(occurrences: &[String]) -> Result<Formula, Error> {
        let mut condition_groups = Vec::new();
        let mut signal_overrides = Vec::new();

        for occurrence in occurrences {
            let segments = grammar::split_predicates(occurrence)?;
            let mut group = Vec::with_capacity(segments.len());
            for segment in &segments {
                group.push(Predicate::parse(segment)?);
            }

            let signal_count = group.iter().filter(|p| p.is_signal_directive()).count();
            if signal_count > 0 && (signal_count > 1 || group.len() > 1) {
                return Err(Error::Parsing {
                    what: "abort-condition group".to_string(),
                    detail: "a signal directive must be the sole entry in its group".to_string(),
                });
            }
            if signal_count == 1 {
                if let Predicate::SignalDirective { signal, policy } = &group[0] {
                    signal_overrides.push((signal.clone(), *policy));
                }
                continue;
            }

            let mut seen = HashSet::new();
            for predicate in &group {
                if !seen.insert(predicate.identity()) {
                    return Err(Error::Parsing {
                        what: "abort-condition group".to_string(),
                        detail: format!("duplicate predicate {} in group", predicate.identity()),
                    });
                }
            }
            condition_groups.push(group);
        }

        Ok(Formula {
            condition_groups,
            signal_overrides,
        })
    }

    pub fn signal_overrides(&self) -> &[(String, SignalPolicy)] {
        &self.signal_overrides
    }

    /// Evaluates every group; returns `AbortConditionsSatisfied` with
    /// the joined messages of the first group whose predicates are
    /// all true, honoring `file_exists`'s injected host check so
    /// tests can fake the filesystem.
    pub fn check(
        &self,
        state: &AbortState,
        clock: &dyn Clock,
        file_exists: &dyn Fn(&Path) -> bool,
    ) -> Option<Error> {
        for group in &self.condition_groups {
            let mut messages = Vec::with_capacity(group.len());
            let mut all_true = true;
            for predicate in group {
                match predicate.evaluate(state, clock, file_exists) {
                    Some(message) => messages.push(message),
                    None => {
                        all_true = false;
                        break;
                    }
                }
            }
            if all_true && !messages.is_empty() {
                return Some(Error::AbortConditionsSatisfied(messages.join("; ")));
            }
        }
        None
    }
}

/// Default `file_exists` host check (`std::path::Path::exists`).
pub fn host_file_exists(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdl_core::RealClock;
    use serde_json::json;

    #[test]
    fn single_predicate_group_checks_true() {
        let formula = Formula::parse(&["file_exists:/tmp/nonexistent-chatdl-test".to_string()])
            .unwrap();
        let state = AbortState::new();
        let err = formula.check(&state, &RealClock, &|_| true);
        assert!(matches!(err, Some(Error::AbortConditionsSatisfied(_))));
    }

    #[test]
    fn group_is_and_across_predicates() {
        let formula = Formula::parse(&[
            "file_exists:/a & changed_scheduled_start_time:%Y-%m-%d".to_string(),
        ])
        .unwrap();
        let mut state = AbortState::new();
        // file_exists true, but scheduled-start-time state absent.
        let err = formula.check(&state, &RealClock, &|_| true);
        assert!(err.is_none());

        state.set("orig_scheduled_start_time", json!("2024-01-01T00:00:00Z"));
        state.set("scheduled_start_time", json!("2024-01-02T00:00:00Z"));
        let err = formula.check(&state, &RealClock, &|_| true);
        assert!(matches!(err, Some(Error::AbortConditionsSatisfied(_))));
    }

    #[test]
    fn groups_are_ored_across_occurrences() {
        let formula = Formula::parse(&[
            "file_exists:/only-in-group-a".to_string(),
            "file_exists:/only-in-group-b".to_string(),
        ])
        .unwrap();
        let state = AbortState::new();
        let err = formula.check(&state, &RealClock, &|p| {
            p.to_string_lossy().contains("group-b")
        });
        assert!(matches!(err, Some(Error::AbortConditionsSatisfied(_))));
    }

    #[test]
    fn signal_directive_is_routed_not_checked() {
        let formula = Formula::parse(&["SIGINT:disable".to_string()]).unwrap();
        assert_eq!(formula.signal_overrides().len(), 1);
        assert_eq!(formula.signal_overrides()[0].0, "SIGINT");
        let state = AbortState::new();
        assert!(formula.check(&state, &RealClock, &|_| true).is_none());
    }

    #[test]
    fn signal_directive_rejected_when_grouped() {
        let result = Formula::parse(&["SIGINT:disable & file_exists:/a".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_predicate_identity_in_group_is_rejected() {
        let result = Formula::parse(&[
            "changed_scheduled_start_time:%Y & changed_scheduled_start_time:%m".to_string(),
        ]);
        assert!(result.is_err());
    }
}
