//! Resolution strategy execution.
//!
//! [`resolve`] is a pure function from (group, members, strategy, dry-run)
//! to a [`ResolutionPlan`] — it never performs I/O. The write adapter owns
//! persistence and must honor the plan's `applied` annotation.

use serde_json::{Map, Value};

use super::types::{Action, Candidate, DuplicateGroup, ResolutionPlan, Strategy};

/// Produce the change plan for one frozen duplicate group.
///
/// `members` must be the candidates for exactly the records in
/// `group.members` (any order).
pub fn resolve(
    group: &DuplicateGroup,
    members: &[Candidate<'_>],
    strategy: Strategy,
    dry_run: bool,
) -> ResolutionPlan {
    let actions = match strategy {
        Strategy::KeepLatest | Strategy::Merge => {
            let mut actions = vec![Action::Keep {
                id: group.representative.clone(),
            }];
            for id in &group.members {
                if *id == group.representative {
                    continue;
                }
                actions.push(match strategy {
                    Strategy::KeepLatest => Action::Delete { id: id.clone() },
                    _ => Action::MergeInto {
                        id: id.clone(),
                        target: group.representative.clone(),
                    },
                });
            }
            actions
        }
        Strategy::FlagOnly => group
            .members
            .iter()
            .map(|id| Action::Flag { id: id.clone() })
            .collect(),
    };

    let merged_metadata = match strategy {
        Strategy::Merge => Some(merge_metadata(group, members)),
        _ => None,
    };

    ResolutionPlan {
        actions,
        justification: justification(group, strategy),
        merged_metadata,
        applied: !dry_run,
    }
}

/// Union of member metadata: members are folded oldest to newest so later
/// timestamps win on key conflicts; array values are concatenated with
/// duplicates removed. Provenance (`merged_from`) is always recorded so a
/// merge can be traced back or undone.
fn merge_metadata(group: &DuplicateGroup, members: &[Candidate<'_>]) -> Value {
    let mut ordered: Vec<&Candidate<'_>> = members.iter().collect();
    ordered.sort_by(|x, y| {
        x.created
            .cmp(&y.created)
            .then_with(|| x.record.id.cmp(&y.record.id))
    });

    let mut merged = Map::new();
    for candidate in ordered {
        let Some(Value::Object(fields)) = &candidate.record.metadata else {
            continue;
        };
        for (key, value) in fields {
            match (merged.get_mut(key), value) {
                (Some(Value::Array(existing)), Value::Array(incoming)) => {
                    for item in incoming {
                        if !existing.contains(item) {
                            existing.push(item.clone());
                        }
                    }
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    let mut folded: Vec<String> = group
        .members
        .iter()
        .filter(|id| **id != group.representative)
        .cloned()
        .collect();
    folded.sort();
    merged.insert(
        "merged_from".to_string(),
        Value::Array(folded.into_iter().map(Value::String).collect()),
    );

    Value::Object(merged)
}

fn justification(group: &DuplicateGroup, strategy: Strategy) -> String {
    let max_composite = group
        .scores
        .iter()
        .map(|s| s.composite)
        .fold(0.0_f64, f64::max);
    format!(
        "{} group of {} records linked by {} above-threshold score(s), max composite {:.3}; representative {}",
        strategy,
        group.members.len(),
        group.scores.len(),
        max_composite,
        group.representative,
    )
}

/// Reject plans whose merge target is itself deleted or merged away in the
/// same plan. Cannot occur for plans built from disjoint groups, but the
/// invariant is checked before anything reaches the write adapter.
pub fn conflict(plan: &ResolutionPlan) -> Option<String> {
    for action in &plan.actions {
        if let Action::MergeInto { id, target } = action {
            let target_removed = plan.actions.iter().any(|other| match other {
                Action::Delete { id: other_id } => other_id == target,
                Action::MergeInto { id: other_id, .. } => other_id == target,
                _ => false,
            });
            if target_removed {
                return Some(format!(
                    "record {id} merges into {target}, which is removed by the same plan"
                ));
            }
        }
    }
    None
}
