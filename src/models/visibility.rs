use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conditional-visibility rule attached to a session.
///
/// The typed `Conditional` shape is the one the engine understands and
/// remaps during duplication. Any other payload found in the stored column
/// is carried as `Legacy` and must survive storage and cloning verbatim —
/// it is never evaluated, never remapped, and never fails an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibilityRule {
    Conditional(ConditionalVisibility),
    Legacy(serde_json::Value),
}

/// "Visible iff the recorded answer to `question_id` is among
/// `accepted_values`" — or the complement when `negate` is set.
///
/// The triggering question must belong to the same questionnaire as the
/// session carrying the rule; it is a weak reference by id, not an
/// ownership edge. Unknown fields demote the payload to `Legacy` so no
/// part of it is silently dropped on rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalVisibility {
    pub question_id: Uuid,
    pub accepted_values: Vec<serde_json::Value>,
    #[serde(default)]
    pub negate: bool,
}

impl VisibilityRule {
    /// The triggering question, when the rule is in the typed shape.
    pub fn trigger_question(&self) -> Option<Uuid> {
        match self {
            VisibilityRule::Conditional(c) => Some(c.question_id),
            VisibilityRule::Legacy(_) => None,
        }
    }

    /// Rewrite the triggering-question reference through an old→new id map.
    ///
    /// References with no entry in the map are left as found; legacy
    /// payloads are returned unchanged.
    pub fn remapped(&self, question_ids: &HashMap<Uuid, Uuid>) -> VisibilityRule {
        match self {
            VisibilityRule::Conditional(c) => match question_ids.get(&c.question_id) {
                Some(new_id) => VisibilityRule::Conditional(ConditionalVisibility {
                    question_id: *new_id,
                    accepted_values: c.accepted_values.clone(),
                    negate: c.negate,
                }),
                None => self.clone(),
            },
            VisibilityRule::Legacy(_) => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed_rule(question_id: Uuid) -> VisibilityRule {
        VisibilityRule::Conditional(ConditionalVisibility {
            question_id,
            accepted_values: vec![serde_json::json!("yes")],
            negate: false,
        })
    }

    #[test]
    fn typed_shape_round_trips() {
        let id = Uuid::new_v4();
        let rule = typed_rule(id);
        let json = serde_json::to_string(&rule).unwrap();
        let back: VisibilityRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
        assert_eq!(back.trigger_question(), Some(id));
    }

    #[test]
    fn negate_defaults_to_false() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"question_id": "{id}", "accepted_values": [1, 2]}}"#);
        let rule: VisibilityRule = serde_json::from_str(&json).unwrap();
        match rule {
            VisibilityRule::Conditional(c) => {
                assert!(!c.negate);
                assert_eq!(c.accepted_values, vec![serde_json::json!(1), serde_json::json!(2)]);
            }
            VisibilityRule::Legacy(_) => panic!("expected typed rule"),
        }
    }

    #[test]
    fn missing_question_id_parses_as_legacy() {
        let rule: VisibilityRule =
            serde_json::from_str(r#"{"accepted_values": ["yes"]}"#).unwrap();
        assert!(matches!(rule, VisibilityRule::Legacy(_)));
        assert_eq!(rule.trigger_question(), None);
    }

    #[test]
    fn unknown_fields_parse_as_legacy() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"question_id": "{id}", "accepted_values": ["yes"], "operator": "in"}}"#
        );
        let rule: VisibilityRule = serde_json::from_str(&json).unwrap();
        assert!(matches!(rule, VisibilityRule::Legacy(_)));

        // Verbatim round trip — the unknown field must survive
        let back = serde_json::to_value(&rule).unwrap();
        assert_eq!(back["operator"], "in");
    }

    #[test]
    fn remap_rewrites_mapped_reference() {
        let old_id = Uuid::new_v4();
        let new_id = Uuid::new_v4();
        let map = HashMap::from([(old_id, new_id)]);

        let remapped = typed_rule(old_id).remapped(&map);
        assert_eq!(remapped.trigger_question(), Some(new_id));
    }

    #[test]
    fn remap_leaves_unmapped_reference_as_found() {
        let dangling = Uuid::new_v4();
        let map = HashMap::from([(Uuid::new_v4(), Uuid::new_v4())]);

        let rule = typed_rule(dangling);
        assert_eq!(rule.remapped(&map), rule);
    }

    #[test]
    fn remap_leaves_legacy_untouched() {
        let legacy = VisibilityRule::Legacy(serde_json::json!({"if": "Q1", "equals": 3}));
        let map = HashMap::from([(Uuid::new_v4(), Uuid::new_v4())]);
        assert_eq!(legacy.remapped(&map), legacy);
    }
}
