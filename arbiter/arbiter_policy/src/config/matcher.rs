//! Allow-block matching.

use serde_json::Value;

use arbiter_core::Actor;

/// Match an allow block against an actor.
///
/// Returns `None` for a `null` block, which is treated as absent. Otherwise:
///
/// - `true` / `false` match everyone / no one.
/// - An object matches when any of its keys matches: `"*"` matches if the
///   actor has that key at all, a scalar or list matches if it shares a value
///   with the actor's attribute (which may itself be a scalar or list), and
///   `unauthenticated: true` matches the anonymous actor.
/// - Any other value matches no one.
pub fn actor_matches_allow(actor: &Actor, allow: &Value) -> Option<bool> {
    let block = match allow {
        Value::Null => return None,
        Value::Bool(b) => return Some(*b),
        Value::Object(block) => block,
        _ => return Some(false),
    };

    if actor.is_anonymous() && block.get("unauthenticated") == Some(&Value::Bool(true)) {
        return Some(true);
    }

    for (key, wanted) in block {
        let Some(present) = actor.get(key) else {
            continue;
        };
        if wanted.as_str() == Some("*") {
            return Some(true);
        }
        let wanted = as_list(wanted);
        if as_list(present).iter().any(|value| wanted.contains(value)) {
            return Some(true);
        }
    }

    Some(false)
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_blocks() {
        let actor = Actor::new("alice");
        assert_eq!(actor_matches_allow(&actor, &json!(true)), Some(true));
        assert_eq!(actor_matches_allow(&actor, &json!(false)), Some(false));
        assert_eq!(actor_matches_allow(&actor, &Value::Null), None);
    }

    #[test]
    fn test_id_matching() {
        let alice = Actor::new("alice");
        assert_eq!(actor_matches_allow(&alice, &json!({"id": "alice"})), Some(true));
        assert_eq!(actor_matches_allow(&alice, &json!({"id": ["bob", "alice"]})), Some(true));
        assert_eq!(actor_matches_allow(&alice, &json!({"id": "bob"})), Some(false));
        assert_eq!(actor_matches_allow(&alice, &json!({"id": "*"})), Some(true));
    }

    #[test]
    fn test_list_attributes() {
        let actor = Actor::new("carol").with_attribute("roles", json!(["staff", "ops"]));
        assert_eq!(actor_matches_allow(&actor, &json!({"roles": "ops"})), Some(true));
        assert_eq!(actor_matches_allow(&actor, &json!({"roles": ["admin"]})), Some(false));
        assert_eq!(
            actor_matches_allow(&actor, &json!({"id": "nobody", "roles": ["staff"]})),
            Some(true)
        );
    }

    #[test]
    fn test_anonymous_actor() {
        let anon = Actor::anonymous();
        assert_eq!(actor_matches_allow(&anon, &json!({"unauthenticated": true})), Some(true));
        assert_eq!(actor_matches_allow(&anon, &json!({"id": "*"})), Some(false));

        // An authenticated actor does not match unauthenticated: true
        assert_eq!(
            actor_matches_allow(&Actor::new("alice"), &json!({"unauthenticated": true})),
            Some(false)
        );
    }

    #[test]
    fn test_attributeless_authenticated_actors_are_not_unauthenticated() {
        let block = json!({"unauthenticated": true});
        let token = Actor::from_value(json!({"_r": {"a": ["vi"]}})).unwrap();
        let empty = Actor::from_value(json!({})).unwrap();

        assert_eq!(actor_matches_allow(&token, &block), Some(false));
        assert_eq!(actor_matches_allow(&empty, &block), Some(false));
        assert_eq!(actor_matches_allow(&Actor::from_value(Value::Null).unwrap(), &block), Some(true));
    }

    #[test]
    fn test_unexpected_block_matches_no_one() {
        assert_eq!(actor_matches_allow(&Actor::new("alice"), &json!("alice")), Some(false));
    }
}
