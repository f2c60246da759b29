use serde::Serialize;
use serde_json::Value;

/// Ranked war score, own faction first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WarScoreState {
    pub own_score: i64,
    pub opponent_score: i64,
}

/// An ongoing war found in a `faction` payload with the `wars` selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveWar {
    pub war_id: String,
    pub own_id: String,
    pub enemy_id: String,
    pub own_score: i64,
    pub enemy_score: i64,
}

impl ActiveWar {
    pub fn scores(&self) -> WarScoreState {
        WarScoreState {
            own_score: self.own_score,
            opponent_score: self.enemy_score,
        }
    }
}

/// Find the first war in a faction payload and identify the opposing side.
///
/// Returns `None` when the payload has no wars, lacks the faction's own `ID`,
/// or the war lists no other faction.
pub fn detect_active_war(payload: &Value) -> Option<ActiveWar> {
    let own_id = match payload.get("ID")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };

    let wars = payload.get("wars")?.as_object()?;
    let (war_id, war) = wars.iter().next()?;
    let factions = war.get("factions")?.as_object()?;
    let enemy_id = factions.keys().find(|id| **id != own_id)?.clone();

    let score = |id: &str| {
        factions
            .get(id)
            .and_then(|f| f.get("score"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };

    Some(ActiveWar {
        war_id: war_id.clone(),
        own_score: score(&own_id),
        enemy_score: score(&enemy_id),
        own_id,
        enemy_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_active_war() {
        let payload = json!({
            "ID": 100,
            "name": "Asgard",
            "wars": {
                "5501": {
                    "factions": {
                        "100": {"name": "Asgard", "score": 1200},
                        "200": {"name": "Valhalla", "score": 950}
                    }
                }
            }
        });

        let war = detect_active_war(&payload).expect("war present");
        assert_eq!(war.war_id, "5501");
        assert_eq!(war.own_id, "100");
        assert_eq!(war.enemy_id, "200");
        assert_eq!(war.scores(), WarScoreState { own_score: 1200, opponent_score: 950 });
    }

    #[test]
    fn test_no_war() {
        assert!(detect_active_war(&json!({"ID": 100, "wars": {}})).is_none());
        assert!(detect_active_war(&json!({"ID": 100})).is_none());
    }

    #[test]
    fn test_missing_own_id() {
        let payload = json!({"wars": {"1": {"factions": {"100": {}, "200": {}}}}});
        assert!(detect_active_war(&payload).is_none());
    }

    #[test]
    fn test_war_without_opponent() {
        let payload = json!({"ID": "100", "wars": {"1": {"factions": {"100": {"score": 3}}}}});
        assert!(detect_active_war(&payload).is_none());
    }
}
