use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Unknown fields returned by the API, kept verbatim.
pub type Extra = Map<String, JsonValue>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_at: Option<i64>,
    #[serde(default)]
    pub time_estimate: Option<u64>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A project or category; the API stores both in one collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub target: Option<f64>,
    #[serde(default)]
    pub is_positive: Option<bool>,
    /// Flat `[time, value, time, value, ...]` log as sent by the API.
    #[serde(default)]
    pub history: Vec<JsonValue>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub reminder_id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Result of starting or stopping time tracking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResult {
    #[serde(default)]
    pub start_id: Option<String>,
    #[serde(default)]
    pub start_times: Vec<i64>,
    #[serde(default)]
    pub stop_id: Option<String>,
    #[serde(default)]
    pub stop_times: Vec<i64>,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed: Option<bool>,
    #[serde(default)]
    pub billing_period: Option<String>,
    #[serde(default)]
    pub marvin_points: Option<i64>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kudos {
    #[serde(default)]
    pub kudos: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub kudos_remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::{Habit, Task};
    use serde_json::json;

    #[test]
    fn task_keeps_unknown_fields() {
        let task: Task = serde_json::from_value(json!({
            "_id": "t1",
            "title": "Write docs",
            "parentId": "unassigned",
            "labelIds": ["l1"],
            "isStarred": 2
        }))
        .expect("task must decode");

        assert_eq!(task.id, "t1");
        assert_eq!(task.parent_id.as_deref(), Some("unassigned"));
        assert_eq!(task.label_ids, vec!["l1".to_owned()]);
        assert!(!task.done);
        assert_eq!(task.extra.get("isStarred"), Some(&json!(2)));
    }

    #[test]
    fn habit_history_defaults_to_empty() {
        let habit: Habit = serde_json::from_value(json!({"_id": "h1", "title": "Run"}))
            .expect("habit must decode");
        assert!(habit.history.is_empty());
        assert_eq!(habit.period, None);
    }
}
