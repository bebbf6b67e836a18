//! Survival plan and revision plan payloads, plus the survival plan request

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{Normalized, lenient, record_list, string_list, value_text};

// ── Survival plan ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlan {
    #[serde(default, deserialize_with = "lenient::number")]
    pub week: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub focus: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tasks: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub milestones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default, deserialize_with = "lenient::string")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub activity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    #[serde(default, deserialize_with = "lenient::string")]
    pub day: String,
    #[serde(default, deserialize_with = "lenient::records")]
    pub time_slots: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillStep {
    #[serde(default, deserialize_with = "lenient::string")]
    pub skill: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub current_level: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub target_level: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionPhase {
    #[serde(default, deserialize_with = "lenient::string")]
    pub phase: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub duration: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub focus: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamTactic {
    #[serde(default, deserialize_with = "lenient::string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub priority: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub tactics: Vec<String>,
}

/// Structured survival plan. `raw_response` is only set when the model
/// output could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalPlan {
    pub weekly_plan: Vec<WeekPlan>,
    pub daily_schedule: Vec<DaySchedule>,
    pub skill_roadmap: Vec<SkillStep>,
    pub revision_plan: Vec<RevisionPhase>,
    pub exam_strategy: Vec<ExamTactic>,
    pub productivity_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl Normalized for SurvivalPlan {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            weekly_plan: record_list(object.get("weeklyPlan")),
            daily_schedule: record_list(object.get("dailySchedule")),
            skill_roadmap: record_list(object.get("skillRoadmap")),
            revision_plan: record_list(object.get("revisionPlan")),
            exam_strategy: record_list(object.get("examStrategy")),
            productivity_rules: string_list(object.get("productivityRules")),
            raw_response: None,
        }
    }

    fn fallback(raw: &str) -> Self {
        Self {
            raw_response: Some(raw.to_string()),
            ..Self::default()
        }
    }
}

// ── Revision plan ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionWeek {
    #[serde(default, deserialize_with = "lenient::number")]
    pub week_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub goals: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub activities: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub assessments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub weeks: Vec<RevisionWeek>,
    pub study_tips: Vec<String>,
    pub resources: Vec<String>,
}

impl Normalized for RevisionPlan {
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            summary: object.get("summary").and_then(value_text),
            weeks: record_list(object.get("weeks")),
            study_tips: string_list(object.get("studyTips")),
            resources: string_list(object.get("resources")),
        }
    }

    fn fallback(raw: &str) -> Self {
        Self {
            summary: Some(raw.to_string()),
            ..Self::default()
        }
    }
}

// ── Survival plan request ──

/// Student details for a survival plan. Fields stay loosely typed: clients
/// send either a single value or a list for skills and exam dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalPlanRequest {
    #[serde(default, alias = "userSkills")]
    pub skills: Option<Value>,
    #[serde(default)]
    pub stress_level: Option<Value>,
    #[serde(default)]
    pub time_available: Option<Value>,
    #[serde(default)]
    pub exam_dates: Option<Value>,
    #[serde(default)]
    pub goals: Option<Value>,
    #[serde(default)]
    pub deadline: Option<Value>,
}

impl SurvivalPlanRequest {
    /// Names of required fields that are absent, null, false, zero or the
    /// empty string. Lists, objects and whitespace-only strings are present,
    /// even when empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("skills", self.skills.as_ref()),
            ("stressLevel", self.stress_level.as_ref()),
            ("timeAvailable", self.time_available.as_ref()),
            ("examDates", self.exam_dates.as_ref()),
            ("goals", self.goals.as_ref()),
        ]
        .into_iter()
        .filter(|(_, value)| !is_present(*value))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn skills_text(&self) -> String {
        render(self.skills.as_ref())
    }

    pub fn stress_level_text(&self) -> String {
        render(self.stress_level.as_ref())
    }

    pub fn time_available_text(&self) -> String {
        render(self.time_available.as_ref())
    }

    pub fn exam_dates_text(&self) -> String {
        render(self.exam_dates.as_ref())
    }

    pub fn goals_text(&self) -> String {
        render(self.goals.as_ref())
    }

    pub fn deadline_text(&self) -> Option<String> {
        self.deadline
            .as_ref()
            .filter(|v| is_present(Some(*v)))
            .map(|v| render(Some(v)))
            .filter(|text| !text.is_empty())
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Lists render as `a, b, c`; scalars as their text
fn render(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => value_text(other).unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    fn request(body: Value) -> SurvivalPlanRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_request_missing_goals() {
        let req = request(json!({
            "skills": ["Python"],
            "stressLevel": "high",
            "timeAvailable": "3 hours",
            "examDates": ["2025-05-01"]
        }));
        assert_eq!(req.missing_fields(), vec!["goals"]);
        assert!(!req.is_complete());
    }

    #[test]
    fn test_request_falsy_values_count_as_missing() {
        let req = request(json!({
            "stressLevel": 0,
            "timeAvailable": "",
            "examDates": null,
            "goals": false
        }));
        assert_eq!(
            req.missing_fields(),
            vec!["skills", "stressLevel", "timeAvailable", "examDates", "goals"]
        );
    }

    #[test]
    fn test_request_empty_list_and_blank_text_are_present() {
        let req = request(json!({
            "skills": [],
            "stressLevel": "  ",
            "timeAvailable": {},
            "examDates": ["May 3"],
            "goals": "Pass"
        }));
        assert!(req.missing_fields().is_empty());
        assert_eq!(req.skills_text(), "");
    }

    #[test]
    fn test_request_rendering() {
        let req = request(json!({
            "userSkills": ["Python", "SQL"],
            "stressLevel": 7,
            "timeAvailable": "2 hours/day",
            "examDates": "May 3",
            "goals": "Pass DBMS",
            "deadline": ""
        }));
        assert!(req.is_complete());
        assert_eq!(req.skills_text(), "Python, SQL");
        assert_eq!(req.stress_level_text(), "7");
        assert_eq!(req.exam_dates_text(), "May 3");
        assert_eq!(req.deadline_text(), None);
    }

    #[test]
    fn test_survival_plan_fallback() {
        let plan: SurvivalPlan = normalize("hello world");
        assert_eq!(plan.raw_response.as_deref(), Some("hello world"));
        assert!(plan.weekly_plan.is_empty());
        assert!(plan.daily_schedule.is_empty());
        assert!(plan.productivity_rules.is_empty());

        let value = serde_json::to_value(&plan).unwrap();
        for key in [
            "weeklyPlan",
            "dailySchedule",
            "skillRoadmap",
            "revisionPlan",
            "examStrategy",
            "productivityRules",
        ] {
            assert_eq!(value[key], json!([]), "{} should be an empty list", key);
        }
        assert_eq!(value["rawResponse"], "hello world");
    }

    #[test]
    fn test_survival_plan_parses_and_coerces() {
        let raw = r#"Here is your plan:
{
  "weeklyPlan": [{"week": 1, "focus": "Basics", "tasks": ["Read ch. 1"], "milestones": ["Quiz"]}, "stray"],
  "dailySchedule": [{"day": "Monday", "timeSlots": [{"time": "9-11 AM", "activity": "DBMS"}, 3]}],
  "skillRoadmap": [{"skill": "SQL", "currentLevel": "Beginner", "targetLevel": "Intermediate", "action": "Practice joins"}],
  "revisionPlan": [{"phase": "Recall", "duration": "1 week", "focus": "Normal forms", "method": "Flashcards"}],
  "examStrategy": [{"subject": "DBMS", "priority": "High", "tactics": ["Past papers"]}],
  "productivityRules": ["Sleep 8 hours"]
}
Good luck!"#;
        let plan: SurvivalPlan = normalize(raw);
        assert_eq!(plan.raw_response, None);
        assert_eq!(plan.weekly_plan.len(), 1);
        assert_eq!(plan.weekly_plan[0].week, Some(1));
        assert_eq!(plan.daily_schedule[0].time_slots.len(), 1);
        assert_eq!(plan.daily_schedule[0].time_slots[0].activity, "DBMS");
        assert_eq!(plan.skill_roadmap[0].target_level, "Intermediate");
        assert_eq!(plan.exam_strategy[0].tactics, vec!["Past papers"]);
        assert_eq!(plan.productivity_rules, vec!["Sleep 8 hours"]);
    }

    #[test]
    fn test_revision_plan_parses() {
        let raw = r#"{"weeks": [{"weekNumber": "1", "topics": ["Sets"], "goals": "Basics", "activities": [], "assessments": "Quiz"}], "studyTips": ["Pomodoro"], "resources": []}"#;
        let plan: RevisionPlan = normalize(raw);
        assert_eq!(plan.weeks[0].week_number, Some(1));
        assert_eq!(plan.weeks[0].topics, vec!["Sets"]);
        assert_eq!(plan.study_tips, vec!["Pomodoro"]);
        assert_eq!(plan.summary, None);
    }

    #[test]
    fn test_revision_plan_fallback() {
        let plan: RevisionPlan = normalize("hello world");
        assert_eq!(plan.summary.as_deref(), Some("hello world"));
        assert!(plan.weeks.is_empty());
        assert!(plan.study_tips.is_empty());
        assert!(plan.resources.is_empty());
    }
}
