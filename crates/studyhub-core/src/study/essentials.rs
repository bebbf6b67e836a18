//! Essentials payload: the topics and mark-weighted questions of a document

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{Normalized, first_present, string_list, value_text};

/// Questions grouped by mark weightage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksDistribution {
    pub two_marks: Vec<String>,
    pub three_marks: Vec<String>,
    pub fourteen_marks: Vec<String>,
    pub sixteen_marks: Vec<String>,
}

impl MarksDistribution {
    /// Accepts both `twoMarks`-style keys and bare mark numbers (`"2"`, `"14"`)
    fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            two_marks: string_list(first_present(object, &["twoMarks", "2"])),
            three_marks: string_list(first_present(object, &["threeMarks", "3"])),
            fourteen_marks: string_list(first_present(object, &["fourteenMarks", "14"])),
            sixteen_marks: string_list(first_present(object, &["sixteenMarks", "16"])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.two_marks.is_empty()
            && self.three_marks.is_empty()
            && self.fourteen_marks.is_empty()
            && self.sixteen_marks.is_empty()
    }
}

/// Essential topics extracted from a syllabus or question paper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Essentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub creative_topics: Vec<String>,
    pub theory_topics: Vec<String>,
    pub numerical_topics: Vec<String>,
    pub marks_distribution: MarksDistribution,
}

impl Essentials {
    pub fn topic_count(&self) -> usize {
        self.creative_topics.len() + self.theory_topics.len() + self.numerical_topics.len()
    }
}

impl Normalized for Essentials {
    fn from_object(object: &Map<String, Value>) -> Self {
        let marks_distribution = match first_present(object, &["marksDistribution", "marks"]) {
            Some(Value::Object(marks)) => MarksDistribution::from_object(marks),
            _ => MarksDistribution::default(),
        };

        Self {
            summary: object.get("summary").and_then(value_text),
            creative_topics: string_list(first_present(
                object,
                &["creativeTopics", "creativeQuestions"],
            )),
            theory_topics: string_list(object.get("theoryTopics")),
            numerical_topics: string_list(object.get("numericalTopics")),
            marks_distribution,
        }
    }

    fn fallback(raw: &str) -> Self {
        Self {
            summary: Some(raw.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_fallback_shape_keeps_text_as_summary() {
        let essentials: Essentials = normalize("hello world");
        assert_eq!(essentials.summary.as_deref(), Some("hello world"));
        assert_eq!(essentials.topic_count(), 0);
        assert!(essentials.marks_distribution.is_empty());

        let value = serde_json::to_value(&essentials).unwrap();
        assert_eq!(
            value,
            json!({
                "summary": "hello world",
                "creativeTopics": [],
                "theoryTopics": [],
                "numericalTopics": [],
                "marksDistribution": {
                    "twoMarks": [],
                    "threeMarks": [],
                    "fourteenMarks": [],
                    "sixteenMarks": []
                }
            })
        );
    }

    #[test]
    fn test_parses_canonical_keys() {
        let raw = r#"```json
{
  "creativeTopics": ["Design a bridge"],
  "theoryTopics": ["Newton's laws", "Friction"],
  "numericalTopics": ["Projectile motion"],
  "marksDistribution": {
    "twoMarks": ["Define inertia"],
    "threeMarks": [],
    "fourteenMarks": ["Derive the range equation"],
    "sixteenMarks": []
  }
}
```"#;
        let essentials: Essentials = normalize(raw);
        assert_eq!(essentials.summary, None);
        assert_eq!(essentials.creative_topics, vec!["Design a bridge"]);
        assert_eq!(essentials.theory_topics.len(), 2);
        assert_eq!(essentials.marks_distribution.two_marks, vec!["Define inertia"]);
        assert_eq!(
            essentials.marks_distribution.fourteen_marks,
            vec!["Derive the range equation"]
        );
    }

    #[test]
    fn test_parses_alternate_keys() {
        let raw = r#"{
            "creativeQuestions": ["Invent a sorting game"],
            "theoryTopics": ["Big-O"],
            "numericalTopics": [],
            "marks": {"2": ["What is a stack?"], "16": ["Explain quicksort"]}
        }"#;
        let essentials: Essentials = normalize(raw);
        assert_eq!(essentials.creative_topics, vec!["Invent a sorting game"]);
        assert_eq!(essentials.marks_distribution.two_marks, vec!["What is a stack?"]);
        assert_eq!(
            essentials.marks_distribution.sixteen_marks,
            vec!["Explain quicksort"]
        );
        assert!(essentials.marks_distribution.three_marks.is_empty());
    }

    #[test]
    fn test_mistyped_fields_become_empty() {
        let raw = r#"{"creativeTopics": 7, "theoryTopics": "Optics", "marksDistribution": []}"#;
        let essentials: Essentials = normalize(raw);
        assert!(essentials.creative_topics.is_empty());
        assert_eq!(essentials.theory_topics, vec!["Optics"]);
        assert!(essentials.numerical_topics.is_empty());
        assert!(essentials.marks_distribution.is_empty());
    }
}
