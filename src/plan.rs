use std::fmt::Write as _;

use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::Value;

use crate::error::ProxyError;

const NO_CONDITIONS: &str = "None selected";
const CONDITION_SEPARATOR: &str = ", ";

const PROMPT_PREAMBLE: &str = "You are a supportive wellness assistant. Write a personalized, \
general wellness plan for the person described below. Do not diagnose conditions or prescribe \
medication.";

const PROMPT_SECTIONS: [&str; 6] = [
    "Wellness Overview",
    "Lifestyle Recommendations",
    "Nutrition Guidance",
    "Physical Activity",
    "Stress Management",
    "When to Consult a Healthcare Professional",
];

const PROMPT_CLOSING: &str = "Keep the tone encouraging and the advice practical.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Health,
    Workout,
    Nutrition,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Self::Health, Self::Workout, Self::Nutrition];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Workout => "workout",
            Self::Nutrition => "nutrition",
        }
    }

    /// Route path, shared by the proxy surface and the internal API service.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Health => "/api/generateHealth",
            Self::Workout => "/api/generateWorkout",
            Self::Nutrition => "/api/generateNutrition",
        }
    }

    fn focus(&self) -> &'static str {
        match self {
            Self::Health => "overall health and wellness",
            Self::Workout => "exercise and workout recommendations",
            Self::Nutrition => "nutrition and eating habits",
        }
    }
}

/// Form data submitted from the plan page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default, deserialize_with = "text_or_number")]
    pub name: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub age: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub weight: String,
    #[serde(default, deserialize_with = "text_or_number")]
    pub height: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default, alias = "otherImmersionCondition")]
    pub other_condition: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
}

impl PlanRequest {
    pub fn from_user_data(user_data: &Value) -> Result<Self, ProxyError> {
        let request = Self::deserialize(user_data)
            .map_err(|err| ProxyError::InvalidPlan(format!("Invalid userData: {err}")))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        let required = [&self.name, &self.age, &self.weight, &self.height];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(ProxyError::InvalidPlan(
                "Please fill in name, age, weight, and height fields.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn conditions_line(&self) -> String {
        if self.conditions.is_empty() {
            NO_CONDITIONS.to_string()
        } else {
            self.conditions.join(CONDITION_SEPARATOR)
        }
    }

    pub fn prompt(&self, capability: Capability) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{PROMPT_PREAMBLE}");
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Primary focus: {}", capability.focus());
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Personal details:");
        let _ = writeln!(prompt, "- Name: {}", self.name.trim());
        let _ = writeln!(prompt, "- Age: {}", self.age.trim());
        let _ = writeln!(prompt, "- Weight: {}", self.weight.trim());
        let _ = writeln!(prompt, "- Height: {}", self.height.trim());
        let _ = writeln!(prompt, "- Existing conditions: {}", self.conditions_line());
        if let Some(other) = non_empty(self.other_condition.as_deref()) {
            let _ = writeln!(prompt, "- Other condition: {other}");
        }
        if let Some(notes) = non_empty(self.additional_info.as_deref()) {
            let _ = writeln!(prompt, "- Additional notes: {notes}");
        }
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Please organize the response into these sections:");
        for (idx, section) in PROMPT_SECTIONS.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", idx + 1, section);
        }
        let _ = writeln!(prompt);
        prompt.push_str(PROMPT_CLOSING);
        prompt
    }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected a string or number, found {other}"))),
    }
}
