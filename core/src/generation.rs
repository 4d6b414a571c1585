use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{DietPreference, GenerationProfile, MealPlan, WorkoutPlan};

pub const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

const WORKOUT_SYSTEM_PROMPT: &str = r#"You are a certified fitness trainer creating personalized workout plans. Generate a complete workout with exercises that match the user's profile and goals. Return ONLY valid JSON with this exact structure:
{
  "name": "workout name",
  "difficulty": "beginner|intermediate|advanced",
  "duration_minutes": number,
  "total_calories": number,
  "exercises": [
    {
      "name": "exercise name",
      "sets": number,
      "reps": number,
      "rest_seconds": number
    }
  ]
}"#;

const MEAL_SYSTEM_PROMPT: &str = r#"You are a certified nutritionist creating personalized meal plans. Generate a complete day of meals with accurate macros. Return ONLY valid JSON with this exact structure:
{
  "meals": [
    {
      "name": "meal name",
      "meal_type": "breakfast|lunch|dinner|snack",
      "calories": number,
      "protein": number,
      "carbs": number,
      "fats": number,
      "ingredients": ["ingredient1", "ingredient2", ...]
    }
  ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Workout,
    MealPlan,
}

impl PlanKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::MealPlan => "meal-plan",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("AI gateway API key is not configured (set FITTRACK_AI_API_KEY)")]
    MissingCredential,
    #[error("Failed to reach AI gateway: {0}")]
    Transport(String),
    #[error("AI generation failed: {status}")]
    Upstream { status: u16 },
    #[error("Malformed AI response: {0}")]
    Malformed(String),
}

/// Source of generated plans.
///
/// The CLI implements this with reqwest against an OpenAI-compatible gateway.
/// Called synchronously; `content` is the parsed JSON the model returned.
pub trait PlanGenerator: Send + Sync {
    fn generate(&self, kind: PlanKind, profile: &GenerationProfile)
    -> Result<Value, GenerationError>;
}

// --- Prompts ---

#[must_use]
pub fn system_prompt(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Workout => WORKOUT_SYSTEM_PROMPT,
        PlanKind::MealPlan => MEAL_SYSTEM_PROMPT,
    }
}

#[must_use]
pub fn user_prompt(kind: PlanKind, profile: &GenerationProfile) -> String {
    let header = format!(
        "- Gender: {}\n- Age: {}\n- Weight: {}kg\n- Goal: {}",
        profile.gender,
        profile.age,
        profile.weight,
        profile.goal.phrase()
    );

    match kind {
        PlanKind::Workout => format!(
            "Create a personalized workout for:\n{header}\n\n\
             Generate 6-8 exercises appropriate for their fitness level. \
             Include a mix of compound and isolation exercises."
        ),
        PlanKind::MealPlan => {
            let diet = profile.diet_preference.unwrap_or_default();
            let diet_info = if diet == DietPreference::None {
                String::new()
            } else {
                format!("Must be {diet} compatible.")
            };
            format!(
                "Create a daily meal plan for:\n{header}\n- Diet: {diet}\n\n{diet_info}\n\n\
                 Generate 3 main meals (breakfast, lunch, dinner) and 1-2 snacks. \
                 Include accurate calorie and macro calculations for each meal. \
                 List all ingredients."
            )
        }
    }
}

// --- Chat completion wire types ---

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    #[must_use]
    pub fn new(kind: PlanKind, profile: &GenerationProfile, model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(kind).to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(kind, profile),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Extract the first choice's content from a chat completion body and parse it
/// as JSON. The parsed value is returned as-is.
pub fn parse_chat_response(body: &str) -> Result<Value, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("invalid completion body: {e}")))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationError::Malformed("no content in first choice".to_string()))?;
    serde_json::from_str(&content)
        .map_err(|e| GenerationError::Malformed(format!("content is not JSON: {e}")))
}

// --- Typed plans ---

pub fn workout_from_value(value: Value) -> Result<WorkoutPlan, GenerationError> {
    serde_json::from_value(value)
        .map_err(|e| GenerationError::Malformed(format!("unexpected workout shape: {e}")))
}

pub fn meal_plan_from_value(value: Value) -> Result<MealPlan, GenerationError> {
    serde_json::from_value(value)
        .map_err(|e| GenerationError::Malformed(format!("unexpected meal plan shape: {e}")))
}
