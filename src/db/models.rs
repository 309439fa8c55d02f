use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

/// Anything with a single owning user. Ownership is set at creation and
/// never reassigned; mutation paths re-fetch the record and check the
/// stored owner against the acting session, never a client-supplied field.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

/// The one ownership gate: actor must own the record, else 403.
pub fn assert_owner<T: Owned>(record: &T, actor_id: &str) -> AppResult<()> {
    if record.owner_id() == actor_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    /// Withheld (None) when serialized for anyone but the account holder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub name: String,
    pub age: Option<i64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub goal_weight: Option<f64>,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

impl Owned for User {
    fn owner_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub exercises: Vec<Exercise>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub created_at: String,
}

impl Owned for Workout {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub nutrition: Nutrition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub created_at: String,
}

impl Owned for Meal {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

/// Progress payload as a tagged union: each variant carries only its own
/// required fields, so a `weight` entry without a weight (or a `pr` entry
/// missing its exercise) fails at deserialization, before any store call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressKind {
    Weight { weight: f64 },
    Pr { exercise: String, pr_value: f64 },
    Measurement { measurements: BTreeMap<String, f64> },
    Photos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub entry: ProgressKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub photos: Vec<String>,
    pub created_at: String,
}

impl Owned for ProgressEntry {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Workout,
    Meal,
    Progress,
}

impl PostType {
    /// Display name used in the masked 404 for cross-reference failures.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PostType::Workout => "Workout",
            PostType::Meal => "Meal",
            PostType::Progress => "Progress entry",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Workout => "workout",
            PostType::Meal => "meal",
            PostType::Progress => "progress",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "workout" => Some(PostType::Workout),
            "meal" => Some(PostType::Meal),
            "progress" => Some(PostType::Progress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub content: String,
    // Exposed by the feed view as workoutId/mealId/progressId per type.
    #[serde(skip_serializing)]
    pub ref_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Owned for Post {
    fn owner_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: String,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub comment_id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: String,
}
