// Write inputs and their pre-flight validation. A form that fails here never
// produces a network request.
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::common::models::{JobKind, Role};
use crate::error::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Role,
    #[serde(skip)]
    #[validate(custom = "must_agree")]
    pub agree_terms: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobInput {
    #[validate(length(min = 5, message = "Title must be at least 5 characters"))]
    pub title: String,
    #[validate(length(min = 50, message = "Description must be at least 50 characters"))]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "Budget must be positive"))]
    pub budget: Option<f64>,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub skills: Vec<String>,
}

impl CreateJobInput {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            budget: None,
            kind: JobKind::default(),
            skills: Vec::new(),
        }
    }

    /// Returns false when the skill is blank or already listed.
    pub fn add_skill(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() || self.skills.iter().any(|s| s == skill) {
            return false;
        }
        self.skills.push(skill.to_string());
        true
    }

    pub fn remove_skill(&mut self, skill: &str) {
        self.skills.retain(|s| s != skill);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBidInput {
    #[validate(length(min = 1, message = "Job is required"))]
    pub job_id: String,
    #[validate(range(min = 0.0, message = "Amount must be positive"))]
    pub amount: f64,
    #[validate(length(min = 50, message = "Cover letter must be at least 50 characters"))]
    pub cover_letter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FundInput {
    #[validate(length(min = 1, message = "Please provide a valid contract ID and amount."))]
    pub contract_id: String,
    #[validate(custom(function = "positive_amount", message = "Please provide a valid contract ID and amount."))]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInput {
    #[validate(length(min = 1, message = "Please provide a valid contract ID."))]
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewInput {
    #[validate(length(min = 1, message = "Please provide a valid contract ID and rating (1-5)."))]
    pub contract_id: String,
    #[validate(range(min = 1, max = 5, message = "Please provide a valid contract ID and rating (1-5)."))]
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMilestoneInput {
    #[validate(length(min = 1, message = "Please select a milestone."))]
    pub milestone_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageInput {
    #[validate(custom = "not_blank")]
    pub content: String,
}

fn must_agree(value: &bool) -> Result<(), ValidationError> {
    if *value {
        return Ok(());
    }
    let mut err = ValidationError::new("terms");
    err.message = Some(Cow::from("You must agree to the terms"));
    Err(err)
}

fn positive_amount(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new("positive"))
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if !value.trim().is_empty() {
        return Ok(());
    }
    let mut err = ValidationError::new("blank");
    err.message = Some(Cow::from("Message cannot be empty"));
    Err(err)
}

/// Runs the derived rules and flattens the failures into one user-facing line.
pub fn check<T: Validate>(form: &T) -> Result<(), ClientError> {
    form.validate().map_err(|errors| ClientError::Validation(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);

    let mut messages: Vec<String> = Vec::new();
    for (field, errs) in fields {
        for err in errs.iter() {
            let text = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", field));
            if !messages.contains(&text) {
                messages.push(text);
            }
        }
    }
    messages.join("; ")
}

/// A write the user asked for, tagged with the key the server can use to
/// drop a duplicate. Retrying the same intent reuses the key.
#[derive(Debug, Clone)]
pub struct WriteIntent<T> {
    pub input: T,
    pub key: Uuid,
}

impl<T> WriteIntent<T> {
    pub fn new(input: T) -> Self {
        Self { input, key: Uuid::new_v4() }
    }
}
