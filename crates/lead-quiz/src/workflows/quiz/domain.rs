use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{QuestionCatalog, QuestionKind};

/// Storage key used when a caller does not scope sessions itself.
pub const DEFAULT_SESSION_KEY: &str = "dental-quiz-session";

const MAX_SESSION_KEY_LEN: usize = 64;

/// Identifier of one resumable quiz session (one per browser tab in the HTTP service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    /// Accepts 1-64 characters from `[A-Za-z0-9_-]` so keys are safe as file names.
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionKey> {
        let trimmed = raw.trim();
        let well_formed = !trimmed.is_empty()
            && trimmed.len() <= MAX_SESSION_KEY_LEN
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');

        if well_formed {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidSessionKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self(DEFAULT_SESSION_KEY.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session key '{0}' must be 1-64 characters of letters, digits, '-' or '_'")]
pub struct InvalidSessionKey(pub String);

/// Current answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Single(Option<String>),
    Multi(BTreeSet<String>),
}

impl Answer {
    pub fn unanswered(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::SingleChoice => Answer::Single(None),
            QuestionKind::MultiChoice => Answer::Multi(BTreeSet::new()),
        }
    }

    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Single(choice) => choice.is_some(),
            Answer::Multi(choices) => !choices.is_empty(),
        }
    }

    pub fn matches_kind(&self, kind: QuestionKind) -> bool {
        matches!(
            (self, kind),
            (Answer::Single(_), QuestionKind::SingleChoice)
                | (Answer::Multi(_), QuestionKind::MultiChoice)
        )
    }

    /// Value tokens currently held by the answer.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Answer::Single(choice) => choice.iter().map(String::as_str).collect(),
            Answer::Multi(choices) => choices.iter().map(String::as_str).collect(),
        }
    }
}

/// Answers keyed by question identifier. Entries are overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerState(BTreeMap<String, Answer>);

impl AnswerState {
    /// Every catalog question starts out unanswered.
    pub fn for_catalog(catalog: &QuestionCatalog) -> Self {
        Self(
            catalog
                .questions()
                .iter()
                .map(|question| (question.id.clone(), Answer::unanswered(question.kind)))
                .collect(),
        )
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.0.get(question_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Answer)> {
        self.0.iter()
    }

    pub fn answered_count(&self) -> usize {
        self.0.values().filter(|answer| answer.is_answered()).count()
    }

    pub(crate) fn insert(&mut self, question_id: String, answer: Answer) {
        self.0.insert(question_id, answer);
    }

    /// Single-choice questions replace the stored value; multi-choice questions toggle it.
    pub(crate) fn apply(&mut self, question_id: &str, kind: QuestionKind, value: &str) {
        let entry = self
            .0
            .entry(question_id.to_string())
            .or_insert_with(|| Answer::unanswered(kind));

        if !entry.matches_kind(kind) {
            *entry = Answer::unanswered(kind);
        }

        match entry {
            Answer::Single(choice) => *choice = Some(value.to_string()),
            Answer::Multi(choices) => {
                if !choices.remove(value) {
                    choices.insert(value.to_string());
                }
            }
        }
    }
}

/// Contact details captured on the final step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub postcode: String,
    pub consent: bool,
}

impl ContactInfo {
    pub fn apply(&mut self, update: ContactUpdate) {
        match update {
            ContactUpdate::Name(value) => self.name = value,
            ContactUpdate::Email(value) => self.email = value,
            ContactUpdate::Phone(value) => self.phone = value,
            ContactUpdate::Postcode(value) => self.postcode = value,
            ContactUpdate::Consent(value) => self.consent = value,
        }
    }

    /// All four text fields must be non-blank and consent given.
    pub fn validate(&self) -> Result<(), ContactValidationError> {
        let missing: Vec<ContactField> = [
            (ContactField::Name, &self.name),
            (ContactField::Email, &self.email),
            (ContactField::Phone, &self.phone),
            (ContactField::Postcode, &self.postcode),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() && self.consent {
            Ok(())
        } else {
            Err(ContactValidationError {
                missing,
                consent_required: !self.consent,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Name,
    Email,
    Phone,
    Postcode,
}

impl ContactField {
    pub const fn label(self) -> &'static str {
        match self {
            ContactField::Name => "name",
            ContactField::Email => "email",
            ContactField::Phone => "phone",
            ContactField::Postcode => "postcode",
        }
    }
}

/// One edit to the contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ContactUpdate {
    Name(String),
    Email(String),
    Phone(String),
    Postcode(String),
    Consent(bool),
}

/// User-facing rejection of an incomplete contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactValidationError {
    pub missing: Vec<ContactField>,
    pub consent_required: bool,
}

impl fmt::Display for ContactValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            let fields: Vec<&str> = self.missing.iter().map(|field| field.label()).collect();
            parts.push(format!("please fill in your {}", fields.join(", ")));
        }
        if self.consent_required {
            parts.push("please agree to be contacted".to_string());
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ContactValidationError {}
