mod parser;

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
}

impl QuestionKind {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single-choice",
            QuestionKind::MultiChoice => "multi-choice",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-choice" | "single" => Some(Self::SingleChoice),
            "multi-choice" | "multi" => Some(Self::MultiChoice),
            _ => None,
        }
    }
}

/// Selectable answer with its score weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub value: String,
    pub label: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    pub options: Vec<QuestionOption>,
}

impl Question {
    pub fn option(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

/// Ordered, immutable question set. One quiz step per question plus the contact step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    pub fn new(questions: Vec<Question>) -> Result<Self, CatalogError> {
        let mut seen_questions = HashSet::new();
        for question in &questions {
            if question.id.trim().is_empty() {
                return Err(CatalogError::BlankQuestionId);
            }
            if !seen_questions.insert(question.id.as_str()) {
                return Err(CatalogError::DuplicateQuestion(question.id.clone()));
            }
            if question.options.is_empty() {
                return Err(CatalogError::NoOptions(question.id.clone()));
            }

            let mut seen_values = HashSet::new();
            for option in &question.options {
                if !seen_values.insert(option.value.as_str()) {
                    return Err(CatalogError::DuplicateOption {
                        question_id: question.id.clone(),
                        value: option.value.clone(),
                    });
                }
            }
        }

        Ok(Self { questions })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let questions = parser::parse_questions(reader)?;
        Self::new(questions)
    }

    /// Built-in questionnaire used on the practice website.
    pub fn standard() -> Self {
        Self {
            questions: vec![
                single(
                    "visit_reason",
                    "What's the main reason you're looking for a dentist?",
                    &[
                        ("routine_checkup", "A routine check-up and clean", 1),
                        ("cosmetic", "Improving the look of my smile", 3),
                        ("pain", "I'm in pain or have a problem", 4),
                        ("browsing", "Just exploring my options", 0),
                    ],
                ),
                single(
                    "start_timeline",
                    "How soon would you like to be seen?",
                    &[
                        ("this_week", "This week", 5),
                        ("this_month", "Within the month", 3),
                        ("few_months", "In the next few months", 1),
                        ("not_sure", "Not sure yet", 0),
                    ],
                ),
                single(
                    "last_visit",
                    "When did you last see a dentist?",
                    &[
                        ("within_year", "Within the last year", 0),
                        ("one_to_three_years", "One to three years ago", 2),
                        ("over_three_years", "More than three years ago", 3),
                    ],
                ),
                multi(
                    "smile_goals",
                    "Which of these would you like help with? Choose all that apply.",
                    &[
                        ("whitening", "Whiter teeth", 1),
                        ("sensitivity", "Sensitive teeth", 2),
                        ("missing_teeth", "Replacing missing teeth", 3),
                        ("straightening", "Straighter teeth", 4),
                        ("none", "None of these", 0),
                    ],
                ),
                single(
                    "membership_interest",
                    "Would spreading the cost with a monthly membership plan suit you?",
                    &[
                        ("yes_plan", "Yes, that sounds ideal", 3),
                        ("maybe", "Maybe, tell me more", 1),
                        ("pay_as_you_go", "I'd rather pay as I go", 0),
                    ],
                ),
                single(
                    "dental_anxiety",
                    "How do you feel about dental visits?",
                    &[
                        ("relaxed", "Perfectly relaxed", 0),
                        ("bit_nervous", "A little nervous", 1),
                        ("very_anxious", "Very anxious", 2),
                    ],
                ),
            ],
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
    }

    pub fn question_at(&self, step: usize) -> Option<&Question> {
        self.questions.get(step)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Question steps plus the trailing contact step.
    pub fn total_steps(&self) -> usize {
        self.questions.len() + 1
    }
}

fn single(id: &str, prompt: &str, options: &[(&str, &str, u32)]) -> Question {
    build_question(id, prompt, QuestionKind::SingleChoice, options)
}

fn multi(id: &str, prompt: &str, options: &[(&str, &str, u32)]) -> Question {
    build_question(id, prompt, QuestionKind::MultiChoice, options)
}

fn build_question(
    id: &str,
    prompt: &str,
    kind: QuestionKind,
    options: &[(&str, &str, u32)],
) -> Question {
    Question {
        id: id.to_string(),
        prompt: prompt.to_string(),
        kind,
        options: options
            .iter()
            .map(|(value, label, weight)| QuestionOption {
                value: value.to_string(),
                label: label.to_string(),
                weight: *weight,
            })
            .collect(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read question catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid question catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("question id must not be blank")]
    BlankQuestionId,
    #[error("question '{0}' is defined more than once")]
    DuplicateQuestion(String),
    #[error("question '{question_id}' repeats option '{value}'")]
    DuplicateOption { question_id: String, value: String },
    #[error("question '{0}' has no options")]
    NoOptions(String),
    #[error("question '{question_id}' has unknown kind '{kind}'")]
    UnknownKind { question_id: String, kind: String },
    #[error("question '{0}' mixes single-choice and multi-choice rows")]
    KindConflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CSV: &str = "question_id,kind,prompt,option_value,option_label,weight\n\
treatment,single-choice,What are you after?,implants,Dental implants,4\n\
treatment,single-choice,What are you after?,hygiene,Hygienist visit,1\n\
extras,multi-choice,Anything else?,whitening,Whitening,2\n\
extras,multi-choice,,aligners,Clear aligners,3\n";

    #[test]
    fn standard_catalog_is_valid() {
        let standard = QuestionCatalog::standard();
        let validated =
            QuestionCatalog::new(standard.questions().to_vec()).expect("standard catalog valid");
        assert_eq!(validated.question_count(), 6);
        assert_eq!(validated.total_steps(), 7);
        assert!(validated
            .questions()
            .iter()
            .all(|question| question.options.iter().any(|option| option.weight == 0)));
    }

    #[test]
    fn csv_import_groups_rows_by_question_in_order() {
        let catalog = QuestionCatalog::from_reader(Cursor::new(CSV)).expect("catalog parses");
        assert_eq!(catalog.question_count(), 2);

        let treatment = catalog.question_at(0).expect("first question");
        assert_eq!(treatment.id, "treatment");
        assert_eq!(treatment.kind, QuestionKind::SingleChoice);
        assert_eq!(treatment.options.len(), 2);
        assert_eq!(treatment.option("implants").map(|o| o.weight), Some(4));

        let extras = catalog.question("extras").expect("second question");
        assert_eq!(extras.kind, QuestionKind::MultiChoice);
        assert_eq!(extras.prompt, "Anything else?");
    }

    #[test]
    fn csv_import_rejects_duplicate_options() {
        let csv = "question_id,kind,prompt,option_value,option_label,weight\n\
q1,single,Prompt,a,A,1\n\
q1,single,Prompt,a,Again,2\n";
        let error = QuestionCatalog::from_reader(Cursor::new(csv)).expect_err("duplicate");
        assert!(matches!(error, CatalogError::DuplicateOption { .. }));
    }

    #[test]
    fn csv_import_rejects_unknown_kind_and_kind_changes() {
        let unknown = "question_id,kind,prompt,option_value,option_label,weight\n\
q1,ranking,Prompt,a,A,1\n";
        assert!(matches!(
            QuestionCatalog::from_reader(Cursor::new(unknown)),
            Err(CatalogError::UnknownKind { .. })
        ));

        let conflict = "question_id,kind,prompt,option_value,option_label,weight\n\
q1,single,Prompt,a,A,1\n\
q1,multi,Prompt,b,B,1\n";
        assert!(matches!(
            QuestionCatalog::from_reader(Cursor::new(conflict)),
            Err(CatalogError::KindConflict(_))
        ));
    }

    #[test]
    fn csv_import_rejects_negative_weights() {
        let csv = "question_id,kind,prompt,option_value,option_label,weight\n\
q1,single,Prompt,a,A,-1\n";
        assert!(matches!(
            QuestionCatalog::from_reader(Cursor::new(csv)),
            Err(CatalogError::Csv(_))
        ));
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let error = QuestionCatalog::from_path("./does-not-exist.csv").expect_err("io error");
        match error {
            CatalogError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
