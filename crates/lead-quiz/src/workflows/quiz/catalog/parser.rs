use super::{CatalogError, Question, QuestionKind, QuestionOption};
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// Folds one-row-per-option CSV data into questions, keeping first-appearance order.
pub(super) fn parse_questions<R: Read>(reader: R) -> Result<Vec<Question>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut questions: Vec<Question> = Vec::new();

    for record in csv_reader.deserialize::<CatalogRow>() {
        let row = record?;
        let kind = QuestionKind::parse(&row.kind).ok_or_else(|| CatalogError::UnknownKind {
            question_id: row.question_id.clone(),
            kind: row.kind.clone(),
        })?;
        let option = QuestionOption {
            value: row.option_value,
            label: row.option_label,
            weight: row.weight,
        };

        match questions
            .iter_mut()
            .find(|question| question.id == row.question_id)
        {
            Some(question) => {
                if question.kind != kind {
                    return Err(CatalogError::KindConflict(question.id.clone()));
                }
                if question.prompt.is_empty() {
                    if let Some(prompt) = row.prompt {
                        question.prompt = prompt;
                    }
                }
                question.options.push(option);
            }
            None => questions.push(Question {
                id: row.question_id,
                prompt: row.prompt.unwrap_or_default(),
                kind,
                options: vec![option],
            }),
        }
    }

    Ok(questions)
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    question_id: String,
    kind: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    prompt: Option<String>,
    option_value: String,
    option_label: String,
    weight: u32,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
