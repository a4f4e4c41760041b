use crate::infra::{load_catalog, parse_answer};
use clap::Args;
use lead_quiz::error::AppError;
use lead_quiz::workflows::quiz::{
    ContactUpdate, LoggingSubmitter, MemorySessionRepository, QuestionCatalog, QuizService,
    QuizSettings, ScoreResult, SessionKey, StaticPostcodeEnricher,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct QuestionsArgs {
    /// Optional CSV question catalog (defaults to the built-in dental quiz)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Answer as question_id=value; repeat for several answers or multi-choice selections.
    /// Defaults to a scripted cosmetic-enquiry lead.
    #[arg(long = "answer", value_parser = parse_answer)]
    pub(crate) answers: Vec<(String, String)>,
    /// Score returned by the stand-in postcode lookup
    #[arg(long, default_value_t = 2)]
    pub(crate) postcode_score: u32,
    /// Optional CSV question catalog (defaults to the built-in dental quiz)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) fn run_questions(args: QuestionsArgs) -> Result<(), AppError> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    render_catalog(&catalog);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        answers,
        postcode_score,
        catalog,
    } = args;

    let catalog = load_catalog(catalog.as_deref())?;
    let answers = if answers.is_empty() {
        scripted_answers()
    } else {
        answers
    };

    let service = QuizService::new(
        Arc::new(catalog),
        Arc::new(MemorySessionRepository::default()),
        Arc::new(StaticPostcodeEnricher::new(postcode_score)),
        Arc::new(LoggingSubmitter),
        QuizSettings::default(),
    );

    println!("Dental lead quiz demo");
    let mut engine = service.open(SessionKey::default());
    for question in service.catalog().questions() {
        let chosen: Vec<&str> = answers
            .iter()
            .filter(|(question_id, _)| question_id == &question.id)
            .map(|(_, value)| value.as_str())
            .collect();

        for value in &chosen {
            if let Err(err) = engine.set_answer(&question.id, value) {
                println!("  Answer rejected: {}", err);
            }
        }

        if chosen.is_empty() {
            println!("- {} -> skipped", question.prompt);
        } else {
            println!("- {} -> {}", question.prompt, chosen.join(", "));
        }
        if let Err(err) = engine.next() {
            println!("  Could not advance: {}", err);
        }
    }

    for (question_id, _) in &answers {
        if service.catalog().question(question_id).is_none() {
            println!("  Ignored answer for unknown question '{}'", question_id);
        }
    }

    println!("\nLive score before enrichment: {}", engine.score().raw_score);

    for update in demo_contact() {
        if let Err(err) = engine.update_contact(update) {
            println!("  Contact update rejected: {}", err);
            return Ok(());
        }
    }

    match engine.submit(Some("utm_source=cli-demo")).await {
        Ok(outcome) => {
            render_score(&outcome.score);
            println!("Redirect after submission: {}", outcome.redirect_to);
        }
        Err(err) => println!("Submission failed: {}", err),
    }

    Ok(())
}

fn scripted_answers() -> Vec<(String, String)> {
    [
        ("visit_reason", "cosmetic"),
        ("start_timeline", "this_week"),
        ("smile_goals", "whitening"),
        ("smile_goals", "straightening"),
        ("membership_interest", "pay_as_you_go"),
        ("dental_anxiety", "relaxed"),
    ]
    .into_iter()
    .map(|(question_id, value)| (question_id.to_string(), value.to_string()))
    .collect()
}

fn demo_contact() -> Vec<ContactUpdate> {
    vec![
        ContactUpdate::Name("Demo Visitor".to_string()),
        ContactUpdate::Email("visitor@example.test".to_string()),
        ContactUpdate::Phone("07700 900000".to_string()),
        ContactUpdate::Postcode("SW1A 1AA".to_string()),
        ContactUpdate::Consent(true),
    ]
}

fn render_catalog(catalog: &QuestionCatalog) {
    println!(
        "Question catalog ({} questions + contact step)",
        catalog.question_count()
    );
    for (index, question) in catalog.questions().iter().enumerate() {
        println!(
            "{}. {} [{}] ({})",
            index + 1,
            question.prompt,
            question.id,
            question.kind.label()
        );
        for option in &question.options {
            println!(
                "   - {} = {} (weight {})",
                option.value, option.label, option.weight
            );
        }
    }
}

fn render_score(score: &ScoreResult) {
    println!("\nScore breakdown:");
    for component in &score.components {
        println!("  - {}: {}", component.question_id, component.contribution);
    }
    println!(
        "Raw {} + postcode {} = final {} -> {} lead",
        score.raw_score,
        score.postcode_score,
        score.final_score,
        score.tier.label()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_demo_runs() {
        run_demo(DemoArgs {
            postcode_score: 2,
            ..DemoArgs::default()
        })
        .await
        .expect("demo runs");
    }

    #[tokio::test]
    async fn demo_tolerates_unknown_answers() {
        run_demo(DemoArgs {
            answers: vec![("favourite_colour".to_string(), "blue".to_string())],
            postcode_score: 0,
            catalog: None,
        })
        .await
        .expect("demo runs");
    }

    #[test]
    fn questions_reports_missing_catalog_files() {
        let result = run_questions(QuestionsArgs {
            catalog: Some(PathBuf::from("/nonexistent/lead-quiz-catalog.csv")),
        });
        assert!(matches!(result, Err(AppError::Catalog(_))));
    }
}
