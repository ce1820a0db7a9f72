use std::collections::HashSet;

use chrono::Utc;

use crate::models::progress::{EvaluatedAnswer, SubmittedAnswer, TestResult};
use crate::models::test::Test;

/// Scores a submitted answer set against a quiz definition.
///
/// Pure and infallible: unmatched question or option ids degrade to skipped
/// or zero-point answers instead of errors, so a buggy client still gets a
/// score back. Full points or nothing per question, no partial credit.
pub fn evaluate(test: &Test, answers: &[SubmittedAnswer], time_spent: i64) -> TestResult {
    // The whole definition counts toward the total, not just answered questions
    let total_points = test.total_points();

    let mut score = 0;
    let mut evaluated = Vec::with_capacity(answers.len());
    let mut seen_questions = HashSet::new();

    for answer in answers {
        let Some(question) = test.question(&answer.question_id) else {
            tracing::warn!(
                "Skipping answer for unknown question {} on test {}",
                answer.question_id,
                test.id
            );
            continue;
        };

        // At most one selection per question; the first one wins
        if !seen_questions.insert(question.id) {
            tracing::warn!(
                "Duplicate answer for question {} on test {}, keeping the first",
                answer.question_id,
                test.id
            );
            continue;
        }

        let correct = question
            .option(&answer.option_id)
            .map(|o| o.is_correct)
            .unwrap_or(false);
        let points = if correct { question.points } else { 0 };
        score += points;

        evaluated.push(EvaluatedAnswer {
            question_id: answer.question_id.clone(),
            option_id: answer.option_id.clone(),
            correct,
            points,
        });
    }

    let percentage = if total_points > 0 {
        (score as f64 / total_points as f64) * 100.0
    } else {
        0.0
    };

    TestResult {
        test: test.id,
        score,
        total_points,
        percentage,
        answers: evaluated,
        time_spent: time_spent.max(0),
        passed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test::{AnswerOption, Question, Test};
    use mongodb::bson::oid::ObjectId;

    fn option(id: ObjectId, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id,
            text: format!("option {}", id.to_hex()),
            is_correct,
        }
    }

    fn question(id: ObjectId, points: i64, options: Vec<AnswerOption>) -> Question {
        Question {
            id,
            text: format!("question {}", id.to_hex()),
            points,
            options,
        }
    }

    fn test_with(questions: Vec<Question>) -> Test {
        Test {
            id: ObjectId::new(),
            title: "Loops and arrays".to_string(),
            description: None,
            group: ObjectId::new(),
            created_by: ObjectId::new(),
            time_limit: 30,
            deadline: None,
            questions,
            is_active: true,
        }
    }

    fn answer(question_id: &ObjectId, option_id: &ObjectId) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id: question_id.to_hex(),
            option_id: option_id.to_hex(),
        }
    }

    #[test]
    fn scores_two_question_submission() {
        let q1 = ObjectId::new();
        let q2 = ObjectId::new();
        let a = ObjectId::new();
        let b = ObjectId::new();
        let c = ObjectId::new();
        let wrong1 = ObjectId::new();

        let test = test_with(vec![
            question(q1, 2, vec![option(a, true), option(wrong1, false)]),
            question(q2, 3, vec![option(b, true), option(c, false)]),
        ]);

        let result = evaluate(&test, &[answer(&q1, &a), answer(&q2, &c)], 120);

        assert_eq!(result.score, 2);
        assert_eq!(result.total_points, 5);
        assert_eq!(result.percentage, 40.0);
        assert_eq!(result.time_spent, 120);
        assert_eq!(
            result.answers,
            vec![
                EvaluatedAnswer {
                    question_id: q1.to_hex(),
                    option_id: a.to_hex(),
                    correct: true,
                    points: 2,
                },
                EvaluatedAnswer {
                    question_id: q2.to_hex(),
                    option_id: c.to_hex(),
                    correct: false,
                    points: 0,
                },
            ]
        );
    }

    #[test]
    fn omitted_question_still_counts_toward_total() {
        let q1 = ObjectId::new();
        let q2 = ObjectId::new();
        let q3 = ObjectId::new();
        let right1 = ObjectId::new();
        let wrong1 = ObjectId::new();
        let right2 = ObjectId::new();
        let wrong2 = ObjectId::new();

        let test = test_with(vec![
            question(q1, 2, vec![option(right1, true), option(wrong1, false)]),
            question(q2, 3, vec![option(right2, true), option(wrong2, false)]),
            question(
                q3,
                5,
                vec![option(ObjectId::new(), true), option(ObjectId::new(), false)],
            ),
        ]);

        // Q1 correct, Q2 incorrect, Q3 omitted
        let result = evaluate(&test, &[answer(&q1, &right1), answer(&q2, &wrong2)], 0);

        assert_eq!(result.score, 2);
        assert_eq!(result.total_points, 10);
        assert_eq!(result.percentage, 20.0);
    }

    #[test]
    fn unmatched_option_is_incorrect_not_an_error() {
        let q1 = ObjectId::new();
        let right = ObjectId::new();

        let test = test_with(vec![question(
            q1,
            4,
            vec![option(right, true), option(ObjectId::new(), false)],
        )]);

        let stray_option = ObjectId::new();
        let result = evaluate(&test, &[answer(&q1, &stray_option)], 0);

        assert_eq!(result.score, 0);
        assert_eq!(result.answers.len(), 1);
        assert!(!result.answers[0].correct);
        assert_eq!(result.answers[0].points, 0);
    }

    #[test]
    fn unmatched_question_is_skipped() {
        let q1 = ObjectId::new();
        let right = ObjectId::new();

        let test = test_with(vec![question(
            q1,
            2,
            vec![option(right, true), option(ObjectId::new(), false)],
        )]);

        let stray_question = ObjectId::new();
        let result = evaluate(
            &test,
            &[answer(&stray_question, &right), answer(&q1, &right)],
            0,
        );

        // The stray answer contributes nothing and is not recorded
        assert_eq!(result.score, 2);
        assert_eq!(result.total_points, 2);
        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.answers[0].question_id, q1.to_hex());
    }

    #[test]
    fn zero_total_points_yields_zero_percentage() {
        let test = test_with(vec![]);

        let result = evaluate(&test, &[], 0);

        assert_eq!(result.score, 0);
        assert_eq!(result.total_points, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn first_selection_wins_on_duplicate_answers() {
        let q1 = ObjectId::new();
        let right = ObjectId::new();
        let wrong = ObjectId::new();

        let test = test_with(vec![question(
            q1,
            3,
            vec![option(right, true), option(wrong, false)],
        )]);

        let result = evaluate(&test, &[answer(&q1, &right), answer(&q1, &wrong)], 0);

        assert_eq!(result.score, 3);
        assert_eq!(result.answers.len(), 1);
        assert!(result.answers[0].correct);
    }

    #[test]
    fn negative_time_spent_is_clamped() {
        let test = test_with(vec![]);

        let result = evaluate(&test, &[], -15);

        assert_eq!(result.time_spent, 0);
    }
}
