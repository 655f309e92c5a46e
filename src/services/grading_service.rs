use crate::models::answer::Answer;
use crate::models::exam_session::Score;
use crate::models::question::Question;

pub struct GradingService;

impl GradingService {
    /// Counts answers whose selected option equals the question's correct option.
    /// Answers to unknown questions are ignored; the last answer per question wins.
    pub fn grade(questions: &[Question], answers: &[Answer]) -> Score {
        let mut correct: u32 = 0;

        for q in questions {
            let given = answers.iter().rev().find(|a| a.question_id == q.id);
            if let Some(answer) = given {
                if answer.selected_answer == q.correct_answer {
                    correct += 1;
                }
            }
        }

        Score {
            correct,
            total: questions.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::sample_questions;

    fn answer(id: &str, selected: &str) -> Answer {
        Answer {
            question_id: id.to_string(),
            selected_answer: selected.to_string(),
            time_spent_seconds: 5,
        }
    }

    #[test]
    fn counts_exact_matches_only() {
        let questions = sample_questions();
        let answers = vec![answer("q1", "Paris"), answer("q2", "Earth"), answer("q3", "pacific ocean")];
        let score = GradingService::grade(&questions, &answers);
        assert_eq!(score.correct, 1);
        assert_eq!(score.total, questions.len() as u32);
    }

    #[test]
    fn latest_answer_per_question_wins() {
        let questions = sample_questions();
        let answers = vec![answer("q2", "Mars"), answer("q2", "Saturn")];
        assert_eq!(GradingService::grade(&questions, &answers).correct, 0);
    }

    #[test]
    fn unknown_questions_are_ignored() {
        let questions = sample_questions();
        let answers = vec![answer("nope", "Paris")];
        assert_eq!(GradingService::grade(&questions, &answers).correct, 0);
    }
}
