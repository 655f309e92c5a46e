use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Question set used when an exam carries none of its own.
pub fn sample_questions() -> Vec<Question> {
    let q = |id: &str, question: &str, options: [&str; 4], correct: &str| Question {
        id: id.to_string(),
        question: question.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct.to_string(),
        image: None,
    };
    vec![
        q("q1", "What is the capital of France?", ["Berlin", "Madrid", "Paris", "Rome"], "Paris"),
        q("q2", "Which planet is known as the Red Planet?", ["Earth", "Mars", "Jupiter", "Saturn"], "Mars"),
        q(
            "q3",
            "What is the largest ocean on Earth?",
            ["Atlantic Ocean", "Indian Ocean", "Arctic Ocean", "Pacific Ocean"],
            "Pacific Ocean",
        ),
        q(
            "q4",
            "Who wrote \"Hamlet\"?",
            ["Charles Dickens", "William Shakespeare", "Leo Tolstoy", "Mark Twain"],
            "William Shakespeare",
        ),
    ]
}
