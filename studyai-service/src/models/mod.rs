//! Typed results the AI provider is asked to produce.
//!
//! Each struct mirrors the JSON schema sent with the request, so a
//! well-behaved provider response deserializes directly into it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Exactly four answer options.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: usize,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub summary: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionStep {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepByStepSolution {
    pub steps: Vec<SolutionStep>,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkError {
    /// Where in the student's work the mistake occurs.
    pub location: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCheck {
    pub correct: bool,
    pub feedback: String,
    #[serde(default)]
    pub errors: Vec<WorkError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashcard_set_parses_from_provider_json() {
        let set: FlashcardSet = serde_json::from_str(
            r#"{"flashcards":[{"front":"Hlavné mesto SR?","back":"Bratislava"}]}"#,
        )
        .unwrap();
        assert_eq!(set.flashcards.len(), 1);
        assert_eq!(set.flashcards[0].back, "Bratislava");
    }

    #[test]
    fn work_check_errors_default_to_empty() {
        let check: WorkCheck =
            serde_json::from_str(r#"{"correct":true,"feedback":"Správne!"}"#).unwrap();
        assert!(check.correct);
        assert!(check.errors.is_empty());
    }

    #[test]
    fn quiz_question_round_trips() {
        let q: QuizQuestion = serde_json::from_str(
            r#"{"question":"2+2?","options":["3","4","5","6"],"correct_index":1,"explanation":"."}"#,
        )
        .unwrap();
        assert_eq!(q.options.len(), 4);
        assert_eq!(q.correct_index, 1);
    }
}
