//! Prompt builders and output schemas for the study tools.

use serde_json::{json, Value};

/// Hard cap on user-supplied input length.
pub const MAX_INPUT_CHARS: usize = 20_000;

pub fn flashcards_prompt(text: &str, count: usize) -> String {
    format!(
        "Si pomocník pre študentov. Z nasledujúceho študijného textu vytvor {count} \
         kartičiek na učenie. Každá kartička má prednú stranu (otázka alebo pojem) \
         a zadnú stranu (odpoveď alebo vysvetlenie). Odpovedaj v jazyku textu.\n\n\
         Text:\n{text}"
    )
}

pub fn flashcards_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "flashcards": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "front": { "type": "string" },
                        "back": { "type": "string" }
                    },
                    "required": ["front", "back"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["flashcards"],
        "additionalProperties": false
    })
}

pub fn quiz_prompt(text: &str, question_count: usize) -> String {
    format!(
        "Si pomocník pre študentov. Z nasledujúceho študijného textu vytvor kvíz \
         s {question_count} otázkami. Každá otázka má presne 4 možnosti, index \
         správnej odpovede a krátke vysvetlenie. Odpovedaj v jazyku textu.\n\n\
         Text:\n{text}"
    )
}

pub fn quiz_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "question": { "type": "string" },
                        "options": {
                            "type": "array",
                            "items": { "type": "string" },
                            "minItems": 4,
                            "maxItems": 4
                        },
                        "correct_index": { "type": "integer", "minimum": 0, "maximum": 3 },
                        "explanation": { "type": "string" }
                    },
                    "required": ["question", "options", "correct_index", "explanation"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}

pub fn summary_prompt(text: &str, max_points: Option<usize>) -> String {
    let points = max_points
        .map(|n| format!("najviac {n}"))
        .unwrap_or_else(|| "5 až 10".to_string());
    format!(
        "Si pomocník pre študentov. Zhrň nasledujúci študijný text do krátkeho \
         súvislého zhrnutia a {points} kľúčových bodov. Odpovedaj v jazyku textu.\n\n\
         Text:\n{text}"
    )
}

pub fn summary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "key_points": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["summary", "key_points"],
        "additionalProperties": false
    })
}

pub fn steps_prompt(problem: &str) -> String {
    format!(
        "Si trpezlivý učiteľ. Vyrieš nasledujúcu úlohu krok za krokom. Každý krok \
         má krátky názov a podrobné vysvetlenie, na konci uveď výslednú odpoveď. \
         Odpovedaj v jazyku zadania.\n\nÚloha:\n{problem}"
    )
}

pub fn steps_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "detail": { "type": "string" }
                    },
                    "required": ["title", "detail"],
                    "additionalProperties": false
                }
            },
            "answer": { "type": "string" }
        },
        "required": ["steps", "answer"],
        "additionalProperties": false
    })
}

pub fn work_check_prompt(problem: &str, student_work: &str) -> String {
    format!(
        "Si trpezlivý učiteľ. Skontroluj riešenie študenta. Posúď, či je správne, \
         napíš povzbudivú spätnú väzbu a vymenuj konkrétne chyby (kde sa nachádzajú \
         a prečo sú chybou). Odpovedaj v jazyku zadania.\n\n\
         Úloha:\n{problem}\n\nRiešenie študenta:\n{student_work}"
    )
}

pub fn work_check_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "correct": { "type": "boolean" },
            "feedback": { "type": "string" },
            "errors": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "location": { "type": "string" },
                        "explanation": { "type": "string" }
                    },
                    "required": ["location", "explanation"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["correct", "feedback", "errors"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_user_input() {
        let prompt = flashcards_prompt("Mitochondria je elektráreň bunky.", 12);
        assert!(prompt.contains("12"));
        assert!(prompt.contains("Mitochondria"));

        let prompt = work_check_prompt("2+2", "2+2=5");
        assert!(prompt.contains("2+2=5"));
    }

    #[test]
    fn schemas_are_strict_objects() {
        for schema in [
            flashcards_schema(),
            quiz_schema(),
            summary_schema(),
            steps_schema(),
            work_check_schema(),
        ] {
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["additionalProperties"], false);
        }
    }

    #[test]
    fn summary_prompt_defaults_point_range() {
        assert!(summary_prompt("text", None).contains("5 až 10"));
        assert!(summary_prompt("text", Some(3)).contains("najviac 3"));
    }
}
