//! crates/eduforge_core/src/content.rs
//!
//! Turns a (topic, learner level, learning style) triple into a structured
//! educational payload.
//!
//! The model is asked for JSON but routinely wraps it in markdown fences,
//! prose, or trailing commentary, so the reply is cleaned, the first balanced
//! JSON object is cut out and then checked against the payload schema. Any
//! failure along the way yields a deterministic payload built from templates.

use crate::completion::{CompletionError, ResilientCompletionClient};
use crate::domain::{EducationalContent, Flashcard, PromptMessage, QuizItem, UiSuggestions};
use crate::styles::LearningStyle;
use regex::Regex;
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::sync::{Arc, LazyLock};
use tracing::{error, info};

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are an expert educational content creator specializing in {learning_style} learning.

Create comprehensive educational content for {learner_level} level learners about: {topic}

Learning Style Focus: {content_emphasis}
Quiz Style: {quiz_style}
{prompt_suffix}

Generate ONLY valid JSON with this exact structure:
{
  "learning_objectives": [
    "Detailed objective 1 (specific and measurable)",
    "Detailed objective 2 (with action verbs)",
    "Detailed objective 3 (tailored to {learner_level} level)",
    "Detailed objective 4 (aligned with {learning_style} learning)",
    "Detailed objective 5 (practical application)"
  ],
  "video_script": "Comprehensive 3-4 minute script with [SCENE: description] markers for visual cues. Include engaging narration tailored for {learning_style} learners. Format with proper paragraphs and scene breaks.",
  "quiz": [
    {
      "question": "Thought-provoking question 1",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": 0,
      "explanation": "Detailed explanation with learning reinforcement",
      "hint": "Helpful hint for learners"
    },
    {
      "question": "Application-based question 2",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": 1,
      "explanation": "Clear explanation connecting to learning objectives",
      "hint": "Guiding hint"
    },
    {
      "question": "Analysis question 3",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": 2,
      "explanation": "Comprehensive explanation",
      "hint": "Strategic hint"
    },
    {
      "question": "Synthesis question 4",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": 1,
      "explanation": "In-depth explanation",
      "hint": "Learning-focused hint"
    },
    {
      "question": "Evaluation question 5",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct_answer": 3,
      "explanation": "Detailed explanation with examples",
      "hint": "Supportive hint"
    }
  ],
  "flashcards": [
    {"front": "Key concept 1", "back": "Comprehensive explanation with examples"},
    {"front": "Important term 2", "back": "Clear definition with context"},
    {"front": "Process/Method 3", "back": "Step-by-step explanation"},
    {"front": "Application 4", "back": "Real-world example and usage"},
    {"front": "Connection 5", "back": "How this relates to broader concepts"},
    {"front": "Practice 6", "back": "Example problem or scenario"},
    {"front": "Summary 7", "back": "Key takeaway and importance"},
    {"front": "Next Steps 8", "back": "What to learn next or how to apply"}
  ],
  "ui_suggestions": {
    "color_scheme": "Recommended colors based on topic and learning style",
    "layout_emphasis": "Visual focus areas for {learning_style} learners",
    "interaction_type": "Recommended interaction patterns"
  }
}

Ensure the content is engaging, age-appropriate for {learner_level} level, and optimized for {learning_style} learning style."#;

const DEFAULT_HINT: &str = "Think about the key concepts we discussed.";
const DEFAULT_COLOR_SCHEME: &str = "Blue and purple gradients for focus and creativity";

const OBJECTIVE_COUNT: RangeInclusive<usize> = 3..=5;
const QUIZ_COUNT: RangeInclusive<usize> = 3..=5;
const FLASHCARD_COUNT: RangeInclusive<usize> = 3..=8;
const OPTIONS_PER_QUESTION: usize = 4;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("code fence pattern is valid"));
static LEADING_PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*here is[^{\n]*?:").expect("leading prose pattern is valid")
});

//=========================================================================================
// Errors and Settings
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone)]
pub struct SynthesizerSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            temperature: 0.7,
            max_output_tokens: 4000,
        }
    }
}

//=========================================================================================
// The Synthesizer
//=========================================================================================

pub struct ContentSynthesizer {
    client: Arc<ResilientCompletionClient>,
    settings: SynthesizerSettings,
}

impl ContentSynthesizer {
    pub fn new(client: Arc<ResilientCompletionClient>, settings: SynthesizerSettings) -> Self {
        Self { client, settings }
    }

    /// Returns a payload for the triple. Never fails: provider or parsing
    /// problems produce the template fallback instead.
    pub async fn synthesize(
        &self,
        topic: &str,
        learner_level: &str,
        learning_style: &str,
    ) -> EducationalContent {
        match self.try_synthesize(topic, learner_level, learning_style).await {
            Ok(content) => content,
            Err(e) => {
                error!("Error generating educational content: {}", e);
                info!("Serving fallback content for topic '{}'", topic);
                fallback_content(topic, learner_level, learning_style)
            }
        }
    }

    async fn try_synthesize(
        &self,
        topic: &str,
        learner_level: &str,
        learning_style: &str,
    ) -> Result<EducationalContent, SynthesisError> {
        let messages = vec![
            PromptMessage::system(build_system_prompt(topic, learner_level, learning_style)),
            PromptMessage::user(format!("Create educational content for: {}", topic)),
        ];

        let reply = self
            .client
            .complete(
                messages,
                &self.settings.model,
                self.settings.temperature,
                self.settings.max_output_tokens,
            )
            .await?;

        parse_content(&reply, learning_style)
    }
}

fn build_system_prompt(topic: &str, learner_level: &str, learning_style: &str) -> String {
    let profile = LearningStyle::parse_or_default(learning_style).profile();
    SYSTEM_PROMPT_TEMPLATE
        .replace("{content_emphasis}", profile.content_emphasis)
        .replace("{quiz_style}", profile.quiz_style)
        .replace("{prompt_suffix}", profile.prompt_suffix)
        .replace("{learner_level}", learner_level)
        .replace("{learning_style}", learning_style)
        .replace("{topic}", topic)
}

//=========================================================================================
// Parsing and Validation
//=========================================================================================

/// Removes markdown code fences and a leading "Here is ...:" preamble.
pub fn strip_decorations(text: &str) -> String {
    let without_fences = CODE_FENCE.replace_all(text, "");
    LEADING_PROSE.replace(&without_fences, "").trim().to_string()
}

/// Returns the first complete `{...}` object in `text`.
///
/// Braces are counted from the first `{` until depth returns to zero, skipping
/// braces that sit inside JSON string literals. Anything after the object is
/// ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Deserialize)]
struct RawQuizItem {
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    explanation: String,
    #[serde(default)]
    hint: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawUiSuggestions {
    color_scheme: Option<String>,
    layout_emphasis: Option<String>,
    interaction_type: Option<String>,
}

#[derive(Deserialize)]
struct RawContent {
    learning_objectives: Vec<String>,
    video_script: String,
    quiz: Vec<RawQuizItem>,
    flashcards: Vec<Flashcard>,
    #[serde(default)]
    ui_suggestions: RawUiSuggestions,
}

/// Parses a raw model reply into a validated payload.
pub fn parse_content(reply: &str, learning_style: &str) -> Result<EducationalContent, SynthesisError> {
    let cleaned = strip_decorations(reply);
    let json = extract_json_object(&cleaned)
        .ok_or_else(|| SynthesisError::MalformedPayload("no JSON object found in response".into()))?;
    let raw: RawContent = serde_json::from_str(json)
        .map_err(|e| SynthesisError::MalformedPayload(e.to_string()))?;
    raw.validate(learning_style)
}

fn check_count(field: &str, len: usize, allowed: &RangeInclusive<usize>) -> Result<(), SynthesisError> {
    if allowed.contains(&len) {
        Ok(())
    } else {
        Err(SynthesisError::MalformedPayload(format!(
            "{} has {} entries, expected {} to {}",
            field,
            len,
            allowed.start(),
            allowed.end()
        )))
    }
}

impl RawContent {
    fn validate(self, learning_style: &str) -> Result<EducationalContent, SynthesisError> {
        check_count("learning_objectives", self.learning_objectives.len(), &OBJECTIVE_COUNT)?;
        check_count("quiz", self.quiz.len(), &QUIZ_COUNT)?;
        check_count("flashcards", self.flashcards.len(), &FLASHCARD_COUNT)?;
        if self.video_script.trim().is_empty() {
            return Err(SynthesisError::MalformedPayload("video_script is empty".into()));
        }

        let quiz = self
            .quiz
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                if item.options.len() != OPTIONS_PER_QUESTION {
                    return Err(SynthesisError::MalformedPayload(format!(
                        "quiz item {} has {} options",
                        i,
                        item.options.len()
                    )));
                }
                if item.correct_answer >= item.options.len() {
                    return Err(SynthesisError::MalformedPayload(format!(
                        "quiz item {} correct_answer {} is out of range",
                        i, item.correct_answer
                    )));
                }
                Ok(QuizItem {
                    question: item.question,
                    options: item.options,
                    correct_answer: item.correct_answer,
                    explanation: item.explanation,
                    hint: item.hint.unwrap_or_else(|| DEFAULT_HINT.to_string()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ui = self.ui_suggestions;
        let ui_suggestions = UiSuggestions {
            color_scheme: ui
                .color_scheme
                .unwrap_or_else(|| DEFAULT_COLOR_SCHEME.to_string()),
            layout_emphasis: ui
                .layout_emphasis
                .unwrap_or_else(|| format!("Optimized for {} learning", learning_style)),
            interaction_type: ui
                .interaction_type
                .unwrap_or_else(|| format!("Interactive elements for {} learners", learning_style)),
        };

        Ok(EducationalContent {
            learning_objectives: self.learning_objectives,
            video_script: self.video_script,
            quiz,
            flashcards: self.flashcards,
            ui_suggestions,
        })
    }
}

//=========================================================================================
// Fallback Payload
//=========================================================================================

/// Builds the template payload used when the model cannot be used.
/// A pure function of its inputs.
pub fn fallback_content(topic: &str, learner_level: &str, learning_style: &str) -> EducationalContent {
    let profile = LearningStyle::parse_or_default(learning_style).profile();
    let emphasis = profile.content_emphasis;

    let video_script = format!(
        "[SCENE: Introduction with {topic} overview]
Welcome to this comprehensive {learner_level} lesson on {topic}! Today we'll explore this fascinating subject through a {learning_style} learning approach.

[SCENE: Core concepts explanation]
Let's start by understanding what {topic} really means and why it's important in today's world. {emphasis} will help us grasp these concepts effectively.

[SCENE: Detailed breakdown]
Now, let's dive deeper into the key components and examine how they work together to form the complete picture of {topic}.

[SCENE: Practical applications]
Finally, we'll see how {topic} applies to real-world situations and how you can use this knowledge in practical scenarios.

[SCENE: Summary and next steps]
To summarize, we've covered the essential aspects of {topic} using {learning_style} learning techniques. Remember to practice these concepts and explore further!"
    );

    let options = |items: [&str; 4]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    EducationalContent {
        learning_objectives: vec![
            format!("Understand the fundamental concepts of {}", topic),
            format!("Analyze key components and their relationships in {}", topic),
            format!("Apply {} principles to real-world scenarios", topic),
            format!("Evaluate different approaches and methods in {}", topic),
            format!("Create solutions using {} knowledge and skills", topic),
        ],
        video_script,
        quiz: vec![
            QuizItem {
                question: format!("What is the primary focus of {}?", topic),
                options: options(["Option A", "Option B", "Option C", "Option D"]),
                correct_answer: 0,
                explanation: format!(
                    "The primary focus helps establish the foundation for understanding {} at the {} level.",
                    topic, learner_level
                ),
                hint: "Think about the core purpose and main objectives.".to_string(),
            },
            QuizItem {
                question: format!("How does {} apply to real-world scenarios?", topic),
                options: options([
                    "Limited applications",
                    "Broad practical uses",
                    "Theoretical only",
                    "Outdated concepts",
                ]),
                correct_answer: 1,
                explanation: format!(
                    "{} has extensive real-world applications across many fields.",
                    topic
                ),
                hint: "Consider the practical benefits and widespread usage.".to_string(),
            },
            QuizItem {
                question: format!(
                    "What makes {} particularly suitable for {} learners?",
                    topic, learning_style
                ),
                options: options([
                    "Text-heavy content",
                    emphasis,
                    "Audio-only format",
                    "Abstract concepts",
                ]),
                correct_answer: 1,
                explanation: format!(
                    "The emphasis on {} aligns perfectly with {} learning preferences.",
                    emphasis, learning_style
                ),
                hint: "Think about how the content is presented and structured.".to_string(),
            },
        ],
        flashcards: vec![
            Flashcard {
                front: format!("What is {}?", topic),
                back: "A comprehensive subject area with practical applications and theoretical foundations."
                    .to_string(),
            },
            Flashcard {
                front: format!("Key benefits of {}", topic),
                back: "Provides practical skills, theoretical understanding, and real-world applications."
                    .to_string(),
            },
            Flashcard {
                front: format!("{} learning approach", learning_style),
                back: format!("Emphasizes {} for optimal learning experience.", emphasis),
            },
        ],
        ui_suggestions: UiSuggestions {
            color_scheme: "Blue and green gradients for trust and growth".to_string(),
            layout_emphasis: format!("Focus on {}", profile.video_style),
            interaction_type: format!("Interactive elements suited for {} learners", learning_style),
        },
    }
}
