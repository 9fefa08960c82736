//! crates/eduforge_core/src/styles.rs
//!
//! Learning styles and learner levels, and the presentation profile attached to
//! each style.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningStyle {
    Visual,
    Auditory,
    Reading,
    Kinesthetic,
    Comprehensive,
}

/// How content should lean for a given learning style.
#[derive(Debug, Clone, Copy)]
pub struct StyleProfile {
    pub content_emphasis: &'static str,
    pub video_style: &'static str,
    pub quiz_style: &'static str,
    pub prompt_suffix: &'static str,
}

impl LearningStyle {
    pub const ALL: [LearningStyle; 5] = [
        LearningStyle::Visual,
        LearningStyle::Auditory,
        LearningStyle::Reading,
        LearningStyle::Kinesthetic,
        LearningStyle::Comprehensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::Reading => "reading",
            LearningStyle::Kinesthetic => "kinesthetic",
            LearningStyle::Comprehensive => "comprehensive",
        }
    }

    /// Parses a style name, treating anything unknown as `Visual`.
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or(LearningStyle::Visual)
    }

    pub fn profile(&self) -> StyleProfile {
        match self {
            LearningStyle::Visual => StyleProfile {
                content_emphasis: "diagrams, infographics, visual scenes, charts, mind maps",
                video_style: "rich visual content with diagrams and animations",
                quiz_style: "visual-based questions with image descriptions",
                prompt_suffix: "Focus on visual elements, diagrams, and scene descriptions. Use visual metaphors and spatial relationships.",
            },
            LearningStyle::Auditory => StyleProfile {
                content_emphasis: "narration, dialogues, discussions, audio explanations",
                video_style: "podcast-style with detailed audio explanations and dialogues",
                quiz_style: "listening-based and discussion questions",
                prompt_suffix: "Emphasize audio content, conversations, and verbal explanations. Use dialogue format and discussion-based learning.",
            },
            LearningStyle::Reading => StyleProfile {
                content_emphasis: "detailed text notes, structured outlines, written summaries",
                video_style: "text-heavy slides with detailed written content",
                quiz_style: "reading comprehension and written analysis questions",
                prompt_suffix: "Focus on detailed written content, structured text, and comprehensive reading materials. Use bullet points and organized text.",
            },
            LearningStyle::Kinesthetic => StyleProfile {
                content_emphasis: "hands-on activities, simulations, interactive experiments",
                video_style: "demonstration-focused with step-by-step practical examples",
                quiz_style: "interactive and simulation-based questions with practical scenarios",
                prompt_suffix: "Emphasize hands-on learning, practical examples, and interactive elements. Include 'try-it-yourself' activities and real-world applications.",
            },
            LearningStyle::Comprehensive => StyleProfile {
                content_emphasis: "multi-modal content combining visual, auditory, and practical elements",
                video_style: "balanced approach with visuals, clear narration, and practical examples",
                quiz_style: "diverse question types covering multiple learning approaches",
                prompt_suffix: "Create comprehensive content that appeals to all learning styles. Include visual elements, clear explanations, practical examples, and interactive components.",
            },
        }
    }
}

impl fmt::Display for LearningStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

impl FromStr for LearningStyle {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        LearningStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| ParseNameError {
                kind: "learning style",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl LearnerLevel {
    pub const ALL: [LearnerLevel; 3] = [
        LearnerLevel::Beginner,
        LearnerLevel::Intermediate,
        LearnerLevel::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearnerLevel::Beginner => "beginner",
            LearnerLevel::Intermediate => "intermediate",
            LearnerLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for LearnerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LearnerLevel {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        LearnerLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ParseNameError {
                kind: "learner level",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Kinesthetic".parse::<LearningStyle>().unwrap(), LearningStyle::Kinesthetic);
        assert_eq!(" ADVANCED ".parse::<LearnerLevel>().unwrap(), LearnerLevel::Advanced);
        assert!("telepathic".parse::<LearningStyle>().is_err());
        assert!("expert".parse::<LearnerLevel>().is_err());
    }

    #[test]
    fn unknown_style_defaults_to_visual() {
        assert_eq!(LearningStyle::parse_or_default("interpretive dance"), LearningStyle::Visual);
    }

    #[test]
    fn profiles_differ_per_style() {
        let visual = LearningStyle::Visual.profile();
        let auditory = LearningStyle::Auditory.profile();
        assert_ne!(visual.content_emphasis, auditory.content_emphasis);
        assert_ne!(visual.video_style, auditory.video_style);
    }
}
