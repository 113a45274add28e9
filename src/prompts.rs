//! Prompt construction for chapter illustrations.
//!
//! Every prompt string lives here so that prompt changes touch exactly one
//! module and unit tests can inspect them without a provider.
//!
//! Two policies coexist (see [`PromptPolicy`]):
//!
//! * **KeywordSafe** — for grades up to the configured threshold the topic is
//!   scanned for a fixed keyword and a canned classroom description is
//!   returned. The chapter text is not used. Older grades use the template.
//! * **Generic** — the structured template below, for every grade.

use crate::config::PromptPolicy;
use crate::error::Pdf2ImgError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Canned illustration descriptions, scanned in this order.
///
/// The first keyword contained in the lower-cased topic wins.
pub const YOUNG_GRADE_PROMPTS: &[(&str, &str)] = &[
    (
        "moral",
        "Cartoon-style flat illustration showing a well-lit classroom with toys, books, charts, and a blackboard with drawings",
    ),
    (
        "story",
        "An educational illustration of a bright classroom desk with books, pencils, and a glowing lamp",
    ),
    (
        "reading",
        "Illustration of an open colorful storybook on a school desk with classroom posters in the background",
    ),
    (
        "children",
        "Cartoon-style school bag with learning material on a desk in a colorful classroom",
    ),
    (
        "learn",
        "Illustration of a blackboard with alphabet letters, books, and stationery in a cartoon classroom",
    ),
    (
        "school",
        "Cartoon drawing of a school building exterior with a garden, books, and sun in the sky",
    ),
];

/// Returned for young grades when no keyword matches.
pub const FALLBACK_PROMPT: &str = "A bright cartoon illustration with happy children";

static GRADE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Grade (-?\d+)|(\d+))$").expect("valid grade regex")
});

/// Parse a grade given as `N` or `Grade N`.
///
/// Surrounding whitespace is ignored. The bare form is digits only; the
/// `Grade N` form also takes a sign. Values beyond `i64` saturate.
pub fn parse_grade(input: &str) -> Result<i64, Pdf2ImgError> {
    let caps = GRADE_RE
        .captures(input.trim())
        .ok_or_else(|| Pdf2ImgError::InvalidGrade {
            input: input.to_string(),
        })?;
    let digits = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default();

    Ok(digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Canned prompt for a topic, or [`FALLBACK_PROMPT`] when nothing matches.
pub fn canned_prompt(topic: &str) -> &'static str {
    let topic = topic.to_lowercase();
    YOUNG_GRADE_PROMPTS
        .iter()
        .find(|(keyword, _)| topic.contains(keyword))
        .map(|(_, prompt)| *prompt)
        .unwrap_or(FALLBACK_PROMPT)
}

/// Structured template embedding topic, chapter text and grade.
pub fn generic_prompt(topic: &str, chapter_text: &str, grade: i64) -> String {
    format!(
        r#"You are an AI educational assistant.

You are given:
1. A topic: "{topic}"
2. Chapter content extracted from a textbook PDF: "{chapter_text}"
3. The grade level of the textbook: "Grade {grade}"

Your task:
- Generate a high-quality, realistic, and grade-appropriate educational image based on the given topic.
- Ensure the image content is derived from the chapter and suitable for the specified grade level.
- The image should be informative, visually engaging, and contextually relevant.
- Keep complexity aligned with the grade. For lower grades, keep it simple and colorful. For higher grades, add scientific/technical accuracy.
"#
    )
}

/// Build the provider prompt according to `policy`.
pub fn build_prompt(
    policy: PromptPolicy,
    topic: &str,
    chapter_text: &str,
    grade: i64,
    young_grade_max: u32,
) -> String {
    match policy {
        PromptPolicy::KeywordSafe if grade <= i64::from(young_grade_max) => canned_prompt(topic).to_string(),
        PromptPolicy::KeywordSafe | PromptPolicy::Generic => {
            generic_prompt(topic, chapter_text, grade)
        }
    }
}
