//! Response text extraction from the inference transcript.
//!
//! Newer engine builds log the final message as JSON behind a fixed marker;
//! older builds interleave the answer with banners, spinner animation and
//! prompt echoes, which the heuristic tier scrubs line by line. A corrupt
//! structured payload downgrades to the heuristic tier instead of failing
//! the run.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::warn;

/// Marker the engine prints before the serialized final message.
pub const PARSED_MESSAGE_MARKER: &str = "Parsed message:";

/// Result of response extraction. Distinguishes "no structured payload"
/// from "structured payload present but malformed" so callers can alert on
/// the latter without treating either as fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Tier 1: parsed out of the structured payload.
    Structured(String),
    /// Tier 2: no payload marker found, heuristic scrub of the transcript.
    Heuristic(String),
    /// Payload marker found but unparsable; heuristic text used instead.
    Degraded(String),
}

impl ResponseOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Structured(s) | Self::Heuristic(s) | Self::Degraded(s) => s,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Structured(s) | Self::Heuristic(s) | Self::Degraded(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct ParsedMessage {
    content: String,
}

enum StructuredTier {
    Found(String),
    Corrupt,
    Absent,
}

pub fn extract_response(transcript: &str) -> ResponseOutcome {
    match structured_tier(transcript) {
        StructuredTier::Found(text) => ResponseOutcome::Structured(text),
        StructuredTier::Corrupt => {
            warn!("structured response payload corrupt, falling back to heuristic scrub");
            ResponseOutcome::Degraded(heuristic_tier(transcript))
        }
        StructuredTier::Absent => ResponseOutcome::Heuristic(heuristic_tier(transcript)),
    }
}

fn structured_tier(transcript: &str) -> StructuredTier {
    let Some(line) = transcript
        .lines()
        .find(|line| line.contains(PARSED_MESSAGE_MARKER))
    else {
        return StructuredTier::Absent;
    };

    let after_marker = &line[line.find(PARSED_MESSAGE_MARKER).unwrap() + PARSED_MESSAGE_MARKER.len()..];
    let Some(brace) = after_marker.find('{') else {
        return StructuredTier::Corrupt;
    };

    // Tolerate trailing text after the object; logcat appends freely.
    let mut de = serde_json::Deserializer::from_str(&after_marker[brace..]);
    match ParsedMessage::deserialize(&mut de) {
        Ok(message) => StructuredTier::Found(message.content),
        Err(_) => StructuredTier::Corrupt,
    }
}

/// Line markers for engine chatter that is never part of the answer.
const NOISE_PREFIXES: &[&str] = &[
    "build:",
    "main:",
    "llama_",
    "llm_load",
    "ggml_",
    "system_info",
    "sampler",
    "sampling",
    "prefill time:",
    "decode time:",
    "- Press Return",
    "- To return control",
    "== Running in interactive mode",
];

// Compact-dialect throughput line, e.g. `40.12 tokens/s`.
static TPS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?\s*tokens/s").unwrap());

/// Block-art and mojibake fragments from the startup banner.
const GLYPH_MARKERS: &[&str] = &["▄", "▀", "█", "â–", "\u{FFFD}"];

const ROLE_PREFIXES: &[&str] = &["assistant:", "user:", "system:", "llama:", "> "];

fn is_noise(line: &str) -> bool {
    let trimmed = line.trim_start();
    if NOISE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if GLYPH_MARKERS.iter().any(|g| line.contains(g)) {
        return true;
    }
    // Echo of the quoted prompt.
    if trimmed.starts_with('"') {
        return true;
    }
    // Throughput chatter such as `Prompt: 10 t/s`.
    if line.contains("t/s") && line.contains("Prompt") {
        return true;
    }
    if TPS_LINE_RE.is_match(trimmed) {
        return true;
    }
    false
}

fn is_spinner_glyph(c: char) -> bool {
    // Braille patterns block, used by the progress spinner.
    ('\u{2800}'..='\u{28FF}').contains(&c)
}

fn clean_line(line: &str) -> String {
    let mut text: String = line.chars().filter(|c| *c != '\u{0008}').collect();

    // Strip leading spinner glyphs and role prefixes to a fixpoint, so a
    // second pass over already-clean text removes nothing more.
    loop {
        let stripped = text
            .trim_start()
            .trim_start_matches(is_spinner_glyph)
            .trim_start();
        let lower = stripped.to_lowercase();
        let mut next = stripped.to_string();
        for prefix in ROLE_PREFIXES {
            if lower.starts_with(prefix) {
                next = stripped[prefix.len()..].trim_start().to_string();
                break;
            }
        }
        if next == text {
            break;
        }
        text = next;
    }
    text
}

pub fn heuristic_tier(transcript: &str) -> String {
    let lines: Vec<String> = transcript
        .lines()
        .filter(|line| !is_noise(line))
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_payload() {
        let transcript = "main: loading model\nParsed message: {\"content\": \"Hello world\"}\ndone\n";
        let outcome = extract_response(transcript);
        assert_eq!(outcome, ResponseOutcome::Structured("Hello world".into()));
    }

    #[test]
    fn test_structured_payload_with_trailing_text() {
        let transcript = "Parsed message: {\"content\": \"Hi\"} (eom)\n";
        assert_eq!(
            extract_response(transcript),
            ResponseOutcome::Structured("Hi".into())
        );
    }

    #[test]
    fn test_corrupt_payload_degrades_to_heuristic() {
        let transcript = "Parsed message: {\"content\": \"Hel\nOnce upon a time.\n";
        let outcome = extract_response(transcript);
        assert!(outcome.is_degraded());
        assert!(outcome.text().contains("Once upon a time."));
    }

    #[test]
    fn test_marker_without_object_is_corrupt() {
        let outcome = extract_response("Parsed message: <binary>\nanswer text\n");
        assert!(outcome.is_degraded());
        assert_eq!(outcome.text(), "answer text");
    }

    #[test]
    fn test_heuristic_scrub() {
        let transcript = "\
build: 3620 (abc123) with clang
main: llama threadpool init, n_threads = 8
▄▀█ banner art
\"Write a story about a robot.\"
⠹ Assistant: Once upon a time, a robot learned to sing.
Prompt: 10 t/s
It sang every day.
llama_print_timings: total time = 1000.00 ms
";
        let outcome = extract_response(transcript);
        assert_eq!(
            outcome,
            ResponseOutcome::Heuristic(
                "Once upon a time, a robot learned to sing.\nIt sang every day.".into()
            )
        );
    }

    #[test]
    fn test_compact_timing_chatter_scrubbed() {
        let transcript = "\
prefill time: 512
decode time: 3187
Once upon a time, a robot learned to sing.
40.12 tokens/s
";
        let text = heuristic_tier(transcript);
        assert_eq!(text, "Once upon a time, a robot learned to sing.");
        assert_eq!(heuristic_tier(&text), text);
    }

    #[test]
    fn test_backspace_and_spinner_stripping() {
        let text = heuristic_tier("⠋⠙ hello\u{0008}\u{0008}world\n");
        assert_eq!(text, "helloworld");
    }

    #[test]
    fn test_role_prefix_case_insensitive() {
        assert_eq!(heuristic_tier("ASSISTANT: fine\n"), "fine");
        assert_eq!(heuristic_tier("> User: stacked prefixes\n"), "stacked prefixes");
    }

    #[test]
    fn test_sanitizer_idempotent() {
        let once = heuristic_tier("⠹ Assistant: The answer is 42.\nmain: shutting down\n");
        assert_eq!(once, "The answer is 42.");
        assert_eq!(heuristic_tier(&once), once);

        // Structured-tier output must survive a re-scrub unchanged too.
        let structured = extract_response("Parsed message: {\"content\": \"Hello world\"}\n");
        assert_eq!(heuristic_tier(structured.text()), "Hello world");
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(
            extract_response(""),
            ResponseOutcome::Heuristic(String::new())
        );
    }
}
