//! Content differ and update validator.
//!
//! Pure functions that compare two content snapshots and flag replacements
//! that look unsafe to commit. The gate is a heuristic: large legitimate
//! rewrites are rejected and small destructive edits pass.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Maximum number of mismatch locations kept in a [`ContentDiff`].
pub const MAX_DIFF_SAMPLES: usize = 10;

/// Updates changing strictly more than this share of positions are rejected.
pub const MAX_CHANGE_PERCENTAGE: f64 = 80.0;

/// Brace-delimited substrings longer than this must parse as JSON.
pub const JSON_CANDIDATE_MIN_LEN: usize = 20;

/// HTML elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
  "wbr",
];

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)(?:\s[^<>]*)?>").expect("Invalid open-tag regex")
});

static CLOSE_TAG: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"</[A-Za-z][A-Za-z0-9-]*\s*>").expect("Invalid close-tag regex"));

static JSON_CANDIDATE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("Invalid JSON-candidate regex"));

// ─── Diff ────────────────────────────────────────────────────────────────────

/// One position at which the two snapshots disagree. An empty string stands
/// in for a position past the end of the shorter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLocation {
  pub position: usize,
  pub left:     String,
  pub right:    String,
}

/// Ephemeral comparison result; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentDiff {
  pub diff_count: usize,
  /// Mismatches as a percentage of the longer snapshot's length.
  pub percentage: f64,
  pub samples:    Vec<DiffLocation>,
}

/// Compare `a` and `b` position by position (by `char`) up to the length of
/// the longer one.
pub fn calculate_content_diff(a: &str, b: &str) -> ContentDiff {
  let left: Vec<char> = a.chars().collect();
  let right: Vec<char> = b.chars().collect();
  let len = left.len().max(right.len());

  let mut diff_count = 0;
  let mut samples = Vec::new();

  for position in 0..len {
    let l = left.get(position);
    let r = right.get(position);
    if l == r {
      continue;
    }
    diff_count += 1;
    if samples.len() < MAX_DIFF_SAMPLES {
      samples.push(DiffLocation {
        position,
        left: l.map(char::to_string).unwrap_or_default(),
        right: r.map(char::to_string).unwrap_or_default(),
      });
    }
  }

  let percentage = if len == 0 {
    0.0
  } else {
    diff_count as f64 * 100.0 / len as f64
  };

  ContentDiff {
    diff_count,
    percentage,
    samples,
  }
}

// ─── Problem detection ───────────────────────────────────────────────────────

/// A structural or encoding issue found in a content snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum ContentProblem {
  UnbalancedTags { open: usize, close: usize },
  MalformedJson { snippet: String },
  ControlCharacters { count: usize },
}

impl fmt::Display for ContentProblem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::UnbalancedTags { open, close } => {
        write!(f, "unbalanced tags ({open} opening, {close} closing)")
      }
      Self::MalformedJson { snippet } => write!(f, "malformed JSON near {snippet:?}"),
      Self::ControlCharacters { count } => write!(f, "{count} control character(s)"),
    }
  }
}

/// Code points treated as problem characters: C0 and C1 controls except tab,
/// line feed and carriage return, plus the Unicode line and paragraph
/// separators.
fn is_problem_char(c: char) -> bool {
  matches!(c as u32, 0..=8 | 11 | 12 | 14..=31 | 127..=159 | 0x2028 | 0x2029)
}

/// Flag unbalanced tags, malformed brace-delimited JSON, and control
/// characters in `content`.
pub fn detect_problem_content(content: &str) -> Vec<ContentProblem> {
  let mut problems = Vec::new();

  let open = OPEN_TAG
    .captures_iter(content)
    .filter(|cap| !cap[0].ends_with("/>"))
    .filter(|cap| !VOID_ELEMENTS.contains(&cap[1].to_ascii_lowercase().as_str()))
    .count();
  let close = CLOSE_TAG.find_iter(content).count();
  if open != close {
    problems.push(ContentProblem::UnbalancedTags { open, close });
  }

  for candidate in JSON_CANDIDATE.find_iter(content) {
    let text = candidate.as_str();
    if text.chars().count() <= JSON_CANDIDATE_MIN_LEN {
      continue;
    }
    if serde_json::from_str::<serde_json::Value>(text).is_err() {
      problems.push(ContentProblem::MalformedJson {
        snippet: text.chars().take(40).collect(),
      });
    }
  }

  let control = content.chars().filter(|c| is_problem_char(*c)).count();
  if control > 0 {
    problems.push(ContentProblem::ControlCharacters { count: control });
  }

  problems
}

// ─── Safety gate ─────────────────────────────────────────────────────────────

/// Why an update was refused by [`is_update_safe`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnsafeUpdate {
  #[error(
    "update changes {:.1}% of the content, above the {}% limit; this looks like an accidental overwrite",
    .percentage,
    MAX_CHANGE_PERCENTAGE
  )]
  ExcessiveChange { percentage: f64 },

  #[error("update contains problem content: {}", join_problems(.0))]
  ProblemContent(Vec<ContentProblem>),
}

fn join_problems(problems: &[ContentProblem]) -> String {
  problems
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// Decide whether `update` may replace `current`.
///
/// Rejects when strictly more than [`MAX_CHANGE_PERCENTAGE`] of positions
/// differ, or when `update` contains any [`ContentProblem`].
pub fn is_update_safe(current: &str, update: &str) -> Result<(), UnsafeUpdate> {
  let diff = calculate_content_diff(current, update);
  if diff.percentage > MAX_CHANGE_PERCENTAGE {
    return Err(UnsafeUpdate::ExcessiveChange {
      percentage: diff.percentage,
    });
  }

  let problems = detect_problem_content(update);
  if !problems.is_empty() {
    return Err(UnsafeUpdate::ProblemContent(problems));
  }

  Ok(())
}

// ─── Sanitising ──────────────────────────────────────────────────────────────

/// Incremental form of [`sanitize_document_content`].
///
/// Feeding a string through [`push`](Self::push) in any number of pieces
/// yields the same concatenated output as sanitising it whole, so streamed
/// chunks and the persisted content always agree.
#[derive(Debug, Clone, Default)]
pub struct ContentSanitizer {
  after_cr: bool,
}

impl ContentSanitizer {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
      if is_problem_char(c) && !matches!(c, '\u{2028}' | '\u{2029}') {
        continue;
      }
      let after_cr = std::mem::take(&mut self.after_cr);
      match c {
        '\r' => {
          out.push('\n');
          self.after_cr = true;
        }
        '\n' if after_cr => {}
        '\u{2028}' | '\u{2029}' => out.push('\n'),
        c => out.push(c),
      }
    }
    out
  }
}

/// Strip control characters and normalise every line-ending variant (CRLF,
/// lone CR, U+2028, U+2029) to `\n`. Idempotent.
pub fn sanitize_document_content(content: &str) -> String {
  ContentSanitizer::new().push(content)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_inputs_have_no_diff() {
    for s in ["", "a", "hello world", "ünïcödé ✓"] {
      let diff = calculate_content_diff(s, s);
      assert_eq!(diff.diff_count, 0);
      assert_eq!(diff.percentage, 0.0);
      assert!(diff.samples.is_empty());
    }
  }

  #[test]
  fn missing_positions_count_as_mismatches() {
    let diff = calculate_content_diff("abc", "abcde");
    assert_eq!(diff.diff_count, 2);
    assert_eq!(diff.percentage, 40.0);
    assert_eq!(diff.samples[0], DiffLocation {
      position: 3,
      left:     String::new(),
      right:    "d".into(),
    });
  }

  #[test]
  fn samples_are_bounded() {
    let diff = calculate_content_diff(&"a".repeat(50), &"b".repeat(50));
    assert_eq!(diff.diff_count, 50);
    assert_eq!(diff.samples.len(), MAX_DIFF_SAMPLES);
    assert_eq!(diff.percentage, 100.0);
  }

  #[test]
  fn exactly_eighty_percent_is_accepted() {
    // 8 of 10 positions differ.
    assert!(is_update_safe("aaaaaaaaaa", "bbbbbbbbaa").is_ok());
    // 9 of 10 positions differ.
    assert!(matches!(
      is_update_safe("aaaaaaaaaa", "bbbbbbbbba"),
      Err(UnsafeUpdate::ExcessiveChange { .. })
    ));
  }

  #[test]
  fn unmatched_div_is_flagged() {
    let problems = detect_problem_content("<div>hello");
    assert_eq!(problems, vec![ContentProblem::UnbalancedTags { open: 1, close: 0 }]);
    assert!(detect_problem_content("<div>hello</div>").is_empty());
  }

  #[test]
  fn void_and_self_closing_tags_are_balanced() {
    assert!(detect_problem_content("line<br>break <img src=\"a.png\"/> <x-icon/>").is_empty());
    assert!(detect_problem_content("if a < b && c > d").is_empty());
  }

  #[test]
  fn long_brace_blocks_must_be_json() {
    assert!(detect_problem_content(r#"config: {"name": "quire", "port": 8080}"#).is_empty());
    let problems = detect_problem_content("config: {name: quire, port: 8080, x}");
    assert!(matches!(problems.as_slice(), [ContentProblem::MalformedJson { .. }]));
    // Short brace groups are not inspected.
    assert!(detect_problem_content("{not json}").is_empty());
  }

  #[test]
  fn control_characters_are_flagged_but_whitespace_is_not() {
    assert!(detect_problem_content("tab\tnewline\ncr\r\n").is_empty());
    let problems = detect_problem_content("bell\u{7}nel\u{85}sep\u{2028}");
    assert_eq!(problems, vec![ContentProblem::ControlCharacters { count: 3 }]);
  }

  #[test]
  fn problem_content_rejects_small_edits() {
    let err = is_update_safe("<p>hi</p>", "<p>hi</p><div>").unwrap_err();
    assert!(err.to_string().contains("unbalanced tags"));
  }

  #[test]
  fn sanitize_normalises_line_endings_and_strips_controls() {
    assert_eq!(
      sanitize_document_content("a\r\nb\rc\u{2028}d\u{0}e\u{9f}f\tg"),
      "a\nb\nc\ndef\tg"
    );
  }

  #[test]
  fn sanitize_is_idempotent() {
    for input in ["", "plain", "a\r\n\r\nb", "\r\r\n\n", "x\u{1b}[0m\r", "\u{2029}\r\u{0}\n"] {
      let once = sanitize_document_content(input);
      assert_eq!(sanitize_document_content(&once), once, "input {input:?}");
    }
  }

  #[test]
  fn streaming_sanitizer_matches_whole_input() {
    let input = "line one\r\nline two\r\u{0}\nline\u{7} three\r";
    let whole = sanitize_document_content(input);
    for split in 0..input.len() {
      if !input.is_char_boundary(split) {
        continue;
      }
      let mut sanitizer = ContentSanitizer::new();
      let mut pieces = sanitizer.push(&input[..split]);
      pieces.push_str(&sanitizer.push(&input[split..]));
      assert_eq!(pieces, whole, "split at {split}");
    }
  }
}
