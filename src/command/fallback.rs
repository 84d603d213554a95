//! Deterministic rule-based intent matching
//!
//! Used when no language model is reachable or its reply could not be used.
//! Text is case-folded and trimmed, then tested against an ordered list of
//! rules. A rule anchored at the start of the command always beats one whose
//! phrase merely appears somewhere in it. Among the rest, the most specific
//! wins (longest trigger phrase, plus one when the rule's constraint held);
//! ties go to the kind registered first in the catalog, then to rule order.

use crate::actions::catalog::{Action, ActionCatalog, ActionSource, Parameters};
use crate::core::error::AssistError;
use serde_json::Value;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Leading words dropped before matching
const POLITE_PREFIXES: &[&[&str]] = &[
    &["hey", "jarvis"],
    &["jarvis"],
    &["please"],
    &["can", "you"],
    &["could", "you"],
    &["would", "you"],
    &["i", "want", "to"],
    &["i'd", "like", "to"],
];

/// Leading words dropped from extracted values ("find my resume" -> "resume")
const FILLERS: &[&str] = &["my", "the", "a", "an", "some", "for", "about", "to"];

/// Extensions that mark a dotted name as a file rather than a host
const FILE_EXTENSIONS: &[&str] = &[
    "txt", "md", "pdf", "doc", "docx", "odt", "rtf", "xls", "xlsx", "csv", "ppt", "pptx", "png",
    "jpg", "jpeg", "gif", "svg", "bmp", "mp3", "wav", "flac", "mp4", "mkv", "mov", "avi", "zip",
    "tar", "gz", "json", "toml", "yaml", "yml", "xml", "log", "html", "exe",
];

const ORDINALS: &[&str] = &[
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Where a rule's phrase must appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Command starts with the phrase; the rest is the remainder
    Leading,
    /// Phrase appears anywhere as whole words; the whole command is the remainder
    Anywhere,
}

/// How the remainder becomes a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Remainder,
    FirstWord,
    Nothing,
}

/// Extra condition on the remainder; a satisfied constraint makes the rule more specific
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    None,
    /// "2", "second", "2nd one"; normalized to the number
    Ordinal,
    /// "youtube.com", "https://..."
    WebAddress,
    /// "notes.txt", "quarterly report.pdf"
    FileName,
    /// Remainder must end with this word, which is removed
    Suffix(String),
}

/// One matching rule for a catalog kind
#[derive(Debug, Clone)]
pub struct FallbackRule {
    pub kind: String,
    pub phrases: Vec<Vec<String>>,
    pub position: Position,
    pub param: Option<String>,
    pub capture: Capture,
    pub constraint: Constraint,
    pub strip_fillers: bool,
    /// Trailing words dropped from the value ("press enter key" -> "enter")
    pub trailing_noise: Vec<String>,
}

impl FallbackRule {
    pub fn leading(kind: &str, phrases: &[&str], param: Option<&str>) -> Self {
        Self {
            kind: kind.to_string(),
            phrases: phrases
                .iter()
                .map(|p| p.split_whitespace().map(str::to_string).collect())
                .collect(),
            position: Position::Leading,
            param: param.map(str::to_string),
            capture: if param.is_some() {
                Capture::Remainder
            } else {
                Capture::Nothing
            },
            constraint: Constraint::None,
            strip_fillers: true,
            trailing_noise: Vec::new(),
        }
    }

    pub fn anywhere(kind: &str, phrases: &[&str], param: Option<&str>) -> Self {
        Self {
            position: Position::Anywhere,
            strip_fillers: false,
            ..Self::leading(kind, phrases, param)
        }
    }

    pub fn first_word(mut self) -> Self {
        self.capture = Capture::FirstWord;
        self
    }

    pub fn verbatim(mut self) -> Self {
        self.strip_fillers = false;
        self
    }

    pub fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn trailing(mut self, words: &[&str]) -> Self {
        self.trailing_noise = words.iter().map(|w| w.to_string()).collect();
        self
    }

    /// Try every phrase; returns (specificity, parameters) for the best fit
    fn try_match(&self, words: &[String], original: &[&str]) -> Option<(usize, Parameters)> {
        let mut best: Option<(usize, Parameters)> = None;

        for phrase in &self.phrases {
            let remainder: Vec<&str> = match self.position {
                Position::Leading => {
                    if words.len() < phrase.len() || words[..phrase.len()] != phrase[..] {
                        continue;
                    }
                    original[phrase.len()..].to_vec()
                }
                Position::Anywhere => {
                    if phrase.is_empty()
                        || !words.windows(phrase.len()).any(|w| w == &phrase[..])
                    {
                        continue;
                    }
                    original.to_vec()
                }
            };

            let Some((bonus, value)) = self.apply_constraint(remainder) else {
                continue;
            };
            let specificity = phrase.len() + bonus;
            if best.as_ref().map(|(s, _)| specificity > *s).unwrap_or(true) {
                best = Some((specificity, self.build_parameters(value)));
            }
        }

        best
    }

    fn apply_constraint(&self, mut remainder: Vec<&str>) -> Option<(usize, String)> {
        if self.strip_fillers {
            // A lone filler is the value itself ("press a")
            while remainder.len() > 1
                && remainder
                    .first()
                    .map(|w| FILLERS.contains(&w.to_lowercase().as_str()))
                    .unwrap_or(false)
            {
                remainder.remove(0);
            }
        }
        while remainder
            .last()
            .map(|w| self.trailing_noise.iter().any(|n| n.eq_ignore_ascii_case(w)))
            .unwrap_or(false)
        {
            remainder.pop();
        }

        match &self.constraint {
            Constraint::None => Some((0, remainder.join(" "))),
            Constraint::Ordinal => parse_ordinal(&remainder).map(|n| (1, n.to_string())),
            Constraint::WebAddress => {
                let value = remainder.join(" ");
                looks_like_web_address(&value).then_some((1, value))
            }
            Constraint::FileName => {
                let value = remainder.join(" ");
                has_file_extension(&value).then_some((1, value))
            }
            Constraint::Suffix(word) => {
                let last = remainder.last()?;
                if !last.eq_ignore_ascii_case(word) || remainder.len() < 2 {
                    return None;
                }
                remainder.pop();
                Some((1, remainder.join(" ")))
            }
        }
    }

    fn build_parameters(&self, value: String) -> Parameters {
        let mut parameters = Parameters::new();
        let Some(param) = &self.param else {
            return parameters;
        };
        let value = match self.capture {
            Capture::Remainder => value,
            Capture::FirstWord => value.split_whitespace().next().unwrap_or("").to_lowercase(),
            Capture::Nothing => return parameters,
        };
        if !value.is_empty() {
            parameters.insert(param.clone(), Value::String(value));
        }
        parameters
    }
}

/// Ordering key for competing rules; field order is priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    anchored: bool,
    specificity: usize,
    position: Reverse<usize>,
    index: Reverse<usize>,
}

/// What the fallback matcher made of a command
#[derive(Debug)]
pub enum FallbackOutcome {
    Matched(Action),
    /// A rule fired but its parameters did not validate ("find" with no object)
    Incomplete {
        kind: String,
        parameters: Parameters,
        error: AssistError,
    },
    NoMatch,
}

/// Rule-based resolver over the catalog's kinds
pub struct FallbackMatcher {
    catalog: Arc<ActionCatalog>,
    rules: Vec<FallbackRule>,
    confidence: f32,
}

impl FallbackMatcher {
    /// Matcher with the builtin rules for every kind the catalog knows
    pub fn new(catalog: Arc<ActionCatalog>, confidence: f32) -> Self {
        let mut matcher = Self {
            catalog,
            rules: Vec::new(),
            confidence,
        };
        for rule in builtin_rules() {
            matcher.add_rule(rule);
        }
        matcher
    }

    /// Append a rule; rules for kinds missing from the catalog are ignored
    pub fn add_rule(&mut self, rule: FallbackRule) -> bool {
        if !self.catalog.contains(&rule.kind) {
            debug!(kind = %rule.kind, "skipping fallback rule for unknown kind");
            return false;
        }
        self.rules.push(rule);
        true
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Match a command against the rules
    pub fn match_command(&self, text: &str) -> FallbackOutcome {
        let original = strip_punctuation(text.trim());
        let original: Vec<&str> = original.split_whitespace().collect();
        let skip = polite_prefix_len(&original);
        let original = &original[skip..];
        let words: Vec<String> = original.iter().map(|w| w.to_lowercase()).collect();

        if words.is_empty() {
            return FallbackOutcome::NoMatch;
        }

        let mut best: Option<(Rank, Parameters)> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            let Some((specificity, parameters)) = rule.try_match(&words, original) else {
                continue;
            };
            let rank = Rank {
                anchored: rule.position == Position::Leading,
                specificity,
                position: Reverse(self.catalog.position(&rule.kind).unwrap_or(usize::MAX)),
                index: Reverse(idx),
            };
            if best.as_ref().map(|(b, _)| rank > *b).unwrap_or(true) {
                best = Some((rank, parameters));
            }
        }

        let Some((rank, parameters)) = best else {
            debug!(command = %text, "no fallback rule matched");
            return FallbackOutcome::NoMatch;
        };
        let kind = &self.rules[rank.index.0].kind;
        debug!(kind = %kind, specificity = rank.specificity, "fallback rule matched");

        match self
            .catalog
            .validate(kind, &parameters, ActionSource::Fallback, self.confidence)
        {
            Ok(action) => FallbackOutcome::Matched(action),
            Err(error) => FallbackOutcome::Incomplete {
                kind: kind.clone(),
                parameters,
                error,
            },
        }
    }
}

/// Drop leading filler words from a clarification answer
pub fn strip_fillers(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words
        .iter()
        .position(|w| !FILLERS.contains(&w.to_lowercase().as_str()))
        .unwrap_or(words.len());
    strip_punctuation(&words[start..].join(" ")).to_string()
}

fn strip_punctuation(text: &str) -> &str {
    text.trim_end_matches(|c: char| matches!(c, '?' | '!' | '.' | ',' | ';'))
        .trim()
}

fn polite_prefix_len(words: &[&str]) -> usize {
    let mut skip = 0;
    'outer: loop {
        for prefix in POLITE_PREFIXES {
            let end = skip + prefix.len();
            if end <= words.len()
                && words[skip..end]
                    .iter()
                    .zip(prefix.iter())
                    .all(|(w, p)| w.trim_end_matches(',').eq_ignore_ascii_case(p))
            {
                skip = end;
                continue 'outer;
            }
        }
        return skip;
    }
}

/// "2", "2nd", "second", optionally followed by "one"/"result"/"file"
fn parse_ordinal(words: &[&str]) -> Option<usize> {
    let (first, rest) = words.split_first()?;
    if !rest
        .iter()
        .all(|w| matches!(w.to_lowercase().as_str(), "one" | "result" | "file" | "item"))
    {
        return None;
    }
    let first = first.to_lowercase();
    if let Some(pos) = ORDINALS.iter().position(|o| *o == first) {
        return Some(pos + 1);
    }
    let digits = first.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let suffix = &first[digits.len()..];
    if !matches!(suffix, "" | "st" | "nd" | "rd" | "th") {
        return None;
    }
    digits.parse::<usize>().ok().filter(|n| *n > 0)
}

fn looks_like_web_address(value: &str) -> bool {
    if value.is_empty() || value.contains(char::is_whitespace) {
        return false;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return true;
    }
    let host = value.split('/').next().unwrap_or("");
    if has_file_extension(host) {
        return false;
    }
    match host.rsplit_once('.') {
        Some((name, tld)) => {
            !name.is_empty()
                && (2..=6).contains(&tld.len())
                && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

fn has_file_extension(value: &str) -> bool {
    let Some(last) = value.split_whitespace().last() else {
        return false;
    };
    match last.rsplit_once('.') {
        Some((name, ext)) => {
            !name.is_empty() && FILE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        None => false,
    }
}

/// Builtin rules, roughly in catalog order
fn builtin_rules() -> Vec<FallbackRule> {
    vec![
        // === MEDIA ===
        FallbackRule::leading(
            "play_media",
            &["play", "put on", "listen to", "watch"],
            Some("query"),
        ),
        FallbackRule::leading(
            "search_media",
            &[
                "search youtube for",
                "search youtube",
                "youtube search",
                "search videos of",
                "search videos for",
                "find videos of",
            ],
            Some("query"),
        ),
        // === FILESYSTEM ===
        FallbackRule::leading(
            "search_files",
            &[
                "find",
                "find file",
                "find files",
                "locate",
                "look for",
                "where is",
                "search files for",
                "search for files",
                "search for file",
            ],
            Some("query"),
        ),
        FallbackRule::leading("open_file", &["open", "open file", "open result"], Some("target"))
            .constrained(Constraint::Ordinal),
        FallbackRule::leading("open_file", &["open file", "open the file", "open document"], Some("target")),
        FallbackRule::leading("open_file", &["open"], Some("target")).constrained(Constraint::FileName),
        FallbackRule::leading("open_folder", &["open folder", "open the folder", "open directory"], Some("name")),
        FallbackRule::leading("open_folder", &["open"], Some("name"))
            .constrained(Constraint::Suffix("folder".into())),
        // === SYSTEM ===
        FallbackRule::leading("launch_app", &["open", "launch", "start", "open app"], Some("name")),
        FallbackRule::leading("open_website", &["go to", "visit", "browse to", "open website"], Some("site")),
        FallbackRule::leading("open_website", &["open"], Some("site"))
            .constrained(Constraint::WebAddress),
        FallbackRule::leading(
            "search_web",
            &["search", "search for", "search the web for", "google", "look up"],
            Some("query"),
        ),
        FallbackRule::leading(
            "run_command",
            &["run", "run command", "execute", "execute command"],
            Some("command"),
        )
        .verbatim(),
        // === VISION ===
        FallbackRule::anywhere(
            "analyze_screen",
            &[
                "on my screen",
                "on the screen",
                "on screen",
                "analyze screen",
                "analyze the screen",
                "read the screen",
                "look at my screen",
            ],
            Some("question"),
        ),
        // === INPUT ===
        FallbackRule::leading("click_screen", &["click", "click on"], Some("target")),
        FallbackRule::leading("type_text", &["type", "write", "enter text"], Some("text")).verbatim(),
        FallbackRule::leading("press_key", &["press", "hit", "press key"], Some("key"))
            .trailing(&["key", "button"]),
        FallbackRule::leading("scroll", &["scroll"], Some("direction")).first_word(),
    ]
}
