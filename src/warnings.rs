use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::TemperError;

/// How warnings are keyed when baseline and candidate sets are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// File and normalized message. Line numbers are ignored, so a hunk
    /// that shifts an old warning does not count as a new one.
    #[default]
    FileMessage,
    /// File, exact line, and normalized message.
    FileLineMessage,
}

/// One compiler diagnostic lifted out of a build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
    /// Original text, with indented continuation lines folded in.
    pub raw: String,
}

impl Warning {
    /// Identity under the given policy. Warnings without a line number
    /// key the same way under both policies.
    pub fn key(&self, policy: MatchPolicy) -> String {
        match policy {
            MatchPolicy::FileMessage => format!("{}: {}", self.file, self.message),
            MatchPolicy::FileLineMessage => match self.line {
                Some(line) => format!("{}:{line}: {}", self.file, self.message),
                None => format!("{}: {}", self.file, self.message),
            },
        }
    }
}

/// Classification of a single log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Warning(Warning),
    Unrecognized,
}

/// Classify one line of build output.
///
/// A warning line has the shape `<file>[:<line>[:<col>]]: warning: <msg>`
/// where the location token contains no whitespace and the marker match
/// is case-insensitive. Everything else is `Unrecognized`.
pub fn classify(line: &str) -> LineKind {
    let clean = strip_ansi(line);
    let lower = clean.to_ascii_lowercase();
    let mut from = 0;
    while let Some(rel) = lower[from..].find("warning:") {
        let at = from + rel;
        if let Some(warning) = parse_at(&clean, at, line) {
            return LineKind::Warning(warning);
        }
        from = at + "warning:".len();
    }
    LineKind::Unrecognized
}

/// Parse a warning whose marker starts at byte `at` of `clean`.
fn parse_at(clean: &str, at: usize, original: &str) -> Option<Warning> {
    let head = &clean[..at];
    // The marker must be separated from the location by whitespace.
    if !head.ends_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let token = head.trim_end().split_whitespace().next_back()?;
    let loc = token.strip_suffix(':')?;
    let (file, line) = parse_location(loc)?;

    let message = squash_ws(&clean[at + "warning:".len()..]);
    Some(Warning {
        file,
        line,
        message,
        raw: original.trim_end().to_string(),
    })
}

/// Split `file[:line[:col]]` into the file and an optional line number.
/// The column, when present, is validated and dropped.
fn parse_location(loc: &str) -> Option<(String, Option<u32>)> {
    if loc.is_empty() || loc.contains(char::is_whitespace) {
        return None;
    }
    let file = normalize_file(loc);
    let Some((head, last)) = loc.rsplit_once(':') else {
        return Some((file, None));
    };
    if !is_digits(last) {
        return Some((file, None));
    }
    // `last` is numeric: either a bare line, or a column preceded by one
    if let Some((file_part, prev)) = head.rsplit_once(':') {
        if is_digits(prev) && !file_part.is_empty() {
            return Some((normalize_file(file_part), prev.parse().ok()));
        }
    }
    if head.is_empty() {
        return None;
    }
    Some((normalize_file(head), last.parse().ok()))
}

fn normalize_file(file: &str) -> String {
    file.trim_start_matches("./").to_string()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Collapse whitespace runs and trim.
fn squash_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop ANSI CSI sequences (`ESC [ <params> <final letter>`).
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for param in chars.by_ref() {
                if param.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Deduplicated warning set, ordered by key. The first occurrence of a
/// key wins, so extraction order never changes the stored raw text.
#[derive(Debug, Clone, Default)]
pub struct WarningSet {
    policy: MatchPolicy,
    entries: BTreeMap<String, Warning>,
}

impl WarningSet {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, warning: Warning) {
        self.entries
            .entry(warning.key(self.policy))
            .or_insert(warning);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Key-sorted iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Warning)> {
        self.entries.iter().map(|(k, w)| (k.as_str(), w))
    }
}

/// Feeds lines through the classifier, folding indented unrecognized
/// lines into the raw block of the warning they follow.
struct Collector {
    set: WarningSet,
    pending: Option<Warning>,
}

impl Collector {
    fn new(policy: MatchPolicy) -> Self {
        Self {
            set: WarningSet::new(policy),
            pending: None,
        }
    }

    fn feed(&mut self, line: &str) {
        if let Some(pending) = self.pending.as_mut() {
            let indented = line.starts_with([' ', '\t']);
            if indented && matches!(classify(line), LineKind::Unrecognized) {
                pending.raw.push('\n');
                pending.raw.push_str(line.trim_end());
                return;
            }
        }
        self.flush();
        if let LineKind::Warning(warning) = classify(line) {
            self.pending = Some(warning);
        }
    }

    fn flush(&mut self) {
        if let Some(warning) = self.pending.take() {
            self.set.insert(warning);
        }
    }

    fn finish(mut self) -> WarningSet {
        self.flush();
        self.set
    }
}

/// In-memory extraction, for tests; production reads logs through
/// `extract_file`.
#[cfg(test)]
pub fn extract(text: &str, policy: MatchPolicy) -> WarningSet {
    let mut collector = Collector::new(policy);
    for line in text.lines() {
        collector.feed(line);
    }
    collector.finish()
}

/// Extract from a log file without loading it whole. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn extract_file(path: &Path, policy: MatchPolicy) -> Result<WarningSet, TemperError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut collector = Collector::new(policy);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        collector.feed(line.trim_end_matches(['\n', '\r']));
    }
    Ok(collector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(line: &str) -> Warning {
        match classify(line) {
            LineKind::Warning(w) => w,
            LineKind::Unrecognized => panic!("expected warning: {line}"),
        }
    }

    #[test]
    fn classify_file_line_col() {
        let w = warning("drivers/net/foo.c:1024:17: warning: unused variable 'x'");
        assert_eq!(w.file, "drivers/net/foo.c");
        assert_eq!(w.line, Some(1024));
        assert_eq!(w.message, "unused variable 'x'");
    }

    #[test]
    fn classify_file_line_only() {
        let w = warning("Makefile:15: warning: overriding recipe for target 'all'");
        assert_eq!(w.file, "Makefile");
        assert_eq!(w.line, Some(15));
    }

    #[test]
    fn classify_without_line_number() {
        let w = warning("cc1: warning: command-line option is valid for C++");
        assert_eq!(w.file, "cc1");
        assert_eq!(w.line, None);
    }

    #[test]
    fn classify_is_case_insensitive() {
        let w = warning("foo.c:3: WARNING: shouty diagnostic");
        assert_eq!(w.message, "shouty diagnostic");
    }

    #[test]
    fn classify_strips_ansi_sequences() {
        let w = warning("\x1b[1mfoo.c:7:2:\x1b[0m \x1b[35mwarning:\x1b[0m odd bits");
        assert_eq!(w.file, "foo.c");
        assert_eq!(w.line, Some(7));
        assert_eq!(w.message, "odd bits");
    }

    #[test]
    fn classify_strips_dot_slash_prefix() {
        let w = warning("./include/linux/bar.h:99: warning: macro redefined");
        assert_eq!(w.file, "include/linux/bar.h");
    }

    #[test]
    fn classify_collapses_message_whitespace() {
        let w = warning("foo.c:1: warning:   spaced \t out   message ");
        assert_eq!(w.message, "spaced out message");
    }

    #[test]
    fn classify_finds_location_mid_line() {
        let w = warning("[  12.345] foo.c:4: warning: late diagnostic");
        assert_eq!(w.file, "foo.c");
        assert_eq!(w.line, Some(4));
    }

    #[test]
    fn rejects_marker_without_location() {
        assert_eq!(classify("warning: free-floating text"), LineKind::Unrecognized);
        assert_eq!(classify("GCC warning: no colon on token"), LineKind::Unrecognized);
    }

    #[test]
    fn rejects_marker_glued_to_location() {
        assert_eq!(classify("foo.c:1:warning: no separator"), LineKind::Unrecognized);
    }

    #[test]
    fn skips_bad_marker_and_takes_the_next() {
        let w = warning("text warning: noise foo.c:3: warning: real one");
        assert_eq!(w.file, "foo.c");
        assert_eq!(w.line, Some(3));
        assert_eq!(w.message, "real one");
    }

    #[test]
    fn rejects_errors_and_notes() {
        assert_eq!(classify("foo.c:1:2: error: this is fatal"), LineKind::Unrecognized);
        assert_eq!(classify("foo.c:1:2: note: declared here"), LineKind::Unrecognized);
        assert_eq!(classify("  CC      drivers/net/foo.o"), LineKind::Unrecognized);
    }

    #[test]
    fn extraction_is_deterministic_and_deduplicated() {
        let text = "foo.c:1:2: warning: dup\nsome progress\nfoo.c:1:2: warning: dup\n";
        let a = extract(text, MatchPolicy::FileMessage);
        let b = extract(text, MatchPolicy::FileMessage);
        assert_eq!(a.len(), 1);
        let keys_a: Vec<&str> = a.iter().map(|(k, _)| k).collect();
        let keys_b: Vec<&str> = b.iter().map(|(k, _)| k).collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn line_drift_collapses_under_default_policy() {
        let baseline = extract("foo.c:10: warning: shadowed", MatchPolicy::FileMessage);
        let candidate = extract("foo.c:14: warning: shadowed", MatchPolicy::FileMessage);
        let key: Vec<&str> = candidate.iter().map(|(k, _)| k).collect();
        assert!(baseline.contains(key[0]));
    }

    #[test]
    fn line_drift_distinct_under_strict_policy() {
        let baseline = extract("foo.c:10: warning: shadowed", MatchPolicy::FileLineMessage);
        let candidate = extract("foo.c:14: warning: shadowed", MatchPolicy::FileLineMessage);
        let key: Vec<&str> = candidate.iter().map(|(k, _)| k).collect();
        assert!(!baseline.contains(key[0]));
    }

    #[test]
    fn continuation_lines_fold_into_raw() {
        let text = "foo.c:5:1: warning: frame size too large\n  987 |   u64 buf[128];\n      |       ^~~\nnext unrelated line\n";
        let set = extract(text, MatchPolicy::FileMessage);
        assert_eq!(set.len(), 1);
        let (_, w) = set.iter().next().unwrap();
        assert!(w.raw.contains("987 |"));
        assert!(w.raw.contains("^~~"));
        assert!(!w.raw.contains("unrelated"));
    }

    #[test]
    fn indented_warning_is_not_a_continuation() {
        let text = "foo.c:5: warning: first\n  bar.c:6: warning: second\n";
        let set = extract(text, MatchPolicy::FileMessage);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn first_occurrence_keeps_its_raw_block() {
        let text = "foo.c:5: warning: dup\n  detail one\nfoo.c:9: warning: dup\n  detail two\n";
        let set = extract(text, MatchPolicy::FileMessage);
        assert_eq!(set.len(), 1);
        let (_, w) = set.iter().next().unwrap();
        assert!(w.raw.contains("detail one"));
    }

    #[test]
    fn extract_file_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.log");
        std::fs::write(&path, b"foo.c:1: warning: ok\n\xFF\xFEgarbage\n").unwrap();
        let set = extract_file(&path, MatchPolicy::FileMessage).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn strip_ansi_handles_color_and_cursor_codes() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("\x1b[?25hplain"), "plain");
        assert_eq!(strip_ansi("no escapes"), "no escapes");
    }

    #[test]
    fn keys_differ_between_policies_only_by_line() {
        let w = warning("foo.c:12:3: warning: something odd");
        assert_eq!(w.key(MatchPolicy::FileMessage), "foo.c: something odd");
        assert_eq!(w.key(MatchPolicy::FileLineMessage), "foo.c:12: something odd");
    }
}
