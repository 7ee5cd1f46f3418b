use regex::Regex;

use crate::error::PatternError;

/// Shell-style glob compiled into an anchored regular expression.
///
/// Supported syntax:
/// - `*` matches any run of characters, `?` exactly one
/// - `[...]` matches one character of the class; `[!...]` or `[^...]` negates it,
///   a `]` right after the opening bracket is literal, a leading or trailing `-` is literal,
///   and `*`/`?` lose their meaning inside a class
/// - `\` escapes a following `*`, `?`, `[` or `]`; before anything else it is a literal backslash
///
/// Every other character matches itself.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    glob: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob
    pub fn new(glob: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| PatternError {
            glob: glob.to_string(),
            source,
        })?;

        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    /// Whether the whole of `candidate` matches the glob
    pub fn matches(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The glob this pattern was compiled from
    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

/// One-shot match of `candidate` against `glob`. Invalid globs never match.
pub fn matches(glob: &str, candidate: &str) -> bool {
    GlobPattern::new(glob).map_or(false, |pattern| pattern.matches(candidate))
}

fn is_glob_meta(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | ']')
}

fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(2 * chars.len() + 2);
    let mut in_class = false;
    let mut i = 0;

    out.push('^');

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if !in_class => out.push_str(".*"),
            '?' if !in_class => out.push('.'),
            '[' if !in_class => {
                in_class = true;
                out.push('[');
                if matches!(chars.get(i + 1), Some('!') | Some('^')) {
                    out.push('^');
                    i += 1;
                }
                // A `]` opening the class is a member, not the terminator
                if chars.get(i + 1) == Some(&']') {
                    out.push_str("\\]");
                    i += 1;
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '\\' => match chars.get(i + 1) {
                Some(&next) if is_glob_meta(next) => {
                    out.push('\\');
                    out.push(next);
                    i += 1;
                }
                _ => out.push_str("\\\\"),
            },
            _ if in_class => {
                // Nested classes and set operators mean something to the regex engine
                if matches!(c, '[' | '&' | '~') {
                    out.push('\\');
                }
                out.push(c);
            }
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }

    out.push('$');
    out
}
