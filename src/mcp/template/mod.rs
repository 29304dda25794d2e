//! URI Template Matching
//!
//! Resource templates are URIs with `{name}` placeholders, such as
//! `greeting://{name}` or `repo://{owner}/{repo}/readme`. A template is
//! compiled once into literal and capture segments and then matched against
//! concrete URIs to extract the placeholder values.


use crate::mcp::errors::{McpError, McpResult};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Placeholder values extracted from a matched URI, keyed by placeholder name
pub type TemplateParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A compiled URI template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    /// Parse a template string into literal and capture segments
    #[inline]
    pub fn compile(template: &str) -> McpResult<Self> {
        let invalid = |reason: &str| McpError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        if template.is_empty() {
            return Err(invalid("template is empty"));
        }

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(brace) = rest.find(['{', '}']) {
            let (before, after) = rest.split_at(brace);
            literal.push_str(before);

            let Some(after) = after.strip_prefix('{') else {
                return Err(invalid("unmatched '}'"));
            };
            let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
            let (name, tail) = after.split_at(close);

            if name.contains('{') {
                return Err(invalid("nested '{'"));
            }
            if name.is_empty() {
                return Err(invalid("placeholder name is empty"));
            }
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(&format!(
                    "placeholder '{}' may only contain ASCII letters, digits and '_'",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(invalid(&format!("placeholder '{}' appears more than once", name)));
            }

            if literal.is_empty() {
                if matches!(segments.last(), Some(Segment::Capture(_))) {
                    return Err(invalid(&format!(
                        "placeholder '{}' directly follows another placeholder",
                        name
                    )));
                }
            } else {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Capture(name.to_string()));

            rest = tail.strip_prefix('}').unwrap_or(tail);
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// The template string this matcher was compiled from
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in the order they appear
    #[inline]
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Whether the template has no placeholders at all
    #[inline]
    pub fn is_literal(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// Length in bytes of the literal text before the first placeholder
    #[inline]
    pub fn literal_prefix_len(&self) -> usize {
        match self.segments.first() {
            Some(Segment::Literal(literal)) => literal.len(),
            _ => 0,
        }
    }

    /// Match a concrete URI, returning the captured placeholder values.
    ///
    /// Literals must match exactly. Each placeholder captures at least one
    /// character, so a URI that leaves a placeholder empty does not match.
    #[inline]
    pub fn matches(&self, candidate: &str) -> Option<TemplateParams> {
        let mut params = TemplateParams::new();
        Matcher::new(&self.segments, candidate)
            .run(0, 0, &mut params)
            .then_some(params)
    }

    /// Substitute placeholder values back into the template. Returns `None`
    /// when a placeholder has no value or an empty one.
    #[inline]
    pub fn expand(&self, params: &TemplateParams) -> Option<String> {
        let mut uri = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => uri.push_str(literal),
                Segment::Capture(name) => {
                    let value = params.get(name).filter(|value| !value.is_empty())?;
                    uri.push_str(value);
                }
            }
        }
        Some(uri)
    }
}

impl fmt::Display for UriTemplate {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Backtracking matcher over one candidate URI.
///
/// Whether the segments from `index` onwards match the input from byte
/// `offset` onwards depends on nothing else, so a failed pair is recorded and
/// never explored again. Each pair is expanded at most once, which keeps a
/// hostile URI from forcing exponential backtracking.
struct Matcher<'a> {
    segments: &'a [Segment],
    input: &'a str,
    failed: HashSet<(usize, usize)>,
}

impl<'a> Matcher<'a> {
    fn new(segments: &'a [Segment], input: &'a str) -> Self {
        Self {
            segments,
            input,
            failed: HashSet::new(),
        }
    }

    fn run(&mut self, index: usize, offset: usize, params: &mut TemplateParams) -> bool {
        if self.failed.contains(&(index, offset)) {
            return false;
        }
        let matched = self.step(index, offset, params);
        if !matched {
            self.failed.insert((index, offset));
        }
        matched
    }

    fn step(&mut self, index: usize, offset: usize, params: &mut TemplateParams) -> bool {
        let segments = self.segments;
        let whole = self.input;
        let input = &whole[offset..];

        match segments.get(index) {
            None => input.is_empty(),
            Some(Segment::Literal(literal)) => {
                input.starts_with(literal.as_str())
                    && self.run(index + 1, offset + literal.len(), params)
            }
            Some(Segment::Capture(name)) => match segments.get(index + 1) {
                None => {
                    if input.is_empty() {
                        return false;
                    }
                    params.insert(name.clone(), input.to_string());
                    true
                }
                Some(Segment::Literal(next)) => {
                    // Leftmost boundary first; later occurrences are tried only
                    // when the remainder fails to match.
                    for (at, _) in input.char_indices().skip(1) {
                        if input[at..].starts_with(next.as_str())
                            && self.run(index + 1, offset + at, params)
                        {
                            params.insert(name.clone(), input[..at].to_string());
                            return true;
                        }
                    }
                    false
                }
                // compile() never produces adjacent captures
                Some(Segment::Capture(_)) => false,
            },
        }
    }
}

/// Pick the template that matches `uri`, preferring the longest literal
/// prefix. Ties go to the candidate that comes first.
#[inline]
pub fn resolve<'t, T>(
    candidates: impl IntoIterator<Item = (&'t UriTemplate, T)>,
    uri: &str,
) -> Option<(T, TemplateParams)> {
    let mut best: Option<(usize, T, TemplateParams)> = None;

    for (template, value) in candidates {
        let Some(params) = template.matches(uri) else {
            continue;
        };
        let prefix = template.literal_prefix_len();
        if best.as_ref().is_none_or(|(len, _, _)| prefix > *len) {
            best = Some((prefix, value, params));
        }
    }

    best.map(|(_, value, params)| (value, params))
}
