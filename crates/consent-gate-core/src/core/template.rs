// crates/consent-gate-core/src/core/template.rs
// ============================================================================
// Module: Consent Gate URI Templates
// Description: Parameterized resource URI templates with overlap analysis.
// Purpose: Bind template variables and detect ambiguous registrations.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Resource templates mix literal text with `{name}` placeholders, for example
//! `weather://{city}/current`. A placeholder binds one or more characters and
//! never crosses a `/`. Two placeholders may not be adjacent, so every binding
//! is delimited by literal text or the end of the URI.
//!
//! Matching runs the template as a small automaton, so cost stays linear in
//! the URI length regardless of how many variables share a segment.
//! [`UriTemplate::overlaps`] decides whether some concrete URI could match two
//! templates at once. The registry rejects such pairs at registration time so
//! resolution never depends on ordering accidents.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Longest URI, in bytes, considered for template matching.
pub const MAX_MATCH_URI_LENGTH: usize = 8 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A single parsed template component.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    /// Literal text that must match exactly.
    Literal(String),
    /// Named placeholder.
    Variable(String),
}

/// Parsed resource URI template.
///
/// # Invariants
/// - Variable names are unique and match `[A-Za-z_][A-Za-z0-9_]*`.
/// - No two variables are adjacent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    /// Original template text.
    raw: String,
    /// Parsed components in order.
    parts: Vec<TemplatePart>,
}

/// Template parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Template string was empty.
    #[error("uri template is empty")]
    Empty,
    /// Template has no placeholders.
    #[error("uri template has no variables: {0}")]
    NoVariables(String),
    /// A `{` was not closed, or a stray `}` appeared.
    #[error("uri template has unbalanced braces: {0}")]
    Unbalanced(String),
    /// Variable name is empty or contains invalid characters.
    #[error("uri template has invalid variable name: {0}")]
    InvalidVariable(String),
    /// The same variable name appears twice.
    #[error("uri template repeats variable: {0}")]
    DuplicateVariable(String),
    /// Two variables appear without literal text between them.
    #[error("uri template has adjacent variables: {0}")]
    AdjacentVariables(String),
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

impl UriTemplate {
    /// Parses a template string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }
        let mut parts = Vec::new();
        let mut seen = BTreeSet::new();
        let mut rest = raw;
        while !rest.is_empty() {
            if let Some(after_open) = rest.strip_prefix('{') {
                let close = after_open
                    .find('}')
                    .ok_or_else(|| TemplateError::Unbalanced(raw.to_string()))?;
                let name = &after_open[.. close];
                if !is_variable_name(name) {
                    return Err(TemplateError::InvalidVariable(name.to_string()));
                }
                if !seen.insert(name.to_string()) {
                    return Err(TemplateError::DuplicateVariable(name.to_string()));
                }
                if matches!(parts.last(), Some(TemplatePart::Variable(_))) {
                    return Err(TemplateError::AdjacentVariables(raw.to_string()));
                }
                parts.push(TemplatePart::Variable(name.to_string()));
                rest = &after_open[close + 1 ..];
            } else {
                let end = rest.find(['{', '}']).unwrap_or(rest.len());
                if rest[end ..].starts_with('}') {
                    return Err(TemplateError::Unbalanced(raw.to_string()));
                }
                parts.push(TemplatePart::Literal(rest[.. end].to_string()));
                rest = &rest[end ..];
            }
        }
        if seen.is_empty() {
            return Err(TemplateError::NoVariables(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    /// Returns the template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the variable names in template order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                TemplatePart::Variable(name) => Some(name.as_str()),
                TemplatePart::Literal(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ============================================================================
// SECTION: Matching
// ============================================================================

impl UriTemplate {
    /// Matches a concrete URI and returns bound variables.
    ///
    /// When a segment offers several splits (`{a}-{b}` against `x-y-z`), the
    /// shortest binding for the earlier variable wins. URIs longer than
    /// [`MAX_MATCH_URI_LENGTH`] bytes never match.
    #[must_use]
    pub fn match_uri(&self, uri: &str) -> Option<BTreeMap<String, String>> {
        if uri.len() > MAX_MATCH_URI_LENGTH {
            return None;
        }
        let elements = compile(&self.parts);
        let chars: Vec<(usize, char)> = uri.char_indices().collect();
        let table = AcceptTable::build(&elements, &chars);
        if !table.accepts(0, 0) {
            return None;
        }
        bind_variables(&self.parts, uri, &chars, &table)
    }

    /// Returns true when at least one URI is matched by both templates.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let left = compile(&self.parts);
        let right = compile(&other.parts);
        let alphabet = literal_alphabet(&left, &right);
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        for state in closure_pairs(&left, &right, 0, 0) {
            if visited.insert(state) {
                queue.push_back(state);
            }
        }
        while let Some((i, j)) = queue.pop_front() {
            if i == left.len() && j == right.len() {
                return true;
            }
            for symbol in &alphabet {
                let (Some(next_i), Some(next_j)) =
                    (step(&left, i, *symbol), step(&right, j, *symbol))
                else {
                    continue;
                };
                for state in closure_pairs(&left, &right, next_i, next_j) {
                    if visited.insert(state) {
                        queue.push_back(state);
                    }
                }
            }
        }
        false
    }
}

/// Walks the template left to right, giving each variable the shortest
/// binding from which the remaining input is still accepted.
fn bind_variables(
    parts: &[TemplatePart],
    uri: &str,
    chars: &[(usize, char)],
    table: &AcceptTable,
) -> Option<BTreeMap<String, String>> {
    let mut bindings = BTreeMap::new();
    let mut position = 0;
    let mut element = 0;
    for part in parts {
        match part {
            TemplatePart::Literal(text) => {
                let count = text.chars().count();
                position += count;
                element += count;
            }
            TemplatePart::Variable(name) => {
                let next = element + 2;
                let mut end = position + 1;
                loop {
                    let (_, ch) = *chars.get(end - 1)?;
                    if ch == '/' {
                        return None;
                    }
                    if table.accepts(end, next) {
                        break;
                    }
                    end += 1;
                }
                let start_byte = byte_offset(uri, chars, position);
                let end_byte = byte_offset(uri, chars, end);
                bindings.insert(name.clone(), uri[start_byte .. end_byte].to_string());
                position = end;
                element = next;
            }
        }
    }
    Some(bindings)
}

/// Returns the byte offset of the character at `index`, or the URI length.
fn byte_offset(uri: &str, chars: &[(usize, char)], index: usize) -> usize {
    chars.get(index).map_or(uri.len(), |(offset, _)| *offset)
}

/// Acceptance table over (input position, automaton state).
///
/// `accepts(p, s)` is true when the input suffix starting at character `p`
/// is accepted from state `s`. Built backwards in O(len × states).
struct AcceptTable {
    /// Row width: automaton states plus the final state.
    width: usize,
    /// Row-major cells, one row per input position.
    cells: Vec<bool>,
}

impl AcceptTable {
    /// Builds the table for `elements` over `chars`.
    fn build(elements: &[Element], chars: &[(usize, char)]) -> Self {
        let width = elements.len() + 1;
        let mut cells = vec![false; (chars.len() + 1) * width];
        let last_row = chars.len() * width;
        for state in 0 .. width {
            cells[last_row + state] = closure(elements, state).contains(&elements.len());
        }
        for (position, (_, ch)) in chars.iter().enumerate().rev() {
            let next_row = (position + 1) * width;
            for state in 0 .. width {
                let accepted = closure(elements, state).into_iter().any(|current| {
                    step(elements, current, Symbol::Char(*ch))
                        .is_some_and(|next| cells[next_row + next])
                });
                cells[position * width + state] = accepted;
            }
        }
        Self {
            width,
            cells,
        }
    }

    /// Returns true when the suffix at `position` is accepted from `state`.
    fn accepts(&self, position: usize, state: usize) -> bool {
        self.cells.get(position * self.width + state).copied().unwrap_or(false)
    }
}

// ============================================================================
// SECTION: Template Automaton
// ============================================================================

/// Automaton element derived from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    /// Exactly this character.
    Char(char),
    /// Exactly one non-`/` character.
    AnyOne,
    /// Zero or more non-`/` characters.
    AnyMany,
}

/// Input symbol consumed by the template automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Symbol {
    /// A character appearing literally in either template.
    Char(char),
    /// Any non-`/` character absent from both templates.
    Other,
}

/// Lowers template parts into automaton elements.
fn compile(parts: &[TemplatePart]) -> Vec<Element> {
    let mut elements = Vec::new();
    for part in parts {
        match part {
            TemplatePart::Literal(text) => elements.extend(text.chars().map(Element::Char)),
            TemplatePart::Variable(_) => {
                elements.push(Element::AnyOne);
                elements.push(Element::AnyMany);
            }
        }
    }
    elements
}

/// Collects the distinct literal characters plus the catch-all symbol.
fn literal_alphabet(left: &[Element], right: &[Element]) -> BTreeSet<Symbol> {
    let mut alphabet: BTreeSet<Symbol> = left
        .iter()
        .chain(right.iter())
        .filter_map(|element| match element {
            Element::Char(ch) => Some(Symbol::Char(*ch)),
            Element::AnyOne | Element::AnyMany => None,
        })
        .collect();
    alphabet.insert(Symbol::Other);
    alphabet
}

/// Returns the states reachable from `index` without consuming input.
fn closure(elements: &[Element], index: usize) -> Vec<usize> {
    let mut states = vec![index];
    let mut cursor = index;
    while matches!(elements.get(cursor), Some(Element::AnyMany)) {
        cursor += 1;
        states.push(cursor);
    }
    states
}

/// Returns the epsilon closure of a state pair.
fn closure_pairs(left: &[Element], right: &[Element], i: usize, j: usize) -> Vec<(usize, usize)> {
    let right_states = closure(right, j);
    closure(left, i)
        .into_iter()
        .flat_map(|a| right_states.iter().map(move |b| (a, *b)))
        .collect()
}

/// Consumes one symbol from state `index`.
fn step(elements: &[Element], index: usize, symbol: Symbol) -> Option<usize> {
    let element = elements.get(index)?;
    let wildcard_ok = match symbol {
        Symbol::Char(ch) => ch != '/',
        Symbol::Other => true,
    };
    match element {
        Element::Char(expected) => (symbol == Symbol::Char(*expected)).then_some(index + 1),
        Element::AnyOne => wildcard_ok.then_some(index + 1),
        Element::AnyMany => wildcard_ok.then_some(index),
    }
}

/// Returns true when `name` is a valid variable identifier.
fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

// ============================================================================
// SECTION: Tests
// ============================================================================
