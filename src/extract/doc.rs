//! Documentation extraction using Markdown parsing
//!
//! Splits a document into heading-bounded sections and collects, per section,
//! the code symbols it appears to talk about:
//! - a heading that itself looks like a function or type name
//! - inline code spans, classified by casing (`Capitalized` → type,
//!   `lowerCase` → function)
//! - identifiers found in fenced code blocks
//!
//! The casing heuristic is approximate on purpose; downstream confidence
//! scores assume its noise level.

use super::content_hash;
use anyhow::{Context, Result};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source extensions that count as code-file references
const CODE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts", "py", "rs",
];

/// Declaration keywords whose following identifier is a symbol
const DECLARATION_KEYWORDS: &[&str] = &[
    "function", "class", "interface", "type", "def", "fn", "struct", "enum", "trait", "const",
    "let",
];

/// One heading-bounded section of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationSection {
    pub heading: String,
    /// Heading depth, 0 for text before the first heading
    pub level: u8,
    /// Raw section text including the heading line
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub referenced_functions: Vec<String>,
    /// Class, interface and type names
    #[serde(default)]
    pub referenced_types: Vec<String>,
    /// Symbol-like identifiers from fenced code blocks
    #[serde(default)]
    pub code_block_symbols: Vec<String>,
}

impl DocumentationSection {
    fn new(heading: &str, level: u8, start_line: usize) -> Self {
        Self {
            heading: heading.to_string(),
            level,
            content: String::new(),
            start_line,
            end_line: start_line,
            referenced_functions: Vec::new(),
            referenced_types: Vec::new(),
            code_block_symbols: Vec::new(),
        }
    }

    /// Whether the section references a symbol by any of the heuristics
    pub fn references_symbol(&self, name: &str) -> bool {
        self.referenced_functions.iter().any(|s| s == name)
            || self.referenced_types.iter().any(|s| s == name)
            || self.code_block_symbols.iter().any(|s| s == name)
    }

    fn add_function(&mut self, name: String) {
        if !self.referenced_functions.contains(&name) {
            self.referenced_functions.push(name);
        }
    }

    fn add_type(&mut self, name: String) {
        if !self.referenced_types.contains(&name) {
            self.referenced_types.push(name);
        }
    }

    fn add_code_symbol(&mut self, name: String) {
        if !self.code_block_symbols.contains(&name) {
            self.code_block_symbols.push(name);
        }
    }
}

/// Structural model of one documentation file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationSnapshot {
    pub file_path: String,
    pub hash: String,
    /// Code file paths referenced via links or inline code
    pub code_references: Vec<String>,
    pub sections: Vec<DocumentationSection>,
}

impl DocumentationSnapshot {
    /// Whether a code file path is referenced, compared by trailing path components
    pub fn references_file(&self, path: &str) -> bool {
        let target = normalize_path(path);
        self.code_references.iter().any(|reference| {
            let reference = normalize_path(reference);
            !reference.is_empty()
                && (target == reference || target.ends_with(&format!("/{}", reference)))
        })
    }

    /// Sections that reference a symbol
    pub fn sections_referencing(&self, name: &str) -> Vec<&DocumentationSection> {
        self.sections
            .iter()
            .filter(|s| s.references_symbol(name))
            .collect()
    }

    pub fn section(&self, heading: &str) -> Option<&DocumentationSection> {
        self.sections.iter().find(|s| s.heading == heading)
    }
}

/// Forward slashes, no anchor, no leading `./` or `../` segments
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut path = path.split('#').next().unwrap_or_default();
    while let Some(rest) = path
        .strip_prefix("./")
        .or_else(|| path.strip_prefix("../"))
    {
        path = rest;
    }
    path.trim_end_matches('/').to_string()
}

/// Extracts documentation snapshots from Markdown files
pub struct DocExtractor;

impl DocExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read and extract a Markdown file from disk
    pub fn extract_path(&self, path: &Path) -> Result<DocumentationSnapshot> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(self.extract_file(path, &content))
    }

    /// Extract sections and references from Markdown content
    pub fn extract_file(&self, path: &Path, content: &str) -> DocumentationSnapshot {
        let file_path = path.to_string_lossy().to_string();
        let line_starts = line_starts(content);
        let line_of = |offset: usize| match line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        let total_lines = content.lines().count().max(1);

        let mut sections: Vec<DocumentationSection> = Vec::new();
        let mut current = DocumentationSection::new(
            &path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            0,
            1,
        );
        let mut code_references = Vec::new();

        let mut heading: Option<PendingHeading> = None;
        let mut code_block: Option<String> = None;

        for (event, range) in Parser::new(content).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading = Some(PendingHeading {
                        level: level as u8,
                        line: line_of(range.start),
                        text: String::new(),
                        inline_code: Vec::new(),
                    });
                }
                Event::End(TagEnd::Heading(_)) => {
                    let Some(pending) = heading.take() else {
                        continue;
                    };
                    let text = pending.text.trim();
                    let previous = std::mem::replace(
                        &mut current,
                        DocumentationSection::new(text, pending.level, pending.line),
                    );
                    push_section(
                        &mut sections,
                        previous,
                        pending.line.saturating_sub(1),
                        content,
                        &line_starts,
                    );
                    classify_heading(&mut current, text);
                    for code in &pending.inline_code {
                        classify_inline_code(&mut current, code);
                    }
                }
                Event::Start(Tag::CodeBlock(_)) => code_block = Some(String::new()),
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = code_block.take() {
                        for symbol in code_block_symbols(&block) {
                            current.add_code_symbol(symbol);
                        }
                    }
                }
                Event::Start(Tag::Link { dest_url, .. }) => {
                    if is_code_path(&dest_url) {
                        code_references.push(normalize_path(&dest_url));
                    }
                }
                Event::Text(text) => {
                    if let Some(block) = code_block.as_mut() {
                        block.push_str(&text);
                    } else if let Some(pending) = heading.as_mut() {
                        pending.text.push_str(&text);
                    }
                }
                Event::Code(code) => {
                    if is_code_path(&code) {
                        code_references.push(normalize_path(&code));
                    } else if heading.is_none() {
                        classify_inline_code(&mut current, &code);
                    }
                    if let Some(pending) = heading.as_mut() {
                        pending.text.push_str(&code);
                        pending.inline_code.push(code.to_string());
                    }
                }
                _ => {}
            }
        }
        push_section(&mut sections, current, total_lines, content, &line_starts);

        code_references.sort();
        code_references.dedup();

        DocumentationSnapshot {
            file_path,
            hash: content_hash(content),
            code_references,
            sections,
        }
    }
}

impl Default for DocExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Heading being read; its section starts when the heading ends
struct PendingHeading {
    level: u8,
    line: usize,
    text: String,
    inline_code: Vec<String>,
}

fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Close a section at `end_line`; empty preambles, and those before a
/// heading on line 1, are dropped
fn push_section(
    sections: &mut Vec<DocumentationSection>,
    mut section: DocumentationSection,
    end_line: usize,
    content: &str,
    line_starts: &[usize],
) {
    if section.level == 0 && end_line < section.start_line {
        return;
    }
    section.end_line = end_line.max(section.start_line);
    let start = line_starts
        .get(section.start_line.saturating_sub(1))
        .copied()
        .unwrap_or(content.len());
    let end = line_starts
        .get(section.end_line)
        .copied()
        .unwrap_or(content.len());
    section.content = content[start..end.max(start)].trim_end().to_string();

    if section.level == 0 && section.content.trim().is_empty() {
        return;
    }
    sections.push(section);
}

fn is_code_path(text: &str) -> bool {
    let text = text.trim();
    if text.contains(char::is_whitespace) || text.starts_with("http") {
        return false;
    }
    let path = text.split('#').next().unwrap_or_default();
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| CODE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip a call suffix and receiver: `repo.save(item)` → `save`
fn symbol_of(text: &str) -> Option<(&str, bool)> {
    let text = text.trim();
    let (head, called) = match text.find('(') {
        Some(idx) => (&text[..idx], true),
        None => (text, false),
    };
    let name = head
        .rsplit(|c| c == '.' || c == ':')
        .next()
        .unwrap_or(head)
        .trim();
    is_identifier(name).then_some((name, called))
}

fn classify_inline_code(section: &mut DocumentationSection, code: &str) {
    let Some((name, called)) = symbol_of(code) else {
        return;
    };
    if name.starts_with(|c: char| c.is_ascii_uppercase()) {
        section.add_type(name.to_string());
    } else if called || name.starts_with(|c: char| c.is_ascii_lowercase()) {
        section.add_function(name.to_string());
    }
}

/// A heading names a symbol when it is a single identifier that reads like code
fn classify_heading(section: &mut DocumentationSection, heading: &str) {
    let Some((name, called)) = symbol_of(heading) else {
        return;
    };
    let has_inner_upper = name.chars().skip(1).any(|c| c.is_ascii_uppercase());
    let first_lower = name.starts_with(|c: char| c.is_ascii_lowercase());

    if called || (first_lower && (has_inner_upper || name.contains('_'))) {
        section.add_function(name.to_string());
    } else if !first_lower && has_inner_upper {
        section.add_type(name.to_string());
    }
}

/// Called identifiers and declared names in a code block
fn code_block_symbols(block: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut push = |name: &str| {
        if !symbols.iter().any(|s: &String| s == name) {
            symbols.push(name.to_string());
        }
    };

    let mut tokens: Vec<(usize, &str)> = Vec::new();
    let mut start = None;
    for (idx, c) in block.char_indices() {
        let ident_char = c.is_ascii_alphanumeric() || c == '_';
        match (ident_char, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                tokens.push((s, &block[s..idx]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &block[s..]));
    }

    for (i, (offset, token)) in tokens.iter().enumerate() {
        if !is_identifier(token) {
            continue;
        }
        let declared = i > 0 && DECLARATION_KEYWORDS.contains(&tokens[i - 1].1);
        let called = block[offset + token.len()..].trim_start().starts_with('(');
        if (declared || called) && !DECLARATION_KEYWORDS.contains(token) {
            push(token);
        }
    }
    symbols
}
