//! Narrative source documents: Markdown prose interleaved with snippet
//! chunks.
//!
//! The source is parsed with `pulldown-cmark`. A fenced code block whose
//! info string is `{kind key=value ...}` is a snippet chunk; every other
//! event (headings, lists, emphasis, ordinary code blocks) is prose and is
//! rendered to HTML as-is.
//!
//! Inside a `stratified` chunk, body lines `name: level, level` declare
//! stratification factors. Other chunks must have an empty body.

use crate::{
    error::{RandError, RandResult},
    generator::{StratificationFactor, DEFAULT_BLOCK_SIZE},
    simple::DEFAULT_INTERVENTION_PROB,
};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fragment {
    /// Rendered HTML for a run of Markdown between snippets.
    Prose { html: String },
    Snippet { line: usize, snippet: Snippet },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snippet {
    Simple {
        n:    usize,
        prob: f64,
    },
    Catalog {
        block_size: usize,
    },
    Block {
        target_n:   usize,
        block_size: usize,
        oversample: f64,
        enroll:     usize,
    },
    Stratified {
        target_n:   usize,
        block_size: usize,
        oversample: f64,
        enroll:     usize,
        factors:    Vec<StratificationFactor>,
    },
}

impl Snippet {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple { .. }     => "simple",
            Self::Catalog { .. }    => "catalog",
            Self::Block { .. }      => "block",
            Self::Stratified { .. } => "stratified",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    title:         Option<String>,
    pub fragments: Vec<Fragment>,
}

impl Document {
    /// Plain text of the first level-1 heading.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn snippet_count(&self) -> usize {
        self.fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Snippet { .. }))
            .count()
    }
}

fn markdown_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Parse a narrative source.
pub fn parse(source: &str) -> RandResult<Document> {
    let mut document = Document::default();
    let mut prose: Vec<Event<'_>> = Vec::new();
    let mut title: Option<String> = None;
    let mut events = Parser::new_ext(source, markdown_options()).into_offset_iter();

    while let Some((event, range)) = events.next() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if info.trim_start().starts_with('{') =>
            {
                flush_prose(&mut prose, &mut document.fragments);
                let line = line_of(source, range.start);

                let mut body = String::new();
                for (inner, _) in events.by_ref() {
                    match inner {
                        Event::Text(text) => body.push_str(&text),
                        Event::End(TagEnd::CodeBlock) => break,
                        _ => {}
                    }
                }
                if !is_closed_fence(&source[range]) {
                    return Err(narrative_err(line, "unterminated chunk"));
                }

                let snippet = parse_snippet(line, info.trim(), &body)?;
                document.fragments.push(Fragment::Snippet { line, snippet });
            }
            event => {
                match &event {
                    Event::Start(Tag::Heading { level: HeadingLevel::H1, .. })
                        if document.title.is_none() && title.is_none() =>
                    {
                        title = Some(String::new());
                    }
                    Event::End(TagEnd::Heading(HeadingLevel::H1)) if title.is_some() => {
                        document.title = title.take().map(|t| t.trim().to_string());
                    }
                    Event::Text(text) | Event::Code(text) => {
                        if let Some(t) = title.as_mut() {
                            t.push_str(text);
                        }
                    }
                    _ => {}
                }
                prose.push(event);
            }
        }
    }
    flush_prose(&mut prose, &mut document.fragments);

    Ok(document)
}

fn flush_prose(prose: &mut Vec<Event<'_>>, fragments: &mut Vec<Fragment>) {
    if prose.is_empty() {
        return;
    }
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, prose.drain(..));
    fragments.push(Fragment::Prose { html });
}

/// 1-based line number of a byte offset.
fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

// A fenced block that runs to end of input has no closing fence line.
fn is_closed_fence(block: &str) -> bool {
    let mut lines = block.trim_end().lines();
    let opening = lines.next();
    let closing = lines.last().map(str::trim_start);
    opening.is_some() && closing.is_some_and(|l| l.starts_with("```") || l.starts_with("~~~"))
}

fn parse_snippet(line: usize, chunk_header: &str, body: &str) -> RandResult<Snippet> {
    let chunk_header = chunk_header
        .strip_prefix('{')
        .and_then(|h| h.strip_suffix('}'))
        .ok_or_else(|| narrative_err(line, "chunk header must look like ```{kind key=value}"))?;
    let body: Vec<(usize, &str)> = body
        .lines()
        .enumerate()
        .map(|(i, l)| (line + 1 + i, l))
        .collect();

    let mut parts = chunk_header.split_whitespace();
    let kind = parts
        .next()
        .ok_or_else(|| narrative_err(line, "chunk header names no kind"))?;
    let mut args = Args::parse(line, parts)?;

    let snippet = match kind {
        "simple" => Snippet::Simple {
            n:    args.take("n", 10)?,
            prob: args.take("prob", DEFAULT_INTERVENTION_PROB)?,
        },
        "catalog" => Snippet::Catalog {
            block_size: args.take("block_size", DEFAULT_BLOCK_SIZE)?,
        },
        "block" => Snippet::Block {
            target_n:   args.take("target_n", 8)?,
            block_size: args.take("block_size", DEFAULT_BLOCK_SIZE)?,
            oversample: args.take("oversample", 1.0)?,
            enroll:     args.take("enroll", 0)?,
        },
        "stratified" => {
            let factors = parse_factors(&body)?;
            if factors.is_empty() {
                return Err(narrative_err(line, "stratified chunk declares no factors"));
            }
            Snippet::Stratified {
                target_n:   args.take("target_n", 8)?,
                block_size: args.take("block_size", DEFAULT_BLOCK_SIZE)?,
                oversample: args.take("oversample", 1.0)?,
                enroll:     args.take("enroll", 0)?,
                factors,
            }
        }
        other => return Err(narrative_err(line, &format!("unknown chunk kind '{other}'"))),
    };

    if kind != "stratified" {
        if let Some((body_no, _)) = body.iter().find(|(_, l)| !l.trim().is_empty()) {
            return Err(narrative_err(*body_no, &format!("'{kind}' chunk takes no body")));
        }
    }
    args.finish()?;
    Ok(snippet)
}

fn parse_factors(body: &[(usize, &str)]) -> RandResult<Vec<StratificationFactor>> {
    body.iter()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(line_no, l)| {
            let (name, levels) = l
                .split_once(':')
                .ok_or_else(|| narrative_err(*line_no, "factor line must be `name: level, level`"))?;
            let levels: Vec<String> = levels
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if levels.is_empty() {
                return Err(narrative_err(*line_no, "factor has no levels"));
            }
            Ok(StratificationFactor { name: name.trim().to_string(), levels })
        })
        .collect()
}

/// `key=value` arguments of a chunk header. Every key must be consumed.
struct Args {
    line:   usize,
    values: BTreeMap<String, String>,
}

impl Args {
    fn parse<'a>(line: usize, parts: impl Iterator<Item = &'a str>) -> RandResult<Self> {
        let mut values = BTreeMap::new();
        for part in parts {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| narrative_err(line, &format!("expected key=value, got '{part}'")))?;
            if values.insert(key.to_string(), value.to_string()).is_some() {
                return Err(narrative_err(line, &format!("duplicate argument '{key}'")));
            }
        }
        Ok(Self { line, values })
    }

    fn take<T: std::str::FromStr>(&mut self, key: &str, default: T) -> RandResult<T> {
        match self.values.remove(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                narrative_err(self.line, &format!("cannot parse {key}={raw}"))
            }),
        }
    }

    fn finish(self) -> RandResult<()> {
        match self.values.keys().next() {
            None => Ok(()),
            Some(key) => Err(narrative_err(self.line, &format!("unknown argument '{key}'"))),
        }
    }
}

fn narrative_err(line: usize, message: &str) -> RandError {
    RandError::Narrative { line, message: message.to_string() }
}
