//! Report rendering — one narrative source in, one static HTML page out.
//!
//! Snippets are evaluated in document order. Snippet i draws from slot i
//! of `RngBank::new(seed)`, so one seed reproduces the whole report and
//! editing one snippet's arguments never reshuffles another's output.

use crate::{
    block::{binomial, BlockCatalog},
    error::RandResult,
    generator::{generate, GeneratorParams, Strata},
    narrative::{self, Document, Fragment, Snippet},
    rng::RngBank,
    simple::{simple_randomization, ArmCounts},
    table::AssignmentTable,
    types::Treatment,
};
use chrono::{DateTime, Utc};
use pulldown_cmark_escape::{escape_html, FmtWriter};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const STYLE: &str = "body{font-family:sans-serif;max-width:52em;margin:2em auto;line-height:1.5}\
table{border-collapse:collapse;margin:1em 0}\
td,th{border:1px solid #bbb;padding:2px 8px;text-align:left}\
.snippet{background:#f6f6f6;border-left:4px solid #4a7;padding:0.5em 1em;margin:1em 0}\
.consumed{color:#888}";

/// Render a parsed document to a complete HTML page.
pub fn render_html(
    document: &Document,
    seed: u64,
    rendered_at: DateTime<Utc>,
) -> RandResult<String> {
    let bank = RngBank::new(seed);
    let title = document.title().unwrap_or("Randomization report");

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    writeln!(html, "<title>{}</title>", escape(title)?)?;
    writeln!(html, "<style>{STYLE}</style>\n</head>\n<body>")?;

    let mut slot = 0usize;
    for fragment in &document.fragments {
        match fragment {
            Fragment::Prose { html: prose } => html.push_str(prose),
            Fragment::Snippet { line, snippet } => {
                log::debug!("evaluating {} snippet from line {line} (slot {slot})", snippet.kind());
                html.push_str("<div class=\"snippet\">\n");
                render_snippet(&mut html, snippet, &bank, slot)?;
                html.push_str("</div>\n");
                slot += 1;
            }
        }
    }

    writeln!(
        html,
        "<footer><small>Seed {seed}. Rendered {}.</small></footer>\n</body>\n</html>",
        rendered_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    Ok(html)
}

fn render_snippet(
    html: &mut String,
    snippet: &Snippet,
    bank: &RngBank,
    slot: usize,
) -> RandResult<()> {
    match snippet {
        Snippet::Simple { n, prob } => {
            let mut rng = bank.for_slot(slot);
            let draws = simple_randomization(*n, *prob, &mut rng)?;
            let counts = ArmCounts::tally(&draws);
            writeln!(
                html,
                "<p>Simple randomization, n = {n}, P(intervention) = {prob}:</p>"
            )?;
            let codes: Vec<String> = draws.iter().map(|t| t.as_code().to_string()).collect();
            writeln!(html, "<pre>{}</pre>", codes.join(" "))?;
            write_counts(html, &counts)?;
        }
        Snippet::Catalog { block_size } => {
            let catalog = BlockCatalog::enumerate(*block_size)?;
            let half = *block_size as u64 / 2;
            writeln!(
                html,
                "<p>All {} distinct blocks of size {block_size} (C({block_size}, {half}) = {}):</p>",
                catalog.len(),
                binomial(*block_size as u64, half).unwrap_or_default()
            )?;
            html.push_str("<table>\n<tr><th>#</th><th>block</th><th>codes</th></tr>\n");
            for (i, block) in catalog.blocks().iter().enumerate() {
                let codes: Vec<String> =
                    block.labels().iter().map(|t| t.as_code().to_string()).collect();
                writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    i + 1,
                    block.code(),
                    codes.join(" ")
                )?;
            }
            html.push_str("</table>\n");
        }
        Snippet::Block { target_n, block_size, oversample, enroll } => {
            let params = GeneratorParams {
                total_target_n:    *target_n,
                block_size:        *block_size,
                oversample_factor: *oversample,
            };
            let table = generate(&params, &Strata::Unstratified, seed_for(bank, slot))?;
            render_table(html, table, *enroll)?;
        }
        Snippet::Stratified { target_n, block_size, oversample, enroll, factors } => {
            let params = GeneratorParams {
                total_target_n:    *target_n,
                block_size:        *block_size,
                oversample_factor: *oversample,
            };
            let strata = Strata::cross(factors)?;
            let names: Vec<&str> = factors.iter().map(|f| f.name.as_str()).collect();
            writeln!(
                html,
                "<p>Stratified by {}; each stratum draws its own blocks.</p>",
                escape(&names.join(" \u{d7} "))?
            )?;
            let table = generate(&params, &strata, seed_for(bank, slot))?;
            render_table(html, table, *enroll)?;
        }
    }
    Ok(())
}

// Table generation needs a master seed of its own (it fans out per
// stratum); derive one from the snippet's slot stream.
fn seed_for(bank: &RngBank, slot: usize) -> u64 {
    bank.for_slot(slot).next_u64()
}

fn render_table(html: &mut String, mut table: AssignmentTable, enroll: usize) -> RandResult<()> {
    let partitions: Vec<Option<String>> = table
        .partitions()
        .into_iter()
        .map(|p| p.map(String::from))
        .collect();

    for stratum in &partitions {
        for _ in 0..enroll {
            table.consume(stratum.as_deref())?;
        }
    }

    writeln!(
        html,
        "<p>{} rows in blocks of {}; every completed block is exactly balanced: {}.</p>",
        table.len(),
        table.block_size(),
        if table.is_block_balanced() { "yes" } else { "no" }
    )?;
    html.push_str("<table>\n<tr><th>identifier</th><th>stratum</th><th>treatment_assignment</th><th>randomized</th></tr>\n");
    for row in table.rows() {
        let class = if row.randomized { " class=\"consumed\"" } else { "" };
        writeln!(
            html,
            "<tr{class}><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&row.identifier)?,
            escape(row.stratum.as_deref().unwrap_or(""))?,
            row.treatment.as_code(),
            if row.randomized { "TRUE" } else { "FALSE" }
        )?;
    }
    html.push_str("</table>\n");

    for stratum in &partitions {
        let counts = table.arm_counts(stratum.as_deref());
        if let Some(label) = stratum {
            writeln!(html, "<p>Stratum {}:</p>", escape(label)?)?;
        }
        write_counts(html, &counts)?;
    }
    Ok(())
}

fn write_counts(html: &mut String, counts: &ArmCounts) -> RandResult<()> {
    writeln!(
        html,
        "<table><tr><th>{}</th><th>{}</th><th>imbalance</th></tr>\
         <tr><td>{}</td><td>{}</td><td>{}</td></tr></table>",
        Treatment::Intervention,
        Treatment::Control,
        counts.intervention,
        counts.control,
        counts.imbalance()
    )?;
    Ok(())
}

/// HTML-escape text for element or attribute content.
pub fn escape(text: &str) -> RandResult<String> {
    let mut out = String::with_capacity(text.len());
    escape_html(FmtWriter(&mut out), text)?;
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub output:   PathBuf,
    pub snippets: usize,
    pub bytes:    usize,
}

/// The single report-rendering job: source document -> HTML file.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub seed:   u64,
}

impl RenderJob {
    pub fn run(&self) -> RandResult<RenderSummary> {
        self.run_at(Utc::now())
    }

    /// Same as `run()` with a fixed render timestamp.
    pub fn run_at(&self, rendered_at: DateTime<Utc>) -> RandResult<RenderSummary> {
        log::info!("rendering {} -> {}", self.source.display(), self.output.display());

        let source = std::fs::read_to_string(&self.source)?;
        let document = narrative::parse(&source)?;
        let html = render_html(&document, self.seed, rendered_at)?;

        write_atomically(&self.output, html.as_bytes())?;

        let summary = RenderSummary {
            output:   self.output.clone(),
            snippets: document.snippet_count(),
            bytes:    html.len(),
        };
        log::info!("rendered {} snippets, {} bytes", summary.snippets, summary.bytes);
        Ok(summary)
    }
}

// Write next to the target and rename, so a failed render never leaves a
// truncated report at the output path.
fn write_atomically(path: &Path, bytes: &[u8]) -> RandResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".partial");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
