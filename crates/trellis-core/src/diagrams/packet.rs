use serde::Serialize;
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::prelude::*;
use winnow::stream::Location;

use crate::canon::apply_accessibility;
use crate::config::Config;
use crate::cst::{Document, Record};
use crate::error::{CanonResult, GrammarError, Result};
use crate::grammar::{self, accessibility, header, span_from, title};
use crate::lex::{Input, PResult, eol, hspace0, punct, quoted, spanned, unsigned};
use crate::model::{Accessibility, Model};

pub const NOTATION: &str = "packet";
pub const HEADERS: &[&str] = &["packet-beta", "packet"];
const STATEMENTS: &[&str] = &["bit range", "`+` bit count", "title", "accTitle", "accDescr"];
const DEFAULT_BITS_PER_ROW: u64 = 32;
const MAX_ROWS: u64 = 4096;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketModel {
    pub title: Option<String>,
    pub bits_per_row: u64,
    /// Fields as written.
    pub blocks: Vec<PacketBlock>,
    /// Fields split at row boundaries.
    pub rows: Vec<Vec<PacketBlock>>,
    pub acc: Accessibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketBlock {
    pub id: String,
    pub start: u64,
    pub end: u64,
    pub label: String,
}

impl PacketModel {
    pub fn block(&self, id: &str) -> Option<&PacketBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_at_bit(&self, bit: u64) -> Option<&PacketBlock> {
        self.blocks.iter().find(|b| (b.start..=b.end).contains(&bit))
    }

    pub fn total_bits(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.end + 1)
    }
}

impl Model for PacketModel {
    fn entity_ids(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }

    fn relation_endpoints(&self) -> Vec<(&str, &str)> {
        Vec::new()
    }
}

pub fn parse(text: &str, config: &Config) -> Result<PacketModel> {
    let doc = parse_document(text)?;
    super::canonicalized(NOTATION, transform(&doc, config))
}

pub fn parse_document(text: &str) -> std::result::Result<Document<'_>, GrammarError> {
    grammar::parse_document(NOTATION, text, header(HEADERS), statement, STATEMENTS)
}

fn statement<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    alt((accessibility, title, field)).parse_next(input)
}

/// `start[-end]: "label"` or `+bits: "label"`
fn field<'a>(input: &mut Input<'a>) -> PResult<Record<'a>> {
    let start = input.current_token_start();
    let bits = opt(preceded(punct('+'), spanned(unsigned.take()))).parse_next(input)?;
    let (first, last) = match bits {
        Some(_) => (None, None),
        None => {
            let first = spanned(unsigned.take()).parse_next(input)?;
            let last = opt(preceded((hspace0, punct('-'), hspace0), spanned(unsigned.take())))
                .parse_next(input)?;
            (Some(first), last)
        }
    };
    hspace0.parse_next(input)?;
    cut_err(punct(':')).parse_next(input)?;
    hspace0.parse_next(input)?;
    let label = cut_err(spanned(quoted)).parse_next(input)?;
    cut_err(eol).parse_next(input)?;
    Ok(Record::new("field", span_from(input, start))
        .with_opt("bits", bits)
        .with_opt("start", first)
        .with_opt("end", last)
        .with("label", label))
}

pub fn transform(doc: &Document<'_>, config: &Config) -> CanonResult<PacketModel> {
    let bits_per_row = config
        .get_i64("packet.bitsPerRow")
        .and_then(|v| u64::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_BITS_PER_ROW);
    let mut model = PacketModel {
        bits_per_row,
        ..Default::default()
    };
    let mut next_bit = 0u64;

    for stmt in doc.statements() {
        if apply_accessibility(&mut model.acc, stmt) {
            continue;
        }
        match stmt.kind {
            "title" => model.title = stmt.non_empty_text("text").map(str::to_string),
            "field" => {
                let (start, end) = field_range(doc, stmt, next_bit)?;
                if start != next_bit {
                    return Err(doc.invalid(
                        stmt,
                        format!("packet field starts at bit {start}, expected {next_bit}"),
                    ));
                }
                if end / bits_per_row >= MAX_ROWS {
                    return Err(doc.invalid(
                        stmt,
                        format!("packet field ends at bit {end}, past the last of {MAX_ROWS} rows"),
                    ));
                }
                next_bit = end
                    .checked_add(1)
                    .ok_or_else(|| doc.invalid(stmt, "packet field runs past the last bit number"))?;
                model.blocks.push(PacketBlock {
                    id: format!("{start}-{end}"),
                    start,
                    end,
                    label: stmt.require_text("label")?.to_string(),
                });
            }
            _ => {}
        }
    }

    model.rows = split_rows(&model.blocks, bits_per_row);
    tracing::debug!(
        blocks = model.blocks.len(),
        rows = model.rows.len(),
        "packet canonicalized"
    );
    Ok(model)
}

fn field_range(doc: &Document<'_>, stmt: &Record<'_>, next_bit: u64) -> CanonResult<(u64, u64)> {
    let number = |name: &'static str| -> CanonResult<u64> {
        let raw = stmt.require_text(name)?;
        raw.parse()
            .map_err(|_| doc.invalid(stmt, format!("invalid bit number `{raw}`")))
    };

    if stmt.has("bits") {
        let bits = number("bits")?;
        if bits == 0 {
            return Err(doc.invalid(stmt, "packet field must span at least one bit"));
        }
        let end = next_bit
            .checked_add(bits - 1)
            .ok_or_else(|| doc.invalid(stmt, "packet field runs past the last bit number"))?;
        return Ok((next_bit, end));
    }

    let start = number("start")?;
    let end = if stmt.has("end") { number("end")? } else { start };
    if end < start {
        return Err(doc.invalid(
            stmt,
            format!("packet field end {end} is before its start {start}"),
        ));
    }
    Ok((start, end))
}

/// Block ends must already be below `MAX_ROWS * bits_per_row` and `u64::MAX`.
fn split_rows(blocks: &[PacketBlock], bits_per_row: u64) -> Vec<Vec<PacketBlock>> {
    let mut rows: Vec<Vec<PacketBlock>> = Vec::new();
    for block in blocks {
        let mut start = block.start;
        while start <= block.end {
            let row = start / bits_per_row;
            let row_end = (row * bits_per_row).saturating_add(bits_per_row - 1);
            let end = block.end.min(row_end);
            let row = row as usize;
            if rows.len() <= row {
                rows.resize_with(row + 1, Vec::new);
            }
            rows[row].push(PacketBlock {
                id: block.id.clone(),
                start,
                end,
                label: block.label.clone(),
            });
            start = end + 1;
        }
    }
    rows
}
