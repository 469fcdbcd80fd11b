//! Text cleanup that runs before detection and grammar dispatch: line endings, YAML front-matter
//! and `%%{...}%%` directives.
//!
//! Stripped regions are replaced by the same number of newlines, so grammar positions still
//! point into the caller's text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use trellis_core::Config;

use crate::detect::DetectorRegistry;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct PreprocessResult {
    pub code: String,
    pub title: Option<String>,
    /// Overrides from front-matter `config` and init directives, directives winning.
    pub config: Config,
}

static FRONT_MATTER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^-{3}[ \t]*\n((?:.*?\n)?)-{3}[ \t]*(?:\n|$)").ok());

pub fn preprocess_diagram(input: &str, registry: &DetectorRegistry) -> Result<PreprocessResult> {
    let cleaned = normalize_line_endings(input);
    let (without_front_matter, title, mut config) = process_front_matter(&cleaned)?;
    let (code, directive_config) = process_directives(&without_front_matter, registry)?;

    config.deep_merge(directive_config.as_value());
    Ok(PreprocessResult {
        code,
        title,
        config,
    })
}

fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Newlines standing in for a removed region of `text`.
fn blank_out(text: &str) -> String {
    "\n".repeat(text.matches('\n').count())
}

pub(crate) fn strip_front_matter(text: &str) -> String {
    match FRONT_MATTER_RE.as_ref().and_then(|re| re.find(text)) {
        Some(m) => format!("{}{}", blank_out(m.as_str()), &text[m.end()..]),
        None => text.to_string(),
    }
}

fn process_front_matter(input: &str) -> Result<(String, Option<String>, Config)> {
    let caps = FRONT_MATTER_RE.as_ref().and_then(|re| re.captures(input));
    let Some((whole, body)) = caps.and_then(|c| Some((c.get(0)?, c.get(1)?))) else {
        if input.starts_with("---") {
            return Err(Error::MalformedFrontMatter {
                message: "missing closing `---`".to_string(),
            });
        }
        return Ok((input.to_string(), None, Config::empty_object()));
    };

    let raw: serde_yaml::Value =
        serde_yaml::from_str(body.as_str()).map_err(|e| Error::InvalidFrontMatterYaml {
            message: e.to_string(),
        })?;
    let parsed = serde_json::to_value(raw).map_err(|e| Error::InvalidFrontMatterYaml {
        message: e.to_string(),
    })?;
    let fields = match parsed {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(Error::MalformedFrontMatter {
                message: format!("expected a mapping, found {other}"),
            });
        }
    };

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut config = Config::empty_object();
    if let Some(value) = fields.get("config") {
        config.deep_merge(value);
    }
    if let Some(Value::String(mode)) = fields.get("displayMode") {
        config.set_value("gantt.displayMode", Value::String(mode.clone()));
    }

    tracing::trace!(title = ?title, "front-matter parsed");
    let stripped = format!("{}{}", blank_out(whole.as_str()), &input[whole.end()..]);
    Ok((stripped, title, config))
}

#[derive(Debug, Clone, PartialEq)]
struct Directive {
    ty: String,
    args: Option<Value>,
}

fn process_directives(input: &str, registry: &DetectorRegistry) -> Result<(String, Config)> {
    let mut merged = Config::empty_object();

    for directive in find_directives(input)? {
        match directive.ty.as_str() {
            "init" | "initialize" => {
                let mut args = directive.args.unwrap_or(Value::Object(Map::new()));
                sanitize_directive(&mut args);
                move_config_under_type(&mut args, input, registry);
                merged.deep_merge(&args);
            }
            "wrap" => merged.set_value("wrap", Value::Bool(true)),
            other => tracing::trace!(directive = other, "ignoring directive"),
        }
    }

    Ok((strip_directives(input), merged))
}

/// An init directive's top-level `config` applies to the notation being parsed.
fn move_config_under_type(args: &mut Value, input: &str, registry: &DetectorRegistry) {
    let Value::Object(obj) = args else {
        return;
    };
    let Some(specific) = obj.remove("config") else {
        return;
    };
    let mut scratch = Config::empty_object();
    match registry.detect_type(input, &mut scratch) {
        Ok(ty) => {
            obj.insert(ty.to_string(), specific);
        }
        Err(_) => tracing::debug!("dropping directive `config`: diagram type not detected"),
    }
}

fn find_directives(input: &str) -> Result<Vec<Directive>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel) = input[pos..].find("%%{") {
        let content_start = pos + rel + 3;
        let Some(rel_end) = input[content_start..].find("}%%") else {
            return Err(Error::InvalidDirective {
                message: "unterminated `%%{`".to_string(),
            });
        };
        let content_end = content_start + rel_end;
        if let Some(d) = parse_directive(&input[content_start..content_end])? {
            out.push(d);
        }
        pos = content_end + 3;
    }

    Ok(out)
}

fn parse_directive(raw: &str) -> Result<Option<Directive>> {
    let raw = raw.trim();
    let ty_len = raw
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(raw.len());
    if ty_len == 0 {
        return Ok(None);
    }
    let (ty, rest) = raw.split_at(ty_len);

    let args = match rest.trim_start().strip_prefix(':').map(str::trim) {
        None | Some("") => None,
        Some(body) if body.starts_with('{') || body.starts_with('[') => {
            Some(
                json5::from_str::<Value>(body).map_err(|e| Error::InvalidDirective {
                    message: format!("{ty}: {e}"),
                })?,
            )
        }
        Some(body) => Some(Value::String(body.to_string())),
    };

    Ok(Some(Directive {
        ty: ty.to_string(),
        args,
    }))
}

fn sanitize_directive(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("secure");
            map.retain(|k, _| !k.starts_with("__"));
            for v in map.values_mut() {
                sanitize_directive(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_directive),
        Value::String(s) => {
            if s.contains('<') || s.contains('>') || s.contains("url(data:") {
                s.clear();
            }
        }
        _ => {}
    }
}

pub(crate) fn strip_directives(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(rel) = text[pos..].find("%%{") {
        let start = pos + rel;
        out.push_str(&text[pos..start]);
        let Some(rel_end) = text[start + 3..].find("}%%") else {
            return out;
        };
        let end = start + 3 + rel_end + 3;
        out.push_str(&blank_out(&text[start..end]));
        pos = end;
    }
    out.push_str(&text[pos..]);
    out
}
