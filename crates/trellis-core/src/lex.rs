//! Lexical core shared by every notation grammar.
//!
//! Every recognizer here either consumes input and succeeds, or fails without consuming
//! anything that an enclosing `alt` could not rewind. Grammars never re-implement whitespace
//! or comment handling; they compose these.

use std::borrow::Cow;

use winnow::ascii::{Caseless, digit1, line_ending, multispace1, till_line_ending};
use winnow::combinator::{alt, eof, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Location};
use winnow::token::{any, literal, none_of, one_of, take_while};

use crate::cst::{Span, Token};

pub type Input<'a> = LocatingSlice<&'a str>;
pub type PResult<O> = ModalResult<O, ContextError>;

/// The fixed punctuation set used across notations.
pub const PUNCTUATION: &[char] = &[
    ':', ',', '[', ']', '(', ')', '{', '}', '<', '>', '|', '=', '+', '-', '*', '/', '~', '#',
];

pub fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

pub fn expected_literal(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::StringLiteral(what))
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn hspace0<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    take_while(0.., [' ', '\t']).parse_next(input)
}

pub fn hspace1<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    take_while(1.., [' ', '\t'])
        .context(expected("whitespace"))
        .parse_next(input)
}

/// LF or CRLF.
pub fn newline<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    line_ending.context(expected("newline")).parse_next(input)
}

/// `%% ...` up to (not including) the line terminator; yields the comment body.
pub fn comment<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    preceded("%%", till_line_ending)
        .context(expected("comment"))
        .parse_next(input)
}

/// End of a statement: trailing spaces, then either a `;` terminator (another statement may
/// follow on the same line) or an optional trailing comment followed by a newline or the end of
/// input.
pub fn eol(input: &mut Input<'_>) -> PResult<()> {
    hspace0.parse_next(input)?;
    alt((
        (';', hspace0, opt(comment), opt(line_ending)).void(),
        (opt(comment), alt((line_ending.void(), eof.void()))).void(),
    ))
    .context(expected("end of line"))
    .parse_next(input)
}

/// Any run of empty, whitespace-only or comment-only lines.
pub fn blank_lines(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., (hspace0, opt(comment), line_ending))
        .map(|()| ())
        .parse_next(input)
}

/// Whitespace (including newlines) and comments, as found inside brace-delimited bodies.
pub fn multiline_space(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., alt((multispace1.void(), comment.void(), ';'.void())))
        .map(|()| ())
        .parse_next(input)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (one_of(is_ident_start), take_while(0.., is_ident_char))
        .take()
        .context(expected("identifier"))
        .parse_next(input)
}

/// A run of unicode word characters; looser than [`identifier`] for labels and names.
pub fn word<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_')
        .context(expected("word"))
        .parse_next(input)
}

/// A name that may also contain `-` and `.` (branch names, requirement ids, ...).
pub fn name<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
    })
    .context(expected("name"))
    .parse_next(input)
}

/// Double- or single-quoted string; a backslash escapes the following character.
pub fn quoted<'a>(input: &mut Input<'a>) -> PResult<Cow<'a, str>> {
    alt((quoted_with('"'), quoted_with('\'')))
        .context(expected("quoted string"))
        .parse_next(input)
}

fn quoted_with<'a>(quote: char) -> impl Parser<Input<'a>, Cow<'a, str>, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        punct(quote).parse_next(input)?;
        let body: PResult<&'a str> = repeat(
            0..,
            alt((
                preceded('\\', any).void(),
                none_of([quote, '\\', '\n']).void(),
            )),
        )
        .map(|()| ())
        .take()
        .parse_next(input);
        let body = body?;
        punct(quote).parse_next(input)?;
        Ok(unescape(body))
    }
}

fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

pub fn integer(input: &mut Input<'_>) -> PResult<i64> {
    (opt(one_of(['-', '+'])), digit1)
        .take()
        .try_map(str::parse::<i64>)
        .context(expected("integer"))
        .parse_next(input)
}

pub fn unsigned(input: &mut Input<'_>) -> PResult<u64> {
    digit1
        .try_map(str::parse::<u64>)
        .context(expected("unsigned integer"))
        .parse_next(input)
}

pub fn decimal(input: &mut Input<'_>) -> PResult<f64> {
    (
        opt(one_of(['-', '+'])),
        alt(((digit1, opt(('.', digit1))).void(), ('.', digit1).void())),
    )
        .take()
        .try_map(str::parse::<f64>)
        .context(expected("number"))
        .parse_next(input)
}

/// One character of the fixed punctuation set.
pub fn punct<'a>(c: char) -> impl Parser<Input<'a>, char, ErrMode<ContextError>> {
    c.context(StrContext::Expected(StrContextValue::CharLiteral(c)))
}

/// A fixed multi-character symbol such as `-->` or `:::`.
pub fn symbol<'a>(sym: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    literal(sym).context(expected_literal(sym))
}

/// A literal keyword that is not immediately followed by an identifier character.
pub fn keyword<'a>(kw: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    terminated(literal(kw), not(one_of(is_ident_char))).context(expected_literal(kw))
}

/// Case-insensitive [`keyword`].
pub fn keyword_ci<'a>(kw: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    terminated(literal(Caseless(kw)), not(one_of(is_ident_char))).context(expected_literal(kw))
}

/// Free text up to a trailing comment or the end of the line, trimmed.
pub fn text_to_eol<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    repeat(0.., preceded(not(alt(("%%", "\n", "\r\n"))), any))
        .map(|()| ())
        .take()
        .map(str::trim)
        .parse_next(input)
}

/// Drops a trailing `;` terminator from captured free text.
pub fn strip_terminator(text: &str) -> &str {
    text.trim_end_matches(';').trim_end()
}

/// Bounded label capture: any character while `close` does not match at the current position.
///
/// Labels never cross a line break.
pub fn label_until<'a>(close: &'static str) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    repeat(0.., preceded(not(close), none_of(['\n', '\r'])))
        .map(|()| ())
        .take()
}

/// Like [`label_until`] but stops at whichever of several closing delimiters comes first.
pub fn label_until_any<'a>(
    closers: &'static [&'static str],
) -> impl Parser<Input<'a>, &'a str, ErrMode<ContextError>> {
    move |input: &mut Input<'a>| {
        repeat(
            0..,
            preceded(
                not(move |i: &mut Input<'a>| {
                    for close in closers {
                        if symbol(*close).parse_next(i).is_ok() {
                            return Ok(());
                        }
                    }
                    Err(ErrMode::Backtrack(ContextError::new()))
                }),
                none_of(['\n', '\r']),
            ),
        )
        .map(|()| ())
        .take()
        .parse_next(input)
    }
}

/// Wraps a recognizer's output into a [`Token`] carrying its byte span.
pub fn spanned<'a, O, P>(mut parser: P) -> impl Parser<Input<'a>, Token<'a>, ErrMode<ContextError>>
where
    P: Parser<Input<'a>, O, ErrMode<ContextError>>,
    O: Into<Cow<'a, str>>,
{
    move |input: &mut Input<'a>| {
        let start = input.current_token_start();
        let text = parser.parse_next(input)?;
        let end = input.current_token_start();
        Ok(Token::new(text, Span::new(start, end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run<'a, O>(
        mut p: impl Parser<Input<'a>, O, ErrMode<ContextError>>,
        text: &'a str,
    ) -> Option<(O, &'a str)> {
        let mut input = Input::new(text);
        let out = p.parse_next(&mut input).ok()?;
        Some((out, *input))
    }

    #[test]
    fn eol_accepts_terminator_comment_and_crlf() {
        assert_eq!(run(eol, "  \nrest").map(|(_, r)| r), Some("rest"));
        assert_eq!(run(eol, " ; next").map(|(_, r)| r), Some("next"));
        assert_eq!(run(eol, " %% note\r\nrest").map(|(_, r)| r), Some("rest"));
        assert_eq!(run(eol, "").map(|(_, r)| r), Some(""));
        assert!(run(eol, "x").is_none());
    }

    #[test]
    fn quoted_strings_unescape_backslashes() {
        let (s, rest) = run(quoted, r#""a \"b\" c" tail"#).unwrap();
        assert_eq!(s, "a \"b\" c");
        assert_eq!(rest, " tail");
        let (s, _) = run(quoted, "'single'").unwrap();
        assert_eq!(s, "single");
        assert!(run(quoted, "\"open").is_none());
    }

    #[test]
    fn numbers_and_identifiers() {
        assert_eq!(run(integer, "-42x").map(|(n, _)| n), Some(-42));
        assert_eq!(run(decimal, "3.25,").map(|(n, _)| n), Some(3.25));
        assert_eq!(run(decimal, ".5").map(|(n, _)| n), Some(0.5));
        assert_eq!(run(identifier, "_a1-b").map(|(s, _)| s), Some("_a1"));
        assert!(run(identifier, "1a").is_none());
    }

    #[test]
    fn keyword_requires_word_boundary() {
        assert!(run(keyword("end"), "end\n").is_some());
        assert!(run(keyword("end"), "endpoint").is_none());
        assert!(run(keyword_ci("TITLE"), "title x").is_some());
    }

    #[test]
    fn label_capture_stops_at_closing_delimiter() {
        let (label, rest) = run(label_until("))"), "a (b) c)) tail").unwrap();
        assert_eq!(label, "a (b) c");
        assert_eq!(rest, ")) tail");
        let (label, rest) = run(label_until_any(&["/]", "\\]"]), "lean/] x").unwrap();
        assert_eq!(label, "lean");
        assert_eq!(rest, "/] x");
    }

    #[test]
    fn text_to_eol_stops_before_comment() {
        let (text, rest) = run(text_to_eol, " hello world %% c\nnext").unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(rest, "%% c\nnext");
    }

    #[test]
    fn spanned_tokens_carry_offsets() {
        let mut input = Input::new("ab cd");
        let _ = identifier.parse_next(&mut input).unwrap();
        let _ = hspace1.parse_next(&mut input).unwrap();
        let tok = spanned(identifier).parse_next(&mut input).unwrap();
        assert_eq!(tok.text, "cd");
        assert_eq!(tok.span, Span::new(3, 5));
    }
}
