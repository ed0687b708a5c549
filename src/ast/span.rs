use std::fmt;

use serde::Serialize;
use sqlparser::{
    dialect::Dialect,
    keywords::Keyword,
    tokenizer::{Location, Span as TokenSpan, Token, Tokenizer, Whitespace}
};

use crate::error::{ParseError, SourcePosition};

/// Half-open byte range `[start, end)` into the analyzed text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end:   usize
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Two spans overlap when they share a byte, or both start at the same
    /// offset (two insertions at one point conflict too).
    pub fn overlaps(&self, other: &Span) -> bool {
        (self.start < other.end && other.start < self.end) || self.start == other.start
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Slice `text`, returning `None` for out-of-range or non-boundary spans.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        if self.start > self.end {
            return None;
        }
        text.get(self.start..self.end)
    }

    /// Whether this span can be used to cut `text`.
    pub fn fits(&self, text: &str) -> bool {
        self.slice(text).is_some()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Maps sqlparser's 1-based line/column locations onto byte offsets.
#[derive(Debug)]
pub struct SourceMap<'a> {
    text:        &'a str,
    line_starts: Vec<usize>
}

impl<'a> SourceMap<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self {
            text,
            line_starts
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offset of a 1-based `(line, column)`; columns count characters.
    ///
    /// A column one past the last character of a line maps to the start of
    /// the next line, which is how exclusive span ends are reported.
    pub fn offset_of(&self, line: usize, column: usize) -> Option<usize> {
        if line == 0 || column == 0 {
            return None;
        }
        let start = *self.line_starts.get(line - 1)?;
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len());
        let line_text = &self.text[start..end];
        match line_text.char_indices().nth(column - 1) {
            Some((idx, _)) => Some(start + idx),
            None if line_text.chars().count() == column - 1 => Some(end),
            None => None
        }
    }

    /// Inverse of [`offset_of`](Self::offset_of).
    pub fn position_of(&self, offset: usize) -> Option<SourcePosition> {
        if offset > self.text.len() || !self.text.is_char_boundary(offset) {
            return None;
        }
        let line_idx = self.line_starts.partition_point(|&s| s <= offset) - 1;
        let line_start = self.line_starts[line_idx];
        let column = self.text[line_start..offset].chars().count() + 1;
        Some(SourcePosition {
            line: line_idx + 1,
            column,
            offset
        })
    }

    fn location(&self, loc: Location) -> Option<usize> {
        self.offset_of(
            usize::try_from(loc.line).ok()?,
            usize::try_from(loc.column).ok()?
        )
    }

    /// Convert a sqlparser span. Empty spans (line 0) mean "unknown".
    pub fn span(&self, span: TokenSpan) -> Option<Span> {
        let start = self.location(span.start)?;
        let end = self.location(span.end)?;
        Some(Span::new(start, end.max(start)))
    }
}

/// One token with its byte span.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span:  Span
}

impl Lexeme {
    fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_) | Token::EOF)
    }

    fn is_blank(&self) -> bool {
        matches!(
            self.token,
            Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
        )
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.token, Token::Word(w) if w.keyword == keyword)
    }
}

/// Token stream of the analyzed text, used to recover spans the parser
/// does not attach to nodes (keywords, parentheses).
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    lexemes: Vec<Lexeme>
}

impl TokenStream {
    pub fn tokenize(
        sql: &str,
        dialect: &dyn Dialect,
        map: &SourceMap<'_>
    ) -> Result<Self, ParseError> {
        let tokens = Tokenizer::new(dialect, sql)
            .tokenize_with_location()
            .map_err(|e| ParseError::from_parser_message(e.to_string(), map))?;
        let lexemes = tokens
            .into_iter()
            .filter_map(|t| {
                let span = map.span(t.span)?;
                Some(Lexeme {
                    token: t.token,
                    span
                })
            })
            .collect();
        Ok(Self {
            lexemes
        })
    }

    pub fn lexemes(&self) -> &[Lexeme] {
        &self.lexemes
    }

    /// Index of the first lexeme starting at or after `offset`.
    fn position(&self, offset: usize) -> usize {
        self.lexemes.partition_point(|l| l.span.start < offset)
    }

    /// First non-whitespace lexeme starting at or after `offset`.
    pub fn next_significant(&self, offset: usize) -> Option<(usize, &Lexeme)> {
        self.lexemes
            .iter()
            .enumerate()
            .skip(self.position(offset))
            .find(|(_, l)| !l.is_trivia())
    }

    /// Last non-whitespace lexeme ending at or before `offset`.
    pub fn prev_significant(&self, offset: usize) -> Option<(usize, &Lexeme)> {
        let end = self.lexemes.partition_point(|l| l.span.end <= offset);
        self.lexemes[..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| !l.is_trivia())
    }

    /// End offset of the parenthesis closing the one at `open`.
    pub fn matching_paren(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for lexeme in self.lexemes.get(open..)? {
            match lexeme.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(lexeme.span.end);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Span of `keyword` if it is the next significant token after `offset`.
    pub fn keyword_after(&self, offset: usize, keyword: Keyword) -> Option<Span> {
        self.next_significant(offset)
            .filter(|(_, l)| l.is_keyword(keyword))
            .map(|(_, l)| l.span)
    }

    /// End of the parenthesized group that follows `offset`, skipping over
    /// keywords and names (`IN (`, `NOT IN (`, `fn(`).
    pub fn paren_group_end(&self, offset: usize) -> Option<usize> {
        for (idx, lexeme) in self.lexemes.iter().enumerate().skip(self.position(offset)) {
            match lexeme.token {
                Token::Whitespace(_) | Token::Word(_) | Token::Period => continue,
                Token::LParen => return self.matching_paren(idx),
                _ => return None
            }
        }
        None
    }

    /// Span of `NAME ( ... )` around `inner`, for call-like constructs the
    /// parser does not span as a whole (`CAST(x AS INT)`,
    /// `EXTRACT(YEAR FROM x)`). Keywords between the parenthesis and `inner`
    /// are skipped; `NAME` must be one of `names`.
    pub fn call_around(&self, inner: Span, names: &[&str]) -> Option<Span> {
        let mut offset = inner.start;
        loop {
            let (idx, lexeme) = self.prev_significant(offset)?;
            match &lexeme.token {
                Token::LParen => {
                    let (_, word) = self.prev_significant(lexeme.span.start)?;
                    let Token::Word(w) = &word.token else {
                        return None;
                    };
                    if !names.iter().any(|n| w.value.eq_ignore_ascii_case(n)) {
                        return None;
                    }
                    let end = self.matching_paren(idx)?;
                    return (end >= inner.end).then_some(Span::new(word.span.start, end));
                }
                Token::Word(_) => offset = lexeme.span.start,
                _ => return None
            }
        }
    }

    /// First of `keywords` lying entirely inside `within`.
    pub fn find_keyword(&self, within: Span, keywords: &[Keyword]) -> Option<Span> {
        self.lexemes
            .iter()
            .skip(self.position(within.start))
            .take_while(|l| l.span.end <= within.end)
            .find(|l| keywords.iter().any(|&k| l.is_keyword(k)))
            .map(|l| l.span)
    }

    /// Widen `inner` by one pair of enclosing parentheses, if present.
    pub fn widen_to_parens(&self, inner: Span) -> Span {
        let Some((open, paren)) = self.prev_significant(inner.start) else {
            return inner;
        };
        if paren.token != Token::LParen {
            return inner;
        }
        match (self.next_significant(inner.end), self.matching_paren(open)) {
            (Some((_, close)), Some(end)) if close.token == Token::RParen && close.span.end == end => {
                Span::new(paren.span.start, end)
            }
            _ => inner
        }
    }

    /// Extend `span` back over the significant token right before it.
    pub fn extend_back(&self, span: Span) -> Span {
        match self.prev_significant(span.start) {
            Some((_, l)) => Span::new(l.span.start, span.end),
            None => span
        }
    }

    /// End of a run of the given keywords following `offset`.
    pub fn keyword_run_end(&self, offset: usize, keywords: &[Keyword]) -> usize {
        let mut end = offset;
        for lexeme in self.lexemes.iter().skip(self.position(offset)) {
            if lexeme.is_trivia() {
                continue;
            }
            if keywords.iter().any(|&k| lexeme.is_keyword(k)) {
                end = lexeme.span.end;
            } else {
                break;
            }
        }
        end
    }

    /// End of the spaces, tabs and newlines directly after `offset`.
    pub fn blank_end(&self, offset: usize) -> usize {
        self.lexemes
            .iter()
            .skip(self.position(offset))
            .take_while(|l| l.is_blank())
            .last()
            .map_or(offset, |l| l.span.end)
    }

    /// First word of the text, upper-cased (`SELECT`, `INSERT`, ...).
    pub fn leading_word(&self) -> Option<String> {
        match self.next_significant(0) {
            Some((
                _,
                Lexeme {
                    token: Token::Word(w),
                    ..
                }
            )) => Some(w.value.to_uppercase()),
            _ => None
        }
    }

    /// Spans of statements separated by top-level semicolons, trimmed of
    /// surrounding whitespace and comments.
    pub fn statement_spans(&self) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut current: Option<Span> = None;
        let mut depth = 0usize;
        for lexeme in &self.lexemes {
            match lexeme.token {
                Token::SemiColon if depth == 0 => {
                    spans.extend(current.take());
                    continue;
                }
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            if lexeme.is_trivia() {
                continue;
            }
            current = Some(match current {
                Some(span) => span.join(lexeme.span),
                None => lexeme.span
            });
        }
        spans.extend(current);
        spans
    }
}
