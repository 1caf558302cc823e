//! Bounded rendering of run outcomes for telemetry.
//!
//! The summarizer streams a value's `Debug` output through a filter instead of
//! formatting it in full. Collections are cut after a number of elements,
//! nesting is cut after a depth, long string literals are replaced by their
//! byte length and the whole summary is capped. Formatting stops as soon as the
//! cap is reached, so summarizing a huge value costs roughly the cap.

use std::fmt::{self, Debug, Write};

/// Limits applied by [`summarize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummaryLimits {
    /// Deepest bracket level rendered in full.
    pub max_depth: usize,
    /// Elements rendered per collection before eliding the rest.
    pub max_width: usize,
    /// String literals longer than this are replaced by their byte length.
    pub max_scalar_bytes: usize,
    /// Hard cap on the summary length.
    pub max_total_bytes: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_width: 5,
            max_scalar_bytes: 64,
            max_total_bytes: 512,
        }
    }
}

const ELLIPSIS: &str = "…";

/// Render `value` within `limits`.
pub fn summarize<T: Debug + ?Sized>(value: &T, limits: &SummaryLimits) -> String {
    let mut writer = BoundedWriter::new(*limits);
    // An error here only means the writer stopped early.
    let _ = write!(writer, "{:?}", value);
    writer.finish()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Literal {
    None,
    Str,
    Char,
}

struct BoundedWriter {
    limits: SummaryLimits,
    out: String,
    /// Element counters, one per open bracket.
    widths: Vec<usize>,
    /// Suppress output while nested at or below this level.
    muted_at: Option<usize>,
    literal: Literal,
    escaped: bool,
    literal_buf: String,
    literal_len: usize,
    full: bool,
}

impl BoundedWriter {
    fn new(limits: SummaryLimits) -> Self {
        Self {
            limits,
            out: String::new(),
            widths: Vec::new(),
            muted_at: None,
            literal: Literal::None,
            escaped: false,
            literal_buf: String::new(),
            literal_len: 0,
            full: false,
        }
    }

    fn depth(&self) -> usize {
        self.widths.len()
    }

    fn muted(&self) -> bool {
        self.muted_at.is_some()
    }

    fn emit(&mut self, text: &str) {
        if self.full || self.muted() {
            return;
        }
        if self.out.len() + text.len() > self.limits.max_total_bytes {
            self.out.push_str(ELLIPSIS);
            self.full = true;
            return;
        }
        self.out.push_str(text);
    }

    fn emit_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.emit(c.encode_utf8(&mut buf));
    }

    fn literal_char(&mut self, c: char) {
        if self.escaped {
            self.escaped = false;
        } else if c == '\\' {
            self.escaped = true;
        } else if (self.literal == Literal::Str && c == '"')
            || (self.literal == Literal::Char && c == '\'')
        {
            self.close_literal(c);
            return;
        }
        self.literal_len += c.len_utf8();
        if self.literal_len <= self.limits.max_scalar_bytes {
            self.literal_buf.push(c);
        }
    }

    fn close_literal(&mut self, quote: char) {
        self.literal = Literal::None;
        let text = if self.literal_len > self.limits.max_scalar_bytes {
            format!("<{} bytes>", self.literal_len)
        } else {
            format!("{quote}{}{quote}", self.literal_buf)
        };
        self.literal_buf.clear();
        self.literal_len = 0;
        self.emit(&text);
    }

    fn push(&mut self, c: char) {
        if self.literal != Literal::None {
            self.literal_char(c);
            return;
        }
        match c {
            '"' => self.literal = Literal::Str,
            '\'' => self.literal = Literal::Char,
            '[' | '{' | '(' => {
                self.emit_char(c);
                self.widths.push(0);
                if !self.muted() && self.depth() > self.limits.max_depth {
                    self.emit(ELLIPSIS);
                    self.muted_at = Some(self.depth());
                }
            }
            ']' | '}' | ')' => {
                if self.muted_at == Some(self.depth()) {
                    self.muted_at = None;
                }
                self.widths.pop();
                self.emit_char(c);
            }
            ',' if !self.muted() && self.depth() > 0 => {
                let width = self.widths.last().copied().unwrap_or(0) + 1;
                if let Some(last) = self.widths.last_mut() {
                    *last = width;
                }
                if width >= self.limits.max_width {
                    self.emit(", ");
                    self.emit(ELLIPSIS);
                    self.muted_at = Some(self.depth());
                } else {
                    self.emit_char(c);
                }
            }
            _ => self.emit_char(c),
        }
    }

    fn finish(mut self) -> String {
        if self.literal != Literal::None && !self.full {
            // unterminated literal, only possible with odd Debug impls
            let pending = std::mem::take(&mut self.literal_buf);
            self.emit(&pending);
        }
        self.out
    }
}

impl Write for BoundedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.full {
                return Err(fmt::Error);
            }
            self.push(c);
        }
        Ok(())
    }
}
