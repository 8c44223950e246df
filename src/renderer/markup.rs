//! HTML scanner – reduces an HTML document to a flat list of text blocks.
//!
//! Only the structure the flow renderer can draw is kept:
//! - Headings: h1-h6
//! - Paragraph-like blocks: p, div, section, blockquote, pre, tr (cells
//!   joined with spaces)
//! - List items with bullet or ordinal markers
//! - Hard line breaks: br
//!
//! Inline tags are transparent, `<head>` only contributes its `<title>`, and
//! `<style>` / `<script>` content is dropped.

/// Kind of a text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Heading level 1-6.
    Heading(u8),
    Paragraph,
    /// List item with its rendered marker ("•" or "3.").
    ListItem { marker: String, depth: usize },
}

/// A run of text that starts on a new line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    /// Whitespace-collapsed text; `\n` marks hard breaks.
    pub text: String,
}

/// Result of scanning a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    /// Content of `<title>`, if any.
    pub title: Option<String>,
    pub blocks: Vec<Block>,
}

/// Scan `html` into blocks.
pub fn parse(html: &str) -> Markup {
    let mut scanner = Scanner::new(html);
    scanner.run();
    scanner.finish()
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    buf: String,
    kind: BlockKind,
    /// One entry per open list: `None` for `<ul>`, the last ordinal for `<ol>`.
    lists: Vec<Option<usize>>,
    in_head: bool,
    in_title: bool,
    title: String,
    blocks: Vec<Block>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            buf: String::new(),
            kind: BlockKind::Paragraph,
            lists: Vec::new(),
            in_head: false,
            in_title: false,
            title: String::new(),
            blocks: Vec::new(),
        }
    }

    fn run(&mut self) {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.skip_past("-->");
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_past(">");
            } else if self.starts_with("</") {
                self.pos += 2;
                let name = self.tag_name();
                self.skip_past(">");
                self.close_tag(&name);
            } else if self.starts_with("<") && self.next_is_tag_start() {
                self.pos += 1;
                let name = self.tag_name();
                self.skip_past(">");
                self.open_tag(&name);
                if name == "style" || name == "script" {
                    self.skip_raw_text(&name);
                }
            } else {
                self.text();
            }
        }
    }

    fn finish(mut self) -> Markup {
        self.flush();
        let title = collapse_whitespace(&self.title);
        Markup {
            title: (!title.is_empty()).then_some(title),
            blocks: self.blocks,
        }
    }

    fn open_tag(&mut self, name: &str) {
        match name {
            "head" => self.in_head = true,
            "title" => self.in_title = true,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.kind = BlockKind::Heading(name.as_bytes()[1] - b'0');
            }
            "ul" => {
                self.flush();
                self.lists.push(None);
            }
            "ol" => {
                self.flush();
                self.lists.push(Some(0));
            }
            "li" => {
                self.flush();
                let depth = self.lists.len().max(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        *n += 1;
                        format!("{n}.")
                    }
                    _ => "\u{2022}".to_string(),
                };
                self.kind = BlockKind::ListItem { marker, depth };
            }
            "br" => self.buf.push('\n'),
            "td" | "th" => push_collapsed(&mut self.buf, " "),
            name if is_block(name) => self.flush(),
            _ => {}
        }
    }

    fn close_tag(&mut self, name: &str) {
        match name {
            "head" => self.in_head = false,
            "title" => self.in_title = false,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
                self.flush();
                self.kind = BlockKind::Paragraph;
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
                self.kind = BlockKind::Paragraph;
            }
            "td" | "th" => push_collapsed(&mut self.buf, " "),
            name if is_block(name) => self.flush(),
            _ => {}
        }
    }

    fn text(&mut self) {
        let start = self.pos;
        // A stray '<' that does not open a tag is text.
        self.advance_char();
        while !self.eof() && !(self.starts_with("<") && self.next_is_tag_like()) {
            self.advance_char();
        }
        let raw = decode_entities(&self.input[start..self.pos]);
        if self.in_title {
            self.title.push_str(&raw);
        } else if !self.in_head {
            push_collapsed(&mut self.buf, &raw);
        }
    }

    /// Emit the buffered text as a block of the current kind.
    fn flush(&mut self) {
        let text = self
            .buf
            .split('\n')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim_matches('\n').to_string();
        self.buf.clear();
        if text.is_empty() {
            return;
        }
        self.blocks.push(Block {
            kind: self.kind.clone(),
            text,
        });
        // Continuation text inside the same item is not re-marked.
        if let BlockKind::ListItem { depth, .. } = self.kind {
            self.kind = BlockKind::ListItem {
                marker: String::new(),
                depth,
            };
        }
    }

    fn tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.input.as_bytes()[self.pos];
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    /// Skip to just after the next `needle`, honoring quoted attribute
    /// values when the needle is `>`.
    fn skip_past(&mut self, needle: &str) {
        if needle == ">" {
            let mut quote: Option<u8> = None;
            while !self.eof() {
                let c = self.input.as_bytes()[self.pos];
                self.pos += 1;
                match (quote, c) {
                    (Some(q), c) if c == q => quote = None,
                    (None, b'"') | (None, b'\'') => quote = Some(c),
                    (None, b'>') => return,
                    _ => {}
                }
            }
            return;
        }
        match self.input[self.pos..].find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn skip_raw_text(&mut self, name: &str) {
        let close = format!("</{name}");
        let rest = self.input[self.pos..].to_ascii_lowercase();
        match rest.find(&close) {
            Some(i) => self.pos += i,
            None => self.pos = self.input.len(),
        }
    }

    fn next_is_tag_start(&self) -> bool {
        self.input.as_bytes()
            .get(self.pos + 1)
            .is_some_and(u8::is_ascii_alphabetic)
    }

    fn next_is_tag_like(&self) -> bool {
        self.input.as_bytes()
            .get(self.pos + 1)
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, b'/' | b'!' | b'?'))
    }

    fn advance_char(&mut self) {
        self.pos += self.input[self.pos..].chars().next().map_or(1, char::len_utf8);
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "main"
            | "nav"
            | "aside"
            | "blockquote"
            | "pre"
            | "table"
            | "thead"
            | "tbody"
            | "tfoot"
            | "tr"
            | "hr"
            | "body"
            | "html"
    )
}

/// Append `text` to `buf`, collapsing whitespace runs to one space.
fn push_collapsed(buf: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{00A0}' {
            if !buf.is_empty() && !buf.ends_with(' ') && !buf.ends_with('\n') {
                buf.push(' ');
            }
        } else {
            buf.push(c);
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode named and numeric character references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "euro" => '\u{20AC}',
        "pound" => '\u{00A3}',
        "yen" => '\u{00A5}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "deg" => '\u{00B0}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        _ => return None,
    })
}
