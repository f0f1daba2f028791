//! Text mmCIF reader.

use std::iter::Peekable;

use super::{CifBlock, CifCategory, CifError, CifField, CifFile, FieldData};

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    DataBlock(&'a str),
    Loop,
    Name(&'a str),
    Value { text: &'a str, quoted: bool },
}

impl Token<'_> {
    /// Unquoted `.` and `?` are the CIF missing markers.
    fn into_value(self) -> Option<Option<String>> {
        match self {
            Token::Value { text, quoted } => {
                if !quoted && (text == "." || text == "?") {
                    Some(None)
                } else {
                    Some(Some(text.to_owned()))
                }
            }
            _ => None,
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.bytes()[self.pos - 1] == b'\n'
    }

    /// Skip whitespace and `#` comments.
    fn skip_blank(&mut self) {
        let bytes = self.bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// `;` text field; `self.pos` is on the opening semicolon.
    fn text_field(&mut self) -> Result<Token<'a>, CifError> {
        let start_line = self.line;
        let src = self.src;
        let bytes = self.bytes();
        let start = self.pos + 1;
        let mut i = start;
        loop {
            match bytes[i..].iter().position(|&b| b == b'\n') {
                Some(offset) => {
                    let newline = i + offset;
                    self.line += 1;
                    if bytes.get(newline + 1) == Some(&b';') {
                        let text = src[start..newline]
                            .trim_end_matches('\r')
                            .trim_start_matches(['\r', '\n']);
                        self.pos = newline + 2;
                        return Ok(Token::Value { text, quoted: true });
                    }
                    i = newline + 1;
                }
                None => {
                    return Err(CifError::syntax(
                        start_line,
                        "unterminated ';' text field",
                    ))
                }
            }
        }
    }

    /// Quoted value; a quote only closes when followed by whitespace.
    fn quoted(&mut self, quote: u8) -> Result<Token<'a>, CifError> {
        let src = self.src;
        let bytes = self.bytes();
        let start = self.pos + 1;
        let mut i = start;
        while i < bytes.len() {
            if bytes[i] == b'\n' {
                break;
            }
            if bytes[i] == quote
                && bytes.get(i + 1).map_or(true, u8::is_ascii_whitespace)
            {
                self.pos = i + 1;
                return Ok(Token::Value {
                    text: &src[start..i],
                    quoted: true,
                });
            }
            i += 1;
        }
        Err(CifError::syntax(self.line, "unterminated quoted value"))
    }

    fn bare(&mut self) -> Token<'a> {
        let src = self.src;
        let bytes = self.bytes();
        let start = self.pos;
        while self.pos < bytes.len() && !bytes[self.pos].is_ascii_whitespace()
        {
            self.pos += 1;
        }
        let word = &src[start..self.pos];
        if word.starts_with('_') {
            Token::Name(word)
        } else if word.eq_ignore_ascii_case("loop_") {
            Token::Loop
        } else if word
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data_"))
        {
            Token::DataBlock(&word[5..])
        } else {
            Token::Value {
                text: word,
                quoted: false,
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<(Token<'a>, usize), CifError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_blank();
        let &byte = self.bytes().get(self.pos)?;
        let line = self.line;
        let token = match byte {
            b';' if self.at_line_start() => self.text_field(),
            b'\'' | b'"' => self.quoted(byte),
            _ => Ok(self.bare()),
        };
        Some(token.map(|t| (t, line)))
    }
}

/// Split `_category.field` into its two halves.
fn split_name(name: &str, line: usize) -> Result<(&str, &str), CifError> {
    name.trim_start_matches('_')
        .split_once('.')
        .ok_or_else(|| {
            CifError::syntax(line, format!("data name '{name}' has no category"))
        })
}

/// Parse text mmCIF bytes.
pub fn parse_text(data: &[u8]) -> Result<CifFile, CifError> {
    let src =
        std::str::from_utf8(data).map_err(|e| CifError::Encoding(e.to_string()))?;
    let mut lexer = Lexer::new(src).peekable();
    let mut file = CifFile::default();

    while let Some(item) = lexer.next() {
        let (token, line) = item?;
        match token {
            Token::DataBlock(header) => file.blocks.push(CifBlock::new(header)),
            Token::Loop => {
                let block = current_block(&mut file, line)?;
                let category = parse_loop(&mut lexer, line)?;
                block.categories.push(category);
            }
            Token::Name(name) => {
                let block = current_block(&mut file, line)?;
                let (category, field) = split_name(name, line)?;
                let value = match lexer.next() {
                    Some(Ok((value, _))) => value.into_value(),
                    Some(Err(e)) => return Err(e),
                    None => None,
                }
                .ok_or_else(|| {
                    CifError::syntax(line, format!("no value for '{name}'"))
                })?;
                push_single(block, category, field, value);
            }
            Token::Value { text, .. } => {
                return Err(CifError::syntax(
                    line,
                    format!("value '{text}' outside of a data item"),
                ));
            }
        }
    }

    if file.blocks.is_empty() {
        return Err(CifError::NoDataBlock);
    }
    Ok(file)
}

fn current_block(
    file: &mut CifFile,
    line: usize,
) -> Result<&mut CifBlock, CifError> {
    file.blocks
        .last_mut()
        .ok_or_else(|| CifError::syntax(line, "data item before any data_ block"))
}

fn push_single(
    block: &mut CifBlock,
    category: &str,
    field: &str,
    value: Option<String>,
) {
    let field = CifField::text(field, vec![value]);
    if let Some(existing) = block.category_mut(category) {
        existing.fields.push(field);
    } else {
        block.categories.push(CifCategory {
            name: category.to_owned(),
            row_count: 1,
            fields: vec![field],
        });
    }
}

fn parse_loop<'a, I>(
    lexer: &mut Peekable<I>,
    loop_line: usize,
) -> Result<CifCategory, CifError>
where
    I: Iterator<Item = Result<(Token<'a>, usize), CifError>>,
{
    let mut category_name: Option<String> = None;
    let mut names: Vec<String> = Vec::new();
    while let Some(Ok((Token::Name(name), line))) = lexer.peek() {
        let (category, field) = split_name(name, *line)?;
        match &category_name {
            None => category_name = Some(category.to_owned()),
            Some(existing) if !existing.eq_ignore_ascii_case(category) => {
                return Err(CifError::syntax(
                    *line,
                    format!("loop mixes categories '{existing}' and '{category}'"),
                ));
            }
            Some(_) => {}
        }
        names.push(field.to_owned());
        let _ = lexer.next();
    }
    let name = category_name
        .ok_or_else(|| CifError::syntax(loop_line, "loop_ without data names"))?;

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    let mut count = 0usize;
    while let Some(Ok((Token::Value { .. }, _))) = lexer.peek() {
        if let Some(Ok((token, _))) = lexer.next() {
            if let Some(value) = token.into_value() {
                columns[count % names.len()].push(value);
                count += 1;
            }
        }
    }
    if let Some(Err(_)) = lexer.peek() {
        if let Some(Err(e)) = lexer.next() {
            return Err(e);
        }
    }
    if count % names.len() != 0 {
        return Err(CifError::syntax(
            loop_line,
            format!(
                "loop for '{name}' has {count} values for {} columns",
                names.len()
            ),
        ));
    }

    Ok(CifCategory {
        name,
        row_count: count / names.len(),
        fields: names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| CifField {
                name,
                data: FieldData::Text(values),
            })
            .collect(),
    })
}
