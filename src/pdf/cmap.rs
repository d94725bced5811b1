//! ToUnicode CMap parsing
//!
//! Only the parts needed for text extraction are understood:
//! `codespacerange` (to learn the code width), `bfchar` and `bfrange`.

use std::collections::HashMap;

/// Largest bfrange expanded into the lookup table
const MAX_RANGE_SPAN: u32 = 0xFFFF;

/// Character code → Unicode text
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
    code_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(word) if word == "begincodespacerange" => {
                    i += 1;
                    while i < tokens.len() && tokens[i] != Token::Word("endcodespacerange".into()) {
                        if let Token::Hex(bytes) = &tokens[i] {
                            cmap.code_bytes.get_or_insert(bytes.len());
                        }
                        i += 1;
                    }
                }
                Token::Word(word) if word == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.map.insert(code_of(src), utf16_text(dst));
                        i += 2;
                    }
                }
                Token::Word(word) if word == "beginbfrange" => {
                    i += 1;
                    loop {
                        match (tokens.get(i), tokens.get(i + 1), tokens.get(i + 2)) {
                            (Some(Token::Hex(lo)), Some(Token::Hex(hi)), Some(Token::Hex(dst))) => {
                                cmap.insert_range(code_of(lo), code_of(hi), dst);
                                i += 3;
                            }
                            (Some(Token::Hex(lo)), Some(Token::Hex(_)), Some(Token::ArrayStart)) => {
                                let mut code = code_of(lo);
                                i += 3;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    cmap.map.insert(code, utf16_text(dst));
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::ArrayEnd) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }

        cmap
    }

    fn insert_range(&mut self, lo: u32, hi: u32, dst: &[u8]) {
        if hi < lo {
            return;
        }
        let mut units = utf16_units(dst);
        if units.is_empty() {
            return;
        }
        let last = units.len() - 1;
        let base = units[last];
        for offset in 0..=(hi - lo).min(MAX_RANGE_SPAN) {
            units[last] = base.wrapping_add(offset as u16);
            self.map
                .insert(lo + offset, String::from_utf16_lossy(&units));
        }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// Code width declared by the first codespace range
    pub fn code_bytes(&self) -> Option<usize> {
        self.code_bytes
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![bytes[0] as u16];
    }
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => ((*hi as u16) << 8) | *lo as u16,
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        match b {
            b if b.is_ascii_whitespace() || b == 0 => i += 1,
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Word("<<".into()));
                i += 2;
            }
            b'>' if data.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::Word(">>".into()));
                i += 2;
            }
            b'<' => {
                i += 1;
                let mut digits = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if data[i].is_ascii_hexdigit() {
                        digits.push(data[i]);
                    }
                    i += 1;
                }
                i += 1;
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        std::str::from_utf8(pair)
                            .ok()
                            .and_then(|s| u8::from_str_radix(s, 16).ok())
                    })
                    .collect();
                tokens.push(Token::Hex(bytes));
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings never carry mapping data we use; skip them.
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            b'>' | b')' | b'{' | b'}' => i += 1,
            _ => {
                let start = i;
                i += 1;
                while i < data.len() && !data[i].is_ascii_whitespace() && !is_delimiter(data[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }

    tokens
}
