//! Lexer: turns filter text into a lazy stream of located tokens.
//!
//! Address-shaped and byte-chain literals are recognized by shape only;
//! whether `aa:bb:cc:dd:ee:ff` is an Ethernet address or a byte string is
//! decided during semantic analysis against the field it meets. An
//! unrecognized character produces an [`TokenKind::Error`] token carrying
//! the offending location; the parser turns it into a diagnostic.

use crate::loc::Location;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or dotted field name; word operators (`and`, `or`,
    /// `not`, `in`, `contains`, `matches`) arrive as identifiers and are
    /// classified by the parser.
    Ident(String),
    Int(u64),
    Float(f64),
    /// Quoted string with escapes decoded.
    Str(String),
    /// Colon- or dash-separated hex pairs (`aa:bb:cc`).
    ByteChain(Vec<u8>),
    /// Address-shaped literal kept raw: dotted quad or IPv6 text, with an
    /// optional `/prefix` suffix.
    Addr(String),
    /// Slash-delimited regular expression literal, delimiters stripped.
    Regex(String),
    /// Occurrence pin `#N` (negative counts from the last occurrence).
    Occurrence(i32),

    EqEq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    AndAnd,
    OrOr,
    Bang,
    Amp,
    Plus,
    Minus,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    DotDot,

    Eof,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text as written, for diagnostics and disassembly.
    pub text: String,
    pub loc: Location,
}

impl Token {
    fn new(kind: TokenKind, text: &str, start: usize) -> Self {
        Token {
            loc: Location::new(start, text.len()),
            text: text.to_string(),
            kind,
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

/// Lazy tokenizer over one filter string. Yields an explicit `Eof` token
/// and then stops.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Inside `[...]` the colon and dash are slice punctuation, so byte
    /// chains and address shapes are not recognized there.
    bracket_depth: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            bracket_depth: 0,
            done: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => self.pos += 1,
                // '#' followed by a digit is an occurrence pin, handled by
                // the token scanner; any other '#' opens a line comment
                Some(b'#')
                    if !matches!(self.peek_at(1), Some(d) if d.is_ascii_digit() || d == b'-') =>
                {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => self.pos += 1,
                            None => {
                                return Some(Token::new(
                                    TokenKind::Error("unterminated comment".into()),
                                    &self.input[start..],
                                    start,
                                ));
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn scan_token(&mut self) -> Token {
        if let Some(err) = self.skip_trivia() {
            return err;
        }
        let start = self.pos;
        let c = match self.peek() {
            None => return Token::new(TokenKind::Eof, "", start),
            Some(c) => c,
        };

        // multi-byte operators first
        for (text, kind) in [
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::Neq),
            (">=", TokenKind::Ge),
            ("<=", TokenKind::Le),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
            ("..", TokenKind::DotDot),
        ] {
            if self.rest().starts_with(text) {
                self.pos += text.len();
                return Token::new(kind, text, start);
            }
        }

        match c {
            b'"' => self.scan_string(start),
            b'/' => self.scan_regex(start),
            b'#' => self.scan_occurrence(start),
            b'>' => self.punct(TokenKind::Gt, start),
            b'<' => self.punct(TokenKind::Lt, start),
            b'!' => self.punct(TokenKind::Bang, start),
            b'&' => self.punct(TokenKind::Amp, start),
            b'+' => self.punct(TokenKind::Plus, start),
            b'-' => self.punct(TokenKind::Minus, start),
            b'(' => self.punct(TokenKind::LParen, start),
            b')' => self.punct(TokenKind::RParen, start),
            b'{' => self.punct(TokenKind::LBrace, start),
            b'}' => self.punct(TokenKind::RBrace, start),
            b'[' => {
                self.bracket_depth += 1;
                self.punct(TokenKind::LBracket, start)
            }
            b']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                self.punct(TokenKind::RBracket, start)
            }
            b',' => self.punct(TokenKind::Comma, start),
            b':' => self.punct(TokenKind::Colon, start),
            _ if c.is_ascii_digit() || c.is_ascii_alphabetic() || c == b'_' => {
                self.scan_wordish(start)
            }
            _ => {
                self.pos += 1;
                Token::new(
                    TokenKind::Error(format!("unrecognized character '{}'", c as char)),
                    &self.input[start..self.pos],
                    start,
                )
            }
        }
    }

    fn punct(&mut self, kind: TokenKind, start: usize) -> Token {
        self.pos += 1;
        Token::new(kind, &self.input[start..self.pos], start)
    }

    /// Identifiers, numbers, byte chains, and address-shaped literals all
    /// start with an alphanumeric character; shape matchers pick the
    /// longest interpretation.
    fn scan_wordish(&mut self, start: usize) -> Token {
        let rest = self.rest();

        if self.bracket_depth > 0 {
            if rest.as_bytes()[0].is_ascii_digit() {
                return self.scan_number(start);
            }
            return self.scan_ident(start);
        }
        if let Some(len) = match_ipv4(rest) {
            self.pos += len;
            return Token::new(
                TokenKind::Addr(rest[..len].to_string()),
                &rest[..len],
                start,
            );
        }
        if let Some(len) = match_ipv6(rest) {
            self.pos += len;
            return Token::new(
                TokenKind::Addr(rest[..len].to_string()),
                &rest[..len],
                start,
            );
        }
        if let Some((len, bytes)) = match_byte_chain(rest) {
            self.pos += len;
            return Token::new(TokenKind::ByteChain(bytes), &rest[..len], start);
        }
        if rest.as_bytes()[0].is_ascii_digit() {
            return self.scan_number(start);
        }
        self.scan_ident(start)
    }

    fn scan_ident(&mut self, start: usize) -> Token {
        let bytes = self.bytes;
        let mut end = self.pos;
        while end < bytes.len() {
            let c = bytes[end];
            if c.is_ascii_alphanumeric() || c == b'_' {
                end += 1;
            } else if c == b'.'
                && end + 1 < bytes.len()
                && (bytes[end + 1].is_ascii_alphanumeric() || bytes[end + 1] == b'_')
            {
                end += 1;
            } else {
                break;
            }
        }
        let text = &self.input[self.pos..end];
        self.pos = end;
        Token::new(TokenKind::Ident(text.to_string()), text, start)
    }

    fn scan_number(&mut self, start: usize) -> Token {
        let rest = self.rest();
        let bytes = rest.as_bytes();

        let (digits, radix) = if rest.starts_with("0x") || rest.starts_with("0X") {
            let mut end = 2;
            while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
                end += 1;
            }
            (end, 16)
        } else {
            let mut end = 0;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            // fractional part makes it a float; a second dot (range) does not
            if end < bytes.len()
                && bytes[end] == b'.'
                && bytes.get(end + 1).is_some_and(|d| d.is_ascii_digit())
            {
                let mut fend = end + 1;
                while fend < bytes.len() && bytes[fend].is_ascii_digit() {
                    fend += 1;
                }
                let text = &rest[..fend];
                self.pos += fend;
                return match text.parse::<f64>() {
                    Ok(v) => Token::new(TokenKind::Float(v), text, start),
                    Err(_) => Token::new(
                        TokenKind::Error("malformed float literal".into()),
                        text,
                        start,
                    ),
                };
            }
            let radix = if end > 1 && bytes[0] == b'0' { 8 } else { 10 };
            (end, radix)
        };

        // a trailing identifier character makes the whole run malformed
        let mut end = digits;
        let malformed = bytes
            .get(end)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_');
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        let text = &rest[..end];
        self.pos += end;
        if malformed || digits == 0 {
            return Token::new(
                TokenKind::Error("malformed number literal".into()),
                text,
                start,
            );
        }
        let parse_from = if radix == 16 { &text[2..] } else { text };
        match u64::from_str_radix(parse_from, radix) {
            Ok(v) => Token::new(TokenKind::Int(v), text, start),
            Err(_) => Token::new(
                TokenKind::Error("integer literal out of range".into()),
                text,
                start,
            ),
        }
    }

    fn scan_string(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let text = &self.input[start..self.pos];
                    return Token::new(
                        TokenKind::Error("unterminated string literal".into()),
                        text,
                        start,
                    );
                }
                Some(b'"') => {
                    self.pos += 1;
                    let text = &self.input[start..self.pos];
                    return Token::new(TokenKind::Str(out), text, start);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let esc = self.peek();
                    if esc.is_some() {
                        self.pos += 1;
                    }
                    match esc {
                        Some(b'n') => out.push('\n'),
                        Some(b't') => out.push('\t'),
                        Some(b'r') => out.push('\r'),
                        Some(b'0') => out.push('\0'),
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        Some(b'x') => {
                            let hi = self.peek().and_then(hex_val);
                            let lo = self.peek_at(1).and_then(hex_val);
                            match (hi, lo) {
                                (Some(h), Some(l)) => {
                                    out.push((h * 16 + l) as char);
                                    self.pos += 2;
                                }
                                _ => {
                                    let text = &self.input[start..self.pos];
                                    return Token::new(
                                        TokenKind::Error("invalid \\x escape".into()),
                                        text,
                                        start,
                                    );
                                }
                            }
                        }
                        _ => {
                            let text = &self.input[start..self.pos];
                            return Token::new(
                                TokenKind::Error("unknown escape sequence".into()),
                                text,
                                start,
                            );
                        }
                    }
                }
                Some(_) => {
                    // copy the whole UTF-8 scalar, not just one byte
                    let ch = self.rest().chars().next().unwrap();
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn scan_regex(&mut self, start: usize) -> Token {
        self.pos += 1; // opening slash
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let text = &self.input[start..self.pos];
                    return Token::new(
                        TokenKind::Error("unterminated regular expression".into()),
                        text,
                        start,
                    );
                }
                Some(b'/') => {
                    self.pos += 1;
                    let text = &self.input[start..self.pos];
                    return Token::new(TokenKind::Regex(out), text, start);
                }
                // backslash escapes pass through to the regex engine;
                // only the delimiter escape is consumed here
                Some(b'\\') => match self.peek_at(1) {
                    Some(b'/') => {
                        out.push('/');
                        self.pos += 2;
                    }
                    Some(_) => {
                        out.push('\\');
                        self.pos += 1;
                        let ch = self.rest().chars().next().unwrap();
                        out.push(ch);
                        self.pos += ch.len_utf8();
                    }
                    None => {
                        let text = &self.input[start..self.pos];
                        return Token::new(
                            TokenKind::Error("unterminated regular expression".into()),
                            text,
                            start,
                        );
                    }
                },
                Some(_) => {
                    let ch = self.rest().chars().next().unwrap();
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn scan_occurrence(&mut self, start: usize) -> Token {
        self.pos += 1; // '#'
        let neg = self.peek() == Some(b'-');
        if neg {
            self.pos += 1;
        }
        let digit_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        if digit_start == self.pos {
            return Token::new(
                TokenKind::Error("expected occurrence index after '#'".into()),
                text,
                start,
            );
        }
        match self.input[digit_start..self.pos].parse::<i32>() {
            Ok(n) => Token::new(TokenKind::Occurrence(if neg { -n } else { n }), text, start),
            Err(_) => Token::new(
                TokenKind::Error("occurrence index out of range".into()),
                text,
                start,
            ),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let tok = self.scan_token();
        if tok.is_eof() {
            self.done = true;
        }
        Some(tok)
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Dotted-quad shape with an optional `/prefix`: `d{1,3}(.d{1,3}){3}(/d+)?`.
/// Octet ranges are checked later; only the shape is decided here.
fn match_ipv4(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    let mut pos = 0;
    for group in 0..4 {
        if group > 0 {
            if b.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        }
        let start = pos;
        while pos < b.len() && b[pos].is_ascii_digit() && pos - start < 3 {
            pos += 1;
        }
        if pos == start {
            return None;
        }
    }
    if b.get(pos) == Some(&b'/') {
        let start = pos + 1;
        let mut end = start;
        while end < b.len() && b[end].is_ascii_digit() {
            end += 1;
        }
        if end > start {
            pos = end;
        }
    }
    // reject when the quad runs into more identifier text (e.g. 1.2.3.4x)
    if b.get(pos).is_some_and(|c| is_word_byte(*c) || *c == b'.') {
        return None;
    }
    Some(pos)
}

/// IPv6-ish shape: hex groups joined by colons, `::` allowed, optional
/// `/prefix`. Chains where every group is exactly two hex digits are left
/// for [`match_byte_chain`].
fn match_ipv6(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    let mut pos = 0;
    let mut groups = 0usize;
    let mut colons = 0usize;
    let mut has_double = false;
    let mut all_pairs = true;
    loop {
        let start = pos;
        while pos < b.len() && b[pos].is_ascii_hexdigit() && pos - start < 4 {
            pos += 1;
        }
        if pos > start {
            groups += 1;
            if pos - start != 2 {
                all_pairs = false;
            }
        }
        if b.get(pos) == Some(&b':') {
            colons += 1;
            pos += 1;
            if b.get(pos) == Some(&b':') {
                has_double = true;
                pos += 1;
            }
        } else {
            break;
        }
    }
    if colons == 0 {
        return None;
    }
    let mut end = pos;
    if b.get(end) == Some(&b'/') {
        let pstart = end + 1;
        let mut pend = pstart;
        while pend < b.len() && b[pend].is_ascii_digit() {
            pend += 1;
        }
        if pend > pstart {
            end = pend;
        }
    }
    if b.get(end).is_some_and(|c| is_word_byte(*c)) {
        return None;
    }
    // an all-pairs chain without '::' reads as a byte sequence instead
    if !has_double && all_pairs {
        return None;
    }
    if !has_double && groups < 3 {
        return None;
    }
    Some(end)
}

/// Two or more hex pairs joined by ':' or '-'.
fn match_byte_chain(s: &str) -> Option<(usize, Vec<u8>)> {
    let b = s.as_bytes();
    let mut bytes = Vec::new();
    let mut pos = 0;
    loop {
        let (hi, lo) = (
            b.get(pos).copied().and_then(hex_val)?,
            b.get(pos + 1).copied().and_then(hex_val)?,
        );
        // exactly two hex digits per group
        if b.get(pos + 2).is_some_and(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        bytes.push(hi * 16 + lo);
        pos += 2;
        match b.get(pos) {
            Some(b':') | Some(b'-')
                if b.get(pos + 1).is_some_and(|c| c.is_ascii_hexdigit())
                    && b.get(pos + 2).is_some_and(|c| c.is_ascii_hexdigit()) =>
            {
                pos += 1;
            }
            _ => break,
        }
    }
    if bytes.len() < 2 {
        return None;
    }
    if b.get(pos).is_some_and(|c| is_word_byte(*c)) {
        return None;
    }
    Some((pos, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).collect()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_dotted_field_and_comparison() {
        let toks = kinds("tcp.port == 80");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("tcp.port".into()),
                TokenKind::EqEq,
                TokenKind::Int(80),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_token_locations_are_byte_offsets() {
        let toks = lex("a == 10");
        assert_eq!(toks[0].loc, Location::new(0, 1));
        assert_eq!(toks[1].loc, Location::new(2, 2));
        assert_eq!(toks[2].loc, Location::new(5, 2));
    }

    #[test]
    fn test_number_radixes() {
        assert_eq!(
            kinds("10 0x1f 017"),
            vec![
                TokenKind::Int(10),
                TokenKind::Int(0x1f),
                TokenKind::Int(0o17),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_float_vs_range() {
        assert_eq!(
            kinds("1.5 80..90"),
            vec![
                TokenKind::Float(1.5),
                TokenKind::Int(80),
                TokenKind::DotDot,
                TokenKind::Int(90),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let toks = lex(r#""a\"b\n\x41""#);
        assert_eq!(toks[0].kind, TokenKind::Str("a\"b\nA".into()));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let toks = lex("\"abc");
        assert!(matches!(toks[0].kind, TokenKind::Error(_)));
        assert_eq!(toks[0].loc.start, 0);
    }

    #[test]
    fn test_byte_chain_colon_and_dash() {
        assert_eq!(
            kinds("aa:bb:cc"),
            vec![TokenKind::ByteChain(vec![0xaa, 0xbb, 0xcc]), TokenKind::Eof]
        );
        assert_eq!(
            kinds("de-ad-be-ef"),
            vec![
                TokenKind::ByteChain(vec![0xde, 0xad, 0xbe, 0xef]),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_ether_shaped_chain_is_bytes_at_lex_time() {
        assert_eq!(
            kinds("00:11:22:33:44:55"),
            vec![
                TokenKind::ByteChain(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_ipv4_with_prefix() {
        assert_eq!(
            kinds("10.0.0.0/8"),
            vec![TokenKind::Addr("10.0.0.0/8".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("192.168.1.1"),
            vec![TokenKind::Addr("192.168.1.1".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_ipv6_shapes() {
        assert_eq!(
            kinds("2001:db8::1"),
            vec![TokenKind::Addr("2001:db8::1".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("fe80::1/64"),
            vec![TokenKind::Addr("fe80::1/64".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(
            kinds("/GET|POST/"),
            vec![TokenKind::Regex("GET|POST".into()), TokenKind::Eof]
        );
        // empty pattern
        assert_eq!(
            kinds("//"),
            vec![TokenKind::Regex(String::new()), TokenKind::Eof]
        );
        // escaped delimiter
        assert_eq!(
            kinds(r"/a\/b/"),
            vec![TokenKind::Regex("a/b".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("80 # trailing comment"),
            vec![TokenKind::Int(80), TokenKind::Eof]
        );
        assert_eq!(
            kinds("80 /* block */ 90"),
            vec![TokenKind::Int(80), TokenKind::Int(90), TokenKind::Eof]
        );
    }

    #[test]
    fn test_occurrence_pin() {
        assert_eq!(
            kinds("ip.addr#2"),
            vec![
                TokenKind::Ident("ip.addr".into()),
                TokenKind::Occurrence(2),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("x#-1"),
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Occurrence(-1),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_slice_punctuation() {
        assert_eq!(
            kinds("f[0:4]"),
            vec![
                TokenKind::Ident("f".into()),
                TokenKind::LBracket,
                TokenKind::Int(0),
                TokenKind::Colon,
                TokenKind::Int(4),
                TokenKind::RBracket,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_two_digit_slice_bounds_are_not_a_byte_chain() {
        assert_eq!(
            kinds("f[80:90]"),
            vec![
                TokenKind::Ident("f".into()),
                TokenKind::LBracket,
                TokenKind::Int(80),
                TokenKind::Colon,
                TokenKind::Int(90),
                TokenKind::RBracket,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unrecognized_char_location() {
        let input = "tcp.port $ 80";
        let toks = lex(input);
        let err = toks
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
            .unwrap();
        assert_eq!(err.loc.start as usize, input.find('$').unwrap());
        assert_eq!(err.loc.len, 1);
    }

    #[test]
    fn test_word_operators_arrive_as_idents() {
        assert_eq!(
            kinds("a and b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("and".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_malformed_number() {
        let toks = lex("80abc");
        assert!(matches!(toks[0].kind, TokenKind::Error(_)));
    }
}
