//! Tokenizer for the analyzed source language.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::error::ParseError;
use crate::source::{SourceFile, Span};

/// Kind and content of a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenType {
    /// Identifier or keyword. Verbatim identifiers (`@class`) lose their `@`.
    Identifier(String),
    /// Numeric literal, as written.
    Number(String),
    /// String literal content, without quotes.
    StringLiteral(String),
    /// Interpolated string content, without quotes, and the tokens of each
    /// `{...}` hole with any format specifier dropped.
    InterpolatedString(String, Vec<Vec<Token>>),
    /// Character literal content, without quotes.
    CharLiteral(String),
    /// Punctuation or operator.
    Symbol(String),
}

/// A single token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// Kind and content of the token.
    pub ty: TokenType,
    /// Location of the token.
    pub span: Span,
}

impl Token {
    /// Is this the punctuation `s`?
    pub fn is_symbol(&self, s: &str) -> bool {
        matches!(&self.ty, TokenType::Symbol(sym) if sym == s)
    }

    /// Is this the identifier or keyword `s`?
    pub fn is_word(&self, s: &str) -> bool {
        matches!(&self.ty, TokenType::Identifier(id) if id == s)
    }

    /// Identifier content, if this is an identifier or a keyword.
    pub fn word(&self) -> Option<&str> {
        match &self.ty {
            TokenType::Identifier(id) => Some(id),
            _ => None,
        }
    }

    /// Identifier content, if this is an identifier which is not a reserved keyword.
    pub fn name(&self) -> Option<&str> {
        self.word().filter(|w| !is_keyword(w))
    }
}

lazy_static! {
    /// Reserved words which can never name a declaration or a reference.
    static ref KEYWORDS: HashSet<&'static str> = [
        "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
        "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
        "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
        "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
        "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
        "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed",
        "short", "sizeof", "stackalloc", "static", "string", "struct", "switch", "this",
        "throw", "true", "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort",
        "using", "virtual", "void", "volatile", "while",
    ]
    .into_iter()
    .collect();

    /// Keywords naming built-in types.
    static ref BUILTIN_TYPES: HashSet<&'static str> = [
        "bool", "byte", "char", "decimal", "double", "float", "int", "long", "object", "sbyte",
        "short", "string", "uint", "ulong", "ushort", "void", "dynamic", "nint", "nuint",
    ]
    .into_iter()
    .collect();
}

/// Is `word` a reserved keyword?
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Is `word` a keyword naming a built-in type?
pub fn is_builtin_type(word: &str) -> bool {
    BUILTIN_TYPES.contains(word)
}

const OPERATORS: &[&str] = &[
    "??=", "=>", "?.", "??", "::", "==", "!=", "<=", "&&", "||", "++", "--", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "->",
];

const PUNCTUATION: &str = "{}()[];,.:+-*/%<>=!&|^~?";

/// A cursor over the characters of a file, keeping track of byte offsets.
struct Cursor<'a> {
    file: &'a SourceFile,
    rest: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(file: &'a SourceFile) -> Cursor<'a> {
        Cursor {
            file,
            rest: file.text(),
            pos: 0,
        }
    }

    /// A cursor over `span` of `file` only.
    fn slice(file: &'a SourceFile, span: Span) -> Cursor<'a> {
        Cursor {
            file,
            rest: file.text_of(span),
            pos: span.lo,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest.starts_with(s)
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn skip(&mut self, s: &str) {
        self.pos += s.len();
        self.rest = &self.rest[s.len()..];
    }

    /// Collect characters while `f` returns true. Returns the string and its span.
    fn collect_while(&mut self, mut f: impl FnMut(char, &Self) -> bool) -> (String, Span) {
        let lo = self.pos;
        let mut content = String::new();
        while let Some(c) = self.peek() {
            if !f(c, self) {
                break;
            }
            content.push(c);
            self.next();
        }
        (content, Span::new(lo, self.pos))
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.file, offset, message)
    }
}

/// Split `file` into tokens, skipping whitespace, comments and preprocessor lines.
/// Of each `#if` chain only the first branch is kept.
pub fn tokenize(file: &SourceFile) -> Result<Vec<Token>, ParseError> {
    read_tokens(Cursor::new(file))
}

fn read_tokens(mut iter: Cursor) -> Result<Vec<Token>, ParseError> {
    let mut res = Vec::new();
    while let Some(c) = iter.peek() {
        if c.is_whitespace() || c == '\u{feff}' {
            iter.next();
            continue;
        }
        if iter.starts_with("//") {
            flush_single_line(&mut iter);
            continue;
        }
        if c == '#' {
            read_directive(&mut iter);
            continue;
        }
        if iter.starts_with("/*") {
            flush_multi_line_comment(&mut iter)?;
            continue;
        }
        let token = match c {
            '"' => read_string(&mut iter)?,
            '$' | '@' if is_string_prefix(&iter) => read_string(&mut iter)?,
            '@' if iter.peek_nth(1).is_some_and(is_identifier_start) => {
                iter.next();
                let mut token = read_identifier(&mut iter);
                token.span.lo -= 1;
                token
            }
            '\'' => read_char(&mut iter)?,
            c if is_identifier_start(c) => read_identifier(&mut iter),
            '0'..='9' => read_number(&mut iter),
            '.' if iter.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => read_number(&mut iter),
            _ => read_other(&mut iter)?,
        };
        res.push(token);
    }
    Ok(res)
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_string_prefix(iter: &Cursor) -> bool {
    iter.starts_with("$\"")
        || iter.starts_with("@\"")
        || iter.starts_with("$@\"")
        || iter.starts_with("@$\"")
        || iter.starts_with("$$")
}

fn flush_single_line(iter: &mut Cursor) {
    iter.collect_while(|c, _| c != '\n');
}

fn read_directive(iter: &mut Cursor) {
    let (line, _) = iter.collect_while(|c, _| c != '\n');
    let directive = line.trim_start_matches('#').trim_start();
    if directive.starts_with("elif") || directive.starts_with("else") {
        skip_to_endif(iter);
    }
}

/// Skip lines up to and including the `#endif` closing the current chain.
fn skip_to_endif(iter: &mut Cursor) {
    let mut depth = 0usize;
    while iter.peek().is_some() {
        let (line, _) = iter.collect_while(|c, _| c != '\n');
        iter.next();
        let directive = match line.trim_start().strip_prefix('#') {
            Some(directive) => directive.trim_start(),
            None => continue,
        };
        if directive.starts_with("if") {
            depth += 1;
        } else if directive.starts_with("endif") {
            if depth == 0 {
                return;
            }
            depth -= 1;
        }
    }
}

fn flush_multi_line_comment(iter: &mut Cursor) -> Result<(), ParseError> {
    let start = iter.pos;
    iter.skip("/*");
    while !iter.starts_with("*/") {
        if iter.next().is_none() {
            return Err(iter.error(start, "unterminated comment"));
        }
    }
    iter.skip("*/");
    Ok(())
}

fn read_identifier(iter: &mut Cursor) -> Token {
    let (content, span) = iter.collect_while(|c, _| c.is_alphanumeric() || c == '_');
    Token {
        ty: TokenType::Identifier(content),
        span,
    }
}

fn read_number(iter: &mut Cursor) -> Token {
    let hex = iter.starts_with("0x") || iter.starts_with("0X");
    let mut prev = ' ';
    let (content, span) = iter.collect_while(|c, iter| {
        let take = match c {
            '0'..='9' | '_' => true,
            c if c.is_ascii_alphabetic() => true,
            '.' => iter.peek_nth(1).is_some_and(|c| c.is_ascii_digit()),
            '+' | '-' => !hex && matches!(prev, 'e' | 'E'),
            _ => false,
        };
        prev = c;
        take
    });
    Token {
        ty: TokenType::Number(content),
        span,
    }
}

fn read_char(iter: &mut Cursor) -> Result<Token, ParseError> {
    let lo = iter.pos;
    iter.next();
    let mut content = String::new();
    loop {
        match iter.next() {
            Some('\'') => break,
            Some('\\') => {
                content.push('\\');
                if let Some(c) = iter.next() {
                    content.push(c);
                }
            }
            Some('\n') | None => return Err(iter.error(lo, "unterminated character literal")),
            Some(c) => content.push(c),
        }
    }
    Ok(Token {
        ty: TokenType::CharLiteral(content),
        span: Span::new(lo, iter.pos),
    })
}

fn read_string(iter: &mut Cursor) -> Result<Token, ParseError> {
    let lo = iter.pos;
    let mut verbatim = false;
    let mut interpolated = false;
    while let Some(c @ ('$' | '@')) = iter.peek() {
        verbatim |= c == '@';
        interpolated |= c == '$';
        iter.next();
    }
    if iter.starts_with("\"\"\"") {
        let content = read_raw_string_content(iter, lo)?;
        return Ok(Token {
            ty: TokenType::StringLiteral(content),
            span: Span::new(lo, iter.pos),
        });
    }
    let (content, holes) = read_string_content(iter, lo, verbatim, interpolated)?;
    let ty = if interpolated {
        let file = iter.file;
        let holes = holes
            .into_iter()
            .map(|hole| read_tokens(Cursor::slice(file, hole_expression(file, hole))))
            .collect::<Result<Vec<_>, _>>()?;
        TokenType::InterpolatedString(content, holes)
    } else {
        TokenType::StringLiteral(content)
    };
    Ok(Token {
        ty,
        span: Span::new(lo, iter.pos),
    })
}

/// The expression part of an interpolation hole, without `,alignment` or
/// `:format`.
fn hole_expression(file: &SourceFile, hole: Span) -> Span {
    let text = file.text_of(hole);
    let mut depth = 0usize;
    // Delimiter of the nested literal being skipped, and whether it is verbatim.
    let mut quote: Option<(char, bool)> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some((_, false)), '\\') => {
                chars.next();
            }
            (Some((q, _)), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '@') if chars.peek().is_some_and(|(_, c)| *c == '"') => {
                chars.next();
                quote = Some(('"', true));
            }
            (None, '"' | '\'') => quote = Some((c, false)),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth = depth.saturating_sub(1),
            (None, ':') if chars.peek().is_some_and(|(_, c)| *c == ':') => {
                chars.next();
            }
            (None, ':' | ',') if depth == 0 => return Span::new(hole.lo, hole.lo + i),
            _ => {}
        }
    }
    hole
}

fn read_raw_string_content(iter: &mut Cursor, lo: usize) -> Result<String, ParseError> {
    let (quotes, _) = iter.collect_while(|c, _| c == '"');
    let mut content = String::new();
    loop {
        if iter.starts_with(&quotes) {
            iter.skip(&quotes);
            return Ok(content);
        }
        match iter.next() {
            Some(c) => content.push(c),
            None => return Err(iter.error(lo, "unterminated raw string literal")),
        }
    }
}

/// Content of a string after its prefix, and the spans of its interpolation holes.
fn read_string_content(
    iter: &mut Cursor,
    lo: usize,
    verbatim: bool,
    interpolated: bool,
) -> Result<(String, Vec<Span>), ParseError> {
    iter.next();
    let mut content = String::new();
    let mut holes = 0usize;
    let mut hole_start = 0;
    let mut spans = Vec::new();
    loop {
        let c = match iter.next() {
            Some(c) => c,
            None => return Err(iter.error(lo, "unterminated string literal")),
        };
        match c {
            '"' if holes > 0 => {
                // Nested literal inside an interpolation hole.
                content.push(c);
                loop {
                    match iter.next() {
                        Some('"') => break,
                        Some('\\') => {
                            iter.next();
                        }
                        Some('\n') | None => {
                            return Err(iter.error(lo, "unterminated string literal"))
                        }
                        Some(c) => content.push(c),
                    }
                }
                content.push('"');
                continue;
            }
            '"' if verbatim && iter.peek() == Some('"') => {
                iter.next();
                content.push('"');
                content.push('"');
                continue;
            }
            '"' => return Ok((content, spans)),
            '\\' if !verbatim => {
                content.push('\\');
                if let Some(c) = iter.next() {
                    content.push(c);
                }
                continue;
            }
            '\n' if !verbatim && holes == 0 => {
                return Err(iter.error(lo, "unterminated string literal"))
            }
            '{' if interpolated => {
                if holes == 0 && iter.peek() == Some('{') {
                    iter.next();
                    content.push('{');
                } else {
                    if holes == 0 {
                        hole_start = iter.pos;
                    }
                    holes += 1;
                }
            }
            '}' if interpolated && holes > 0 => {
                holes -= 1;
                if holes == 0 {
                    spans.push(Span::new(hole_start, iter.pos - 1));
                }
            }
            _ => {}
        }
        content.push(c);
    }
}

fn read_other(iter: &mut Cursor) -> Result<Token, ParseError> {
    let lo = iter.pos;
    if let Some(op) = OPERATORS.iter().find(|op| iter.starts_with(op)) {
        // `a?.5:b` is a conditional, not a null-conditional access.
        if *op != "?." || !iter.peek_nth(2).is_some_and(|c| c.is_ascii_digit()) {
            iter.skip(op);
            return Ok(Token {
                ty: TokenType::Symbol(op.to_string()),
                span: Span::new(lo, iter.pos),
            });
        }
    }
    match iter.next() {
        Some(c) if PUNCTUATION.contains(c) => Ok(Token {
            ty: TokenType::Symbol(c.to_string()),
            span: Span::new(lo, iter.pos),
        }),
        Some(c) => Err(iter.error(lo, format!("unexpected character '{}'", c))),
        None => Err(iter.error(lo, "unexpected end of file")),
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::*;

    fn t(ty: TokenType, lo: usize, hi: usize) -> Token {
        Token {
            ty,
            span: Span { lo, hi },
        }
    }

    fn id(s: &str) -> TokenType {
        TokenType::Identifier(s.to_string())
    }

    fn sym(s: &str) -> TokenType {
        TokenType::Symbol(s.to_string())
    }

    fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
        tokenize(&SourceFile::new("foo.cs", input))
    }

    fn test(input: &str, expected: Vec<Token>) {
        let tokens = lex(input).unwrap();
        assert_eq!(
            tokens.iter().map(|t| &t.ty).collect::<Vec<_>>(),
            expected.iter().map(|t| &t.ty).collect::<Vec<_>>()
        );
        assert_eq!(
            tokens.iter().map(|t| &t.span).collect::<Vec<_>>(),
            expected.iter().map(|t| &t.span).collect::<Vec<_>>()
        );
    }

    #[test]
    fn simple_tokens() {
        test(
            "foo 123 \"bar\"",
            vec![
                t(id("foo"), 0, 3),
                t(TokenType::Number("123".to_string()), 4, 7),
                t(TokenType::StringLiteral("bar".to_string()), 8, 13),
            ],
        );
    }

    #[test]
    fn comments() {
        test(
            "foo /* bar */ baz\ngux //baz\n#region x\nq",
            vec![
                t(id("foo"), 0, 3),
                t(id("baz"), 14, 17),
                t(id("gux"), 18, 21),
                t(id("q"), 38, 39),
            ],
        );
    }

    #[test]
    fn numbers() {
        test(
            "123 0x1F 1.5f 2e+5 1_000L",
            vec![
                t(TokenType::Number("123".to_string()), 0, 3),
                t(TokenType::Number("0x1F".to_string()), 4, 8),
                t(TokenType::Number("1.5f".to_string()), 9, 13),
                t(TokenType::Number("2e+5".to_string()), 14, 18),
                t(TokenType::Number("1_000L".to_string()), 19, 25),
            ],
        );
    }

    #[test]
    fn member_access_is_not_a_number() {
        test(
            "a.b 1.ToString()",
            vec![
                t(id("a"), 0, 1),
                t(sym("."), 1, 2),
                t(id("b"), 2, 3),
                t(TokenType::Number("1".to_string()), 4, 5),
                t(sym("."), 5, 6),
                t(id("ToString"), 6, 14),
                t(sym("("), 14, 15),
                t(sym(")"), 15, 16),
            ],
        );
    }

    #[test]
    fn operators() {
        test(
            "x => a?.b ?? c",
            vec![
                t(id("x"), 0, 1),
                t(sym("=>"), 2, 4),
                t(id("a"), 5, 6),
                t(sym("?."), 6, 8),
                t(id("b"), 8, 9),
                t(sym("??"), 10, 12),
                t(id("c"), 13, 14),
            ],
        );
        test(
            "List<List<int>>",
            vec![
                t(id("List"), 0, 4),
                t(sym("<"), 4, 5),
                t(id("List"), 5, 9),
                t(sym("<"), 9, 10),
                t(id("int"), 10, 13),
                t(sym(">"), 13, 14),
                t(sym(">"), 14, 15),
            ],
        );
    }

    #[test]
    fn strings() {
        test(
            r#""foo" "bar\"" 'b' '\''"#,
            vec![
                t(TokenType::StringLiteral("foo".to_string()), 0, 5),
                t(TokenType::StringLiteral("bar\\\"".to_string()), 6, 13),
                t(TokenType::CharLiteral("b".to_string()), 14, 17),
                t(TokenType::CharLiteral("\\'".to_string()), 18, 22),
            ],
        );
    }

    #[test]
    fn special_strings() {
        test(
            r#"@"a""b" $"{x} {"y"}" """q"q""""#,
            vec![
                t(TokenType::StringLiteral("a\"\"b".to_string()), 0, 7),
                t(
                    TokenType::InterpolatedString(
                        "{x} {\"y\"}".to_string(),
                        vec![
                            vec![t(id("x"), 11, 12)],
                            vec![t(TokenType::StringLiteral("y".to_string()), 15, 18)],
                        ],
                    ),
                    8,
                    20,
                ),
                t(TokenType::StringLiteral("q\"q".to_string()), 21, 30),
            ],
        );
    }

    #[test]
    fn interpolation_holes() {
        let tokens = lex(r#"$"{{ {Bar.Baz:N2} {a,-5} {(c ? d : e)} }}""#).unwrap();
        let holes = match &tokens[0].ty {
            TokenType::InterpolatedString(_, holes) => holes,
            other => panic!("not interpolated: {:?}", other),
        };
        let types = |hole: &Vec<Token>| hole.iter().map(|t| t.ty.clone()).collect::<Vec<_>>();
        assert_eq!(holes.len(), 3);
        assert_eq!(types(&holes[0]), vec![id("Bar"), sym("."), id("Baz")]);
        assert_eq!(holes[0][0].span, Span::new(6, 9));
        assert_eq!(types(&holes[1]), vec![id("a")]);
        assert_eq!(holes[2].len(), 7);
    }

    #[test]
    fn preprocessor_branches() {
        test(
            "#if DEBUG\nvoid M() {\n#elif TRACE\nvoid N() {\n#else\nvoid O() {\n#endif\n}",
            vec![
                t(id("void"), 10, 14),
                t(id("M"), 15, 16),
                t(sym("("), 16, 17),
                t(sym(")"), 17, 18),
                t(sym("{"), 19, 20),
                t(sym("}"), 68, 69),
            ],
        );
    }

    #[test]
    fn nested_preprocessor_branches() {
        test(
            "#if A\n#if B\nx\n#else\ny\n#endif\n#else\n#if C\nz\n#endif\n#endif\nw",
            vec![t(id("x"), 12, 13), t(id("w"), 57, 58)],
        );
    }

    #[test]
    fn byte_order_mark() {
        test("a\u{feff}b", vec![t(id("a"), 0, 1), t(id("b"), 4, 5)]);
        let tokens = tokenize(&SourceFile::new("foo.cs", "\u{feff}class Foo")).unwrap();
        assert_eq!(tokens[0], t(id("class"), 0, 5));
    }

    #[test]
    fn verbatim_identifiers() {
        test("@class", vec![t(id("class"), 0, 6)]);
    }

    #[test]
    fn unterminated() {
        let err = lex("foo\n  \"bar").unwrap_err();
        assert_eq!((err.line, err.column), (1, 2));
        assert_eq!(err.message, "unterminated string literal");

        let err = lex("/* foo").unwrap_err();
        assert_eq!(err.message, "unterminated comment");
    }

    #[test]
    fn unexpected_character() {
        let err = lex("int `x").unwrap_err();
        assert_eq!((err.line, err.column), (0, 4));
        assert_eq!(err.message, "unexpected character '`'");
    }

    #[test]
    fn keywords() {
        assert!(is_keyword("class"));
        assert!(!is_keyword("var"));
        assert!(is_builtin_type("int"));
        assert!(!is_builtin_type("Foo"));
    }
}
