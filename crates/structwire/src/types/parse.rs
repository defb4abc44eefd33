// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C-like declaration parser.
//!
//! Registers structure types described in header text:
//!
//! ```text
//! #define NAME_LEN 32
//!
//! typedef struct Point {
//!     double x;               // metres
//!     double y;
//! } Point;
//!
//! struct Path {
//!     char name[NAME_LEN];
//!     int count;
//!     Point *pts;
//! };
//! ```
//!
//! Supported: `#define` integer constants as dimensions, `typedef struct`,
//! plain `struct` definitions, atomic typedef aliases, `typedef enum` (an
//! alias of `int`), multi-dimensional arrays, single pointers, every string
//! form, and trailing `//` or `/* */` comments as field descriptions. Types
//! are registered in declaration order, so inline members must be declared
//! before use.

use super::atomic::AtomicType;
use super::descriptor::{FieldDecl, TypeClass, STRING_ARRAY_TYPE, STRING_TYPE};
use super::registry::{TypeId, TypeRegistry};
use crate::error::{MarshalError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Alias chains longer than this are treated as cycles.
const MAX_ALIAS_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Number(usize),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

/// Lexed input: tokens, trailing comments per line, raw `#define`s.
#[derive(Debug, Default)]
struct Lexed {
    tokens: Vec<Token>,
    comments: HashMap<usize, String>,
    defines: Vec<(String, String, usize)>,
}

fn invalid(line: usize, reason: impl Into<String>) -> MarshalError {
    MarshalError::InvalidDeclaration {
        line,
        reason: reason.into(),
    }
}

fn lex(text: &str) -> Result<Lexed> {
    let mut out = Lexed::default();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let mut line_start = true;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            line_start = true;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' && line_start {
            let end = chars[i..].iter().position(|&ch| ch == '\n').map_or(chars.len(), |p| i + p);
            let directive: String = chars[i + 1..end].iter().collect();
            let mut words = directive.split_whitespace();
            if words.next() == Some("define") {
                if let (Some(name), Some(value)) = (words.next(), words.next()) {
                    out.defines.push((name.to_string(), value.to_string(), line));
                }
            }
            i = end;
            continue;
        }
        line_start = false;

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            let end = chars[i..].iter().position(|&ch| ch == '\n').map_or(chars.len(), |p| i + p);
            let comment: String = chars[i + 2..end].iter().collect();
            out.comments.insert(line, comment.trim().to_string());
            i = end;
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            let mut j = i + 2;
            while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                if chars[j] == '\n' {
                    line += 1;
                }
                j += 1;
            }
            if j + 1 >= chars.len() {
                return Err(invalid(start_line, "unterminated comment"));
            }
            let comment: String = chars[i + 2..j].iter().collect();
            out.comments.insert(start_line, comment.trim().to_string());
            i = j + 2;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.tokens.push(Token {
                tok: Tok::Ident(chars[start..i].iter().collect()),
                line,
            });
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            let value = parse_number(&literal)
                .ok_or_else(|| invalid(line, format!("bad number `{}`", literal)))?;
            out.tokens.push(Token {
                tok: Tok::Number(value),
                line,
            });
            continue;
        }
        out.tokens.push(Token {
            tok: Tok::Punct(c),
            line,
        });
        i += 1;
    }
    Ok(out)
}

fn parse_number(literal: &str) -> Option<usize> {
    let trimmed = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenCursor<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line)
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Punct(p), .. }) if *p == c)
    }

    fn is_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Ident(w), .. }) if w == word)
    }

    fn expect_punct(&mut self, c: char) -> Result<usize> {
        match self.next() {
            Some(Token { tok: Tok::Punct(p), line }) if *p == c => Ok(*line),
            Some(t) => Err(invalid(t.line, format!("expected `{}`, found {:?}", c, t.tok))),
            None => Err(invalid(self.line(), format!("expected `{}` at end of input", c))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token { tok: Tok::Ident(w), .. }) => Ok(w.clone()),
            Some(t) => Err(invalid(t.line, format!("expected identifier, found {:?}", t.tok))),
            None => Err(invalid(self.line(), "expected identifier at end of input")),
        }
    }

    fn optional_ident(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token { tok: Tok::Ident(w), .. }) => {
                self.pos += 1;
                Some(w.clone())
            }
            _ => None,
        }
    }
}

/// Parser state carried across files: constants and aliases.
#[derive(Debug, Default, Clone)]
pub struct DeclarationParser {
    defines: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    source: String,
}

impl DeclarationParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source path recorded on every registered descriptor.
    pub fn source(mut self, path: impl Into<String>) -> Self {
        self.source = path.into();
        self
    }

    /// Predefine an integer constant.
    pub fn define(mut self, name: impl Into<String>, value: usize) -> Self {
        self.defines.insert(name.into(), value);
        self
    }

    pub fn constant(&self, name: &str) -> Option<usize> {
        self.defines.get(name).copied()
    }

    /// Parse `text` and register every structure it defines.
    pub fn parse(&mut self, text: &str, registry: &mut TypeRegistry) -> Result<Vec<TypeId>> {
        let lexed = lex(text)?;
        for (name, value, line) in &lexed.defines {
            let resolved = parse_number(value)
                .or_else(|| self.defines.get(value.as_str()).copied());
            match resolved {
                Some(v) => {
                    self.defines.insert(name.clone(), v);
                }
                None => log::debug!("[parse] line {}: ignoring non-integer define {}", line, name),
            }
        }

        let lines: Vec<&str> = text.lines().collect();
        let mut cur = TokenCursor {
            tokens: &lexed.tokens,
            pos: 0,
        };
        let mut registered = Vec::new();

        while let Some(token) = cur.peek() {
            let start = token.line;
            match &token.tok {
                Tok::Punct(';') => {
                    cur.next();
                }
                Tok::Ident(w) if w == "typedef" => {
                    cur.next();
                    if let Some(id) = self.parse_typedef(&mut cur, &lexed, &lines, start, registry)? {
                        registered.push(id);
                    }
                }
                Tok::Ident(w) if w == "struct" => {
                    cur.next();
                    let name = cur.expect_ident()?;
                    if cur.is_punct(';') {
                        cur.next();
                        continue;
                    }
                    let fields = self.parse_body(&mut cur, &lexed)?;
                    let end = cur.expect_punct(';')?;
                    registered.push(self.register(registry, &name, fields, &lines, start, end)?);
                }
                other => {
                    return Err(invalid(start, format!("expected `typedef` or `struct`, found {:?}", other)))
                }
            }
        }
        Ok(registered)
    }

    fn parse_typedef(
        &mut self,
        cur: &mut TokenCursor<'_>,
        lexed: &Lexed,
        lines: &[&str],
        start: usize,
        registry: &mut TypeRegistry,
    ) -> Result<Option<TypeId>> {
        if cur.is_ident("struct") {
            cur.next();
            let tag = cur.optional_ident();
            if !cur.is_punct('{') {
                // typedef struct Tag Alias;
                let alias = cur.expect_ident()?;
                cur.expect_punct(';')?;
                let tag = tag.ok_or_else(|| invalid(start, "typedef struct without tag or body"))?;
                self.aliases.insert(alias, tag);
                return Ok(None);
            }
            let fields = self.parse_body(cur, lexed)?;
            let name = cur.expect_ident()?;
            let end = cur.expect_punct(';')?;
            if let Some(tag) = tag.filter(|t| *t != name) {
                self.aliases.insert(tag, name.clone());
            }
            return self.register(registry, &name, fields, lines, start, end).map(Some);
        }

        if cur.is_ident("enum") {
            cur.next();
            let tag = cur.optional_ident();
            cur.expect_punct('{')?;
            while !cur.is_punct('}') {
                if cur.next().is_none() {
                    return Err(invalid(start, "unterminated enum"));
                }
            }
            cur.next();
            let name = cur.expect_ident()?;
            cur.expect_punct(';')?;
            if let Some(tag) = tag {
                self.aliases.insert(tag, "int".to_string());
            }
            self.aliases.insert(name, "int".to_string());
            return Ok(None);
        }

        // typedef <type words> Alias;
        let mut words = Vec::new();
        loop {
            match cur.next() {
                Some(Token { tok: Tok::Ident(w), .. }) => words.push(w.clone()),
                Some(Token { tok: Tok::Punct(';'), .. }) => break,
                Some(t) => return Err(invalid(t.line, "pointer and array typedefs are not supported")),
                None => return Err(invalid(start, "unterminated typedef")),
            }
        }
        let alias = words
            .pop()
            .filter(|_| !words.is_empty())
            .ok_or_else(|| invalid(start, "typedef needs a type and a name"))?;
        self.aliases.insert(alias, words.join(" "));
        Ok(None)
    }

    fn parse_body(&self, cur: &mut TokenCursor<'_>, lexed: &Lexed) -> Result<Vec<FieldDecl>> {
        cur.expect_punct('{')?;
        let mut fields = Vec::new();
        loop {
            if cur.is_punct('}') {
                cur.next();
                return Ok(fields);
            }
            if cur.peek().is_none() {
                return Err(invalid(cur.line(), "unterminated structure body"));
            }
            let statement_line = cur.line();

            let mut words = Vec::new();
            let mut is_enum = false;
            while let Some(Token { tok: Tok::Ident(w), .. }) = cur.peek() {
                match w.as_str() {
                    "struct" | "const" | "volatile" => {
                        cur.next();
                    }
                    "enum" => {
                        is_enum = true;
                        cur.next();
                    }
                    _ => {
                        let continues = matches!(
                            cur.peek_at(1),
                            Some(Token { tok: Tok::Ident(_) | Tok::Punct('*'), .. })
                        );
                        if !continues {
                            break;
                        }
                        words.push(w.clone());
                        cur.next();
                    }
                }
            }
            let base = if is_enum && self.aliases.get(&words.join(" ")).is_none() {
                "int".to_string()
            } else if words.is_empty() {
                return Err(invalid(statement_line, "field without a type"));
            } else {
                self.resolve_alias(&words.join(" "), statement_line)?
            };

            let first = fields.len();
            loop {
                let mut stars = 0;
                while cur.is_punct('*') {
                    cur.next();
                    stars += 1;
                }
                let name = cur.expect_ident()?;
                let mut dims = Vec::new();
                while cur.is_punct('[') {
                    cur.next();
                    let dim = match cur.next() {
                        Some(Token { tok: Tok::Number(n), .. }) => *n,
                        Some(Token { tok: Tok::Ident(c), line }) => self
                            .defines
                            .get(c)
                            .copied()
                            .ok_or_else(|| invalid(*line, format!("undefined constant `{}`", c)))?,
                        _ => return Err(invalid(statement_line, "bad array dimension")),
                    };
                    cur.expect_punct(']')?;
                    dims.push(dim);
                }
                fields.push(field_decl(&base, stars, name, &dims, statement_line)?);

                match cur.next() {
                    Some(Token { tok: Tok::Punct(','), .. }) => continue,
                    Some(Token { tok: Tok::Punct(';'), line }) => {
                        if let Some(comment) = lexed.comments.get(line) {
                            for field in &mut fields[first..] {
                                field.description = comment.clone();
                            }
                        }
                        break;
                    }
                    Some(t) => return Err(invalid(t.line, format!("unexpected {:?} in field", t.tok))),
                    None => return Err(invalid(statement_line, "unterminated field")),
                }
            }
        }
    }

    fn resolve_alias(&self, name: &str, line: usize) -> Result<String> {
        let mut current = name.to_string();
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.aliases.get(&current) {
                Some(next) => current = next.clone(),
                None => return Ok(current),
            }
        }
        Err(invalid(line, format!("typedef cycle through `{}`", name)))
    }

    fn register(
        &self,
        registry: &mut TypeRegistry,
        name: &str,
        fields: Vec<FieldDecl>,
        lines: &[&str],
        start: usize,
        end: usize,
    ) -> Result<TypeId> {
        let image = lines
            .get(start.saturating_sub(1)..end.min(lines.len()))
            .map(|slice| slice.join("\n"))
            .unwrap_or_default();
        let id = registry.register_with(name, fields, TypeClass::Compound, Some(image))?;
        if !self.source.is_empty() {
            let mut descriptor = registry
                .get(id)
                .cloned()
                .ok_or_else(|| MarshalError::TypeUnresolved(name.to_string()))?;
            descriptor.source = self.source.clone();
            registry.replace(name, descriptor)?;
        }
        Ok(id)
    }
}

fn field_decl(base: &str, stars: usize, name: String, dims: &[usize], line: usize) -> Result<FieldDecl> {
    let is_char = AtomicType::from_name(base) == Some(AtomicType::Char);
    let decl = match (is_char, stars, dims.len()) {
        (true, 0, _) => FieldDecl::new(name, "char").dims(dims),
        (true, 1, 0) => FieldDecl::new(name, STRING_TYPE).pointer(),
        (true, 1, 1) => FieldDecl::new(name, STRING_ARRAY_TYPE).dims(dims),
        (true, 2, 0) => FieldDecl::new(name, STRING_ARRAY_TYPE).pointer(),
        (false, 0, _) => FieldDecl::new(name, base).dims(dims),
        (false, 1, 0) => FieldDecl::new(name, base).pointer(),
        _ => {
            return Err(invalid(
                line,
                format!("unsupported declarator for `{}` ({} pointers, rank {})", name, stars, dims.len()),
            ))
        }
    };
    Ok(decl)
}

/// Parse `text` with a fresh parser.
pub fn parse_declarations(text: &str, registry: &mut TypeRegistry) -> Result<Vec<TypeId>> {
    DeclarationParser::new().parse(text, registry)
}

/// Parse a header file, recording its path as the type source.
pub fn parse_file(path: impl AsRef<Path>, registry: &mut TypeRegistry) -> Result<Vec<TypeId>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| invalid(0, format!("{}: {}", path.display(), e)))?;
    DeclarationParser::new()
        .source(path.display().to_string())
        .parse(&text, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StringForm;

    const HEADER: &str = r#"
#define NAME_LEN 32
#define CODES 4

typedef double real;

typedef struct Point {
    real x;            // metres
    real y;
} Point;

typedef enum { RED, GREEN = 4 } Colour;

/* a named path */
struct Path {
    char name[NAME_LEN];
    int count;
    Point *pts;
    Colour colour;
    char *label;      /* free text */
    char *tags[3];
    char codes[CODES][8];
    char **notes;
    unsigned short grid[2][3];
};
"#;

    #[test]
    fn test_parse_header() {
        let mut registry = TypeRegistry::new();
        let ids = parse_declarations(HEADER, &mut registry).unwrap();
        assert_eq!(ids.len(), 2);

        let point = registry.find("Point").unwrap();
        assert_eq!(point.fields[0].type_name, "double");
        assert_eq!(point.fields[0].description, "metres");
        assert!(point.image.starts_with("typedef struct Point {"));
        assert!(point.image.ends_with("} Point;"));

        let path = registry.find("Path").unwrap();
        let name = path.field("name").unwrap();
        assert_eq!(name.string_form(), Some(StringForm::Fixed { len: 32 }));
        assert!(path.field("pts").unwrap().pointer);
        assert_eq!(path.field("colour").unwrap().atomic, Some(AtomicType::Int));
        assert_eq!(path.field("label").unwrap().string_form(), Some(StringForm::Pointer));
        assert_eq!(path.field("label").unwrap().description, "free text");
        assert_eq!(
            path.field("tags").unwrap().string_form(),
            Some(StringForm::PointerArray { count: 3 })
        );
        assert_eq!(
            path.field("codes").unwrap().string_form(),
            Some(StringForm::FixedArray { len: 8, count: 4 })
        );
        assert_eq!(
            path.field("notes").unwrap().string_form(),
            Some(StringForm::PointerToPointers)
        );
        let grid = path.field("grid").unwrap();
        assert_eq!(grid.shape, vec![3, 2]);
        assert_eq!(grid.count, 6);
    }

    #[test]
    fn test_multiple_declarators_share_description() {
        let mut registry = TypeRegistry::new();
        parse_declarations("struct V { float a, *b, c[2]; // parts\n};", &mut registry).unwrap();
        let v = registry.find("V").unwrap();
        assert_eq!(v.fields.len(), 3);
        assert!(!v.fields[0].pointer);
        assert!(v.fields[1].pointer);
        assert_eq!(v.fields[2].count, 2);
        assert!(v.fields.iter().all(|f| f.description == "parts"));
    }

    #[test]
    fn test_undefined_constant() {
        let mut registry = TypeRegistry::new();
        let err = parse_declarations("struct A {\n int v[MISSING];\n};", &mut registry).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidDeclaration { line: 2, .. }));
    }

    #[test]
    fn test_predefined_constant_and_hex() {
        let mut registry = TypeRegistry::new();
        DeclarationParser::new()
            .define("N", 5)
            .parse("#define M 0x10\nstruct A { int v[N]; char s[M]; };", &mut registry)
            .unwrap();
        let a = registry.find("A").unwrap();
        assert_eq!(a.fields[0].count, 5);
        assert_eq!(a.fields[1].count, 16);
    }

    #[test]
    fn test_struct_pointer_to_pointer_rejected() {
        let mut registry = TypeRegistry::new();
        let err = parse_declarations("struct A { double **m; };", &mut registry).unwrap_err();
        assert!(matches!(err, MarshalError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_parse_file_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.h");
        std::fs::write(&path, "typedef struct { int id; } Item;\n").unwrap();
        let mut registry = TypeRegistry::new();
        parse_file(&path, &mut registry).unwrap();
        let item = registry.find("Item").unwrap();
        assert!(item.source.ends_with("types.h"));
        assert_eq!(item.image, "typedef struct { int id; } Item;");
    }
}
