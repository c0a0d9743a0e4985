//! Source-level struct discovery
//!
//! Just enough of a Rust lexer to find module-level `struct` declarations
//! and their field types. Comments, literals and attributes are dropped
//! during tokenization; bodies of functions, impls, traits, enums and
//! macros are skipped as opaque brace groups.

/// Lexical token; literals are kept only as placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tok {
    Ident(String),
    Lifetime,
    /// `::`
    PathSep,
    /// `->`
    Arrow,
    Punct(char),
    Literal,
}

/// A named-field struct found at module level
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StructDecl {
    /// Inline `mod` blocks enclosing the declaration, outermost first
    pub module: Vec<String>,
    pub name: String,
    /// One token list per field, holding the field's type
    pub field_types: Vec<Vec<Tok>>,
}

/// Parse a source file into its module-level named-field structs
pub(crate) fn parse_source(src: &str) -> Result<Vec<StructDecl>, String> {
    let tokens = strip_attributes(tokenize(src)?);
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        out: Vec::new(),
    };
    parser.items(&mut Vec::new(), false)?;
    Ok(parser.out)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(src: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i = skip_block_comment(&chars, i)?;
        } else if c == '"' {
            i = skip_string(&chars, i + 1)?;
            tokens.push(Tok::Literal);
        } else if c == '\'' {
            i = lex_quote(&chars, i, &mut tokens)?;
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();

            match (word.as_str(), chars.get(i)) {
                // b"..", c".."
                ("b" | "c", Some('"')) => {
                    i = skip_string(&chars, i + 1)?;
                    tokens.push(Tok::Literal);
                }
                // b'x'
                ("b", Some('\'')) => {
                    i = skip_char_literal(&chars, i + 1)?;
                    tokens.push(Tok::Literal);
                }
                ("r" | "br" | "cr", Some('"' | '#')) => {
                    let mut hashes = 0;
                    let mut j = i;
                    while chars.get(j) == Some(&'#') {
                        hashes += 1;
                        j += 1;
                    }
                    if chars.get(j) == Some(&'"') {
                        i = skip_raw_string(&chars, j + 1, hashes)?;
                        tokens.push(Tok::Literal);
                    } else if word == "r" && hashes == 1 {
                        // r#ident
                        let start = j;
                        let mut k = j;
                        while k < chars.len() && is_ident_continue(chars[k]) {
                            k += 1;
                        }
                        tokens.push(Tok::Ident(chars[start..k].iter().collect()));
                        i = k;
                    } else {
                        tokens.push(Tok::Ident(word));
                    }
                }
                _ => tokens.push(Tok::Ident(word)),
            }
        } else if c.is_ascii_digit() {
            while i < chars.len() && (is_ident_continue(chars[i]) || chars[i] == '.') {
                // `0..n` is a range, not a float
                if chars[i] == '.' && chars.get(i + 1) == Some(&'.') {
                    break;
                }
                i += 1;
            }
            tokens.push(Tok::Literal);
        } else if c == ':' && chars.get(i + 1) == Some(&':') {
            tokens.push(Tok::PathSep);
            i += 2;
        } else if c == '-' && chars.get(i + 1) == Some(&'>') {
            tokens.push(Tok::Arrow);
            i += 2;
        } else {
            tokens.push(Tok::Punct(c));
            i += 1;
        }
    }

    Ok(tokens)
}

fn skip_block_comment(chars: &[char], start: usize) -> Result<usize, String> {
    let mut depth = 0;
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            depth += 1;
            i += 2;
        } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Ok(i);
            }
        } else {
            i += 1;
        }
    }
    Err("unterminated block comment".to_string())
}

/// `i` points just past the opening quote
fn skip_string(chars: &[char], mut i: usize) -> Result<usize, String> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err("unterminated string literal".to_string())
}

/// `i` points just past the opening quote
fn skip_raw_string(chars: &[char], mut i: usize, hashes: usize) -> Result<usize, String> {
    while i < chars.len() {
        if chars[i] == '"' && (1..=hashes).all(|k| chars.get(i + k) == Some(&'#')) {
            return Ok(i + 1 + hashes);
        }
        i += 1;
    }
    Err("unterminated raw string literal".to_string())
}

/// `i` points just past the opening quote
fn skip_char_literal(chars: &[char], mut i: usize) -> Result<usize, String> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => return Ok(i + 1),
            '\n' => break,
            _ => i += 1,
        }
    }
    Err("unterminated character literal".to_string())
}

/// Lifetime (`'a`) or char literal (`'a'`, `'\n'`)
fn lex_quote(chars: &[char], i: usize, tokens: &mut Vec<Tok>) -> Result<usize, String> {
    match (chars.get(i + 1), chars.get(i + 2)) {
        (Some('\\'), _) => {
            tokens.push(Tok::Literal);
            skip_char_literal(chars, i + 1)
        }
        (Some(_), Some('\'')) => {
            tokens.push(Tok::Literal);
            Ok(i + 3)
        }
        (Some(&c), _) if is_ident_start(c) => {
            let mut j = i + 1;
            while j < chars.len() && is_ident_continue(chars[j]) {
                j += 1;
            }
            tokens.push(Tok::Lifetime);
            Ok(j)
        }
        _ => Err("stray quote".to_string()),
    }
}

/// Drop `#[..]` and `#![..]` groups
fn strip_attributes(tokens: Vec<Tok>) -> Vec<Tok> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i] == Tok::Punct('#') {
            let mut j = i + 1;
            if tokens.get(j) == Some(&Tok::Punct('!')) {
                j += 1;
            }
            if tokens.get(j) == Some(&Tok::Punct('[')) {
                let mut depth = 0usize;
                while j < tokens.len() {
                    match tokens[j] {
                        Tok::Punct('[') => depth += 1,
                        Tok::Punct(']') => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                i = j + 1;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }

    out
}

struct Parser<'t> {
    tokens: &'t [Tok],
    pos: usize,
    out: Vec<StructDecl>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    fn ident_at(&self, offset: usize) -> Option<&str> {
        match self.peek_at(offset) {
            Some(Tok::Ident(name)) => Some(name),
            _ => None,
        }
    }

    /// Module-level items until end of input (or the closing brace of an inline module)
    fn items(&mut self, module: &mut Vec<String>, nested: bool) -> Result<(), String> {
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Ident(word) if word == "mod" => {
                    let name = self.ident_at(1).map(str::to_string);
                    match (name, self.peek_at(2)) {
                        (Some(name), Some(Tok::Punct('{'))) => {
                            self.pos += 3;
                            module.push(name);
                            self.items(module, true)?;
                            module.pop();
                        }
                        _ => self.pos += 1,
                    }
                }
                Tok::Ident(word) if word == "struct" => {
                    self.pos += 1;
                    self.struct_decl(module)?;
                }
                Tok::Punct('{') => self.skip_group('{', '}')?,
                Tok::Punct('(') => self.skip_group('(', ')')?,
                Tok::Punct('[') => self.skip_group('[', ']')?,
                Tok::Punct('}') => {
                    if nested {
                        self.pos += 1;
                        return Ok(());
                    }
                    return Err("unbalanced braces: unexpected '}'".to_string());
                }
                Tok::Punct(')') | Tok::Punct(']') => {
                    return Err("unbalanced delimiters".to_string());
                }
                _ => self.pos += 1,
            }
        }

        if nested {
            return Err("unbalanced braces: missing '}'".to_string());
        }
        Ok(())
    }

    /// Skip a balanced group starting at the current token
    fn skip_group(&mut self, open: char, close: char) -> Result<(), String> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Punct(c) if *c == open => depth += 1,
                Tok::Punct(c) if *c == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(format!("unbalanced delimiters: missing '{}'", close))
    }

    /// Skip `<...>` generics, treating `->` as an arrow
    fn skip_generics(&mut self) -> Result<(), String> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Punct('<') => depth += 1,
                Tok::Punct('>') => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                Tok::Punct('{') | Tok::Punct(';') => break,
                _ => {}
            }
            self.pos += 1;
        }
        Err("unbalanced generics".to_string())
    }

    /// After the `struct` keyword
    fn struct_decl(&mut self, module: &[String]) -> Result<(), String> {
        let Some(name) = self.ident_at(0).map(str::to_string) else {
            return Ok(());
        };
        self.pos += 1;

        if self.peek() == Some(&Tok::Punct('<')) {
            self.skip_generics()?;
        }

        // Optional where clause, then the body
        loop {
            match self.peek() {
                None => return Err(format!("struct {} has no body", name)),
                Some(Tok::Punct(';')) => {
                    // unit struct
                    self.pos += 1;
                    return Ok(());
                }
                Some(Tok::Punct('(')) => {
                    // tuple struct
                    return self.skip_group('(', ')');
                }
                Some(Tok::Punct('{')) => break,
                Some(Tok::Punct('<')) => self.skip_generics()?,
                Some(_) => self.pos += 1,
            }
        }

        self.pos += 1;
        let field_types = self.fields()?;
        self.out.push(StructDecl {
            module: module.to_vec(),
            name,
            field_types,
        });
        Ok(())
    }

    /// Named fields up to and including the closing brace
    fn fields(&mut self) -> Result<Vec<Vec<Tok>>, String> {
        let mut fields = Vec::new();
        let mut current: Vec<Tok> = Vec::new();
        let mut depth = 0usize;

        loop {
            let Some(tok) = self.peek().cloned() else {
                return Err("unbalanced braces: unterminated struct body".to_string());
            };
            self.pos += 1;

            match tok {
                Tok::Punct('}') if depth == 0 => {
                    if !current.is_empty() {
                        fields.push(field_type(&current));
                    }
                    return Ok(fields);
                }
                Tok::Punct(',') if depth == 0 => {
                    fields.push(field_type(&current));
                    current.clear();
                }
                Tok::Punct('(' | '[' | '{' | '<') => {
                    depth += 1;
                    current.push(tok);
                }
                Tok::Punct(')' | ']' | '}' | '>') => {
                    depth = depth.saturating_sub(1);
                    current.push(tok);
                }
                other => current.push(other),
            }
        }
    }
}

/// Type tokens of one `vis name: Type` field
fn field_type(field: &[Tok]) -> Vec<Tok> {
    match field.iter().position(|t| *t == Tok::Punct(':')) {
        Some(colon) => field[colon + 1..].to_vec(),
        None => Vec::new(),
    }
}

/// Marker matching rules for field types
pub(crate) struct MarkerMatcher<'a> {
    /// Local name of the marker type
    pub marker: &'a str,
    /// Accepted qualifying paths
    pub namespaces: &'a [String],
    /// Crate the declaration lives in, substituted for `crate::`
    pub crate_name: &'a str,
}

impl MarkerMatcher<'_> {
    /// Whether a field of this type marks its struct as audit-eligible
    ///
    /// Accepts the marker itself, a qualified path to it, or either behind
    /// exactly one pointer (`&`, `&mut`, `*const`, `Box`, `Rc`, `Arc`).
    pub(crate) fn matches(&self, ty: &[Tok]) -> bool {
        self.is_marker_path(ty) || pointee(ty).is_some_and(|inner| self.is_marker_path(inner))
    }

    fn is_marker_path(&self, ty: &[Tok]) -> bool {
        let Some(mut segments) = path_segments(ty) else {
            return false;
        };
        if segments.last().map(String::as_str) != Some(self.marker) {
            return false;
        }
        segments.pop();
        if segments.is_empty() {
            return true;
        }
        if segments[0] == "crate" {
            segments[0] = self.crate_name.to_string();
        }
        let namespace = segments.join("::");
        self.namespaces.iter().any(|ns| *ns == namespace)
    }
}

/// `a::b::C` (optionally `::a::b::C`) as segments; `None` for anything else
fn path_segments(ty: &[Tok]) -> Option<Vec<String>> {
    let ty = match ty.first() {
        Some(Tok::PathSep) => &ty[1..],
        _ => ty,
    };
    let mut segments = Vec::new();
    let mut expect_ident = true;
    for tok in ty {
        match (tok, expect_ident) {
            (Tok::Ident(name), true) => segments.push(name.clone()),
            (Tok::PathSep, false) => {}
            _ => return None,
        }
        expect_ident = !expect_ident;
    }
    if expect_ident || segments.is_empty() {
        return None;
    }
    Some(segments)
}

/// Type behind a single level of pointer indirection
fn pointee(ty: &[Tok]) -> Option<&[Tok]> {
    match ty.first()? {
        Tok::Punct('&') => {
            let mut rest = &ty[1..];
            if rest.first() == Some(&Tok::Lifetime) {
                rest = &rest[1..];
            }
            if rest.first() == Some(&Tok::Ident("mut".to_string())) {
                rest = &rest[1..];
            }
            Some(rest)
        }
        Tok::Punct('*') => match ty.get(1)? {
            Tok::Ident(kw) if kw == "const" || kw == "mut" => Some(&ty[2..]),
            _ => None,
        },
        _ => {
            // Box<T>, Rc<T>, Arc<T>, possibly path-qualified
            let open = ty.iter().position(|t| *t == Tok::Punct('<'))?;
            if ty.last()? != &Tok::Punct('>') {
                return None;
            }
            let wrapper = path_segments(&ty[..open])?;
            match wrapper.last()?.as_str() {
                "Box" | "Rc" | "Arc" => Some(&ty[open + 1..ty.len() - 1]),
                _ => None,
            }
        }
    }
}
