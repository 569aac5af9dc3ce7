//! Data-only evaluation of script config modules.
//!
//! Config files written as `.ts`/`.js`/`.mjs`/`.cjs`/`.mts`/`.cts` are not
//! executed. Instead the module is scanned for its exports and each exported
//! expression is evaluated as a literal. Supported:
//!
//! - `export default <expr>` and `module.exports = <expr>`
//! - `export const|let|var name = <expr>`, `export { a, b as c }`,
//!   `module.exports.name = <expr>`, `exports.name = <expr>`
//! - top-level `const|let|var` bindings (with optional type annotation) that
//!   later expressions reference by name, including shorthand properties and
//!   `...spread`. A binding whose initializer is not a literal is an error
//!   only when it is referenced.
//! - object and array literals, strings (no `${}` interpolation), numbers
//!   (decimal, exponent, hex/octal/binary, `_` separators), `true`, `false`,
//!   `null`, `undefined`
//! - single-argument wrapper calls such as `defineConfig({ ... })`
//! - TypeScript `as T`, `satisfies T` and `!` suffixes
//!
//! Statements that are not exports or bindings (`import`, `type`,
//! `interface`, function declarations) are skipped.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use thiserror::Error;

/// A parse failure with its 1-based position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct ScriptError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Exports found in a script module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptModule {
    /// The default export. `Some(None)` means `export default undefined`.
    pub default: Option<Option<Value>>,
    /// Named exports whose value is defined.
    pub named: Map<String, Value>,
}

impl ScriptModule {
    /// The value a config loader should use: the default export, or the named
    /// exports as an object when there is no default. `None` for an empty module.
    pub fn export_value(self) -> Option<Option<Value>> {
        match self.default {
            Some(default) => Some(default),
            None if !self.named.is_empty() => Some(Some(Value::Object(self.named))),
            None => None,
        }
    }
}

/// Evaluate the exports of a script module.
pub fn evaluate(source: &str) -> Result<ScriptModule, ScriptError> {
    Parser::new(source).module()
}

/// Result of evaluating one expression. `None` is `undefined`.
type Evaluated = Option<Value>;

/// A top-level `const|let|var`. Initializers that are not literals are kept
/// as errors and only reported when something uses the binding.
#[derive(Debug, Clone)]
enum Binding {
    Literal(Evaluated),
    Unevaluable(ScriptError),
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    bindings: HashMap<String, Binding>,
    /// Named exports that could not be evaluated; fatal only without a default.
    unevaluable_exports: Vec<ScriptError>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            bindings: HashMap::new(),
            unevaluable_exports: Vec::new(),
        }
    }

    fn module(mut self) -> Result<ScriptModule, ScriptError> {
        let mut module = ScriptModule::default();

        if self.rest().starts_with("#!") {
            self.skip_line();
        }

        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            if self.eat(';') {
                continue;
            }

            if self.eat_keyword("import") {
                self.skip_statement();
            } else if self.eat_keyword("export") {
                self.export_statement(&mut module)?;
            } else if self.eat_declaration_keyword().is_some() {
                self.declaration();
            } else if self.eat_keyword("module.exports") {
                self.skip_trivia();
                if self.eat('.') {
                    let name = self.expect_ident()?;
                    self.expect('=')?;
                    if let Some(value) = self.expression()? {
                        module.named.insert(name, value);
                    }
                } else {
                    self.expect('=')?;
                    module.default = Some(self.expression()?);
                }
            } else if self.eat_keyword("exports") {
                self.expect('.')?;
                let name = self.expect_ident()?;
                self.expect('=')?;
                if let Some(value) = self.expression()? {
                    module.named.insert(name, value);
                }
            } else {
                self.skip_statement();
            }
        }

        if module.default.is_none()
            && let Some(error) = self.unevaluable_exports.into_iter().next()
        {
            return Err(error);
        }
        Ok(module)
    }

    fn export_statement(&mut self, module: &mut ScriptModule) -> Result<(), ScriptError> {
        if self.eat_keyword("default") {
            module.default = Some(self.expression()?);
        } else if self.eat_declaration_keyword().is_some() {
            let Some(name) = self.declaration() else {
                return Ok(());
            };
            if let Some(value) = self.binding(&name)? {
                module.named.insert(name, value);
            }
        } else if self.peek_after_trivia() == Some('{') {
            self.export_list(module)?;
        } else {
            // `export type`, `export interface`, `export function`, ...
            self.skip_statement();
        }
        Ok(())
    }

    /// `export { a, b as c }`; re-exports (`from '...'`) are ignored.
    fn export_list(&mut self, module: &mut ScriptModule) -> Result<(), ScriptError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                break;
            }
            let local = self.expect_ident()?;
            let exported = if self.eat_keyword("as") {
                self.expect_ident()?
            } else {
                local.clone()
            };
            entries.push((local, exported));
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        if self.eat_keyword("from") {
            self.skip_statement();
            return Ok(());
        }
        for (local, exported) in entries {
            if !self.bindings.contains_key(&local) {
                return Err(self.error(format!("Unknown export '{local}'")));
            }
            let value = if exported == "default" {
                self.binding_value(&local)?
            } else {
                self.binding(&local)?
            };
            match value {
                Some(value) if exported == "default" => module.default = Some(Some(value)),
                Some(value) => {
                    module.named.insert(exported, value);
                }
                None => {}
            }
        }
        Ok(())
    }

    /// `name (: Type)? = expr`, after the `const|let|var` keyword.
    ///
    /// Destructuring patterns are skipped and yield `None`. An initializer
    /// that is not a literal is recorded as unevaluable and the rest of the
    /// statement is skipped.
    fn declaration(&mut self) -> Option<String> {
        let statement = self.pos;
        let Ok(name) = self.expect_ident() else {
            self.pos = statement;
            self.skip_statement();
            return None;
        };
        self.skip_trivia();
        if self.eat(':') {
            self.skip_type(true);
        }
        if !self.eat('=') {
            let error = self.error(format!("'{name}' has no initializer"));
            self.skip_statement();
            self.bindings.insert(name.clone(), Binding::Unevaluable(error));
            return Some(name);
        }

        let init = self.pos;
        let binding = match self.expression() {
            Ok(value) if self.at_statement_end() => Binding::Literal(value),
            Ok(_) => {
                self.pos = init;
                self.skip_trivia();
                Binding::Unevaluable(self.error(format!("'{name}' is not a literal expression")))
            }
            Err(error) => Binding::Unevaluable(error),
        };
        if matches!(binding, Binding::Unevaluable(_)) {
            self.pos = init;
            self.skip_statement();
        }
        self.bindings.insert(name.clone(), binding);
        Some(name)
    }

    /// Whether the expression just parsed is the whole initializer: the
    /// statement ends here, or the next line starts a new statement.
    fn at_statement_end(&mut self) -> bool {
        let end = self.pos;
        self.skip_trivia();
        let newline = self.src[end..self.pos].contains('\n');
        let result = match self.peek() {
            None | Some(';') => true,
            Some(c) => newline && !"+-*/%&|^?.:=<>,".contains(c),
        };
        self.pos = end;
        result
    }

    /// Value of a named export: a failure is deferred, since named exports
    /// are ignored when the module has a default export.
    fn binding(&mut self, name: &str) -> Result<Evaluated, ScriptError> {
        match self.bindings.get(name) {
            Some(Binding::Unevaluable(error)) => {
                self.unevaluable_exports.push(error.clone());
                Ok(None)
            }
            _ => self.binding_value(name),
        }
    }

    /// Value of a binding that is used directly; unevaluable is an error.
    fn binding_value(&self, name: &str) -> Result<Evaluated, ScriptError> {
        match self.bindings.get(name) {
            Some(Binding::Literal(value)) => Ok(value.clone()),
            Some(Binding::Unevaluable(cause)) => Err(self.error(format!(
                "'{name}' cannot be evaluated ({} at line {}, column {})",
                cause.message, cause.line, cause.column
            ))),
            None => Err(self.error(format!("Unsupported identifier '{name}'"))),
        }
    }

    fn eat_declaration_keyword(&mut self) -> Option<&'static str> {
        ["const", "let", "var"]
            .into_iter()
            .find(|kw| self.eat_keyword(kw))
    }

    // ---- expressions -------------------------------------------------------

    fn expression(&mut self) -> Result<Evaluated, ScriptError> {
        let value = self.primary()?;
        loop {
            self.skip_trivia();
            if self.eat_keyword("as") || self.eat_keyword("satisfies") {
                self.skip_type(false);
            } else if self.peek() == Some('!') && self.peek_nth(1) != Some('=') {
                self.bump();
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<Evaluated, ScriptError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(self.error("Unexpected end of input")),
            Some('{') => self.object().map(Some),
            Some('[') => self.array().map(Some),
            Some(q @ ('\'' | '"' | '`')) => self.string(q).map(|s| Some(Value::String(s))),
            Some('(') => {
                self.bump();
                let value = self.expression()?;
                self.expect(')')?;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.number().map(|n| Some(Value::Number(n)))
            }
            Some(c) if is_ident_start(c) => self.identifier_expression(),
            Some(c) => Err(self.error(format!("Unexpected character '{c}'"))),
        }
    }

    fn identifier_expression(&mut self) -> Result<Evaluated, ScriptError> {
        let ident = self.expect_ident()?;
        match ident.as_str() {
            "true" => return Ok(Some(Value::Bool(true))),
            "false" => return Ok(Some(Value::Bool(false))),
            "null" => return Ok(Some(Value::Null)),
            "undefined" => return Ok(None),
            _ => {}
        }

        self.skip_trivia();
        if self.peek() == Some('<') {
            self.skip_balanced('<', '>');
            self.skip_trivia();
        }
        if self.eat('(') {
            let argument = self.expression()?;
            self.skip_trivia();
            self.eat(',');
            self.expect(')')
                .map_err(|_| self.error(format!("Call to '{ident}' must take exactly one argument")))?;
            return Ok(argument);
        }

        self.binding_value(&ident)
    }

    fn object(&mut self) -> Result<Value, ScriptError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                break;
            }

            if self.rest().starts_with("...") {
                self.pos += 3;
                match self.expression()? {
                    Some(Value::Object(spread)) => map.extend(spread),
                    None | Some(Value::Null) => {}
                    Some(_) => return Err(self.error("Only objects can be spread into objects")),
                }
            } else {
                let key = self.property_key()?;
                self.skip_trivia();
                if self.eat(':') {
                    match self.expression()? {
                        Some(value) => {
                            map.insert(key, value);
                        }
                        None => {
                            map.remove(&key);
                        }
                    }
                } else if matches!(self.peek(), Some(',') | Some('}')) {
                    if let Some(value) = self.binding_value(&key)? {
                        map.insert(key, value);
                    }
                } else {
                    return Err(self.error(format!("Expected ':' after property '{key}'")));
                }
            }

            self.skip_trivia();
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(Value::Object(map))
    }

    fn property_key(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '_')
                {
                    self.bump();
                }
                Ok(self.src[start..self.pos].replace('_', ""))
            }
            Some('[') => Err(self.error("Computed property keys are not supported")),
            _ => self.expect_ident(),
        }
    }

    fn array(&mut self) -> Result<Value, ScriptError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(']') {
                break;
            }
            if self.rest().starts_with("...") {
                self.pos += 3;
                match self.expression()? {
                    Some(Value::Array(spread)) => items.extend(spread),
                    _ => return Err(self.error("Only arrays can be spread into arrays")),
                }
            } else {
                items.push(self.expression()?.unwrap_or(Value::Null));
            }
            self.skip_trivia();
            if !self.eat(',') {
                self.expect(']')?;
                break;
            }
        }
        Ok(Value::Array(items))
    }

    fn string(&mut self, quote: char) -> Result<String, ScriptError> {
        self.bump();
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("Unterminated string"));
            };
            match c {
                c if c == quote => return Ok(out),
                '$' if quote == '`' && self.peek() == Some('{') => {
                    return Err(self.error("Template interpolation is not supported"));
                }
                '\n' if quote != '`' => return Err(self.error("Unterminated string")),
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), ScriptError> {
        let Some(c) = self.bump() else {
            return Err(self.error("Unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            '\r' => {
                self.eat_raw('\n');
            }
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(self.char_from(code)?);
            }
            'u' => {
                let code = if self.eat_raw('{') {
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let digits = &self.src[start..self.pos];
                    let code = u32::from_str_radix(digits, 16)
                        .map_err(|_| self.error("Invalid unicode escape"))?;
                    if !self.eat_raw('}') {
                        return Err(self.error("Invalid unicode escape"));
                    }
                    code
                } else {
                    let high = self.hex_digits(4)?;
                    if (0xD800..0xDC00).contains(&high) && self.rest().starts_with("\\u") {
                        self.pos += 2;
                        let low = self.hex_digits(4)?;
                        0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF)
                    } else {
                        high
                    }
                };
                out.push(self.char_from(code)?);
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, ScriptError> {
        let start = self.pos;
        for _ in 0..count {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.bump();
                }
                _ => return Err(self.error("Invalid hex escape")),
            }
        }
        u32::from_str_radix(&self.src[start..self.pos], 16).map_err(|_| self.error("Invalid hex escape"))
    }

    fn char_from(&self, code: u32) -> Result<char, ScriptError> {
        char::from_u32(code).ok_or_else(|| self.error("Invalid character code"))
    }

    fn number(&mut self) -> Result<Number, ScriptError> {
        let negative = if self.eat_raw('-') {
            true
        } else {
            self.eat_raw('+');
            false
        };

        let radix = match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            self.pos += 2;
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let digits = self.src[start..self.pos].replace('_', "");
            let magnitude = i64::from_str_radix(&digits, radix)
                .map_err(|_| self.error(format!("Invalid number literal '{digits}'")))?;
            return Ok(Number::from(if negative { -magnitude } else { magnitude }));
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-')
                && matches!(self.src[..self.pos].chars().last(), Some('e' | 'E'));
            if c.is_ascii_digit() || matches!(c, '.' | '_' | 'e' | 'E') || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        let text = self.src[start..self.pos].replace('_', "");
        if text.is_empty() {
            return Err(self.error("Expected a number"));
        }

        let is_float = text.contains(['.', 'e', 'E']);
        if !is_float && let Ok(int) = text.parse::<i64>() {
            return Ok(Number::from(if negative { -int } else { int }));
        }
        let float: f64 = text
            .parse()
            .map_err(|_| self.error(format!("Invalid number literal '{text}'")))?;
        let float = if negative { -float } else { float };
        Number::from_f64(float).ok_or_else(|| self.error("Number is not finite"))
    }

    // ---- skipping ----------------------------------------------------------

    /// Skip a type annotation. Stops at `,` `;` `)` `]` `}` or a newline at
    /// depth zero, and at `=` when `stop_at_assign` is set.
    fn skip_type(&mut self, stop_at_assign: bool) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' | '`' => {
                    self.skip_string_raw(c);
                    continue;
                }
                '<' | '(' | '[' | '{' => depth += 1,
                '>' if depth > 0 => depth -= 1,
                ')' | ']' | '}' if depth == 0 => break,
                ')' | ']' | '}' => depth -= 1,
                ',' | ';' | '\n' if depth == 0 => break,
                '=' if depth == 0 && stop_at_assign && self.peek_nth(1) != Some('>') => break,
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip to the end of the current statement: `;` or a newline at depth zero.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        let mut consumed = false;
        while let Some(c) = self.peek() {
            match c {
                '\'' | '"' | '`' => {
                    self.skip_string_raw(c);
                    consumed = true;
                    continue;
                }
                '/' if matches!(self.peek_nth(1), Some('/' | '*')) => {
                    self.skip_trivia();
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => {
                    self.bump();
                    return;
                }
                '\n' if depth == 0 && consumed => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            if !c.is_whitespace() {
                consumed = true;
            }
            self.bump();
        }
    }

    fn skip_balanced(&mut self, open: char, close: char) {
        let mut depth = 0usize;
        while let Some(c) = self.bump() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn skip_string_raw(&mut self, quote: char) {
        self.bump();
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return;
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                return;
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.bump();
            }
            let rest = self.rest();
            if rest.starts_with("//") {
                self.skip_line();
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => self.pos = self.src.len(),
                }
            } else {
                return;
            }
        }
    }

    // ---- primitives --------------------------------------------------------

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn peek_after_trivia(&mut self) -> Option<char> {
        self.skip_trivia();
        self.peek()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume `c` if it is the very next character (no trivia skipped).
    fn eat_raw(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_trivia();
        self.eat_raw(c)
    }

    fn expect(&mut self, c: char) -> Result<(), ScriptError> {
        if self.eat(c) {
            Ok(())
        } else {
            let found = self
                .peek()
                .map(|f| format!("'{f}'"))
                .unwrap_or_else(|| "end of input".to_string());
            Err(self.error(format!("Expected '{c}', found {found}")))
        }
    }

    /// Consume a keyword (which may contain dots) followed by a non-identifier character.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_trivia();
        let rest = self.rest();
        if !rest.starts_with(keyword) {
            return false;
        }
        if rest[keyword.len()..].chars().next().is_some_and(is_ident_continue) {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    fn expect_ident(&mut self) -> Result<String, ScriptError> {
        self.skip_trivia();
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.bump();
            }
            _ => return Err(self.error("Expected an identifier")),
        }
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let consumed = &self.src[..self.pos.min(self.src.len())];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rsplit('\n')
            .next()
            .map(|l| l.chars().count() + 1)
            .unwrap_or(1);
        ScriptError {
            message: message.into(),
            line,
            column,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
