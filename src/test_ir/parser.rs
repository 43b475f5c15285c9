//! TIR (Test IR) parser implementation.
//!
//! A lexer turns the text into tokens carrying their line, and a
//! recursive-descent parser builds the [`Module`]. Blocks of a function are
//! collected in a prescan so branches can name blocks defined later; values
//! used before their definition get a placeholder that the definition fills.

use std::collections::HashMap;

use thiserror::Error;

use super::*;

/// Error produced while parsing TIR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

pub fn parse_module(text: &str) -> Result<Module, ParseError> {
    let tokens = lex(text)?;
    let parser = Parser {
        tokens,
        pos: 0,
        module: Module::default(),
    };
    parser.parse()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Local(String),
    Global(String),
    Word(String),
    Int(i128),
    Float(String),
    Str(String),
    Punct(char),
    Ellipsis,
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Local(name) => format!("'%{name}'"),
            Tok::Global(name) => format!("'@{name}'"),
            Tok::Word(word) => format!("'{word}'"),
            Tok::Int(value) => format!("'{value}'"),
            Tok::Float(text) => format!("'{text}'"),
            Tok::Str(text) => format!("\"{text}\""),
            Tok::Punct(ch) => format!("'{ch}'"),
            Tok::Ellipsis => "'...'".to_string(),
            Tok::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$' | '-')
}

fn lex(text: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    let error = |line, message: String| ParseError { line, message };

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '\n' => {
                line += 1;
                i += 1;
            }
            ch if ch.is_whitespace() => i += 1,
            ';' => {
                // Skip comment line
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '%' | '@' => {
                i += 1;
                let name = if chars.get(i) == Some(&'"') {
                    let (name, next) = read_quoted(&chars, i, line)?;
                    i = next;
                    name
                } else {
                    let start = i;
                    while i < chars.len() && is_name_char(chars[i]) {
                        i += 1;
                    }
                    if start == i {
                        return Err(error(line, format!("expected name after '{ch}'")));
                    }
                    chars[start..i].iter().collect()
                };
                let tok = if ch == '%' { Tok::Local(name) } else { Tok::Global(name) };
                tokens.push(Token { tok, line });
            }
            '"' => {
                let (text, next) = read_quoted(&chars, i, line)?;
                i = next;
                tokens.push(Token { tok: Tok::Str(text), line });
            }
            '#' => {
                // Attribute group reference
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            '.' if chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') => {
                i += 3;
                tokens.push(Token { tok: Tok::Ellipsis, line });
            }
            '-' | '0'..='9' => {
                let start = i;
                if ch == '-' {
                    i += 1;
                }
                if !chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                    return Err(error(line, "expected digit".to_string()));
                }
                if chars[i] == '0' && chars.get(i + 1) == Some(&'x') {
                    // Hexadecimal floating-point literal
                    i += 2;
                    while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                        i += 1;
                    }
                    let text: String = chars[start..i].iter().collect();
                    tokens.push(Token { tok: Tok::Float(text), line });
                    continue;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
                if is_float {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    if matches!(chars.get(i), Some('e') | Some('E')) {
                        i += 1;
                        if matches!(chars.get(i), Some('+') | Some('-')) {
                            i += 1;
                        }
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                    let text: String = chars[start..i].iter().collect();
                    tokens.push(Token { tok: Tok::Float(text), line });
                } else {
                    let text: String = chars[start..i].iter().collect();
                    let value = text
                        .parse::<i128>()
                        .map_err(|_| error(line, format!("integer literal {text} out of range")))?;
                    tokens.push(Token { tok: Tok::Int(value), line });
                }
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '.')) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(Token { tok: Tok::Word(word), line });
            }
            '=' | ',' | '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | ':' | '*' | '!' => {
                i += 1;
                tokens.push(Token { tok: Tok::Punct(ch), line });
            }
            _ => return Err(error(line, format!("unexpected character '{ch}'"))),
        }
    }

    tokens.push(Token { tok: Tok::Eof, line });
    Ok(tokens)
}

fn read_quoted(chars: &[char], start: usize, line: usize) -> Result<(String, usize), ParseError> {
    let mut i = start + 1;
    let mut text = String::new();
    while i < chars.len() && chars[i] != '"' {
        text.push(chars[i]);
        i += 1;
    }
    if i >= chars.len() {
        return Err(ParseError {
            line,
            message: "unterminated string".to_string(),
        });
    }
    Ok((text, i + 1))
}

/// Truncate a literal to `bits` and return its low 64 bits.
fn mask(value: i128, bits: u32) -> u64 {
    let value = value as u64;
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Words that carry no meaning for the symbolizer.
const IGNORED_ATTRIBUTES: &[&str] = &[
    "dso_local",
    "dso_preemptable",
    "local_unnamed_addr",
    "unnamed_addr",
    "hidden",
    "protected",
    "default",
    "noundef",
    "signext",
    "zeroext",
    "nonnull",
    "noalias",
    "nocapture",
    "readonly",
    "readnone",
    "writeonly",
    "returned",
    "immarg",
    "nounwind",
    "noinline",
    "optnone",
    "uwtable",
    "willreturn",
    "mustprogress",
    "nofree",
    "nosync",
];

const IGNORED_FLAGS: &[&str] = &[
    "nsw", "nuw", "exact", "disjoint", "fast", "nnan", "ninf", "nsz", "arcp", "contract", "afn",
    "reassoc",
];

/// Per-function parsing state.
struct FunctionState {
    func: Function,
    names: HashMap<String, ValueRef>,
    blocks: HashMap<String, BlockRef>,
    current_block: Option<BlockRef>,
}

impl FunctionState {
    fn push(&mut self, ty: IrType, kind: ValueKind) -> ValueRef {
        self.func.push_value(ValueData::new(ty, kind))
    }

    fn lookup_or_forward(&mut self, name: &str) -> ValueRef {
        if let Some(&value) = self.names.get(name) {
            return value;
        }
        let value = self.push(IrType::Void, ValueKind::Forward);
        self.func.values[value.0 as usize].name = Some(name.to_string());
        self.names.insert(name.to_string(), value);
        value
    }

    fn define(&mut self, name: Option<String>, data: ValueData, line: usize) -> Result<ValueRef, ParseError> {
        let Some(name) = name else {
            return Ok(self.func.push_value(data));
        };

        match self.names.get(&name) {
            Some(&value) if self.func.values[value.0 as usize].kind == ValueKind::Forward => {
                self.func.values[value.0 as usize] = ValueData {
                    name: Some(name),
                    ..data
                };
                Ok(value)
            }
            Some(_) => Err(ParseError {
                line,
                message: format!("redefinition of %{name}"),
            }),
            None => {
                let value = self.func.push_value(ValueData {
                    name: Some(name.clone()),
                    ..data
                });
                self.names.insert(name, value);
                Ok(value)
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    module: Module,
}

impl Parser {
    fn parse(mut self) -> Result<Module, ParseError> {
        while !self.at_eof() {
            match self.bump() {
                Tok::Word(word) if word == "target" => {
                    let kind = self.word()?;
                    self.expect('=')?;
                    let value = self.string()?;
                    match kind.as_str() {
                        "datalayout" => self.module.datalayout = Some(value),
                        "triple" => self.module.triple = Some(value),
                        other => return Err(self.error(format!("unknown target property '{other}'"))),
                    }
                }
                Tok::Word(word) if word == "source_filename" => {
                    self.expect('=')?;
                    self.string()?;
                }
                Tok::Word(word) if word == "declare" => self.parse_function(true)?,
                Tok::Word(word) if word == "define" => self.parse_function(false)?,
                Tok::Global(name) => self.parse_global(name)?,
                other => return Err(self.error(format!("unexpected {}", other.describe()))),
            }
        }

        Ok(self.module)
    }

    // Token helpers

    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            line: self.line(),
            message,
        }
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == &Tok::Punct(ch) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), ParseError> {
        if !self.eat(ch) {
            return Err(self.error(format!("expected '{ch}' but found {}", self.peek().describe())));
        }
        Ok(())
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Tok::Word(w) if w == word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        if !self.eat_word(word) {
            return Err(self.error(format!("expected '{word}' but found {}", self.peek().describe())));
        }
        Ok(())
    }

    fn word(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Tok::Word(word) => Ok(word),
            other => Err(self.error(format!("expected keyword but found {}", other.describe()))),
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Tok::Str(text) => Ok(text),
            other => Err(self.error(format!("expected string but found {}", other.describe()))),
        }
    }

    fn int(&mut self) -> Result<i128, ParseError> {
        match self.bump() {
            Tok::Int(value) => Ok(value),
            other => Err(self.error(format!("expected integer but found {}", other.describe()))),
        }
    }

    fn skip_attributes(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Tok::Word(word) if IGNORED_ATTRIBUTES.contains(&word.as_str()) => {
                    self.bump();
                }
                Tok::Word(word) if word == "align" => {
                    self.bump();
                    self.int()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_flags(&mut self) {
        while matches!(self.peek(), Tok::Word(word) if IGNORED_FLAGS.contains(&word.as_str())) {
            self.bump();
        }
    }

    /// Skip `, align N` suffixes of memory instructions.
    fn skip_alignment(&mut self) -> Result<(), ParseError> {
        while self.peek() == &Tok::Punct(',') && matches!(self.peek_at(1), Tok::Word(w) if w == "align") {
            self.bump();
            self.bump();
            self.int()?;
        }
        Ok(())
    }

    fn eat_linkage(&mut self) -> Option<Linkage> {
        let Tok::Word(word) = self.peek() else {
            return None;
        };
        let linkage = Linkage::parse(word)?;
        self.bump();
        Some(linkage)
    }

    // Types and constants

    fn parse_type(&mut self) -> Result<IrType, ParseError> {
        match self.bump() {
            Tok::Word(word) => match word.as_str() {
                "void" => Ok(IrType::Void),
                "half" => Ok(IrType::Half),
                "bfloat" => Ok(IrType::BFloat),
                "float" => Ok(IrType::Float),
                "double" => Ok(IrType::Double),
                "x86_fp80" => Ok(IrType::X86Fp80),
                "fp128" => Ok(IrType::Fp128),
                "ppc_fp128" => Ok(IrType::PpcFp128),
                "ptr" => Ok(IrType::Ptr),
                w if w.starts_with('i') => w[1..]
                    .parse()
                    .map(IrType::Int)
                    .map_err(|_| self.error(format!("unknown type '{w}'"))),
                other => Err(self.error(format!("unknown type '{other}'"))),
            },
            Tok::Punct('[') => {
                let len = self.int()?;
                self.expect_word("x")?;
                let element = self.parse_type()?;
                self.expect(']')?;
                Ok(IrType::Array(Box::new(element), len as u64))
            }
            Tok::Punct('<') if self.eat('{') => {
                let fields = self.parse_struct_fields()?;
                self.expect('>')?;
                Ok(IrType::PackedStruct(fields))
            }
            Tok::Punct('<') => {
                let len = self.int()?;
                self.expect_word("x")?;
                let element = self.parse_type()?;
                self.expect('>')?;
                Ok(IrType::Vector(Box::new(element), len as u32))
            }
            Tok::Punct('{') => self.parse_struct_fields().map(IrType::Struct),
            other => Err(self.error(format!("expected type but found {}", other.describe()))),
        }
    }

    /// Field list after the opening `{`, up to and including the `}`.
    fn parse_struct_fields(&mut self) -> Result<Vec<IrType>, ParseError> {
        let mut fields = Vec::new();
        if self.eat('}') {
            return Ok(fields);
        }
        loop {
            fields.push(self.parse_type()?);
            if !self.eat(',') {
                break;
            }
        }
        self.expect('}')?;
        Ok(fields)
    }

    fn parse_constant(&mut self, ty: &IrType) -> Result<Constant, ParseError> {
        match self.bump() {
            Tok::Int(value) => Ok(Constant::Int(mask(value, ty.int_width().unwrap_or(64)))),
            Tok::Float(text) => Ok(Constant::Float(text)),
            Tok::Global(name) => Ok(Constant::Symbol(name)),
            Tok::Word(word) => match word.as_str() {
                "true" => Ok(Constant::Int(1)),
                "false" => Ok(Constant::Int(0)),
                "null" => Ok(Constant::Null),
                "zeroinitializer" => Ok(Constant::ZeroInitializer),
                "undef" | "poison" => Ok(Constant::Undef),
                other => Err(self.error(format!("unsupported constant '{other}'"))),
            },
            Tok::Punct('<') if self.eat('{') => {
                let elements = self.parse_elements('}')?;
                self.expect('>')?;
                Ok(Constant::Aggregate(elements))
            }
            Tok::Punct(open @ ('[' | '{' | '<')) => {
                let close = match open {
                    '[' => ']',
                    '{' => '}',
                    _ => '>',
                };
                self.parse_elements(close).map(Constant::Aggregate)
            }
            other => Err(self.error(format!("expected constant but found {}", other.describe()))),
        }
    }

    fn parse_elements(&mut self, close: char) -> Result<Vec<Constant>, ParseError> {
        let mut elements = Vec::new();
        if self.eat(close) {
            return Ok(elements);
        }
        loop {
            let element_ty = self.parse_type()?;
            elements.push(self.parse_constant(&element_ty)?);
            if !self.eat(',') {
                break;
            }
        }
        self.expect(close)?;
        Ok(elements)
    }

    fn parse_global(&mut self, name: String) -> Result<(), ParseError> {
        self.expect('=')?;
        let explicit_linkage = self.eat_linkage();
        self.skip_attributes()?;
        self.eat_word("thread_local");
        self.eat_word("externally_initialized");

        let constant = match self.word()?.as_str() {
            "global" => false,
            "constant" => true,
            other => return Err(self.error(format!("expected 'global' or 'constant' but found '{other}'"))),
        };
        let ty = self.parse_type()?;

        let has_init = !matches!(explicit_linkage, Some(Linkage::External) | Some(Linkage::ExternWeak));
        let init = if has_init { Some(self.parse_constant(&ty)?) } else { None };

        while self.eat(',') {
            match self.word()?.as_str() {
                "align" => {
                    self.int()?;
                }
                "section" => {
                    self.string()?;
                }
                other => return Err(self.error(format!("unsupported global attribute '{other}'"))),
            }
        }

        self.module.globals.push(Global {
            name,
            linkage: explicit_linkage.unwrap_or_default(),
            constant,
            ty,
            init,
        });
        Ok(())
    }

    // Functions

    fn parse_function(&mut self, declaration: bool) -> Result<(), ParseError> {
        let linkage = self.eat_linkage().unwrap_or_default();
        self.skip_attributes()?;
        let ret = self.parse_type()?;
        let name = match self.bump() {
            Tok::Global(name) => name,
            other => return Err(self.error(format!("expected function name but found {}", other.describe()))),
        };

        let mut state = FunctionState {
            func: Function {
                name,
                linkage,
                ret,
                declaration,
                params: Vec::new(),
                blocks: Vec::new(),
                values: Vec::new(),
                next_sym: 0,
            },
            names: HashMap::new(),
            blocks: HashMap::new(),
            current_block: None,
        };

        self.expect('(')?;
        if !self.eat(')') {
            loop {
                if self.peek() == &Tok::Ellipsis {
                    self.bump();
                    break;
                }
                let ty = self.parse_type()?;
                self.skip_attributes()?;
                let index = state.func.params.len() as u32;
                let param_name = match self.peek() {
                    Tok::Local(name) => {
                        let name = name.clone();
                        self.bump();
                        Some(name)
                    }
                    _ if declaration => None,
                    _ => Some(index.to_string()),
                };
                let data = ValueData::new(ty, ValueKind::Param(index));
                let line = self.line();
                let param = state.define(param_name, data, line)?;
                state.func.params.push(param);
                if !self.eat(',') {
                    break;
                }
            }
            self.expect(')')?;
        }
        self.skip_attributes()?;

        if !declaration {
            self.parse_body(&mut state)?;
        }

        self.module.functions.push(state.func);
        Ok(())
    }

    fn parse_body(&mut self, state: &mut FunctionState) -> Result<(), ParseError> {
        self.expect('{')?;
        self.prescan_blocks(state);

        while !self.eat('}') {
            if self.at_eof() {
                return Err(self.error(format!("unterminated body of @{}", state.func.name)));
            }
            if let (Tok::Word(label), Tok::Punct(':')) = (self.peek(), self.peek_at(1)) {
                let label = label.clone();
                self.bump();
                self.bump();
                state.current_block = state.blocks.get(&label).copied();
                continue;
            }
            self.parse_instruction(state)?;
        }

        if let Some(undefined) = state.func.values.iter().find(|v| v.kind == ValueKind::Forward) {
            return Err(self.error(format!(
                "use of undefined value %{} in @{}",
                undefined.name.as_deref().unwrap_or("?"),
                state.func.name
            )));
        }
        if state.func.blocks.is_empty() {
            return Err(self.error(format!("@{} has no blocks", state.func.name)));
        }
        Ok(())
    }

    /// Create the blocks of the body in order of their labels.
    fn prescan_blocks(&mut self, state: &mut FunctionState) {
        let mut depth = 1usize;
        let mut idx = self.pos;
        while idx + 1 < self.tokens.len() && depth > 0 {
            match (&self.tokens[idx].tok, &self.tokens[idx + 1].tok) {
                (Tok::Punct('{'), _) => depth += 1,
                (Tok::Punct('}'), _) => depth -= 1,
                (Tok::Word(label), Tok::Punct(':')) if depth == 1 => {
                    let block = BlockRef(state.func.blocks.len() as u32);
                    state.func.blocks.push(Block {
                        name: label.clone(),
                        insts: Vec::new(),
                    });
                    state.blocks.insert(label.clone(), block);
                }
                _ => {}
            }
            idx += 1;
        }
    }

    fn block_ref(&mut self, state: &FunctionState) -> Result<BlockRef, ParseError> {
        match self.bump() {
            Tok::Local(name) => state
                .blocks
                .get(&name)
                .copied()
                .ok_or_else(|| self.error(format!("unknown block %{name}"))),
            other => Err(self.error(format!("expected block label but found {}", other.describe()))),
        }
    }

    fn label(&mut self, state: &FunctionState) -> Result<BlockRef, ParseError> {
        self.expect_word("label")?;
        self.block_ref(state)
    }

    fn parse_value(&mut self, state: &mut FunctionState, ty: &IrType) -> Result<ValueRef, ParseError> {
        let value = match self.bump() {
            Tok::Local(name) => state.lookup_or_forward(&name),
            Tok::Global(name) => state.push(IrType::Ptr, ValueKind::Global(name)),
            Tok::Int(value) => {
                let bits = ty
                    .int_width()
                    .ok_or_else(|| self.error(format!("integer literal used as {ty}")))?;
                state.push(ty.clone(), ValueKind::ConstInt { bits, value: mask(value, bits) })
            }
            Tok::Float(text) => state.push(ty.clone(), ValueKind::Float(text)),
            Tok::Word(word) => match word.as_str() {
                "true" | "false" => {
                    let value = u64::from(word == "true");
                    state.push(IrType::Int(1), ValueKind::ConstInt { bits: 1, value })
                }
                "null" => state.push(IrType::Ptr, ValueKind::Null),
                "undef" => state.push(ty.clone(), ValueKind::Undef),
                "poison" => state.push(ty.clone(), ValueKind::Poison),
                "zeroinitializer" => state.push(ty.clone(), ValueKind::ZeroInitializer),
                "getelementptr" => {
                    let inbounds = self.eat_word("inbounds");
                    self.expect('(')?;
                    let source = self.parse_type()?;
                    self.expect(',')?;
                    let (_, base) = self.parse_typed_value(state)?;
                    let mut indices = Vec::new();
                    while self.eat(',') {
                        let (_, index) = self.parse_typed_value(state)?;
                        indices.push(index);
                    }
                    self.expect(')')?;
                    state.push(
                        IrType::Ptr,
                        ValueKind::ConstGep {
                            inbounds,
                            source,
                            base,
                            indices,
                        },
                    )
                }
                "bitcast" => {
                    self.expect('(')?;
                    let (_, value) = self.parse_typed_value(state)?;
                    self.expect_word("to")?;
                    let to = self.parse_type()?;
                    self.expect(')')?;
                    state.push(to, ValueKind::ConstBitCast { value })
                }
                other => return Err(self.error(format!("unsupported operand '{other}'"))),
            },
            other => return Err(self.error(format!("expected value but found {}", other.describe()))),
        };
        Ok(value)
    }

    fn parse_typed_value(&mut self, state: &mut FunctionState) -> Result<(IrType, ValueRef), ParseError> {
        let ty = self.parse_type()?;
        self.skip_attributes()?;
        let value = self.parse_value(state, &ty)?;
        Ok((ty, value))
    }

    fn parse_instruction(&mut self, state: &mut FunctionState) -> Result<(), ParseError> {
        let line = self.line();
        let result = match (self.peek(), self.peek_at(1)) {
            (Tok::Local(name), Tok::Punct('=')) => {
                let name = name.clone();
                self.bump();
                self.bump();
                Some(name)
            }
            _ => None,
        };

        let mut opcode = self.word()?;
        if matches!(opcode.as_str(), "tail" | "musttail" | "notail") {
            opcode = self.word()?;
        }

        let (ty, inst) = if let Some(op) = BinaryOp::parse(&opcode) {
            self.skip_flags();
            let ty = self.parse_type()?;
            let lhs = self.parse_value(state, &ty)?;
            self.expect(',')?;
            let rhs = self.parse_value(state, &ty)?;
            (ty, Inst::Binary { op, lhs, rhs })
        } else if let Some(op) = CastOp::parse(&opcode) {
            let (_, value) = self.parse_typed_value(state)?;
            self.expect_word("to")?;
            let to = self.parse_type()?;
            (to, Inst::Cast { op, value })
        } else {
            match opcode.as_str() {
                "icmp" => {
                    let predicate_word = self.word()?;
                    let predicate = IntPredicate::parse(&predicate_word)
                        .ok_or_else(|| self.error(format!("unknown predicate '{predicate_word}'")))?;
                    let ty = self.parse_type()?;
                    let lhs = self.parse_value(state, &ty)?;
                    self.expect(',')?;
                    let rhs = self.parse_value(state, &ty)?;
                    (IrType::Int(1), Inst::ICmp { predicate, lhs, rhs })
                }
                "select" => {
                    let (_, condition) = self.parse_typed_value(state)?;
                    self.expect(',')?;
                    let (ty, then_value) = self.parse_typed_value(state)?;
                    self.expect(',')?;
                    let (_, else_value) = self.parse_typed_value(state)?;
                    (ty, Inst::Select { condition, then_value, else_value })
                }
                "ret" => {
                    if self.eat_word("void") {
                        (IrType::Void, Inst::Ret { value: None })
                    } else {
                        let (_, value) = self.parse_typed_value(state)?;
                        (IrType::Void, Inst::Ret { value: Some(value) })
                    }
                }
                "br" => {
                    if self.peek() == &Tok::Word("label".to_string()) {
                        let target = self.label(state)?;
                        (IrType::Void, Inst::Br { condition: None, targets: vec![target] })
                    } else {
                        let (_, condition) = self.parse_typed_value(state)?;
                        self.expect(',')?;
                        let then_block = self.label(state)?;
                        self.expect(',')?;
                        let else_block = self.label(state)?;
                        (
                            IrType::Void,
                            Inst::Br {
                                condition: Some(condition),
                                targets: vec![then_block, else_block],
                            },
                        )
                    }
                }
                "call" => {
                    self.skip_flags();
                    self.skip_attributes()?;
                    let ret = self.parse_type()?;
                    let callee = self.parse_value(state, &IrType::Ptr)?;
                    self.expect('(')?;
                    let mut args = Vec::new();
                    if !self.eat(')') {
                        loop {
                            let (_, arg) = self.parse_typed_value(state)?;
                            args.push(arg);
                            if !self.eat(',') {
                                break;
                            }
                        }
                        self.expect(')')?;
                    }
                    self.skip_attributes()?;
                    (ret, Inst::Call { callee, args })
                }
                "alloca" => {
                    let allocated = self.parse_type()?;
                    let mut count = None;
                    if self.peek() == &Tok::Punct(',') && !matches!(self.peek_at(1), Tok::Word(w) if w == "align") {
                        self.bump();
                        let (_, value) = self.parse_typed_value(state)?;
                        count = Some(value);
                    }
                    self.skip_alignment()?;
                    (IrType::Ptr, Inst::Alloca { allocated, count })
                }
                "load" => {
                    let ty = self.parse_type()?;
                    self.expect(',')?;
                    let (_, ptr) = self.parse_typed_value(state)?;
                    self.skip_alignment()?;
                    (ty, Inst::Load { ptr })
                }
                "store" => {
                    let (_, value) = self.parse_typed_value(state)?;
                    self.expect(',')?;
                    let (_, ptr) = self.parse_typed_value(state)?;
                    self.skip_alignment()?;
                    (IrType::Void, Inst::Store { value, ptr })
                }
                "getelementptr" => {
                    let inbounds = self.eat_word("inbounds");
                    let source = self.parse_type()?;
                    self.expect(',')?;
                    let (_, base) = self.parse_typed_value(state)?;
                    let mut indices = Vec::new();
                    while self.eat(',') {
                        let (_, index) = self.parse_typed_value(state)?;
                        indices.push(index);
                    }
                    (
                        IrType::Ptr,
                        Inst::Gep {
                            inbounds,
                            source,
                            base,
                            indices,
                        },
                    )
                }
                "phi" => {
                    let ty = self.parse_type()?;
                    let mut incoming = Vec::new();
                    loop {
                        self.expect('[')?;
                        let value = self.parse_value(state, &ty)?;
                        self.expect(',')?;
                        let block = self.block_ref(state)?;
                        self.expect(']')?;
                        incoming.push((value, block));
                        if !self.eat(',') {
                            break;
                        }
                    }
                    (ty, Inst::Phi { incoming })
                }
                "fneg" | "freeze" => {
                    let (ty, value) = self.parse_typed_value(state)?;
                    (ty, Inst::Unary { opcode, value })
                }
                "unreachable" => (IrType::Void, Inst::Unreachable),
                other => return Err(self.error(format!("unknown instruction '{other}'"))),
            }
        };

        let block = state
            .current_block
            .ok_or_else(|| self.error("instruction outside of a block".to_string()))?;
        let data = ValueData {
            name: None,
            ty,
            kind: ValueKind::Inst(inst),
            block: Some(block),
        };
        let value = state.define(result, data, line)?;
        state.func.blocks[block.0 as usize].insts.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let module = Module::parse(
            "define i32 @f(i32 %a) {\n\
             entry:\n\
               %x = add nsw i32 3, %a\n\
               ret i32 %x\n\
             }\n",
        )
        .unwrap();

        assert_eq!(module.functions.len(), 1);
        let func = &module.functions[0];
        assert_eq!(func.name, "f");
        assert!(!func.declaration);
        assert_eq!(func.params.len(), 1);
        assert_eq!(func.blocks.len(), 1);
        assert_eq!(func.blocks[0].insts.len(), 2);

        let x = func.find_value("x").unwrap();
        match func.value(x).inst() {
            Some(Inst::Binary { op: BinaryOp::Add, lhs, .. }) => {
                assert_eq!(func.value(*lhs).kind, ValueKind::ConstInt { bits: 32, value: 3 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_forward_references() {
        let module = Module::parse(
            "define i32 @loop(i32 %n) {\n\
             entry:\n\
               br label %head\n\
             head:\n\
               %i = phi i32 [ 0, %entry ], [ %next, %head ]\n\
               %next = add i32 %i, 1\n\
               %c = icmp ult i32 %next, %n\n\
               br i1 %c, label %head, label %exit\n\
             exit:\n\
               ret i32 %i\n\
             }\n",
        )
        .unwrap();

        let func = &module.functions[0];
        let names: Vec<_> = func.blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["entry", "head", "exit"]);

        let next = func.find_value("next").unwrap();
        let i = func.find_value("i").unwrap();
        let Some(Inst::Phi { incoming }) = func.value(i).inst() else {
            panic!("expected phi");
        };
        assert_eq!(incoming[1], (next, BlockRef(1)));
        assert!(matches!(func.value(next).inst(), Some(Inst::Binary { .. })));
    }

    #[test]
    fn test_undefined_value_is_an_error() {
        let err = Module::parse("define void @f() {\nentry:\n  store i32 %nope, ptr null\n  ret void\n}\n")
            .unwrap_err();
        assert!(err.message.contains("%nope"), "{err}");
    }

    #[test]
    fn test_parse_globals_and_ctors() {
        let module = Module::parse(
            "target datalayout = \"e-p:32:32\"\n\
             @s = internal global { [4 x i32], i32 } { [4 x i32] [i32 1, i32 2, i32 3, i32 -1], i32 5 }, align 4\n\
             @ext = external global i8\n\
             @llvm.global_ctors = appending global [1 x { i32, ptr, ptr }] [{ i32, ptr, ptr } { i32 65535, ptr @init, ptr null }]\n\
             declare void @init()\n",
        )
        .unwrap();

        assert_eq!(module.datalayout.as_deref(), Some("e-p:32:32"));
        let s = module.global("s").unwrap();
        assert_eq!(s.linkage, Linkage::Internal);
        let Some(Constant::Aggregate(fields)) = &s.init else {
            panic!("expected aggregate initializer");
        };
        assert_eq!(
            fields[0],
            Constant::Aggregate(vec![
                Constant::Int(1),
                Constant::Int(2),
                Constant::Int(3),
                Constant::Int(0xffff_ffff)
            ])
        );
        assert_eq!(module.global("ext").unwrap().init, None);
        assert_eq!(module.constructors(), vec![(65535, "init".to_string())]);
        assert!(module.function("init").unwrap().declaration);
    }

    #[test]
    fn test_parse_memory_and_casts() {
        let module = Module::parse(
            "define i64 @m(ptr %p, i8 %b) {\n\
             entry:\n\
               %slot = alloca i32, align 4\n\
               %arr = alloca i8, i32 %n.dummy\n\
               store i32 7, ptr %slot, align 4\n\
               %v = load i32, ptr %slot, align 4\n\
               %q = getelementptr inbounds { i32, [2 x i64] }, ptr %p, i64 0, i32 1, i64 1\n\
               %w = zext i8 %b to i64\n\
               ret i64 %w\n\
             }\n",
        );
        assert!(module.unwrap_err().message.contains("%n.dummy"));

        let module = Module::parse(
            "define i64 @m(ptr %p, i8 %b, i32 %n) {\n\
             entry:\n\
               %slot = alloca i32, align 4\n\
               %arr = alloca i8, i32 %n\n\
               store i32 7, ptr %slot, align 4\n\
               %v = load i32, ptr %slot, align 4\n\
               %q = getelementptr inbounds { i32, [2 x i64] }, ptr %p, i64 0, i32 1, i64 1\n\
               %w = zext i8 %b to i64\n\
               ret i64 %w\n\
             }\n",
        )
        .unwrap();
        let func = &module.functions[0];
        let arr = func.find_value("arr").unwrap();
        assert!(matches!(func.value(arr).inst(), Some(Inst::Alloca { count: Some(_), .. })));
        let slot = func.find_value("slot").unwrap();
        assert!(matches!(func.value(slot).inst(), Some(Inst::Alloca { count: None, .. })));
        let q = func.find_value("q").unwrap();
        let Some(Inst::Gep { indices, inbounds, .. }) = func.value(q).inst() else {
            panic!("expected gep");
        };
        assert!(inbounds);
        assert_eq!(indices.len(), 3);
        assert_eq!(func.value(func.find_value("w").unwrap()).ty, IrType::Int(64));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = Module::parse("define void @f() {\nentry:\n  frobnicate i32 1\n}\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("frobnicate"));
    }
}
