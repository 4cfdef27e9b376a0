//! Assembly language parser and bytecode compiler.
//!
//! Converts human-readable assembly source into executable bytecode.
//! Uses [`for_each_instruction!`](crate::for_each_instruction) to generate the
//! operand layout table, so the encoder always agrees with the interpreter.
//!
//! # Syntax
//!
//! ```text
//! @label: INSTRUCTION operand1, operand2, ...  # optional comment
//! ```
//!
//! - Mnemonics are case-insensitive (e.g., `load`, `EXTCALL`)
//! - Registers use `r` prefix (e.g., `r0`, `r31`)
//! - `alias r3 $owner` lets `$owner` stand for `r3` from then on
//! - Labels are defined with `@name:` and referenced with `@name`
//! - Literals: `"text"`, integers (`42`, `-1`), hex bytes (`0xdead`), `true`, `false`
//! - `CAST` takes a type name (`Number`, `String`, `Bytes`, ...)
//! - `extcall "Runtime.Time"` expands to `LOAD r31 "Runtime.Time"` + `EXTCALL r31`
//! - Comments start with `#`, commas between operands are optional

use crate::for_each_instruction;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::frame::MAX_REGISTERS;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::object::VMType;
use crate::types::encoding::write_varint;
use num_bigint::BigInt;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_PREFIX: char = '@';
const LABEL_SUFFIX: char = ':';
const ALIAS_PREFIX: char = '$';
const ALIAS_DIRECTIVE: &str = "alias";
/// Register clobbered by the `extcall "Name"` shorthand.
pub const EXTCALL_SCRATCH_REGISTER: u8 = (MAX_REGISTERS - 1) as u8;

/// Encoding of a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    Reg,
    Count,
    Offset,
    Type,
    Literal,
}

macro_rules! define_operand_table {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:expr, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ], $gas:expr
        ),* $(,)?
    ) => {
        /// Operand layout of every opcode, in encoding order.
        fn operand_kinds(op: Opcode) -> &'static [OperandKind] {
            match op {
                $( Opcode::$name => &[ $( OperandKind::$kind ),* ], )*
            }
        }
    };
}

for_each_instruction!(define_operand_table);

/// Output of a successful assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    pub bytecode: Vec<u8>,
    /// Label name (without `@`) to absolute bytecode offset.
    pub labels: BTreeMap<String, usize>,
}

impl Assembly {
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

fn asm_error(line: usize, message: impl Into<String>) -> VMError {
    VMError::Assembly {
        line,
        message: message.into(),
    }
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment outside string literals
/// - commas are ignored
/// - whitespace-separated tokens
fn tokenize(line_no: usize, line: &str) -> Result<Vec<Token<'_>>, VMError> {
    let mut out = Vec::with_capacity(8);

    let mut start: Option<usize> = None;
    let mut start_col: usize = 0;
    let mut in_str = false;

    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == COMMENT_CHAR as u8 && !in_str {
            break;
        }

        match b {
            b'"' => {
                if start.is_none() {
                    start = Some(i);
                    start_col = i + 1;
                }
                in_str = !in_str;
            }
            b'\\' if in_str => {
                // skip the escaped character
                i += 1;
            }
            b',' | b' ' | b'\t' if !in_str => {
                if let Some(s) = start.take() {
                    let text = line[s..i].trim();
                    if !text.is_empty() {
                        out.push(Token {
                            text,
                            offset: start_col,
                        });
                    }
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                    start_col = i + 1;
                }
            }
        }
        i += 1;
    }

    if in_str {
        return Err(asm_error(line_no, "unterminated string literal (missing closing quote)"));
    }

    if let Some(s) = start {
        let text = line[s..i.min(line.len())].trim();
        if !text.is_empty() {
            out.push(Token {
                text,
                offset: start_col,
            });
        }
    }

    Ok(out)
}

/// Strips quotes and resolves `\"`, `\\`, `\n` and `\t` escapes.
fn parse_string(tok: &str) -> Option<String> {
    let body = tok.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            other => out.push(other),
        }
    }
    Some(out)
}

/// Parses a literal into its type tag and raw payload.
pub(crate) fn parse_literal(tok: &str) -> Option<(VMType, Vec<u8>)> {
    if tok.starts_with('"') {
        return parse_string(tok).map(|s| (VMType::String, s.into_bytes()));
    }
    match tok {
        "true" => return Some((VMType::Bool, vec![1])),
        "false" => return Some((VMType::Bool, vec![0])),
        _ => {}
    }
    if let Some(hex_text) = tok.strip_prefix("0x") {
        return hex::decode(hex_text).ok().map(|bytes| (VMType::Bytes, bytes));
    }
    tok.parse::<BigInt>()
        .ok()
        .map(|n| (VMType::Number, n.to_signed_bytes_le()))
}

/// Assembler state shared by both passes.
struct AsmContext {
    labels: HashMap<String, usize>,
    aliases: HashMap<String, u8>,
    /// First pass: unknown labels resolve to a placeholder.
    resolve_labels: bool,
}

impl AsmContext {
    fn new() -> Self {
        Self {
            labels: HashMap::new(),
            aliases: HashMap::new(),
            resolve_labels: false,
        }
    }

    fn define_label(&mut self, line: usize, name: &str, offset: usize) -> Result<(), VMError> {
        if !self.resolve_labels && self.labels.insert(name.to_string(), offset).is_some() {
            return Err(asm_error(line, format!("duplicate label @{name}")));
        }
        Ok(())
    }

    fn parse_reg(&self, line: usize, tok: &str) -> Result<u8, VMError> {
        if let Some(alias) = tok.strip_prefix(ALIAS_PREFIX) {
            return self
                .aliases
                .get(alias)
                .copied()
                .ok_or_else(|| asm_error(line, format!("unknown alias ${alias}")));
        }
        let idx = tok
            .strip_prefix('r')
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| asm_error(line, format!("expected register, got '{tok}'")))?;
        if idx as usize >= MAX_REGISTERS {
            return Err(asm_error(line, format!("register {tok} out of range")));
        }
        Ok(idx)
    }

    fn parse_offset(&self, line: usize, tok: &str) -> Result<u16, VMError> {
        if let Some(label) = tok.strip_prefix(LABEL_PREFIX) {
            if !self.resolve_labels {
                return Ok(0);
            }
            let offset = self
                .labels
                .get(label)
                .copied()
                .ok_or_else(|| asm_error(line, format!("undefined label @{label}")))?;
            return u16::try_from(offset)
                .map_err(|_| asm_error(line, format!("label @{label} is past the 64 KiB offset range")));
        }
        tok.parse::<u16>()
            .map_err(|_| asm_error(line, format!("expected offset or label, got '{tok}'")))
    }

    fn encode_operand(&self, line: usize, kind: OperandKind, tok: &str, out: &mut Vec<u8>) -> Result<(), VMError> {
        match kind {
            OperandKind::Reg => out.push(self.parse_reg(line, tok)?),
            OperandKind::Count => {
                let count = tok
                    .parse::<u8>()
                    .map_err(|_| asm_error(line, format!("expected register count, got '{tok}'")))?;
                out.push(count);
            }
            OperandKind::Offset => out.extend_from_slice(&self.parse_offset(line, tok)?.to_le_bytes()),
            OperandKind::Type => {
                let ty = VMType::parse(tok).ok_or_else(|| asm_error(line, format!("unknown type '{tok}'")))?;
                out.push(ty as u8);
            }
            OperandKind::Literal => {
                let (ty, raw) = parse_literal(tok).ok_or_else(|| asm_error(line, format!("invalid literal {tok}")))?;
                out.push(ty as u8);
                write_varint(out, raw.len() as u64);
                out.extend_from_slice(&raw);
            }
        }
        Ok(())
    }

    fn encode_instruction(&self, line: usize, op: Opcode, operands: &[Token], out: &mut Vec<u8>) -> Result<(), VMError> {
        let kinds = operand_kinds(op);
        if operands.len() != kinds.len() {
            return Err(asm_error(
                line,
                format!("{} expects {} operands, got {}", op.mnemonic(), kinds.len(), operands.len()),
            ));
        }
        out.push(op as u8);
        for (kind, tok) in kinds.iter().zip(operands) {
            self.encode_operand(line, *kind, tok.text, out)?;
        }
        Ok(())
    }

    /// Encodes one source line, appending to `out`.
    fn encode_line(&mut self, line_no: usize, tokens: &[Token], out: &mut Vec<u8>) -> Result<(), VMError> {
        let mut tokens = tokens;
        if let Some(first) = tokens.first() {
            if let Some(name) = first
                .text
                .strip_prefix(LABEL_PREFIX)
                .and_then(|t| t.strip_suffix(LABEL_SUFFIX))
            {
                if name.is_empty() {
                    return Err(asm_error(line_no, "empty label name"));
                }
                self.define_label(line_no, name, out.len())?;
                tokens = &tokens[1..];
            }
        }
        let Some(head) = tokens.first() else {
            return Ok(());
        };

        if head.text.eq_ignore_ascii_case(ALIAS_DIRECTIVE) {
            let [_, reg, alias] = tokens else {
                return Err(asm_error(line_no, "alias expects a register and a $name"));
            };
            let name = alias
                .text
                .strip_prefix(ALIAS_PREFIX)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| asm_error(line_no, format!("alias name must start with $, got '{}'", alias.text)))?;
            let idx = self.parse_reg(line_no, reg.text)?;
            self.aliases.insert(name.to_string(), idx);
            return Ok(());
        }

        let op = Opcode::from_mnemonic(head.text)
            .ok_or_else(|| asm_error(line_no, format!("unknown instruction '{}'", head.text)))?;

        if op == Opcode::ExtCall {
            if let [_, name] = tokens {
                if name.text.starts_with('"') {
                    let scratch = format!("r{EXTCALL_SCRATCH_REGISTER}");
                    let load = [
                        Token { text: &scratch, offset: name.offset },
                        name.clone(),
                    ];
                    self.encode_instruction(line_no, Opcode::Load, &load, out)?;
                    let call = [Token { text: &scratch, offset: name.offset }];
                    return self.encode_instruction(line_no, Opcode::ExtCall, &call, out);
                }
            }
        }

        self.encode_instruction(line_no, op, &tokens[1..], out)
    }
}

fn assemble_pass(ctx: &mut AsmContext, lines: &[(usize, Vec<Token>)]) -> Result<Vec<u8>, VMError> {
    ctx.aliases.clear();
    let mut bytecode = Vec::new();
    for (line_no, tokens) in lines {
        ctx.encode_line(*line_no, tokens, &mut bytecode)?;
    }
    Ok(bytecode)
}

/// Assembles a full source string into bytecode.
///
/// Pass 1 sizes every instruction with placeholder label offsets and records
/// label positions; pass 2 re-encodes with the labels resolved. Offsets are
/// fixed-width, so both passes produce the same layout.
pub fn assemble(source: &str) -> Result<Assembly, VMError> {
    let mut lines = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let tokens = tokenize(i + 1, line)?;
        if !tokens.is_empty() {
            lines.push((i + 1, tokens));
        }
    }

    let mut ctx = AsmContext::new();
    assemble_pass(&mut ctx, &lines)?;
    ctx.resolve_labels = true;
    let bytecode = assemble_pass(&mut ctx, &lines)?;

    Ok(Assembly {
        bytecode,
        labels: ctx.labels.into_iter().collect(),
    })
}

/// Convenience: assemble directly from a file path.
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Assembly, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| asm_error(0, format!("{}: {e}", path_ref.display())))?;
    assemble(&source)
}

/// Formats a compiler-style diagnostic for an assembly failure.
pub fn render_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let VMError::Assembly { line, message } = err else {
        return format!("error: {err}");
    };
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}");
    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, raw_line.trim_end_matches('\r'));
        let _ = writeln!(diag, "  |");
    }
    diag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::object::VMObject;

    #[test]
    fn tokenize_keeps_strings_and_drops_comments() {
        let tokens = tokenize(1, r#"load r1, "a # b" # trailing"#).unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["load", "r1", "\"a # b\""]);
    }

    #[test]
    fn unterminated_string_is_reported() {
        assert!(matches!(
            assemble("load r1 \"oops"),
            Err(VMError::Assembly { line: 1, .. })
        ));
    }

    #[test]
    fn literal_encoding() {
        let asm = assemble("load r2 \"hi\"").unwrap();
        assert_eq!(asm.bytecode, vec![Opcode::Load as u8, 2, VMType::String as u8, 2, b'h', b'i']);

        let asm = assemble("load r0 -1").unwrap();
        assert_eq!(asm.bytecode, vec![Opcode::Load as u8, 0, VMType::Number as u8, 1, 0xFF]);

        let asm = assemble("load r0 0xbeef\nload r1 true").unwrap();
        assert_eq!(
            asm.bytecode,
            vec![Opcode::Load as u8, 0, VMType::Bytes as u8, 2, 0xbe, 0xef, Opcode::Load as u8, 1, VMType::Bool as u8, 1, 1]
        );
    }

    #[test]
    fn forward_labels_resolve_to_absolute_offsets() {
        let asm = assemble("jmp @end\nnop\n@end: ret").unwrap();
        assert_eq!(asm.label("end"), Some(4));
        assert_eq!(asm.bytecode, vec![Opcode::Jmp as u8, 4, 0, Opcode::Nop as u8, Opcode::Ret as u8]);
    }

    #[test]
    fn undefined_and_duplicate_labels_fail() {
        assert!(matches!(assemble("jmp @nowhere"), Err(VMError::Assembly { line: 1, .. })));
        assert!(matches!(assemble("@a: nop\n@a: nop"), Err(VMError::Assembly { line: 2, .. })));
    }

    #[test]
    fn aliases_name_registers() {
        let asm = assemble("alias r4 $total\ninc $total").unwrap();
        assert_eq!(asm.bytecode, vec![Opcode::Inc as u8, 4]);
        assert!(assemble("inc $missing").is_err());
    }

    #[test]
    fn extcall_shorthand_loads_scratch_register() {
        let asm = assemble("extcall \"Runtime.Time\"").unwrap();
        let mut expected = vec![Opcode::Load as u8, EXTCALL_SCRATCH_REGISTER, VMType::String as u8, 12];
        expected.extend_from_slice(b"Runtime.Time");
        expected.extend_from_slice(&[Opcode::ExtCall as u8, EXTCALL_SCRATCH_REGISTER]);
        assert_eq!(asm.bytecode, expected);
    }

    #[test]
    fn cast_takes_type_names() {
        let asm = assemble("cast r0 r1 Number").unwrap();
        assert_eq!(asm.bytecode, vec![Opcode::Cast as u8, 0, 1, VMType::Number as u8]);
        assert!(assemble("cast r0 r1 Float").is_err());
    }

    #[test]
    fn operand_errors() {
        assert!(matches!(assemble("add r0 r1"), Err(VMError::Assembly { .. })));
        assert!(assemble("push r32").is_err());
        assert!(assemble("frobnicate r1").is_err());
    }

    #[test]
    fn literal_parser_matches_object_payloads() {
        let (ty, raw) = parse_literal("256").unwrap();
        assert_eq!(VMObject::from_raw(ty, &raw).unwrap(), VMObject::from(256i64));
        let (ty, raw) = parse_literal("\"a\\\"b\"").unwrap();
        assert_eq!(VMObject::from_raw(ty, &raw).unwrap(), VMObject::from("a\"b"));
        assert!(parse_literal("0xzz").is_none());
    }

    #[test]
    fn diagnostic_points_at_line() {
        let source = "nop\nbogus r1";
        let err = assemble(source).unwrap_err();
        let text = render_diagnostic("demo.asm", source, &err);
        assert!(text.contains("demo.asm:2"));
        assert!(text.contains("bogus r1"));
    }
}
