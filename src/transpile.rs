//! The transpiler seam.
//!
//! The coordinator treats transpilation as an opaque capability behind the
//! `Transpiler` trait. The bundled implementation is deliberately naive: it
//! validates the source lexes and has balanced delimiters, then wraps it in
//! a JS registration stub the hot-reload client evaluates. Real code
//! generation lives elsewhere and plugs in through the same trait.

use thiserror::Error;

use crate::gml::{self, Token};

#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("parse failed: {0}")]
    Parse(#[from] gml::ScanError),
    #[error("unbalanced '{open}' opened and never closed")]
    Unclosed { open: char },
    #[error("unexpected closing '{close}'")]
    UnexpectedClose { close: char },
}

/// Input to one transpile call: the script's symbol id (its registered
/// name) and the current source text.
#[derive(Debug, Clone, Copy)]
pub struct ScriptSource<'a> {
    pub symbol_id: &'a str,
    pub source_text: &'a str,
}

/// Opaque transpile capability: source in, JS body out.
pub trait Transpiler: Send + Sync {
    fn transpile_script(&self, source: ScriptSource<'_>) -> Result<String, TranspileError>;
}

/// The bundled stub transpiler. Validates, then emits a registration
/// wrapper so patches are directly `eval`-able on the client.
#[derive(Debug, Default)]
pub struct StubTranspiler;

impl Transpiler for StubTranspiler {
    fn transpile_script(&self, source: ScriptSource<'_>) -> Result<String, TranspileError> {
        let tokens = gml::scan(source.source_text)?;
        check_balance(&tokens)?;
        Ok(format!(
            "globalThis.__gml_scripts[{:?}] = (function() {{\n{}\n}});",
            source.symbol_id, source.source_text
        ))
    }
}

fn check_balance(tokens: &[Token]) -> Result<(), TranspileError> {
    let mut stack: Vec<char> = Vec::new();
    for token in tokens {
        let Token::Punct(c) = token else { continue };
        match c {
            '(' | '[' | '{' => stack.push(*c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(open) if open == expected => {}
                    _ => return Err(TranspileError::UnexpectedClose { close: *c }),
                }
            }
            _ => {}
        }
    }
    if let Some(open) = stack.pop() {
        return Err(TranspileError::Unclosed { open });
    }
    Ok(())
}
