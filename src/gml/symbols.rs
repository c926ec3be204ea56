//! Symbol extraction: which names a GML file defines and which it references.
//!
//! Definitions cover named functions, `#macro`s, `globalvar`s and enums.
//! References are identifiers the file calls or reads that are neither
//! locally bound (params, `var`/`static` locals) nor GML keywords. A file
//! calling a script it also defines produces a self-reference; the
//! dependency tracker keeps those, mirroring legitimate recursive calls.
//! Builtins end up in the reference set too; that is harmless because no
//! watched file ever defines them.

use std::collections::BTreeSet;

use super::{ScanError, Token, scan};

/// GML keywords and structural words that are never symbol references.
const KEYWORDS: &[&str] = &[
    "and", "begin", "break", "case", "catch", "constructor", "continue", "default", "delete",
    "div", "do", "else", "end", "enum", "exit", "false", "finally", "for", "function", "global",
    "globalvar", "if", "mod", "new", "noone", "not", "or", "other", "repeat", "return", "self",
    "static", "switch", "then", "throw", "true", "try", "undefined", "until", "var", "while",
    "with", "xor",
];

/// Per-file extraction result. Produced fresh on every (re)transpile and
/// replaces the previous set wholesale, with no symbol-level diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolSet {
    pub definitions: BTreeSet<String>,
    pub references: BTreeSet<String>,
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.binary_search(&name).is_ok()
}

/// Extract the definition and reference sets of one GML source file.
///
/// A `ScanError` means the file is temporarily unparseable (mid-edit saves
/// are common); the caller treats it as empty sets, so a broken file loses
/// its contribution to the graph instead of crashing the watcher.
pub fn extract_symbols(source: &str) -> Result<SymbolSet, ScanError> {
    let tokens = scan(source)?;

    let mut definitions = BTreeSet::new();
    let mut locals = BTreeSet::new();
    // Token indices that are declaration-position names, not uses.
    let mut declared_at = BTreeSet::new();

    // Pass 1: definitions and locally bound names.
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Ident(word) if word == "function" => {
                // Named declaration defines a symbol; anonymous functions do not.
                if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                    definitions.insert(name.clone());
                    declared_at.insert(i + 1);
                }
                collect_params(&tokens, i + 1, &mut locals, &mut declared_at);
                i += 1;
            }
            Token::Ident(word) if word == "var" || word == "static" => {
                i = collect_declared(&tokens, i + 1, &mut locals, &mut declared_at);
            }
            Token::Ident(word) if word == "globalvar" => {
                i = collect_declared(&tokens, i + 1, &mut definitions, &mut declared_at);
            }
            Token::Ident(word) if word == "enum" => {
                if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                    definitions.insert(name.clone());
                    declared_at.insert(i + 1);
                }
                i += 1;
            }
            Token::Directive(directive) if directive == "macro" => {
                if let Some(Token::Ident(name)) = tokens.get(i + 1) {
                    definitions.insert(name.clone());
                    declared_at.insert(i + 1);
                    i += 2;
                    continue;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    // Pass 2: references. Every identifier used (not declared) that is not
    // locally bound. Own definitions stay in: that is how self-references
    // enter the graph.
    let mut references = BTreeSet::new();
    for (idx, token) in tokens.iter().enumerate() {
        let Token::Ident(name) = token else { continue };
        if is_keyword(name) || declared_at.contains(&idx) || locals.contains(name) {
            continue;
        }
        // Member access (`global.foo`, `inst.hp`) is not a script reference.
        if idx > 0 && tokens[idx - 1] == Token::Punct('.') {
            continue;
        }
        references.insert(name.clone());
    }

    Ok(SymbolSet {
        definitions,
        references,
    })
}

/// Collect parameter names of a function declaration starting near `from`
/// (the token after `function`). Default-value expressions are skipped.
fn collect_params(
    tokens: &[Token],
    from: usize,
    out: &mut BTreeSet<String>,
    declared_at: &mut BTreeSet<usize>,
) {
    // Find the opening paren, allowing an optional function name in between.
    let mut i = from;
    for _ in 0..2 {
        match tokens.get(i) {
            Some(Token::Punct('(')) => break,
            Some(Token::Ident(_)) => i += 1,
            _ => return,
        }
    }
    if tokens.get(i) != Some(&Token::Punct('(')) {
        return;
    }

    let mut depth = 1;
    let mut at_param_start = true;
    i += 1;
    while i < tokens.len() && depth > 0 {
        match &tokens[i] {
            Token::Punct('(') | Token::Punct('[') | Token::Punct('{') => depth += 1,
            Token::Punct(')') | Token::Punct(']') | Token::Punct('}') => depth -= 1,
            Token::Punct(',') if depth == 1 => at_param_start = true,
            Token::Ident(name) if depth == 1 && at_param_start => {
                if !is_keyword(name) {
                    out.insert(name.clone());
                    declared_at.insert(i);
                }
                at_param_start = false;
            }
            _ => {}
        }
        i += 1;
    }
}

/// Collect names from a `var`/`static`/`globalvar` declaration list starting
/// at `from`. Initializer expressions are skipped up to the next `,` or `;`
/// at the declaration's own nesting depth. Returns the index to resume at.
fn collect_declared(
    tokens: &[Token],
    from: usize,
    out: &mut BTreeSet<String>,
    declared_at: &mut BTreeSet<usize>,
) -> usize {
    let mut i = from;
    loop {
        match tokens.get(i) {
            Some(Token::Ident(name)) if !is_keyword(name) => {
                out.insert(name.clone());
                declared_at.insert(i);
                i += 1;
            }
            _ => return i,
        }

        // Skip an optional initializer.
        if tokens.get(i) == Some(&Token::Punct('=')) {
            let mut depth = 0usize;
            i += 1;
            while let Some(token) = tokens.get(i) {
                match token {
                    Token::Punct('(') | Token::Punct('[') | Token::Punct('{') => depth += 1,
                    Token::Punct(')') | Token::Punct(']') | Token::Punct('}') => {
                        if depth == 0 {
                            return i;
                        }
                        depth -= 1;
                    }
                    Token::Punct(',') if depth == 0 => break,
                    Token::Punct(';') if depth == 0 => return i,
                    _ => {}
                }
                i += 1;
            }
        }

        match tokens.get(i) {
            Some(Token::Punct(',')) => i += 1,
            _ => return i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(set: &SymbolSet) -> Vec<&str> {
        set.definitions.iter().map(String::as_str).collect()
    }

    fn refs(set: &SymbolSet) -> Vec<&str> {
        set.references.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_function_definition_and_call_reference() {
        let set = extract_symbols("function scr_attack(target) { scr_damage(target); }")
            .expect("extract");
        assert_eq!(defs(&set), vec!["scr_attack"]);
        assert_eq!(refs(&set), vec!["scr_damage"], "param must not be a reference");
    }

    #[test]
    fn test_macro_globalvar_and_enum_definitions() {
        let src = "#macro MAX_HP 100\nglobalvar score, combo;\nenum Dir { Left, Right }";
        let set = extract_symbols(src).expect("extract");
        assert_eq!(defs(&set), vec!["Dir", "MAX_HP", "combo", "score"]);
    }

    #[test]
    fn test_var_locals_are_not_references() {
        let src = "function scr_roll() { var a = irandom(6), b = a + 1; return b; }";
        let set = extract_symbols(src).expect("extract");
        assert_eq!(refs(&set), vec!["irandom"]);
    }

    #[test]
    fn test_member_access_is_not_a_reference() {
        let set = extract_symbols("global.score = hero.hp;").expect("extract");
        assert_eq!(refs(&set), vec!["hero"]);
    }

    #[test]
    fn test_recursive_call_is_a_self_reference() {
        let set = extract_symbols("function fib(n) { return fib(n - 1); }").expect("extract");
        assert_eq!(defs(&set), vec!["fib"]);
        assert_eq!(refs(&set), vec!["fib"], "the call site counts, the declaration does not");
    }

    #[test]
    fn test_unused_definition_is_not_a_reference() {
        let set = extract_symbols("function scr_init() { }").expect("extract");
        assert_eq!(defs(&set), vec!["scr_init"]);
        assert!(set.references.is_empty());
    }

    #[test]
    fn test_anonymous_function_defines_nothing() {
        let set = extract_symbols("callback = function(x) { return x; };").expect("extract");
        assert!(set.definitions.is_empty());
        assert_eq!(refs(&set), vec!["callback"]);
    }

    #[test]
    fn test_zero_definitions_is_valid() {
        // Pure side-effect script: contributes references only.
        let set = extract_symbols("scr_spawn_wave(3);").expect("extract");
        assert!(set.definitions.is_empty());
        assert_eq!(refs(&set), vec!["scr_spawn_wave"]);
    }

    #[test]
    fn test_parse_failure_propagates() {
        let err = extract_symbols("function broken() { /* no end").unwrap_err();
        assert!(matches!(err, ScanError::UnterminatedComment { .. }));
    }
}
