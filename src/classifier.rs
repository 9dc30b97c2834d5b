//! Argument-position classification of command symbols.

use crate::symbol::{is_parameter, ArgumentMap, Symbol, SymbolKind};
use crate::syntax::{ADDRESS_HINT, LABEL_PLACEHOLDER};
use crate::tokenizer::{self, Token};

/// Normalizes the usage line of a function symbol and rebuilds its
/// label/variable argument map.
///
/// Must be rerun whenever `argument_count` is overridden.
pub fn classify(symbol: &mut Symbol) {
    if symbol.kind != SymbolKind::Function {
        return;
    }

    let mut words: Vec<String> = tokenizer::words(&symbol.usage)
        .into_iter()
        .map(|token| token.text)
        .collect();
    let mut rewritten = false;

    match words.first() {
        Some(first) if *first == symbol.label => {}
        Some(first) if !is_parameter(first) => {
            words[0] = symbol.label.clone();
            rewritten = true;
        }
        _ => {
            words.insert(0, symbol.label.clone());
            rewritten = true;
        }
    }

    let mut arguments = ArgumentMap::default();
    for (index, word) in words.iter().enumerate().skip(1) {
        if word == LABEL_PLACEHOLDER {
            arguments.label_arguments.insert(index - 1);
        } else if word.to_lowercase().contains(ADDRESS_HINT) {
            arguments.variable_arguments.insert(index - 1);
        }
    }

    let mut declared = words.iter().skip(1).filter(|word| is_parameter(word)).count();
    while declared < symbol.argument_count {
        words.push(format!("<arg{declared}>"));
        declared += 1;
        rewritten = true;
    }

    if rewritten {
        symbol.usage = words.join(" ");
    }
    symbol.arguments = arguments;
}

/// Formal parameter tokens of a usage line, with byte ranges into it.
pub fn parameters(usage: &str) -> Vec<Token> {
    tokenizer::words(usage)
        .into_iter()
        .skip(1)
        .filter(|token| is_parameter(&token.text))
        .collect()
}
