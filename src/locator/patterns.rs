//! Definition pattern catalog.
//!
//! Every pattern runs in multi-line mode so `^` and `$` anchor at line
//! boundaries of the searched text. The same pattern text is fed to both the
//! embedded engine and ripgrep, which share the `regex` crate syntax.

use crate::types::{DefinitionKind, PatternEntry};

/// Horizontal whitespace only; a bare `\s` would silently span lines.
const WS: &str = r"[ \t]";

/// End of an identifier: end of line or any non-identifier character.
/// Haskell identifiers may contain primes, so `Foo` must not match `Foo'`.
const IDENT_END: &str = r"(?:[^\w'\n]|$)";

/// Body of a declaration: anything on the current line, or a line break
/// followed by indentation (a continuation line).
const DECL_BODY: &str = r"(?:[^\n]|\n[ \t])*?";

/// Gap between `=`/`|` and a constructor name, allowed to wrap onto an
/// indented continuation line.
const CON_GAP: &str = r"(?:[ \t\r]|\n[ \t])*";

/// Build the ordered pattern catalog for `identifier`.
///
/// The identifier is escaped before interpolation, so operator-like names
/// and stray metacharacters are matched literally.
pub fn build_patterns(identifier: &str) -> Vec<PatternEntry> {
    let id = regex::escape(identifier);

    DefinitionKind::ALL
        .iter()
        .map(|&kind| PatternEntry {
            kind,
            pattern: pattern_for(kind, &id),
        })
        .collect()
}

fn pattern_for(kind: DefinitionKind, id: &str) -> String {
    match kind {
        DefinitionKind::SignatureSameLine => format!(r"(?m)^{id}{WS}*::"),
        DefinitionKind::SignatureNextLine => format!(r"(?m)^{id}{WS}*\r?\n{WS}*::"),
        DefinitionKind::Assignment => format!(r"(?m)^{id}{WS}*="),
        DefinitionKind::DataDecl => format!(r"(?m)^data{WS}+{id}{IDENT_END}"),
        DefinitionKind::TypeDecl => format!(r"(?m)^type{WS}+{id}{IDENT_END}"),
        DefinitionKind::NewtypeDecl => format!(r"(?m)^newtype{WS}+{id}{IDENT_END}"),
        // Optional single-line superclass context: `class (Eq a) => Ord a`
        DefinitionKind::ClassDecl => {
            format!(r"(?m)^class{WS}+(?:[^\n=]*=>{WS}*)?{id}{IDENT_END}")
        }
        DefinitionKind::Constructor => format!(
            r"(?m)^(?:data|newtype){WS}+{DECL_BODY}[=|]{CON_GAP}{id}{IDENT_END}"
        ),
        DefinitionKind::TypeFamily => format!(r"(?m)^type{WS}+family{WS}+{id}{IDENT_END}"),
        DefinitionKind::DataFamily => format!(r"(?m)^data{WS}+family{WS}+{id}{IDENT_END}"),
        DefinitionKind::PatternSynonym => format!(r"(?m)^pattern{WS}+{id}{WS}*::"),
    }
}
