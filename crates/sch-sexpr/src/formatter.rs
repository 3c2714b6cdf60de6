//! Formatting helpers for S-expressions.
//!
//! The formatter is intentionally simple and fully deterministic: a list
//! whose children are all atoms is kept on one line, everything else breaks
//! one child per line with tab indentation. Serialized trees therefore only
//! change where their content changes.

use crate::Sexpr;

/// Format an S-expression tree.
///
/// The returned string includes a trailing newline.
pub fn format_tree(sexpr: &Sexpr) -> String {
    let mut out = String::new();
    write_node(sexpr, 0, &mut out);
    out.push('\n');
    out
}

fn write_node(sexpr: &Sexpr, depth: usize, out: &mut String) {
    match sexpr {
        Sexpr::List(items) if items.iter().any(Sexpr::is_list) => {
            out.push('(');
            let mut children = items.iter();
            // The leading tag stays on the opening line.
            if let Some(first) = items.first() {
                if !first.is_list() {
                    write_atom(first, out);
                    children.next();
                }
            }
            for child in children {
                out.push('\n');
                push_indent(depth + 1, out);
                write_node(child, depth + 1, out);
            }
            out.push('\n');
            push_indent(depth, out);
            out.push(')');
        }
        Sexpr::List(items) => {
            out.push('(');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(' ');
                }
                write_atom(item, out);
            }
            out.push(')');
        }
        atom => write_atom(atom, out),
    }
}

fn write_atom(sexpr: &Sexpr, out: &mut String) {
    match sexpr {
        Sexpr::Symbol(s) => out.push_str(s),
        Sexpr::String(s) => out.push_str(&quote_string(s)),
        Sexpr::Int(n) => out.push_str(&n.to_string()),
        Sexpr::F64(f) => out.push_str(&trim_float(f.to_string())),
        Sexpr::List(_) => unreachable!("lists are handled by write_node"),
    }
}

/// Quote a string value, escaping special characters.
pub fn quote_string(value: &str) -> String {
    let escaped = escape_string(value);
    let mut quoted = String::with_capacity(escaped.len() + 2);
    quoted.push('"');
    quoted.push_str(&escaped);
    quoted.push('"');
    quoted
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(ch),
        }
    }
    result
}

fn push_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn trim_float(mut s: String) -> String {
    if !s.contains('.') {
        return s;
    }

    while let Some(stripped) = s.strip_suffix('0') {
        s = stripped.to_string();
    }
    if let Some(stripped) = s.strip_suffix('.') {
        s = stripped.to_string();
    }

    if s.is_empty() { "0".to_string() } else { s }
}
