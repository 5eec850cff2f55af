//! `%(KEY)s` placeholder compilation

use once_cell::sync::Lazy;
use regex::Regex;
use wakalib_core::{Params, WakalibError};

use super::BoundStatement;

/// Regex for everything starting with `%`:
/// 1 = `%%` escape, 2 = name, 3 = closing paren, 4 = format after name,
/// 5 = positional format
static PLACEHOLDER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:(%)|\(([^)]*)(\))?([A-Za-z])?|([A-Za-z]))?").unwrap()
});

const FORMATS: [&str; 3] = ["s", "b", "t"];

/// Compile a statement with `%(KEY)s` placeholders into positional form
///
/// Each distinct name becomes `$n` in order of first appearance and its value
/// is bound by the driver. With no params the statement is passed through
/// verbatim, but any named placeholder in it is an error.
pub fn compile(sql: &str, params: Option<&Params>) -> Result<BoundStatement, WakalibError> {
    match params {
        Some(params) if !params.is_empty() => compile_named(sql, params),
        _ => compile_raw(sql),
    }
}

fn compile_raw(sql: &str) -> Result<BoundStatement, WakalibError> {
    for cap in PLACEHOLDER_PATTERN.captures_iter(sql) {
        if let (Some(name), Some(_)) = (cap.get(2), cap.get(3)) {
            return Err(WakalibError::InvalidArgument(format!(
                "statement references placeholder '%({})s' but no params were given",
                name.as_str()
            )));
        }
    }
    Ok(BoundStatement::new(sql, Vec::new()))
}

fn compile_named(sql: &str, params: &Params) -> Result<BoundStatement, WakalibError> {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<&str> = Vec::new();
    let mut last = 0;

    for cap in PLACEHOLDER_PATTERN.captures_iter(sql) {
        let whole = cap.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
        out.push_str(&sql[last..whole.0]);
        last = whole.1;

        if cap.get(1).is_some() {
            out.push('%');
        } else if let Some(name) = cap.get(2) {
            let name = name.as_str();
            if cap.get(3).is_none() {
                return Err(WakalibError::InvalidArgument(format!(
                    "unterminated placeholder '%({}' at byte {}",
                    name, whole.0
                )));
            }
            if name.is_empty() {
                return Err(WakalibError::InvalidArgument(format!(
                    "empty placeholder name at byte {}",
                    whole.0
                )));
            }
            match cap.get(4).map(|m| m.as_str()) {
                Some(format) if FORMATS.contains(&format) => {}
                _ => {
                    return Err(WakalibError::InvalidArgument(format!(
                        "placeholder '%({})' must be followed by 's', 'b' or 't'",
                        name
                    )))
                }
            }
            if !params.contains_key(name) {
                return Err(WakalibError::InvalidArgument(format!(
                    "placeholder '%({})s' has no matching param",
                    name
                )));
            }

            let index = match names.iter().position(|n| *n == name) {
                Some(i) => i,
                None => {
                    names.push(name);
                    names.len() - 1
                }
            };
            out.push('$');
            out.push_str(&(index + 1).to_string());
        } else if let Some(format) = cap.get(5) {
            let format = format.as_str();
            return Err(WakalibError::InvalidArgument(if FORMATS.contains(&format) {
                format!(
                    "positional placeholder '%{}' cannot be used with named params",
                    format
                )
            } else {
                format!("unsupported placeholder '%{}'", format)
            }));
        } else {
            return Err(WakalibError::InvalidArgument(format!(
                "stray '%' at byte {}; use '%%' for a literal percent sign",
                whole.0
            )));
        }
    }
    out.push_str(&sql[last..]);

    let mut unused: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !names.contains(k))
        .collect();
    if !unused.is_empty() {
        unused.sort_unstable();
        return Err(WakalibError::InvalidArgument(format!(
            "params not referenced by any placeholder: {}",
            unused.join(", ")
        )));
    }

    let args = names.iter().map(|n| params[*n].clone()).collect();
    Ok(BoundStatement::new(out, args))
}
