//! Sheet-name quoting for formula text.

use crate::address::name_to_col_index;

/// Returns true if `name` must be wrapped in single quotes when used as a sheet prefix.
///
/// Unquoted names may contain letters, digits, `_` and `.`, must not start with a digit,
/// and must not read as a cell reference (`A1`) or as an R1C1-style token (`R`, `C`, `R1C1`).
pub fn sheet_name_needs_quotes(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    if first.is_ascii_digit() || first == '.' {
        return true;
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return true;
    }
    looks_like_a1(name) || looks_like_r1c1(name)
}

/// Quote `name` if required, doubling embedded apostrophes.
pub fn quote_sheet_name(name: &str) -> String {
    if !sheet_name_needs_quotes(name) {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('\'');
    for ch in name.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Prefix for a sheet span (`Sheet1:Sheet3`), quoted as a whole when either side needs it.
pub fn format_sheet_span(first: &str, last: &str) -> String {
    if first == last {
        return quote_sheet_name(first);
    }
    if sheet_name_needs_quotes(first) || sheet_name_needs_quotes(last) {
        let joined = format!("{first}:{last}");
        let mut out = String::from("'");
        out.push_str(&joined.replace('\'', "''"));
        out.push('\'');
        out
    } else {
        format!("{first}:{last}")
    }
}

fn looks_like_a1(name: &str) -> bool {
    let letters: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &name[letters.len()..];
    !letters.is_empty()
        && letters.len() <= 3
        && !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && name_to_col_index(&letters).is_some_and(|c| c < 16_384)
}

fn looks_like_r1c1(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    if upper == "R" || upper == "C" {
        return true;
    }
    let Some(rest) = upper.strip_prefix('R') else {
        return false;
    };
    let row_digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let rest = &rest[row_digits..];
    match rest.strip_prefix('C') {
        Some(col) => col.chars().all(|c| c.is_ascii_digit()),
        None => rest.is_empty() && row_digits > 0,
    }
}
