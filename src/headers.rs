//! Column and table names
//!
//! Header rows are legalized into identifiers the backend accepts; files without a
//! header row get spreadsheet-style names (`A`, `B`, ..., `Z`, `AA`, ...).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static ILLEGAL_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_$]").unwrap());

static LEGAL_NAME_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$]").unwrap());

const RESERVED_NAMES: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "false",
    "final", "finally", "float", "for", "goto", "if", "implements", "import", "in",
    "instanceof", "int", "interface", "long", "native", "new", "not", "null", "package",
    "private", "protected", "public", "return", "short", "static", "strictfp", "super",
    "switch", "synchronized", "this", "throw", "throws", "transient", "true", "try",
    "void", "volatile", "while", "i", "ii", "k",
];

/// Generate `num_columns` header names: `A..Z`, `AA..AZ`, `BA..BZ`, ..., `AAA..`
pub fn generate_headers(num_columns: usize) -> Vec<String> {
    (0..num_columns).map(spreadsheet_name).collect()
}

fn spreadsheet_name(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// Turn a header row into unique, legal column names
pub fn legalize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .iter()
        .map(|name| {
            let legal = legalize_name(name.as_ref(), "column");
            let unique = dedupe(legal, &taken);
            taken.insert(unique.clone());
            unique
        })
        .collect()
}

/// Legal table name derived from arbitrary text, typically a file stem
pub fn legalize_table_name(name: &str) -> String {
    legalize_name(name, "table")
}

/// Headers for a run: legalized from the first row, or generated to match its width
pub fn resolve_headers(first_row: &[String], read_headers: bool) -> Vec<String> {
    if read_headers {
        legalize_column_names(first_row)
    } else {
        generate_headers(first_row.len())
    }
}

fn legalize_name(name: &str, prefix: &str) -> String {
    let replaced = ILLEGAL_NAME_CHARS.replace_all(name.trim(), "_");
    let mut legal = if replaced.is_empty() {
        prefix.to_string()
    } else if !LEGAL_NAME_START.is_match(&replaced) {
        format!("{}_{}", prefix, replaced)
    } else {
        replaced.into_owned()
    };

    if RESERVED_NAMES.contains(&legal.to_ascii_lowercase().as_str()) {
        legal.push('_');
    }
    legal
}

fn dedupe(name: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&name) {
        return name;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", name, suffix);
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_headers() {
        assert!(generate_headers(0).is_empty());
        assert_eq!(generate_headers(26).join(""), "ABCDEFGHIJKLMNOPQRSTUVWXYZ");

        let headers = generate_headers(26 + 26 * 26 + 1);
        assert_eq!(headers[26], "AA");
        assert_eq!(headers[51], "AZ");
        assert_eq!(headers[52], "BA");
        assert_eq!(headers[26 + 26 * 26 - 1], "ZZ");
        assert_eq!(headers[26 + 26 * 26], "AAA");
    }

    #[test]
    fn test_generate_headers_idempotent() {
        assert_eq!(generate_headers(100), generate_headers(100));
    }

    #[test]
    fn test_legalize_column_names() {
        let names = legalize_column_names(&[
            " First Name ", "2nd", "class", "price($)", "", "First_Name", "",
        ]);
        assert_eq!(
            names,
            vec![
                "First_Name",
                "column_2nd",
                "class_",
                "price_$_",
                "column",
                "First_Name_2",
                "column_2",
            ]
        );
    }

    #[test]
    fn test_legalize_table_name() {
        assert_eq!(legalize_table_name("sales 2024"), "sales_2024");
        assert_eq!(legalize_table_name("2024-sales"), "table_2024_sales");
        assert_eq!(legalize_table_name(""), "table");
    }

    #[test]
    fn test_resolve_headers() {
        let row = vec!["a".to_string(), "b c".to_string()];
        assert_eq!(resolve_headers(&row, true), vec!["a", "b_c"]);
        assert_eq!(resolve_headers(&row, false), vec!["A", "B"]);
    }
}
