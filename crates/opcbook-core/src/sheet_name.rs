//! Sheet naming rules
//!
//! Sheet names are 1-31 characters long, may not contain `: \ / ? * [ ]`,
//! may not start or end with an apostrophe, and are unique within a
//! workbook ignoring case.

use crate::error::{Error, Result};
use crate::MAX_SHEET_NAME_LEN;

const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

/// Validate a sheet name against the naming rules.
///
/// Uniqueness is checked separately with [`is_unique_against`].
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 {
        return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
    }
    if len > MAX_SHEET_NAME_LEN {
        return Err(Error::InvalidSheetName(format!(
            "'{}' is too long (max {} characters)",
            name, MAX_SHEET_NAME_LEN
        )));
    }

    if let Some((i, c)) = name.chars().enumerate().find(|(_, c)| INVALID_CHARS.contains(c)) {
        return Err(Error::InvalidSheetName(format!(
            "invalid char ({}) found at index ({}) in '{}'",
            c, i, name
        )));
    }

    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(Error::InvalidSheetName(format!(
            "'{}' cannot start or end with an apostrophe",
            name
        )));
    }

    Ok(())
}

/// Check that `name` does not collide (case-insensitively) with any of
/// `existing`, skipping the entry at `excluding`.
pub fn is_unique_against<'a, I>(existing: I, name: &str, excluding: Option<usize>) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let name_lower = name.to_lowercase();
    !existing
        .into_iter()
        .enumerate()
        .any(|(i, other)| Some(i) != excluding && other.to_lowercase() == name_lower)
}

/// Compute the name used for a copy of the sheet named `source`.
///
/// Appends `(n)` for `n = 1, 2, ...` until `exists` reports the candidate as
/// free. The base name is cut short when needed so the result never exceeds
/// [`MAX_SHEET_NAME_LEN`] characters.
pub fn unique_clone_name<F>(source: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut n: u32 = 1;
    loop {
        let suffix = format!("({})", n);
        let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let base: String = source.chars().take(room).collect();
        let candidate = format!("{}{}", base, suffix);
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_sheet_name("Sheet1").is_ok());
        assert!(validate_sheet_name("Q1 2024 (draft)").is_ok());
        assert!(validate_sheet_name("it's fine").is_ok());
        assert!(validate_sheet_name(&"A".repeat(MAX_SHEET_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name(&"A".repeat(MAX_SHEET_NAME_LEN + 1)).is_err());
        for bad in ["a/b", "a\\b", "a?b", "a*b", "a[b", "a]b", "a:b"] {
            assert!(validate_sheet_name(bad).is_err(), "{bad} should be rejected");
        }
        assert!(validate_sheet_name("'quoted").is_err());
        assert!(validate_sheet_name("quoted'").is_err());
    }

    #[test]
    fn test_length_counts_chars() {
        // 31 multi-byte characters are still a legal name
        let name = "é".repeat(MAX_SHEET_NAME_LEN);
        assert!(validate_sheet_name(&name).is_ok());
    }

    #[test]
    fn test_unique_case_insensitive() {
        let names = ["Data", "Summary"];
        assert!(!is_unique_against(names, "data", None));
        assert!(!is_unique_against(names, "SUMMARY", None));
        assert!(is_unique_against(names, "Other", None));
        // renaming a sheet to its own name in another case is allowed
        assert!(is_unique_against(names, "DATA", Some(0)));
    }

    #[test]
    fn test_clone_name_suffix() {
        let taken = ["Data", "Data(1)"];
        let name = unique_clone_name("Data", |c| taken.contains(&c));
        assert_eq!(name, "Data(2)");
    }

    #[test]
    fn test_clone_name_truncates() {
        let source = "X".repeat(MAX_SHEET_NAME_LEN);
        let mut taken: Vec<String> = vec![source.clone()];
        for _ in 0..12 {
            let name = unique_clone_name(&source, |c| taken.iter().any(|t| t == c));
            assert!(name.chars().count() <= MAX_SHEET_NAME_LEN, "{name}");
            assert!(!taken.contains(&name));
            taken.push(name);
        }
        assert_eq!(taken[1], format!("{}(1)", "X".repeat(28)));
        assert_eq!(taken[10], format!("{}(10)", "X".repeat(27)));
    }
}
