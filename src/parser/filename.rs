// file: src/parser/filename.rs
// description: parses PDF filenames into structured process/document metadata

use crate::models::FileDescriptor;
use crate::parser::patterns::{
    CNJ_LOOSE, CODE_PAIR, PDF_EXTENSION, UNDERSCORE_RUNS, UNSAFE_FILENAME_CHARS,
};
use unicode_normalization::UnicodeNormalization;

/// Principal codes live in this range; anything above the upper bound is a
/// petition code. The thresholds come from the upstream filing system's
/// naming convention and which document gets submitted as the petition of
/// record depends on them.
const PRINCIPAL_CODE_MIN: u32 = 1;
const PRINCIPAL_CODE_MAX: u32 = 50_000;

const DEFAULT_DESCRIPTION: &str = "Sem descrição";

/// Parses a PDF filename into a [`FileDescriptor`]. Never fails: every
/// problem is reported through `is_valid` / `error_message`. Only the
/// process number is mandatory; codes and description are best-effort.
pub fn parse(file_name: &str) -> FileDescriptor {
    let Some(cnj_raw) = extract_cnj(file_name) else {
        return invalid(file_name, String::new(), "CNJ not found in filename");
    };

    let cnj = match canonicalize_cnj(&cnj_raw) {
        Ok(cnj) => cnj,
        Err(reason) => return invalid(file_name, cnj_raw, &reason),
    };

    let (principal_code, petition_code) = extract_codes(file_name);

    FileDescriptor {
        original_name: file_name.to_string(),
        normalized_name: normalize_filename(file_name),
        court_code: court_code(&cnj_raw),
        cnj_raw,
        cnj,
        principal_code,
        petition_code,
        description: extract_description(file_name),
        is_valid: true,
        error_message: None,
    }
}

fn invalid(file_name: &str, cnj_raw: String, reason: &str) -> FileDescriptor {
    FileDescriptor {
        original_name: file_name.to_string(),
        normalized_name: normalize_filename(file_name),
        cnj_raw,
        cnj: String::new(),
        principal_code: None,
        petition_code: None,
        description: extract_description(file_name),
        court_code: None,
        is_valid: false,
        error_message: Some(reason.to_string()),
    }
}

fn extract_cnj(file_name: &str) -> Option<String> {
    CNJ_LOOSE
        .captures(file_name)
        .map(|caps| caps[1].to_string())
}

/// Expands a loose CNJ number (e.g. `5757.95.2025.8.09.0051`) into the
/// canonical 25-character form `0005757-95.2025.8.09.0051`: the sequential
/// block is left-padded to 7 digits and rejoined with a hyphen after it.
pub fn canonicalize_cnj(loose: &str) -> Result<String, String> {
    let cleaned: String = loose
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let parts: Vec<&str> = cleaned.split('.').collect();
    if parts.len() != 6 {
        return Err(format!(
            "invalid CNJ: expected 6 dot-separated blocks, found {}",
            parts.len()
        ));
    }

    let first_block = format!("{:0>7}", parts[0]);
    let canonical = format!("{}-{}", first_block, parts[1..].join("."));

    if canonical.len() != 25 {
        return Err(format!(
            "invalid canonical CNJ: expected 25 characters, got {}",
            canonical.len()
        ));
    }

    Ok(canonical)
}

/// Justice branch and court blocks of the loose CNJ, e.g. `8.09` for TJGO.
fn court_code(loose: &str) -> Option<String> {
    let parts: Vec<&str> = loose.split('.').collect();
    if parts.len() != 6 {
        return None;
    }
    Some(format!("{}.{}", parts[3], parts[4]))
}

/// Splits the first `_n1_n2_` token into (principal code, petition code).
/// A value in `[1, 50000]` is a principal code, a value above 50000 a
/// petition code; when the straight assignment fails the swapped
/// orientation is tried per number, and an unmatched side stays unset.
fn extract_codes(file_name: &str) -> (Option<u32>, Option<u32>) {
    let Some(caps) = CODE_PAIR.captures(file_name) else {
        return (None, None);
    };

    let n1: Option<u32> = caps[1].parse().ok();
    let n2: Option<u32> = caps[2].parse().ok();

    let in_principal_range = |n: u32| (PRINCIPAL_CODE_MIN..=PRINCIPAL_CODE_MAX).contains(&n);

    let mut principal = n1.filter(|n| in_principal_range(*n));
    let mut petition = n2.filter(|n| *n > PRINCIPAL_CODE_MAX);

    if principal.is_none() {
        principal = n2.filter(|n| in_principal_range(*n));
    }
    if petition.is_none() {
        petition = n1.filter(|n| *n > PRINCIPAL_CODE_MAX);
    }

    (principal, petition)
}

fn extract_description(file_name: &str) -> String {
    let desc = PDF_EXTENSION.replace(file_name, "");
    let desc = CNJ_LOOSE.replace(&desc, "");
    let desc = CODE_PAIR.replacen(&desc, 1, "");
    let desc = desc.trim_matches('_');
    let desc = UNDERSCORE_RUNS.replace_all(desc, " ");
    let desc = desc.trim();

    if desc.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        desc.to_string()
    }
}

/// Accent-stripped, filesystem-safe rendition of a filename: NFD
/// decomposition, combining marks dropped, everything outside
/// `[A-Za-z0-9._-]` replaced with `_`.
pub fn normalize_filename(file_name: &str) -> String {
    let decomposed: String = file_name
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    UNSAFE_FILENAME_CHARS.replace_all(&decomposed, "_").into_owned()
}
