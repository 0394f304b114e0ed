// file: src/parser/patterns.rs
// description: compiled regex patterns for filename parsing
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CNJ process number in its loose form, anchored at the start of the
    // filename: 4-7 digits, then .DD.DDDD.D.DD.DDDD
    pub static ref CNJ_LOOSE: Regex = Regex::new(
        r"^(\d{4,7}\.\d{2}\.\d{4}\.\d\.\d{2}\.\d{4})"
    ).expect("CNJ_LOOSE regex is valid");

    // Embedded _CodProc_CodPet_ token pairing principals with attachments
    pub static ref CODE_PAIR: Regex = Regex::new(
        r"_(\d+)_(\d+)_"
    ).expect("CODE_PAIR regex is valid");

    pub static ref PDF_EXTENSION: Regex = Regex::new(
        r"(?i)\.pdf$"
    ).expect("PDF_EXTENSION regex is valid");

    // Characters not allowed in a normalized filename
    pub static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(
        r"[^A-Za-z0-9._-]"
    ).expect("UNSAFE_FILENAME_CHARS regex is valid");

    // Stricter set for permanent-archive names (no underscores kept)
    pub static ref ARCHIVE_UNSAFE_CHARS: Regex = Regex::new(
        r"[^A-Za-z0-9.-]"
    ).expect("ARCHIVE_UNSAFE_CHARS regex is valid");

    pub static ref UNDERSCORE_RUNS: Regex = Regex::new(
        r"_+"
    ).expect("UNDERSCORE_RUNS regex is valid");
}
