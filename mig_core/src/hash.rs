//! Content hashing for text steps.
//!
//! A step's hash is computed over a normalized copy of its text: every line is
//! trimmed, blank lines and `--` comment lines are dropped, and the rest are
//! joined with `\n`. Re-indenting a migration or annotating it with comments
//! therefore does not make it look like a new step. The normalized copy is only
//! ever hashed; the database always receives the text exactly as registered.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

/// Strips formatting from `text` so that only its statements remain.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the base64 encoded MD5 digest of the normalized `text`.
///
/// Empty or comment-only text is not rejected; it hashes like the empty string.
pub fn content_hash(text: &str) -> String {
    let digest = Md5::digest(normalize(text).as_bytes());
    STANDARD.encode(digest)
}

/// Renders the first non-blank line of `text`, trimmed, marking truncation
/// with `...`.
pub fn first_line(text: &str) -> String {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    match (lines.next(), lines.next()) {
        (None, _) => String::new(),
        (Some(first), None) => first.to_string(),
        (Some(first), Some(_)) => format!("{first}..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_blank_and_comment_lines() {
        let text = "
            -- comments shouldn't affect things...
            create table t(

                survive int
            )
        ";
        assert_eq!(normalize(text), "create table t(\nsurvive int\n)");
    }

    #[test]
    fn whitespace_only_differences_hash_identically() {
        let indented = "
            --comments shouldn't affect things...
            create table test_whitespace(
                survive int
            )
        ";
        let flat = ["create table test_whitespace(", "survive int", ")"].join("\n");
        assert_eq!(content_hash(indented), content_hash(&flat));
    }

    #[test]
    fn token_changes_hash_differently() {
        assert_ne!(
            content_hash("create table t(a int)"),
            content_hash("create table t(a bigint)")
        );
    }

    #[test]
    fn inline_comments_are_part_of_the_content() {
        // Only whole-line comments are ignored.
        assert_ne!(
            content_hash("select 1"),
            content_hash("select 1 -- trailing")
        );
    }

    #[test]
    fn hash_is_a_base64_128_bit_digest() {
        let hash = content_hash("create table t(a int)");
        // 16 bytes encode to 24 base64 characters with padding.
        assert_eq!(hash.len(), 24);
        assert!(hash.ends_with("=="));
        assert_eq!(hash, content_hash("create table t(a int)"));
    }

    #[test]
    fn empty_text_is_hashed_not_rejected() {
        assert_eq!(content_hash(""), content_hash("  \n -- nothing here\n"));
        // MD5 of the empty string.
        assert_eq!(content_hash(""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn first_line_marks_truncation() {
        assert_eq!(first_line("select 1"), "select 1");
        assert_eq!(first_line("create table t(\na int)"), "create table t(...");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn first_line_skips_leading_blank_lines() {
        let text = "
            create table invoices(
                id bigserial primary key
            )
        ";
        assert_eq!(first_line(text), "create table invoices(...");
        assert_eq!(first_line("\n   select 1  \n\n"), "select 1");
        assert_eq!(first_line(" \n \n"), "");
    }
}
