// SPDX-License-Identifier: AGPL-3.0-or-later
//! Filename handling for staged files

use std::path::Path;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// `<stem>_<unix millis>_<6 hex chars><ext>` from a sanitized `name`
pub fn generate_unique_filename(name: &str) -> String {
    let sanitized = sanitize_filename(name);
    let path = Path::new(&sanitized);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("file");
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let millis = chrono::Utc::now().timestamp_millis();
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{stem}_{millis}_{}{extension}", &id[..6])
}

/// Case-insensitive suffix match against the allowed extensions
pub fn is_valid_extension(name: &str, allowed: &[String]) -> bool {
    let name = name.to_ascii_lowercase();
    allowed
        .iter()
        .any(|ext| name.ends_with(&ext.to_ascii_lowercase()))
}

/// `name` with its extension replaced by `.docx`
pub fn docx_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    format!("{stem}.docx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my notes (v2).md"), "my_notes__v2_.md");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_filename("résumé.md"), "r_sum_.md");
        assert_eq!(sanitize_filename("ok-name_1.tex"), "ok-name_1.tex");
    }

    #[test]
    fn test_unique_filename_shape() {
        let name = generate_unique_filename("my notes.md");
        assert!(name.starts_with("my_notes_"));
        assert!(name.ends_with(".md"));

        let middle = &name["my_notes_".len()..name.len() - ".md".len()];
        let (millis, id) = middle.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unique_filenames_differ() {
        assert_ne!(
            generate_unique_filename("a.md"),
            generate_unique_filename("a.md")
        );
    }

    #[test]
    fn test_is_valid_extension() {
        let allowed = vec![".md".to_string(), ".tex".to_string()];
        assert!(is_valid_extension("notes.md", &allowed));
        assert!(is_valid_extension("NOTES.MD", &allowed));
        assert!(is_valid_extension("paper.tex", &allowed));
        assert!(!is_valid_extension("image.png", &allowed));
        assert!(!is_valid_extension("md", &allowed));
    }

    #[test]
    fn test_docx_name() {
        assert_eq!(docx_name("notes.md"), "notes.docx");
        assert_eq!(docx_name("converted"), "converted.docx");
    }
}
