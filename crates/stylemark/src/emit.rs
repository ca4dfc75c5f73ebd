//! Stylesheet and manifest emission.
//!
//! The stylesheet is a single `:root` block rendered through a minijinja
//! template. Categories appear in a fixed order (colors, typography, spaces,
//! radii, borders, shadows); typography variables are grouped per `--text-NNN`
//! group and sorted by name inside the group.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{context, AutoEscape, Environment};
use once_cell::sync::Lazy;

use crate::error::Error;
use crate::tokens::{Token, TokenSet};

const TOKENS_CSS_TEMPLATE: &str =
    ":root {\n{% for token in tokens %}  {{ token.name }}: {{ token.value }};\n{% endfor %}}\n";

static CSS_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
});

/// Default locations the stylesheet is mirrored to, relative to the project
/// root.
pub const DEFAULT_CSS_MIRRORS: &[&str] = &[
    "tokens.css",
    "css/tokens.css",
    "public/css/tokens.css",
    "docs/css/tokens.css",
];

/// Parses the group ordinal out of a `--text-NNN-...` name.
fn text_group(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("--text-")?;
    let digits = rest.split('-').next()?;
    if digits.len() < 3 {
        return None;
    }
    digits.parse().ok()
}

/// Tokens in stylesheet order.
fn css_order(tokens: &TokenSet) -> Vec<&Token> {
    let mut ordered: Vec<&Token> = Vec::with_capacity(tokens.len());
    ordered.extend(&tokens.colors);

    let mut groups: BTreeMap<usize, Vec<&Token>> = BTreeMap::new();
    for token in &tokens.typography {
        if let Some(group) = text_group(&token.name) {
            groups.entry(group).or_default().push(token);
        }
    }
    for mut parts in groups.into_values() {
        parts.sort_by(|a, b| a.name.cmp(&b.name));
        ordered.extend(parts);
    }

    ordered.extend(&tokens.spaces);
    ordered.extend(&tokens.radii);
    ordered.extend(&tokens.borders);
    ordered.extend(&tokens.shadows);
    ordered
}

/// Renders the `:root` custom-property stylesheet.
pub fn render_css(tokens: &TokenSet) -> Result<String, Error> {
    let ordered = css_order(tokens);
    let css = CSS_ENV.render_str(TOKENS_CSS_TEMPLATE, context! { tokens => ordered })?;
    Ok(css)
}

/// Serializes any document as pretty JSON with a trailing newline.
pub fn render_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

fn write_file(path: &Path, contents: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a JSON document, creating parent directories.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), Error> {
    write_file(path, &render_json(value)?)
}

/// Writes the same stylesheet to every mirror path.
///
/// Returns the paths written, in order.
pub fn write_css_mirrors(css: &str, paths: &[PathBuf]) -> Result<Vec<PathBuf>, Error> {
    let mut written = Vec::with_capacity(paths.len());
    for path in paths {
        write_file(path, css)?;
        tracing::debug!(path = %path.display(), "wrote token stylesheet");
        written.push(path.clone());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenKind;

    fn token(name: &str, value: &str, kind: TokenKind) -> Token {
        Token {
            name: name.to_string(),
            value: value.to_string(),
            kind,
            frequency: 1,
            examples: Vec::new(),
        }
    }

    #[test]
    fn test_render_css_empty() {
        assert_eq!(render_css(&TokenSet::default()).unwrap(), ":root {\n}\n");
    }

    #[test]
    fn test_render_css_category_order() {
        let tokens = TokenSet {
            colors: vec![token("--color-001", "rgb(0, 0, 0)", TokenKind::Color)],
            typography: vec![
                token("--text-001-font-size", "16px", TokenKind::Text),
                token("--text-001-line-height", "24px", TokenKind::Text),
            ],
            spaces: vec![token("--space-001", "8px", TokenKind::Space)],
            radii: vec![token("--radius-001", "4px", TokenKind::Radius)],
            borders: vec![token("--border-001", "1px", TokenKind::Border)],
            shadows: vec![token(
                "--shadow-001",
                "rgba(0, 0, 0, 0.2) 0px 1px 3px 0px",
                TokenKind::Shadow,
            )],
        };
        let css = render_css(&tokens).unwrap();
        assert_eq!(
            css,
            ":root {\n  --color-001: rgb(0, 0, 0);\n  --text-001-font-size: 16px;\n  --text-001-line-height: 24px;\n  --space-001: 8px;\n  --radius-001: 4px;\n  --border-001: 1px;\n  --shadow-001: rgba(0, 0, 0, 0.2) 0px 1px 3px 0px;\n}\n"
        );
    }

    #[test]
    fn test_typography_sorted_within_group() {
        let tokens = TokenSet {
            typography: vec![
                token("--text-002-weight", "700", TokenKind::Text),
                token("--text-002-font-size", "20px", TokenKind::Text),
                token("--text-001-weight", "400", TokenKind::Text),
                token("--text-001-font-size", "16px", TokenKind::Text),
            ],
            ..Default::default()
        };
        let css = render_css(&tokens).unwrap();
        let names: Vec<_> = css
            .lines()
            .filter_map(|l| l.trim().split(':').next())
            .filter(|n| n.starts_with("--"))
            .collect();
        assert_eq!(
            names,
            vec![
                "--text-001-font-size",
                "--text-001-weight",
                "--text-002-font-size",
                "--text-002-weight"
            ]
        );
    }

    #[test]
    fn test_values_are_not_escaped() {
        let tokens = TokenSet {
            colors: vec![token("--color-001", "<&>\"'", TokenKind::Color)],
            ..Default::default()
        };
        assert!(render_css(&tokens).unwrap().contains("--color-001: <&>\"';"));
    }

    #[test]
    fn test_text_group_parsing() {
        assert_eq!(text_group("--text-007-font-size"), Some(7));
        assert_eq!(text_group("--text-1000-weight"), Some(1000));
        assert_eq!(text_group("--color-001"), None);
        assert_eq!(text_group("--text-x-weight"), None);
    }

    #[test]
    fn test_render_json_trailing_newline() {
        let json = render_json(&TokenSet::default()).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.contains("\"colors\": []"));
    }

    #[test]
    fn test_write_css_mirrors_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            dir.path().join("tokens.css"),
            dir.path().join("public/css/tokens.css"),
            dir.path().join("docs/css/tokens.css"),
        ];
        let written = write_css_mirrors(":root {\n}\n", &paths).unwrap();
        assert_eq!(written, paths);
        for path in &paths {
            assert_eq!(fs::read_to_string(path).unwrap(), ":root {\n}\n");
        }
    }

    #[test]
    fn test_write_json_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_json(&blocker.join("out.json"), &TokenSet::default()).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }
}
