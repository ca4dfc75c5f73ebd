//! End-to-end tests: fake probe -> inventory -> tokenize -> files on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use stylemark::{
    collect_inventory, tokenize, write_json, ElementSample, EnvOverrides, ProbeError,
    ProbeRequest, Rect, RoleSelectors, SamplerConfig, Settings, StyleProbe, TokenSet,
    TokenizeOptions, Viewport,
};

/// Serves a fixed element list for every page; typography varies by role.
struct SiteProbe;

fn element(class: &str, styles: &[(&str, &str)]) -> ElementSample {
    ElementSample {
        tag: "div".to_string(),
        id: String::new(),
        first_class: class.to_string(),
        rect: Rect {
            x: 0.0,
            y: 0.0,
            width: 320.3,
            height: 48.0,
        },
        styles: styles
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

impl StyleProbe for SiteProbe {
    fn probe(
        &mut self,
        request: &ProbeRequest<'_>,
    ) -> Result<BTreeMap<String, Vec<ElementSample>>, ProbeError> {
        if request.url.ends_with("/missing") {
            return Err(ProbeError::new("404 while navigating"));
        }
        let body = [
            ("color", "rgb(17, 17, 17)"),
            ("backgroundColor", "rgba(0, 0, 0, 0)"),
            ("fontSize", "16px"),
            ("lineHeight", "24px"),
            ("letterSpacing", "normal"),
            ("fontWeight", "400"),
            ("fontStyle", "normal"),
            ("textTransform", "none"),
            ("marginTop", "16px"),
            ("paddingLeft", "15.8px"),
            ("borderTopLeftRadius", "4px"),
            ("borderTopWidth", "1px"),
            ("boxShadow", "none"),
        ];
        let mut heading = body;
        heading[2] = ("fontSize", "32px");
        heading[3] = ("lineHeight", "40px");
        heading[5] = ("fontWeight", "700");

        let mut out = BTreeMap::new();
        out.insert(
            "body".to_string(),
            vec![element("a", &body), element("b", &body), element("c", &body)],
        );
        out.insert(
            "heading".to_string(),
            vec![element("h", &heading), element("i", &heading)],
        );
        Ok(out)
    }
}

fn roles() -> RoleSelectors {
    [("body", vec!["p"]), ("heading", vec!["h1", "h2"])]
        .into_iter()
        .collect()
}

fn run(root: &Path, pages: &[&str]) -> TokenSet {
    let config = SamplerConfig {
        pages: pages.iter().map(|p| p.to_string()).collect(),
        viewports: vec![Viewport::new("desktop", 1440, 900)],
        base_url: None,
    };
    let settings = Settings::resolve(&config, &EnvOverrides::default(), root);
    let report = collect_inventory(&mut SiteProbe, &settings, &roles()).unwrap();
    let options = TokenizeOptions::for_root(root);
    write_json(&options.input, &report.records).unwrap();
    tokenize(&options).unwrap()
}

#[test]
fn test_typography_groups_by_joint_tuple() {
    let dir = tempfile::tempdir().unwrap();
    let tokens = run(dir.path(), &["/"]);
    assert_eq!(tokens.typography_groups(), 2);
    assert_eq!(tokens.typography[0].name, "--text-001-font-size");
    assert_eq!(tokens.typography[0].value, "16px");
    assert_eq!(tokens.typography[0].frequency, 3);
    assert_eq!(tokens.typography[6].value, "32px");
    assert_eq!(tokens.typography[6].frequency, 2);
}

#[test]
fn test_spacing_is_normalized_and_merged() {
    let dir = tempfile::tempdir().unwrap();
    let tokens = run(dir.path(), &["/"]);
    let spaces: Vec<_> = tokens
        .spaces
        .iter()
        .map(|t| (t.name.as_str(), t.value.as_str(), t.frequency))
        .collect();
    assert_eq!(spaces, vec![("--space-001", "16px", 10)]);
}

#[test]
fn test_outputs_are_byte_identical_across_runs() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    run(first.path(), &["/", "/about"]);
    run(second.path(), &["/about", "/"]);
    for file in [
        "tokens.candidates.json",
        "tokens.css",
        "docs/css/tokens.css",
        "artifacts/style-inventory.dedup.json",
    ] {
        let a = fs::read(first.path().join(file)).unwrap();
        let b = fs::read(second.path().join(file)).unwrap();
        assert_eq!(a, b, "{} differs between runs", file);
    }
}

#[test]
fn test_css_mirrors_match() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path(), &["/"]);
    let root_css = fs::read_to_string(dir.path().join("tokens.css")).unwrap();
    assert!(root_css.starts_with(":root {\n  --color-001: rgb(17, 17, 17);\n"));
    for mirror in ["css/tokens.css", "public/css/tokens.css", "docs/css/tokens.css"] {
        assert_eq!(
            fs::read_to_string(dir.path().join(mirror)).unwrap(),
            root_css
        );
    }
}

#[test]
fn test_failed_route_does_not_stop_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = SamplerConfig {
        pages: vec!["/".into(), "/missing".into()],
        viewports: vec![Viewport::new("mobile", 390, 844)],
        base_url: Some("http://127.0.0.1:8080".into()),
    };
    let settings = Settings::resolve(&config, &EnvOverrides::default(), dir.path());
    let report = collect_inventory(&mut SiteProbe, &settings, &roles()).unwrap();
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].route, "/missing");
    assert!(report.summary(&roles()).contains("route errors: 1"));
}
