//! Sampler configuration: routes, viewports, base URL and role selectors.
//!
//! Configuration is layered:
//!
//! 1. `sanitize.config.json` if present, else `phase2.config.json`; when
//!    neither exists the defaults are written to `phase2.config.json` so the
//!    user has something to edit.
//! 2. Environment overrides ([`EnvOverrides`]): `PHASE2_BASE_URL` supplies
//!    the base URL when the file has none, `PAGE_FILTER` and `PAGE_LIMIT`
//!    narrow the route list.
//!
//! Role selectors live in `style.roles.json` and are required.
//!
//! Reference mode samples a deployed site instead of the local export and
//! reads `reference.config.json` (see [`load_reference_settings`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::emit::write_json;
use crate::error::Error;

pub const SANITIZE_CONFIG_FILE: &str = "sanitize.config.json";
pub const PHASE2_CONFIG_FILE: &str = "phase2.config.json";
pub const ROLES_FILE: &str = "style.roles.json";
pub const REFERENCE_CONFIG_FILE: &str = "reference.config.json";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// A named browser viewport size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub w: u32,
    #[serde(default)]
    pub h: u32,
}

impl Viewport {
    pub fn new(name: impl Into<String>, w: u32, h: u32) -> Self {
        Self {
            name: name.into(),
            w,
            h,
        }
    }

    fn is_usable(&self) -> bool {
        !self.name.trim().is_empty() && self.w > 0 && self.h > 0
    }
}

/// Built-in viewports: mobile, tablet, desktop.
pub fn default_viewports() -> Vec<Viewport> {
    vec![
        Viewport::new("mobile", 390, 844),
        Viewport::new("tablet", 834, 1112),
        Viewport::new("desktop", 1440, 900),
    ]
}

fn default_pages() -> Vec<String> {
    vec!["/".to_string(), "/favorites".to_string()]
}

/// Sampler settings as stored on disk.
///
/// Unknown keys are ignored, so a full `sanitize.config.json` can be read
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default)]
    pub viewports: Vec<Viewport>,
    #[serde(rename = "baseURL", default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            viewports: default_viewports(),
            base_url: None,
        }
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the sampler config from `root`, writing defaults when none exists.
pub fn load_sampler_config(root: &Path) -> Result<SamplerConfig, Error> {
    for name in [SANITIZE_CONFIG_FILE, PHASE2_CONFIG_FILE] {
        let path = root.join(name);
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading sampler config");
            return read_json(&path);
        }
    }
    let config = SamplerConfig::default();
    let path = root.join(PHASE2_CONFIG_FILE);
    write_json(&path, &config)?;
    tracing::info!(path = %path.display(), "no sampler config found, wrote defaults");
    Ok(config)
}

/// Role name to CSS selector list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSelectors(pub BTreeMap<String, Vec<String>>);

impl RoleSelectors {
    /// Iterates roles that have at least one selector, by role name.
    pub fn active(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .filter(|(_, selectors)| !selectors.is_empty())
            .map(|(role, selectors)| (role.as_str(), selectors.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, S: Into<String>> FromIterator<(K, Vec<S>)> for RoleSelectors {
    fn from_iter<I: IntoIterator<Item = (K, Vec<S>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(role, selectors)| {
                    (role.into(), selectors.into_iter().map(Into::into).collect())
                })
                .collect(),
        )
    }
}

/// Loads `style.roles.json` from `root`; the file is required.
pub fn load_role_selectors(root: &Path) -> Result<RoleSelectors, Error> {
    let path = root.join(ROLES_FILE);
    if !path.exists() {
        return Err(Error::MissingInput {
            path,
            hint: Some("create a role -> selector list mapping".to_string()),
        });
    }
    read_json(&path)
}

/// Environment overrides for the sampler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `PHASE2_BASE_URL`
    pub base_url: Option<String>,
    /// `PAGE_FILTER`: keep routes containing this substring.
    pub page_filter: Option<String>,
    /// `PAGE_LIMIT`: keep at most this many routes.
    pub page_limit: Option<usize>,
}

impl EnvOverrides {
    /// Reads the overrides from the process environment.
    ///
    /// Empty values are treated as unset; a `PAGE_LIMIT` that is not a
    /// positive integer is ignored.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            base_url: var("PHASE2_BASE_URL"),
            page_filter: var("PAGE_FILTER"),
            page_limit: var("PAGE_LIMIT")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0),
        }
    }
}

/// Leading-slash form of a route; blank routes become `/`.
pub fn normalize_route(route: &str) -> String {
    let clean = route.trim();
    if clean.is_empty() || clean == "/" {
        "/".to_string()
    } else if clean.starts_with('/') {
        clean.to_string()
    } else {
        format!("/{}", clean)
    }
}

/// Resolved settings for one sampling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub pages: Vec<String>,
    pub viewports: Vec<Viewport>,
    /// Directory served when the base URL is not already up.
    pub site_dir: PathBuf,
}

impl Settings {
    /// Merges a loaded config with environment overrides.
    pub fn resolve(config: &SamplerConfig, env: &EnvOverrides, root: &Path) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| env.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let source = if config.pages.iter().any(|p| !p.trim().is_empty()) {
            config.pages.clone()
        } else {
            default_pages()
        };
        let mut pages = normalize_pages(&source);
        if let Some(filter) = &env.page_filter {
            pages.retain(|p| p.contains(filter.as_str()));
        }
        if let Some(limit) = env.page_limit {
            pages.truncate(limit);
        }
        if pages.is_empty() {
            pages.push("/".to_string());
        }

        let mut viewports = usable_viewports(&config.viewports);
        if viewports.is_empty() {
            viewports = default_viewports();
        }

        Self {
            base_url,
            pages,
            viewports,
            site_dir: root.join("docs"),
        }
    }

    /// The parsed base URL.
    ///
    /// URLs that cannot carry a path, such as `localhost:8080` (read as a
    /// `localhost:` scheme), are rejected.
    pub fn base(&self) -> Result<Url, Error> {
        let invalid = |source| Error::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        };
        let url = Url::parse(&self.base_url).map_err(invalid)?;
        if url.cannot_be_a_base() {
            return Err(invalid(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(url)
    }

    /// Absolute URL for a route.
    ///
    /// Routes are absolute paths, so they replace the path and query of the
    /// base URL.
    pub fn url_for(&self, route: &str) -> Result<String, Error> {
        route_url(&self.base()?, route).map_err(|source| Error::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }
}

/// Resolves a route against a parsed base URL.
pub fn route_url(base: &Url, route: &str) -> Result<String, url::ParseError> {
    base.join(&normalize_route(route)).map(|url| url.to_string())
}

/// Trimmed, slash-prefixed, deduplicated and sorted routes; blanks dropped.
fn normalize_pages(pages: &[String]) -> Vec<String> {
    let mut out: Vec<String> = pages
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| normalize_route(p))
        .collect();
    out.sort();
    out.dedup();
    out
}

fn usable_viewports(viewports: &[Viewport]) -> Vec<Viewport> {
    viewports.iter().filter(|v| v.is_usable()).cloned().collect()
}

/// Where reference-mode role selectors come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RoleSource {
    /// Path to a selectors file, relative to the project root.
    File(String),
    Inline(RoleSelectors),
}

/// `reference.config.json`: a deployed site to sample for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceConfig {
    #[serde(default)]
    pub reference_base_url: String,
    #[serde(default)]
    pub pages: Option<Vec<String>>,
    #[serde(default)]
    pub viewports: Vec<Viewport>,
    #[serde(default)]
    pub role_selectors: Option<RoleSource>,
}

/// Loads reference-mode settings and role selectors from `root`.
///
/// Pages come from `reference.config.json`, else `sanitize.config.json`,
/// else `/`; viewports fall back the same way and finally to the built-in
/// set. Role selectors are a file path or an inline map, defaulting to
/// `style.roles.json`. Environment overrides do not apply.
pub fn load_reference_settings(root: &Path) -> Result<(Settings, RoleSelectors), Error> {
    let path = root.join(REFERENCE_CONFIG_FILE);
    if !path.exists() {
        return Err(Error::MissingInput {
            path,
            hint: Some("add a referenceBaseUrl and pages to sample a reference site".to_string()),
        });
    }
    let reference: ReferenceConfig = read_json(&path)?;
    let base_url = reference.reference_base_url.trim().to_string();
    if base_url.is_empty() {
        return Err(Error::InvalidConfig {
            path,
            reason: "referenceBaseUrl must not be empty".to_string(),
        });
    }

    let sanitize_path = root.join(SANITIZE_CONFIG_FILE);
    let (sanitize_pages, sanitize_viewports) = if sanitize_path.exists() {
        let sanitize: SamplerConfig = read_json(&sanitize_path)?;
        (sanitize.pages, sanitize.viewports)
    } else {
        (Vec::new(), Vec::new())
    };

    let source = match reference.pages {
        Some(pages) => pages,
        None if !sanitize_pages.is_empty() => sanitize_pages,
        None => vec!["/".to_string()],
    };
    let pages = normalize_pages(&source);
    if pages.is_empty() {
        return Err(Error::InvalidConfig {
            path,
            reason: "at least one page is required".to_string(),
        });
    }

    let mut viewports = usable_viewports(&reference.viewports);
    if viewports.is_empty() {
        viewports = usable_viewports(&sanitize_viewports);
    }
    if viewports.is_empty() {
        viewports = default_viewports();
    }

    let roles = match reference.role_selectors {
        Some(RoleSource::Inline(roles)) => roles,
        Some(RoleSource::File(file)) if !file.trim().is_empty() => {
            let roles_path = root.join(file.trim());
            if !roles_path.exists() {
                return Err(Error::MissingInput {
                    path: roles_path,
                    hint: Some(format!("roleSelectors in {} points here", REFERENCE_CONFIG_FILE)),
                });
            }
            read_json(&roles_path)?
        }
        _ => load_role_selectors(root)?,
    };

    let settings = Settings {
        base_url,
        pages,
        viewports,
        site_dir: root.join("docs"),
    };
    Ok((settings, roles))
}
