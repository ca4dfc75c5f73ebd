//! Interaction-state capture.
//!
//! For every route and viewport the first visible button, link and input is
//! read in its default state and again while hovered, focused, pressed and
//! disabled. Each [`StateRecord`] keeps the full style maps plus the deltas
//! against the default state, which is what a design system needs to derive
//! state tokens.
//!
//! Like inventory sampling, the browser sits behind
//! [`StyleProbe::capture_states`] and a failing route is recorded, not fatal.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{route_url, RoleSelectors, Settings, Viewport};
use crate::error::Error;
use crate::record::tagged_hint;
use crate::sampler::{route_error_lines, RouteError, StyleProbe, SETTLE_TIMEOUT};

pub const STATES_PATH: &str = "artifacts/style-states.json";
pub const REFERENCE_STATES_PATH: &str = "artifacts/reference/style-states.json";

/// Properties read in every state.
pub const STATE_FIELDS: &[&str] = &[
    "color",
    "backgroundColor",
    "borderTopColor",
    "borderRightColor",
    "borderBottomColor",
    "borderLeftColor",
    "borderTopWidth",
    "borderRightWidth",
    "borderBottomWidth",
    "borderLeftWidth",
    "outlineColor",
    "outlineWidth",
    "boxShadow",
    "fontSize",
    "fontWeight",
    "letterSpacing",
    "transform",
    "opacity",
];

const BUTTON_SELECTORS: [&str; 4] = [
    "button",
    ".sqs-button-element",
    "a[href].buttonlike",
    "[role='button']",
];
const REFERENCE_BUTTON_SELECTORS: [&str; 3] = ["button", "[role='button']", "a[href].buttonlike"];
const LINK_SELECTORS: [&str; 1] = ["a[href]"];
const INPUT_SELECTORS: [&str; 3] = ["input", "textarea", "select"];

pub type StyleMap = BTreeMap<String, String>;

/// A named group of interactive elements; the first visible match of the
/// selectors, tried in order, represents the group on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCategory {
    pub name: String,
    pub selectors: Vec<String>,
}

impl StateCategory {
    fn new(name: &str, selectors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Buttons, links and inputs.
pub fn default_state_categories() -> Vec<StateCategory> {
    vec![
        StateCategory::new("buttons", &BUTTON_SELECTORS),
        StateCategory::new("links", &LINK_SELECTORS),
        StateCategory::new("inputs", &INPUT_SELECTORS),
    ]
}

/// Categories for a reference site: buttons use the `buttons` role selectors
/// when the role map defines any.
pub fn reference_state_categories(roles: &RoleSelectors) -> Vec<StateCategory> {
    let buttons = match roles.0.get("buttons") {
        Some(selectors) if !selectors.is_empty() => StateCategory {
            name: "buttons".to_string(),
            selectors: selectors.clone(),
        },
        _ => StateCategory::new("buttons", &REFERENCE_BUTTON_SELECTORS),
    };
    vec![
        buttons,
        StateCategory::new("links", &LINK_SELECTORS),
        StateCategory::new("inputs", &INPUT_SELECTORS),
    ]
}

/// Everything a probe needs to capture states on one page.
#[derive(Debug, Clone, Copy)]
pub struct StateRequest<'a> {
    pub url: &'a str,
    pub viewport: &'a Viewport,
    pub categories: &'a [StateCategory],
    pub fields: &'a [&'a str],
    pub settle_timeout: Duration,
}

/// One element read in every state, as returned by a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCapture {
    pub category: String,
    pub selector_used: String,
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_class: String,
    pub default: StyleMap,
    pub hover: StyleMap,
    pub focus: StyleMap,
    pub active: StyleMap,
    /// `None` for a form control that is not disabled on the page.
    #[serde(default)]
    pub disabled: Option<StyleMap>,
}

/// Properties that changed relative to the default state, per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDeltas {
    pub hover: StyleMap,
    pub focus: StyleMap,
    pub active: StyleMap,
    pub disabled: StyleMap,
}

/// One entry of `style-states.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub page: String,
    pub viewport: String,
    pub category: String,
    pub selector_used: String,
    pub selector_hint: String,
    pub styles_default: StyleMap,
    pub styles_hover: StyleMap,
    pub styles_focus: StyleMap,
    pub styles_active: StyleMap,
    pub styles_disabled: Option<StyleMap>,
    pub deltas: StateDeltas,
}

impl StateRecord {
    pub fn from_capture(page: &str, viewport: &str, capture: StateCapture) -> Self {
        let deltas = StateDeltas {
            hover: style_delta(&capture.default, &capture.hover),
            focus: style_delta(&capture.default, &capture.focus),
            active: style_delta(&capture.default, &capture.active),
            disabled: capture
                .disabled
                .as_ref()
                .map(|disabled| style_delta(&capture.default, disabled))
                .unwrap_or_default(),
        };
        Self {
            page: page.to_string(),
            viewport: viewport.to_string(),
            selector_hint: tagged_hint(
                &capture.tag,
                &capture.id,
                &capture.first_class,
                "category",
                &capture.category,
            ),
            category: capture.category,
            selector_used: capture.selector_used,
            styles_default: capture.default,
            styles_hover: capture.hover,
            styles_focus: capture.focus,
            styles_active: capture.active,
            styles_disabled: capture.disabled,
            deltas,
        }
    }
}

/// Entries of `target` whose value differs from `base`.
///
/// Only keys present in `base` are compared; a key missing from `target`
/// is not a change.
pub fn style_delta(base: &StyleMap, target: &StyleMap) -> StyleMap {
    base.iter()
        .filter_map(|(key, value)| match target.get(key) {
            Some(changed) if changed != value => Some((key.clone(), changed.clone())),
            _ => None,
        })
        .collect()
}

/// Outcome of a state capture run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatesReport {
    /// Records sorted by page, viewport, category.
    pub records: Vec<StateRecord>,
    pub errors: Vec<RouteError>,
    pub pages: Vec<String>,
    pub viewports: Vec<String>,
    /// Category names in capture order, for the summary.
    pub categories: Vec<String>,
}

impl StatesReport {
    /// Records captured per category, zero for categories never found.
    pub fn category_hits(&self) -> BTreeMap<&str, usize> {
        let mut hits: BTreeMap<&str, usize> =
            self.categories.iter().map(|c| (c.as_str(), 0)).collect();
        for record in &self.records {
            *hits.entry(record.category.as_str()).or_default() += 1;
        }
        hits
    }
}

impl fmt::Display for StatesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let _ = writeln!(out, "pages visited ({}): {}", self.pages.len(), self.pages.join(", "));
        let _ = writeln!(
            out,
            "viewports ({}): {}",
            self.viewports.len(),
            self.viewports.join(", ")
        );
        let _ = writeln!(out, "states captured: {}", self.records.len());
        let hits: Vec<String> = self
            .category_hits()
            .into_iter()
            .map(|(category, count)| format!("{}={}", category, count))
            .collect();
        let _ = writeln!(out, "category hits: {}", hits.join(", "));
        if !self.errors.is_empty() {
            let _ = writeln!(out, "route errors: {}", self.errors.len());
            for line in route_error_lines(&self.errors) {
                let _ = writeln!(out, "  {}", line);
            }
        }
        f.write_str(&out)
    }
}

/// Captures interaction states for every route at every viewport.
pub fn collect_states<P: StyleProbe + ?Sized>(
    probe: &mut P,
    settings: &Settings,
    categories: &[StateCategory],
) -> Result<StatesReport, Error> {
    let base = settings.base()?;
    let mut report = StatesReport {
        pages: settings.pages.clone(),
        viewports: settings.viewports.iter().map(|v| v.name.clone()).collect(),
        categories: categories.iter().map(|c| c.name.clone()).collect(),
        ..Default::default()
    };

    for viewport in &settings.viewports {
        for route in &settings.pages {
            let url = match route_url(&base, route) {
                Ok(url) => url,
                Err(err) => {
                    report.errors.push(RouteError::new(route, viewport, err));
                    continue;
                }
            };
            let request = StateRequest {
                url: &url,
                viewport,
                categories,
                fields: STATE_FIELDS,
                settle_timeout: SETTLE_TIMEOUT,
            };
            tracing::debug!(%url, viewport = %viewport.name, "capturing states");

            match probe.capture_states(&request) {
                Ok(captures) => report.records.extend(
                    captures
                        .into_iter()
                        .map(|capture| StateRecord::from_capture(route, &viewport.name, capture)),
                ),
                Err(err) => report.errors.push(RouteError::new(route, viewport, err)),
            }
        }
    }

    report.records.sort_by(|a, b| {
        (&a.page, &a.viewport, &a.category).cmp(&(&b.page, &b.viewport, &b.category))
    });
    tracing::info!(
        records = report.records.len(),
        errors = report.errors.len(),
        "style states collected"
    );
    Ok(report)
}
