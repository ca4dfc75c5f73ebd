//! Route x viewport sampling loop.
//!
//! The browser is reached only through the [`StyleProbe`] trait: given a URL,
//! a viewport and the role selectors, a probe returns the matched elements
//! with their computed styles. This keeps the loop (ordering, error recovery,
//! record construction) testable without a real browser.
//!
//! Routes are visited sequentially, viewports outermost. A failing route is
//! recorded as a [`RouteError`] and the run moves on; sampling never aborts
//! because one page misbehaved.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{route_url, RoleSelectors, Settings, Viewport};
use crate::error::{Error, ProbeError};
use crate::record::{selector_hint, Rect, StyleRecord, STYLE_FIELDS};
use crate::states::{StateCapture, StateRequest};

/// Maximum elements sampled per role per page.
pub const ROLE_SAMPLE_LIMIT: usize = 60;

/// Upper bound for each settle wait (network idle, fonts).
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Route errors listed in the summary before truncating.
pub const MAX_LISTED_ERRORS: usize = 30;

/// Everything a probe needs for one page visit.
#[derive(Debug, Clone, Copy)]
pub struct ProbeRequest<'a> {
    pub url: &'a str,
    pub viewport: &'a Viewport,
    pub roles: &'a RoleSelectors,
    pub fields: &'a [&'a str],
    pub limit: usize,
    pub settle_timeout: Duration,
}

/// One element as observed by a probe, before provenance is attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSample {
    pub tag: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_class: String,
    pub rect: Rect,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

/// Capability to load a page and read computed styles from it.
pub trait StyleProbe {
    /// Loads `request.url` at the requested viewport and returns, for every
    /// active role, up to `request.limit` matched elements in document order.
    fn probe(
        &mut self,
        request: &ProbeRequest<'_>,
    ) -> Result<BTreeMap<String, Vec<ElementSample>>, ProbeError>;

    /// Loads `request.url` and captures the first visible element of every
    /// state category in its default, hover, focus, active and disabled
    /// states. Categories with no visible element are left out.
    fn capture_states(
        &mut self,
        request: &StateRequest<'_>,
    ) -> Result<Vec<StateCapture>, ProbeError> {
        let _ = request;
        Err(ProbeError::new(
            "interaction states are not supported by this browser driver",
        ))
    }
}

/// A route that could not be sampled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteError {
    pub route: String,
    pub viewport: String,
    pub reason: String,
}

impl RouteError {
    pub(crate) fn new(route: &str, viewport: &Viewport, reason: impl ToString) -> Self {
        let reason = reason.to_string();
        tracing::warn!(route = %route, viewport = %viewport.name, error = %reason, "route failed");
        Self {
            route: route.to_string(),
            viewport: viewport.name.clone(),
            reason,
        }
    }
}

/// Route error lines for a summary, truncated after [`MAX_LISTED_ERRORS`].
pub(crate) fn route_error_lines(errors: &[RouteError]) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .iter()
        .take(MAX_LISTED_ERRORS)
        .map(|e| format!("{} {}: {}", e.viewport, e.route, e.reason))
        .collect();
    if errors.len() > MAX_LISTED_ERRORS {
        lines.push(format!("... and {} more", errors.len() - MAX_LISTED_ERRORS));
    }
    lines
}

/// Outcome of a sampling run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryReport {
    /// Records sorted by page, viewport, role, selector hint.
    pub records: Vec<StyleRecord>,
    pub role_counts: BTreeMap<String, usize>,
    pub errors: Vec<RouteError>,
    pub pages: Vec<String>,
    pub viewports: Vec<String>,
}

impl InventoryReport {
    /// Top values of one property across the raw records, as
    /// `value (count)` joined with commas.
    pub fn top_values(&self, property: &str, limit: usize) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            let value = record.style(property);
            if !value.is_empty() {
                *counts.entry(value).or_default() += 1;
            }
        }
        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|a, b| crate::dedup::by_frequency((a.0, a.1), (b.0, b.1)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(value, count)| format!("{} ({})", value, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Route error lines for the summary, truncated after
    /// [`MAX_LISTED_ERRORS`].
    pub fn error_lines(&self) -> Vec<String> {
        route_error_lines(&self.errors)
    }

    /// Multi-line human summary of the run.
    pub fn summary(&self, roles: &RoleSelectors) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "pages visited ({}): {}", self.pages.len(), self.pages.join(", "));
        let _ = writeln!(
            out,
            "viewports ({}): {}",
            self.viewports.len(),
            self.viewports.join(", ")
        );
        let _ = writeln!(out, "samples per role:");
        for role in roles.names() {
            let count = self.role_counts.get(role).copied().unwrap_or(0);
            let _ = writeln!(out, "  {}: {}", role, count);
        }
        let _ = writeln!(out, "top text color: {}", self.top_values("color", 10));
        let _ = writeln!(
            out,
            "top background color: {}",
            self.top_values("backgroundColor", 10)
        );
        if !self.errors.is_empty() {
            let _ = writeln!(out, "route errors: {}", self.errors.len());
            for line in self.error_lines() {
                let _ = writeln!(out, "  {}", line);
            }
        }
        out
    }
}

/// Samples every route at every viewport through `probe`.
///
/// Only an unusable base URL fails the run; everything route-specific ends
/// up in [`InventoryReport::errors`].
pub fn collect_inventory<P: StyleProbe + ?Sized>(
    probe: &mut P,
    settings: &Settings,
    roles: &RoleSelectors,
) -> Result<InventoryReport, Error> {
    let base = settings.base()?;
    let mut report = InventoryReport {
        pages: settings.pages.clone(),
        viewports: settings.viewports.iter().map(|v| v.name.clone()).collect(),
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
            let request = ProbeRequest {
                url: &url,
                viewport,
                roles,
                fields: STYLE_FIELDS,
                limit: ROLE_SAMPLE_LIMIT,
                settle_timeout: SETTLE_TIMEOUT,
            };
            tracing::debug!(%url, viewport = %viewport.name, "sampling route");

            let samples = match probe.probe(&request) {
                Ok(samples) => samples,
                Err(err) => {
                    report.errors.push(RouteError::new(route, viewport, err));
                    continue;
                }
            };

            for (role, _) in roles.active() {
                let elements = samples.get(role).map(Vec::as_slice).unwrap_or_default();
                let taken = elements.len().min(ROLE_SAMPLE_LIMIT);
                *report.role_counts.entry(role.to_string()).or_default() += taken;
                report
                    .records
                    .extend(elements[..taken].iter().map(|element| StyleRecord {
                        page: route.clone(),
                        viewport: viewport.name.clone(),
                        role: role.to_string(),
                        selector_hint: selector_hint(
                            &element.tag,
                            &element.id,
                            &element.first_class,
                            role,
                        ),
                        rect: element.rect.rounded(),
                        styles: element.styles.clone(),
                    }));
            }
        }
    }

    report.records.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    tracing::info!(
        records = report.records.len(),
        errors = report.errors.len(),
        "style inventory collected"
    );
    Ok(report)
}
