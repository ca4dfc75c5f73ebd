//! Headless Chrome implementation of [`StyleProbe`].
//!
//! One browser process serves the whole run; every visit gets a fresh tab
//! sized to the viewport, which is closed again whether or not sampling
//! succeeded.
//!
//! State capture drives hover and press through CDP mouse events, since
//! `:hover` and `:active` cannot be triggered from page script. Clicks are
//! swallowed and the target's link or submit behavior is neutralized while
//! it is being pressed, then restored.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use headless_chrome::protocol::cdp::Input;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use stylemark::{
    ElementSample, ProbeError, ProbeRequest, StateCapture, StateCategory, StateRequest,
    StyleProbe, Viewport,
};

/// How long a navigation may take before the route is failed.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);

/// Resource-count quiet window that counts as "network idle".
const NETWORK_QUIET_MS: u64 = 500;

const FREEZE_SCRIPT: &str = r#"(() => {
  const style = document.createElement('style');
  style.setAttribute('data-stylemark', 'freeze');
  style.textContent = '*, *::before, *::after { animation: none !important; transition: none !important; caret-color: auto !important; scroll-behavior: auto !important; }'
    + ' .stylemark-force-disabled { opacity: 0.5 !important; pointer-events: none !important; }';
  (document.head || document.documentElement).appendChild(style);
  return true;
})()"#;

const SAMPLE_FUNCTION: &str = r#"(payload) => {
  const out = {};
  for (const [role, selectors] of Object.entries(payload.roles)) {
    if (!selectors.length) continue;
    const nodes = Array.from(document.querySelectorAll(selectors.join(','))).slice(0, payload.limit);
    out[role] = nodes.map((el) => {
      const rect = el.getBoundingClientRect();
      const computed = getComputedStyle(el);
      const styles = {};
      for (const field of payload.fields) {
        const value = computed[field];
        styles[field] = value == null ? '' : String(value);
      }
      return {
        tag: el.tagName.toLowerCase(),
        id: el.id || '',
        firstClass: (el.classList && el.classList[0]) || '',
        rect: { x: rect.x, y: rect.y, width: rect.width, height: rect.height },
        styles,
      };
    });
  }
  return JSON.stringify(out);
}"#;

/// Swallows clicks on links and buttons so pressing never navigates.
const CLICK_GUARD_SCRIPT: &str = r#"(() => {
  const stop = (event) => {
    const target = event.target;
    const clickable = target && target.closest && (target.closest('a[href]') || target.closest('button') || target.closest('[role="button"]'));
    if (clickable) {
      event.preventDefault();
      event.stopPropagation();
      event.stopImmediatePropagation();
    }
  };
  ['click', 'mousedown', 'mouseup', 'pointerdown', 'pointerup'].forEach((name) => window.addEventListener(name, stop, true));
  return true;
})()"#;

/// Marks the first visible match of `payload.selectors`, disarms its link or
/// submit behavior and returns where to point the mouse.
const MARK_FUNCTION: &str = r#"(payload) => {
  document.querySelectorAll('[data-stylemark-target]').forEach((el) => el.removeAttribute('data-stylemark-target'));
  const visible = (el) => {
    const style = getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return rect.width * rect.height > 0 && style.display !== 'none' && style.visibility !== 'hidden';
  };
  for (const selector of payload.selectors) {
    let nodes = [];
    try { nodes = Array.from(document.querySelectorAll(selector)); } catch (err) { continue; }
    const node = nodes.find(visible);
    if (!node) continue;
    const guard = {};
    if (node instanceof HTMLAnchorElement) { guard.href = node.getAttribute('href'); node.setAttribute('href', '#'); }
    if (node instanceof HTMLButtonElement) { guard.type = node.getAttribute('type'); node.setAttribute('type', 'button'); }
    if (node instanceof HTMLInputElement && node.type === 'submit') { guard.inputType = node.getAttribute('type'); node.setAttribute('type', 'button'); }
    node.setAttribute('data-stylemark-target', JSON.stringify(guard));
    node.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = node.getBoundingClientRect();
    return JSON.stringify({ selectorUsed: selector, x: rect.x + rect.width / 2, y: rect.y + rect.height / 2 });
  }
  return JSON.stringify(null);
}"#;

/// Reads `payload.fields` from the marked element.
const READ_FUNCTION: &str = r#"(payload) => {
  const el = document.querySelector('[data-stylemark-target]');
  if (!el) return JSON.stringify(null);
  const read = () => {
    const computed = getComputedStyle(el);
    const styles = {};
    for (const field of payload.fields) {
      const value = computed[field];
      styles[field] = value == null ? '' : String(value);
    }
    return styles;
  };
  if (payload.mode === 'focus') el.focus();
  if (payload.mode === 'disabled') {
    const control = el instanceof HTMLButtonElement || el instanceof HTMLInputElement || el instanceof HTMLSelectElement || el instanceof HTMLTextAreaElement;
    const disabled = el.hasAttribute('disabled') || el.getAttribute('aria-disabled') === 'true';
    if (control && !disabled) return JSON.stringify(null);
    if (!control) {
      el.classList.add('stylemark-force-disabled');
      const styles = read();
      el.classList.remove('stylemark-force-disabled');
      return JSON.stringify({ tag: '', styles });
    }
  }
  return JSON.stringify({
    tag: el.tagName.toLowerCase(),
    id: el.id || '',
    firstClass: (el.classList && el.classList[0]) || '',
    styles: read(),
  });
}"#;

/// Puts back what the mark step disarmed and drops the marker.
const RESTORE_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('[data-stylemark-target]');
  if (!el) return true;
  const guard = JSON.parse(el.getAttribute('data-stylemark-target') || '{}');
  const put = (name, value) => value === null ? el.removeAttribute(name) : el.setAttribute(name, value);
  if (guard.href !== undefined) put('href', guard.href);
  if (guard.type !== undefined) put('type', guard.type);
  if (guard.inputType !== undefined) put('type', guard.inputType);
  el.removeAttribute('data-stylemark-target');
  if (document.activeElement === el) el.blur();
  return true;
})()"#;

/// Where the marked element sits, from [`MARK_FUNCTION`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Target {
    selector_used: String,
    x: f64,
    y: f64,
}

/// Computed styles of the marked element, from [`READ_FUNCTION`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    tag: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    first_class: String,
    styles: BTreeMap<String, String>,
}

/// Waits for the resource count to stop changing, then for web fonts. Each
/// wait is capped at `timeout_ms` and a timeout is not an error.
fn settle_script(timeout_ms: u128) -> String {
    format!(
        r#"(async () => {{
  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  const resources = () => performance.getEntriesByType('resource').length;
  const networkDeadline = Date.now() + {timeout};
  let seen = resources();
  let quietSince = Date.now();
  while (Date.now() < networkDeadline && Date.now() - quietSince < {quiet}) {{
    await sleep(100);
    const now = resources();
    if (now !== seen) {{ seen = now; quietSince = Date.now(); }}
  }}
  const fonts = document.fonts && document.fonts.ready ? document.fonts.ready : Promise.resolve();
  await Promise.race([fonts, sleep({timeout})]);
  return true;
}})()"#,
        timeout = timeout_ms,
        quiet = NETWORK_QUIET_MS,
    )
}

/// Self-invoking sampling expression with the request baked in.
fn sample_script(request: &ProbeRequest<'_>) -> String {
    let roles: BTreeMap<&str, &[String]> = request.roles.active().collect();
    let payload = json!({
        "roles": roles,
        "fields": request.fields,
        "limit": request.limit,
    });
    format!("({})({})", SAMPLE_FUNCTION, payload)
}

fn mark_script(category: &StateCategory) -> String {
    format!("({})({})", MARK_FUNCTION, json!({ "selectors": category.selectors }))
}

fn read_script(fields: &[&str], mode: &str) -> String {
    format!("({})({})", READ_FUNCTION, json!({ "fields": fields, "mode": mode }))
}

/// Evaluates `expression` and parses the JSON string it returns.
fn eval_json<T: DeserializeOwned>(tab: &Tab, expression: &str, what: &str) -> anyhow::Result<T> {
    let result = tab
        .evaluate(expression, false)
        .with_context(|| format!("{what} script failed"))?;
    let text = result
        .value
        .as_ref()
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("{what} script returned no data"))?;
    serde_json::from_str(text).with_context(|| format!("{what} script returned malformed data"))
}

fn dispatch_mouse(
    tab: &Tab,
    kind: Input::DispatchMouseEventTypeOption,
    target: &Target,
) -> anyhow::Result<()> {
    let button = match kind {
        Input::DispatchMouseEventTypeOption::MouseMoved => None,
        _ => Some(Input::MouseButton::Left),
    };
    let click_count = button.as_ref().map(|_| 1);
    tab.call_method(Input::DispatchMouseEvent {
        Type: kind,
        x: target.x,
        y: target.y,
        modifiers: None,
        timestamp: None,
        button,
        buttons: None,
        click_count,
        force: None,
        tangential_pressure: None,
        tilt_x: None,
        tilt_y: None,
        twist: None,
        delta_x: None,
        delta_y: None,
        pointer_Type: None,
    })
    .context("mouse event failed")?;
    Ok(())
}

pub struct ChromeProbe {
    browser: Browser,
}

impl ChromeProbe {
    pub fn launch() -> anyhow::Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| anyhow!("invalid browser launch options: {err}"))?;
        let browser = Browser::new(options).context("failed to launch headless Chrome")?;
        tracing::debug!("headless Chrome started");
        Ok(Self { browser })
    }

    /// Runs `work` in a fresh tab and closes the tab afterwards.
    fn with_tab<T>(&self, work: impl FnOnce(&Arc<Tab>) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let tab = self.browser.new_tab().context("failed to open tab")?;
        let result = work(&tab);
        if let Err(err) = tab.close(false) {
            tracing::debug!(error = %err, "failed to close tab");
        }
        result
    }
}

/// Sizes the tab, loads `url`, waits for it to settle and freezes motion.
fn prepare_page(
    tab: &Arc<Tab>,
    url: &str,
    viewport: &Viewport,
    settle_timeout: Duration,
) -> anyhow::Result<()> {
    tab.set_default_timeout(NAVIGATION_TIMEOUT);
    tab.set_bounds(Bounds::Normal {
        left: Some(0),
        top: Some(0),
        width: Some(f64::from(viewport.w)),
        height: Some(f64::from(viewport.h)),
    })
    .context("failed to size viewport")?;

    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .with_context(|| format!("failed to load {}", url))?;

    tab.evaluate(&settle_script(settle_timeout.as_millis()), true)
        .context("settle wait failed")?;
    tab.evaluate(FREEZE_SCRIPT, false)
        .context("failed to disable animations")?;
    Ok(())
}

fn sample_tab(
    tab: &Arc<Tab>,
    request: &ProbeRequest<'_>,
) -> anyhow::Result<BTreeMap<String, Vec<ElementSample>>> {
    prepare_page(tab, request.url, request.viewport, request.settle_timeout)?;
    eval_json(tab, &sample_script(request), "sampling")
}

fn capture_tab(tab: &Arc<Tab>, request: &StateRequest<'_>) -> anyhow::Result<Vec<StateCapture>> {
    prepare_page(tab, request.url, request.viewport, request.settle_timeout)?;
    tab.evaluate(CLICK_GUARD_SCRIPT, false)
        .context("failed to install click guard")?;

    let mut captures = Vec::new();
    for category in request.categories {
        let Some(target) = eval_json::<Option<Target>>(tab, &mark_script(category), "target lookup")?
        else {
            tracing::debug!(category = %category.name, url = %request.url, "no visible element");
            continue;
        };
        let captured = capture_target(tab, request, category, target);
        if let Err(err) = tab.evaluate(RESTORE_SCRIPT, false) {
            tracing::debug!(error = %err, "failed to restore target");
        }
        captures.push(captured?);
    }
    Ok(captures)
}

fn capture_target(
    tab: &Tab,
    request: &StateRequest<'_>,
    category: &StateCategory,
    target: Target,
) -> anyhow::Result<StateCapture> {
    use headless_chrome::protocol::cdp::Input::DispatchMouseEventTypeOption::{
        MouseMoved, MousePressed, MouseReleased,
    };

    let read = |mode: &str| -> anyhow::Result<Snapshot> {
        eval_json::<Option<Snapshot>>(tab, &read_script(request.fields, mode), "state read")?
            .ok_or_else(|| anyhow!("{} element detached while reading {mode}", category.name))
    };

    let default = read("default")?;
    dispatch_mouse(tab, MouseMoved, &target)?;
    let hover = read("hover")?;
    let focus = read("focus")?;
    dispatch_mouse(tab, MousePressed, &target)?;
    let active = read("active");
    dispatch_mouse(tab, MouseReleased, &target)?;
    let active = active?;
    let disabled = eval_json::<Option<Snapshot>>(tab, &read_script(request.fields, "disabled"), "state read")?;

    Ok(StateCapture {
        category: category.name.clone(),
        selector_used: target.selector_used,
        tag: default.tag,
        id: default.id,
        first_class: default.first_class,
        default: default.styles,
        hover: hover.styles,
        focus: focus.styles,
        active: active.styles,
        disabled: disabled.map(|snapshot| snapshot.styles),
    })
}

impl StyleProbe for ChromeProbe {
    fn probe(
        &mut self,
        request: &ProbeRequest<'_>,
    ) -> Result<BTreeMap<String, Vec<ElementSample>>, ProbeError> {
        self.with_tab(|tab| sample_tab(tab, request))
            .map_err(|err| ProbeError::new(format!("{err:#}")))
    }

    fn capture_states(
        &mut self,
        request: &StateRequest<'_>,
    ) -> Result<Vec<StateCapture>, ProbeError> {
        self.with_tab(|tab| capture_tab(tab, request))
            .map_err(|err| ProbeError::new(format!("{err:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stylemark::{default_state_categories, RoleSelectors, SETTLE_TIMEOUT, STATE_FIELDS, STYLE_FIELDS};

    #[test]
    fn test_sample_script_skips_empty_roles() {
        let roles: RoleSelectors = [
            ("body", vec!["p", "li"]),
            ("nav", Vec::<&str>::new()),
        ]
        .into_iter()
        .collect();
        let viewport = Viewport::new("desktop", 1440, 900);
        let request = ProbeRequest {
            url: "http://127.0.0.1:8080/",
            viewport: &viewport,
            roles: &roles,
            fields: &["color", "fontSize"],
            limit: 60,
            settle_timeout: SETTLE_TIMEOUT,
        };
        let script = sample_script(&request);
        assert!(script.contains(r#""roles":{"body":["p","li"]}"#));
        assert!(script.contains(r#""fields":["color","fontSize"]"#));
        assert!(script.contains(r#""limit":60"#));
        assert!(!script.contains("\"nav\""));
    }

    #[test]
    fn test_sample_script_carries_every_field() {
        let roles = RoleSelectors::default();
        let viewport = Viewport::new("mobile", 390, 844);
        let request = ProbeRequest {
            url: "http://127.0.0.1:8080/",
            viewport: &viewport,
            roles: &roles,
            fields: STYLE_FIELDS,
            limit: 60,
            settle_timeout: SETTLE_TIMEOUT,
        };
        let script = sample_script(&request);
        for field in STYLE_FIELDS {
            assert!(script.contains(&format!("\"{}\"", field)), "{}", field);
        }
    }

    #[test]
    fn test_settle_script_uses_timeout() {
        let script = settle_script(10_000);
        assert_eq!(script.matches("10000").count(), 2);
        assert!(script.contains("document.fonts.ready"));
    }

    #[test]
    fn test_sample_output_parses() {
        let text = r#"{"body":[{"tag":"p","id":"","firstClass":"lead","rect":{"x":0,"y":10.5,"width":320,"height":24},"styles":{"color":"rgb(0, 0, 0)"}}]}"#;
        let parsed: BTreeMap<String, Vec<ElementSample>> = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["body"][0].first_class, "lead");
        assert_eq!(parsed["body"][0].styles["color"], "rgb(0, 0, 0)");
    }

    #[test]
    fn test_mark_script_tries_selectors_in_order() {
        let categories = default_state_categories();
        let script = mark_script(&categories[0]);
        assert!(script.contains(
            r#"{"selectors":["button",".sqs-button-element","a[href].buttonlike","[role='button']"]}"#
        ));
        assert!(script.contains("data-stylemark-target"));
    }

    #[test]
    fn test_read_script_carries_mode_and_fields() {
        let script = read_script(STATE_FIELDS, "disabled");
        assert!(script.contains(r#""mode":"disabled""#));
        for field in STATE_FIELDS {
            assert!(script.contains(&format!("\"{}\"", field)), "{}", field);
        }
    }

    #[test]
    fn test_freeze_script_defines_forced_disabled_class() {
        assert!(FREEZE_SCRIPT.contains(".stylemark-force-disabled"));
        assert!(READ_FUNCTION.contains("stylemark-force-disabled"));
    }

    #[test]
    fn test_snapshot_parses_forced_disabled_shape() {
        let snapshot: Option<Snapshot> =
            serde_json::from_str(r#"{"tag":"","styles":{"opacity":"0.5"}}"#).unwrap();
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.first_class, "");
        assert_eq!(snapshot.styles["opacity"], "0.5");
        let missing: Option<Snapshot> = serde_json::from_str("null").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_target_parses() {
        let target: Target =
            serde_json::from_str(r#"{"selectorUsed":"a[href]","x":12.5,"y":40}"#).unwrap();
        assert_eq!(target.selector_used, "a[href]");
        assert_eq!(target.x, 12.5);
    }
}
