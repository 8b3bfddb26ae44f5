//! Chromium adapter over the Chrome DevTools Protocol.
//!
//! Element lookup runs in the page: [`QUERY_SCRIPT`] computes ARIA roles,
//! accessible names and visibility for every candidate and returns
//! [`ElementSnapshot`]s in document order. Interactions resolve the same
//! query again and act on the `index`-th match, so no element handles are
//! held between calls.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::BrowserSettings;
use crate::driver::{ElementSnapshot, Surface, SurfaceFactory};
use crate::locator::Locator;
use crate::result::{FlowError, FlowResult};

/// In-page query and action script. Called as
/// `(query, action, index, value)`; `action` is one of `query`, `click`,
/// `fill`, `focus`, `check`.
pub const QUERY_SCRIPT: &str = r#"(query, action, index, value) => {
  const norm = s => (s || '').replace(/\s+/g, ' ').trim();
  const test = (m, s) => {
    if (!m) return true;
    const c = norm(s);
    switch (m.kind) {
      case 'exact': return c === m.value;
      case 'exact_ci': return c.toLowerCase() === m.value.toLowerCase();
      case 'contains': return c.toLowerCase().includes(m.value.toLowerCase());
      case 'regex': return new RegExp(m.value, m.flags || '').test(c);
      default: return false;
    }
  };
  const roleOf = el => {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit.split(/\s+/)[0];
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    switch (tag) {
      case 'button': return 'button';
      case 'a': return el.hasAttribute('href') ? 'link' : null;
      case 'input':
        if (['button', 'submit', 'reset'].includes(type)) return 'button';
        if (type === 'checkbox') return 'checkbox';
        if (type === 'radio') return 'radio';
        if (type === 'number') return 'spinbutton';
        if (type === 'search') return 'searchbox';
        if (['', 'text', 'email', 'tel', 'url'].includes(type)) return 'textbox';
        return null;
      case 'textarea': return 'textbox';
      case 'fieldset': return 'group';
      case 'search': return 'search';
      case 'form': return 'form';
      case 'dialog': return 'dialog';
      case 'header': return el.closest('article,aside,main,nav,section') ? null : 'banner';
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'tr': return 'row';
      case 'td': return 'cell';
      case 'th': return 'columnheader';
      default: return null;
    }
  };
  const fromContent = ['button', 'tab', 'link', 'menuitem', 'heading', 'cell', 'row',
    'checkbox', 'radio', 'option', 'columnheader'];
  const nameOf = (el, role) => {
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      const parts = by.split(/\s+/).map(id => document.getElementById(id))
        .filter(Boolean).map(e => norm(e.textContent));
      if (parts.length) return parts.join(' ');
    }
    const label = el.getAttribute('aria-label');
    if (label) return norm(label);
    if (el.labels && el.labels.length) {
      return norm(Array.from(el.labels).map(l => l.textContent).join(' '));
    }
    if (el.tagName.toLowerCase() === 'fieldset') {
      const legend = el.querySelector(':scope > legend');
      if (legend) return norm(legend.textContent);
    }
    if (el.tagName.toLowerCase() === 'input' && ['button', 'submit', 'reset'].includes(el.type)) {
      return norm(el.value);
    }
    if (fromContent.includes(role)) return norm(el.textContent);
    return norm(el.getAttribute('title') || el.getAttribute('placeholder') || el.getAttribute('alt'));
  };
  const textOf = el => norm(el.innerText !== undefined ? el.innerText : el.textContent);
  const visible = el => {
    if (!el.isConnected) return false;
    const style = getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };
  const enabled = el => !(el.disabled || el.getAttribute('aria-disabled') === 'true'
    || el.closest('fieldset[disabled]'));
  const checkedOf = el => {
    if (el.tagName.toLowerCase() === 'input' && ['checkbox', 'radio'].includes(el.type)) return el.checked;
    const aria = el.getAttribute('aria-checked');
    return aria === null ? null : aria === 'true';
  };
  const selectedOf = el => {
    const s = el.getAttribute('aria-selected');
    return s === null ? null : s === 'true';
  };
  const skip = new Set(['script', 'style', 'noscript', 'template', 'head']);
  const within = root => Array.from(root.querySelectorAll('*'))
    .filter(el => !skip.has(el.tagName.toLowerCase()));
  const pick = (list, position) => {
    if (!position || position.kind === 'only') return list;
    if (position.kind === 'last') return list.length ? [list[list.length - 1]] : [];
    return list[position.index] ? [list[position.index]] : [];
  };
  const resolve = s => {
    const roots = s.scope ? pick(resolve(s.scope), s.scope.position) : [document.documentElement];
    const t = s.target;
    let found = [];
    for (const root of roots) {
      const candidates = within(root);
      let hits;
      if (t.by === 'role') {
        hits = candidates.filter(el => roleOf(el) === t.role && test(t.name, nameOf(el, t.role)));
      } else if (t.by === 'text') {
        const matching = candidates.filter(el => textOf(el) && test(t.text, textOf(el)));
        hits = matching.filter(el => !matching.some(o => o !== el && el.contains(o)));
      } else if (t.by === 'testid') {
        hits = candidates.filter(el => el.getAttribute('data-testid') === t.value);
      } else {
        hits = candidates.filter(el => el.id === t.value);
      }
      found = found.concat(hits);
    }
    found = Array.from(new Set(found));
    found.sort((a, b) => (a.compareDocumentPosition(b) & Node.DOCUMENT_POSITION_FOLLOWING) ? -1 : 1);
    if (s.hasText) found = found.filter(el => test(s.hasText, textOf(el)));
    return found;
  };
  const matches = resolve(query);
  if (action === 'query') {
    return matches.map(el => {
      const role = roleOf(el);
      return {
        role, name: nameOf(el, role), text: textOf(el), visible: visible(el),
        enabled: enabled(el), checked: checkedOf(el), selected: selectedOf(el),
      };
    });
  }
  const el = matches[index];
  if (!el) return false;
  el.scrollIntoView({ block: 'center', inline: 'center' });
  switch (action) {
    case 'click':
      el.click();
      return true;
    case 'focus':
      el.focus();
      return true;
    case 'check':
      if (!checkedOf(el)) el.click();
      return true;
    case 'fill': {
      el.focus();
      const proto = el.tagName.toLowerCase() === 'textarea'
        ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
      const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
      setter.call(el, value);
      el.dispatchEvent(new Event('input', { bubbles: true }));
      el.dispatchEvent(new Event('change', { bubbles: true }));
      return true;
    }
    default:
      return false;
  }
}"#;

fn cdp_error(e: impl std::fmt::Display) -> FlowError {
    FlowError::surface(e.to_string())
}

/// A Chromium instance with one page
#[derive(Debug)]
pub struct ChromiumSurface {
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    handler: tokio::task::JoinHandle<()>,
}

impl ChromiumSurface {
    /// Launch Chromium with `settings` and open a blank page
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be launched
    pub async fn launch(settings: &BrowserSettings) -> FlowResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &settings.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(FlowError::surface)?;

        let (browser, mut handler) = CdpBrowser::launch(config).await.map_err(cdp_error)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = browser.new_page("about:blank").await.map_err(cdp_error)?;
        debug!(headless = settings.headless, "chromium launched");
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> FlowResult<T> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(FlowError::surface)?;
        self.page
            .evaluate_expression(params)
            .await
            .map_err(cdp_error)?
            .into_value()
            .map_err(cdp_error)
    }

    async fn run<T: DeserializeOwned>(
        &self,
        locator: &Locator,
        action: &str,
        index: usize,
        value: &str,
    ) -> FlowResult<T> {
        self.eval(invocation(locator, action, index, value)).await
    }

    async fn act(&self, locator: &Locator, action: &str, index: usize, value: &str) -> FlowResult<()> {
        if self.run::<bool>(locator, action, index, value).await? {
            Ok(())
        } else {
            Err(FlowError::surface(format!(
                "{action}: no match #{index} for {locator}"
            )))
        }
    }

    async fn key(&self, kind: DispatchKeyEventType, key: &str) -> FlowResult<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key)
            .code(key);
        if key == "Enter" {
            builder = builder.windows_virtual_key_code(13).native_virtual_key_code(13);
            if kind == DispatchKeyEventType::KeyDown {
                builder = builder.text("\r");
            }
        }
        let params = builder.build().map_err(FlowError::surface)?;
        self.page.execute(params).await.map_err(cdp_error)?;
        Ok(())
    }
}

#[async_trait]
impl Surface for ChromiumSurface {
    async fn navigate(&mut self, url: &str) -> FlowResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| FlowError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> FlowResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(cdp_error)?
            .unwrap_or_default())
    }

    async fn query(&self, locator: &Locator) -> FlowResult<Vec<ElementSnapshot>> {
        self.run(locator, "query", 0, "").await
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> FlowResult<()> {
        self.act(locator, "click", index, "").await
    }

    async fn fill(&mut self, locator: &Locator, index: usize, text: &str) -> FlowResult<()> {
        self.act(locator, "fill", index, text).await
    }

    async fn press(&mut self, locator: &Locator, index: usize, key: &str) -> FlowResult<()> {
        self.act(locator, "focus", index, "").await?;
        self.key(DispatchKeyEventType::KeyDown, key).await?;
        self.key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn check(&mut self, locator: &Locator, index: usize) -> FlowResult<()> {
        self.act(locator, "check", index, "").await
    }

    async fn body_text(&self) -> FlowResult<String> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }

    async fn screenshot(&self) -> FlowResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.page.execute(params).await.map_err(cdp_error)?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(cdp_error)
    }

    async fn close(&mut self) -> FlowResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(cdp_error)?;
        let _ = browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}

/// Launches a fresh Chromium per scenario
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    settings: BrowserSettings,
}

impl ChromiumFactory {
    /// Create a factory
    #[must_use]
    pub const fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SurfaceFactory for ChromiumFactory {
    type Surface = ChromiumSurface;

    async fn open(&self) -> FlowResult<ChromiumSurface> {
        ChromiumSurface::launch(&self.settings).await
    }
}

/// Arguments as they are passed to [`QUERY_SCRIPT`]
fn script_arguments(locator: &Locator, action: &str, index: usize, value: &str) -> Value {
    json!([locator.to_query(), action, index, value])
}

/// Expression evaluated in the page for one query or action
fn invocation(locator: &Locator, action: &str, index: usize, value: &str) -> String {
    format!(
        "({QUERY_SCRIPT})(...{})",
        script_arguments(locator, action, index, value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{Role, TextMatch};

    #[test]
    fn test_script_is_arrow_function() {
        assert!(QUERY_SCRIPT.starts_with("(query, action, index, value) =>"));
        assert!(QUERY_SCRIPT.contains("case 'fill'"));
    }

    #[test]
    fn test_script_arguments_shape() {
        let loc = Locator::role(Role::Searchbox, TextMatch::contains("Search for a list"));
        let args = script_arguments(&loc, "fill", 0, "Pacientes offline");
        assert_eq!(args[0]["target"]["role"], "searchbox");
        assert_eq!(args[1], "fill");
        assert_eq!(args[3], "Pacientes offline");
    }

    #[test]
    fn test_invocation_spreads_arguments() {
        let loc = Locator::any_role(Role::Dialog);
        let expr = invocation(&loc, "query", 2, "");
        assert!(expr.starts_with("((query, action, index, value) =>"));
        let tail = expr.rsplit_once(")(...").map(|(_, t)| t).unwrap();
        let args: Value = serde_json::from_str(tail.trim_end_matches(')')).unwrap();
        assert_eq!(args, script_arguments(&loc, "query", 2, ""));
    }
}
