use anyhow::{Context, Result};
use headless_chrome::Tab;
use ui_workflow_capture::SurfaceSnapshot;

/// JavaScript injected into the page to produce a structured snapshot.
/// NON-DESTRUCTIVE apart from the `data-eid` handle attribute.
///
/// The script:
///   1. Skips script, style, noscript, svg elements. `tagName` is lowercase
///      for SVG and other non-HTML namespaces, so it is uppercased first.
///   2. Walks the DOM tree (max depth 25), recording visibility instead of
///      pruning hidden subtrees, so a dialog that closes still changes the
///      snapshot.
///   3. Assigns sequential handles e0, e1, ... to interactive elements via
///      `data-eid`, reusing a handle already present on the element.
///   4. Returns `JSON.stringify({url, title, nodes})`.
const SNAPSHOT_JS: &str = r#"
(() => {
  const SKIP = new Set(['SCRIPT','STYLE','NOSCRIPT','SVG','LINK','META']);
  const INTERACTIVE = new Set(['a','button','input','textarea','select','option','summary']);
  const INTERACTIVE_ROLES = new Set(['button','link','menuitem','option','tab','checkbox','radio','combobox','textbox','switch']);
  let next = 0;
  document.querySelectorAll('[data-eid]').forEach(el => {
    const n = parseInt((el.getAttribute('data-eid') || '').replace(/\D/g, ''), 10);
    if (!isNaN(n) && n >= next) next = n + 1;
  });
  const nodes = [];

  function isVisible(el) {
    if (el.offsetParent === null && !['BODY','HTML'].includes(el.tagName)) {
      const pos = getComputedStyle(el).position;
      if (pos !== 'fixed' && pos !== 'sticky') return false;
    }
    const s = getComputedStyle(el);
    return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
  }

  function ownText(el) {
    let text = '';
    for (const child of el.childNodes) {
      if (child.nodeType === Node.TEXT_NODE) text += child.textContent;
    }
    return text.trim().slice(0, 200);
  }

  function walk(node, depth, parentVisible) {
    if (depth > 25) return;
    for (const el of node.children) {
      if (SKIP.has(el.tagName.toUpperCase())) continue;
      const tag = el.tagName.toLowerCase();
      const role = el.getAttribute('role') || '';
      const visible = parentVisible && isVisible(el);
      const interactive = INTERACTIVE.has(tag) || INTERACTIVE_ROLES.has(role)
        || el.getAttribute('contenteditable') === 'true';
      let handle = '';
      if (interactive && visible) {
        handle = el.getAttribute('data-eid') || ('e' + (next++));
        el.setAttribute('data-eid', handle);
      }
      const interactiveText = interactive ? (el.innerText || el.textContent || '') : '';
      const name = (el.getAttribute('aria-label') || el.getAttribute('title') || interactiveText).trim().slice(0, 120);
      nodes.push({
        handle,
        tag,
        role: role || null,
        className: typeof el.className === 'string' ? el.className : '',
        accessibleName: name || null,
        text: ownText(el) || (tag === 'select' && el.selectedOptions[0] ? el.selectedOptions[0].text.trim() : ''),
        inputType: el.getAttribute('type') || null,
        placeholder: el.getAttribute('placeholder') || null,
        busy: el.getAttribute('aria-busy') === 'true',
        interactive,
        visible,
      });
      walk(el, depth + 1, visible);
    }
  }

  walk(document.body, 0, true);
  return JSON.stringify({ url: window.location.href, title: document.title, nodes });
})()
"#;

/// Capture a structured snapshot of the current page.
pub fn capture_snapshot(tab: &Tab) -> Result<SurfaceSnapshot> {
    let result = tab.evaluate(SNAPSHOT_JS, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .context("snapshot script returned no value")?;
    let snapshot: SurfaceSnapshot =
        serde_json::from_str(&raw).context("snapshot script returned malformed JSON")?;
    Ok(snapshot)
}

/// JS function applied to a `<select>` (or custom listbox) element. Picks the
/// first option whose text or value matches, case-insensitively.
pub const SELECT_OPTION_JS: &str = r#"
function(wanted) {
  const needle = String(wanted).trim().toLowerCase();
  const options = this.options ? [...this.options] : [...this.querySelectorAll('[role=option]')];
  const hit = options.find(o => (o.text || o.textContent || '').trim().toLowerCase() === needle
    || (o.value || '').toLowerCase() === needle)
    || options.find(o => (o.text || o.textContent || '').toLowerCase().includes(needle));
  if (!hit) return false;
  if (this.options) {
    this.value = hit.value;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
  } else {
    hit.click();
  }
  return true;
}
"#;

/// Clears an input before typing into it.
pub const CLEAR_VALUE_JS: &str = r#"
function() {
  if ('value' in this) {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
  } else if (this.isContentEditable) {
    this.textContent = '';
  }
  this.focus();
}
"#;
