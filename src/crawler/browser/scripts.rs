//! In-page JavaScript used by the browser session
//!
//! Scripts that need an argument are written as arrow functions and wrapped
//! by [`call_with_text`], which embeds the argument as a JSON string literal.

/// Extracts the full UI signature of the current document
pub const SIGNATURE: &str = r#"(() => {
  const structural = ['h1', 'h2', 'h3', 'form', 'button', 'input', 'a[href]', '[role="button"]', '[role="link"]'];
  const domHash = structural.map(s => document.querySelectorAll(s).length).join(',');

  const selectorFor = (el) => {
    if (el.id) return '#' + el.id;
    if (typeof el.className === 'string' && el.className) {
      const classes = el.className.split(' ').filter(c => c).slice(0, 2).join('.');
      if (classes) return el.tagName.toLowerCase() + '.' + classes;
    }
    return el.tagName.toLowerCase();
  };

  const ctas = [];
  const seenTexts = new Set();
  document.querySelectorAll('button, a[href], [role="button"], [role="link"]').forEach(el => {
    const text = (el.innerText || el.textContent || '').trim().slice(0, 100);
    const href = el.getAttribute('href');
    if (text.length === 0 && !href) return;
    if (text.length > 0) {
      if (seenTexts.has(text)) return;
      seenTexts.add(text);
    }
    ctas.push({ type: el.tagName.toLowerCase(), text, href: href || null, selector: selectorFor(el) });
  });

  const forms = [];
  document.querySelectorAll('form').forEach(form => {
    const fields = [];
    form.querySelectorAll('input, select, textarea').forEach(input => {
      fields.push({
        type: input.type || input.tagName.toLowerCase(),
        name: input.name || null,
        id: input.id || null,
        required: !!input.required
      });
    });
    if (fields.length > 0) {
      forms.push({ action: form.action || null, method: (form.method || 'GET').toUpperCase(), fields });
    }
  });

  const navElements = [];
  document.querySelectorAll('nav, [role="navigation"]').forEach(nav => {
    const links = [];
    nav.querySelectorAll('a[href]').forEach(a => {
      links.push({ text: (a.innerText || '').trim().slice(0, 50), href: a.href || null });
    });
    if (links.length > 0) navElements.push({ links });
  });

  return {
    domHash,
    ctas,
    forms,
    navElements,
    metadata: {
      title: document.title || null,
      viewport: { width: window.innerWidth, height: window.innerHeight }
    }
  };
})()"#;

pub const READY_STATE: &str = "document.readyState";

/// Number of resource timing entries; stable counts mean a quiet network
pub const RESOURCE_COUNT: &str = "performance.getEntriesByType('resource').length";

/// Tags the first visible button whose accessible name equals `text`
const MARK_BUTTON_BY_ROLE: &str = r#"(text) => {
  document.querySelectorAll('[data-statetrail-target]').forEach(el => el.removeAttribute('data-statetrail-target'));
  const candidates = document.querySelectorAll('button, [role="button"]');
  for (const el of candidates) {
    const name = (el.getAttribute('aria-label') || el.innerText || el.textContent || '').trim();
    if (name !== text) continue;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
    if (!visible) continue;
    el.setAttribute('data-statetrail-target', '1');
    return true;
  }
  return false;
}"#;

pub const MARKED_TARGET: &str = r#"[data-statetrail-target="1"]"#;

const CLICK_BY_TEXT: &str = r#"(text) => {
  const buttons = Array.from(document.querySelectorAll('button, [role="button"]'));
  for (const btn of buttons) {
    if ((btn.innerText || btn.textContent || '').trim() !== text) continue;
    btn.scrollIntoView({ block: 'center' });
    btn.focus();
    btn.click();
    btn.dispatchEvent(new MouseEvent('click', { bubbles: true, cancelable: true }));
    return true;
  }
  return false;
}"#;

/// Shared panel lookup, prepended to the panel scripts
const FIND_PANEL: &str = r#"
const findButton = (text) => {
  for (const btn of document.querySelectorAll('button, [role="button"]')) {
    if ((btn.innerText || btn.textContent || '').trim() === text) return btn;
  }
  return null;
};
const findPanel = (btn) => {
  const controlled = btn.getAttribute('aria-controls');
  if (controlled) {
    const target = document.getElementById(controlled);
    if (target) return target.closest('.MuiAccordion-root') || target;
  }
  return btn.closest('.MuiAccordion-root, [class*="ccordion"], details, [role="treeitem"]');
};
"#;

const PANEL_PROBE: &str = r#"(text) => {
  const btn = findButton(text);
  if (!btn) return { expanded: false, items: 0 };
  const expanded = btn.getAttribute('aria-expanded') === 'true'
    || btn.closest('[aria-expanded="true"]') !== null
    || btn.closest('.Mui-expanded, .MuiAccordion-expanded, details[open]') !== null;
  const panel = findPanel(btn);
  if (!expanded || !panel) return { expanded, items: 0 };
  const items = panel.querySelectorAll('a[href], [class*="ListItemButton"], [class*="ListItem-root"], [role="link"], [role="menuitem"]').length;
  return { expanded, items };
}"#;

const PANEL_LINKS: &str = r#"(text) => {
  const btn = findButton(text);
  const panel = btn && findPanel(btn);
  if (!panel) return [];
  const links = [];
  const push = (a, fallbackText) => {
    const href = a.href || a.getAttribute('href');
    if (!href || href.startsWith('javascript:') || href.startsWith('#')) return;
    links.push({ url: href, text: ((a.innerText || a.textContent || fallbackText || '').trim()).slice(0, 100) });
  };
  panel.querySelectorAll('a[href]').forEach(a => push(a, ''));
  panel.querySelectorAll('[class*="ListItemButton"], [class*="ListItem-root"]').forEach(item => {
    const anchor = item.closest('a[href]');
    if (anchor && panel.contains(anchor)) push(anchor, item.innerText);
  });
  return links;
}"#;

const AGGRESSIVE_LINKS: &str = r#"(text) => {
  const btn = findButton(text);
  const panel = btn && findPanel(btn);
  if (!panel) return [];
  const links = [];
  const seen = new Set();
  panel.querySelectorAll('a[href], [data-href], [data-to], [data-path], [data-route], [onclick], [role="link"], [role="menuitem"]').forEach(el => {
    let url = null;
    if (el.tagName === 'A' && el.href) url = el.href;
    else if (el.getAttribute('data-href')) url = el.getAttribute('data-href');
    else if (el.getAttribute('data-to')) url = el.getAttribute('data-to');
    else if (el.getAttribute('data-path')) url = el.getAttribute('data-path');
    else if (el.getAttribute('data-route')) url = el.getAttribute('data-route');
    else if (el.onclick || el.getAttribute('onclick')) {
      const parent = el.parentElement && el.parentElement.closest('a[href]');
      if (parent && panel.contains(parent)) url = parent.href;
    }
    if (!url || url.startsWith('javascript:') || url.startsWith('#') || seen.has(url)) return;
    seen.add(url);
    links.push({ url, text: (el.innerText || el.textContent || '').trim().slice(0, 100) });
  });
  return links;
}"#;

/// Encodes `text` as a JavaScript string literal
pub fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Builds an expression that calls `function` with `text`
pub fn call_with_text(function: &str, text: &str) -> String {
    format!("({})({})", function, js_string(text))
}

fn call_panel_script(function: &str, text: &str) -> String {
    format!(
        "(() => {{ {} return ({})({}); }})()",
        FIND_PANEL,
        function,
        js_string(text)
    )
}

pub fn mark_button_by_role(text: &str) -> String {
    call_with_text(MARK_BUTTON_BY_ROLE, text)
}

pub fn click_by_text(text: &str) -> String {
    call_with_text(CLICK_BY_TEXT, text)
}

pub fn panel_probe(text: &str) -> String {
    call_panel_script(PANEL_PROBE, text)
}

pub fn panel_links(text: &str) -> String {
    call_panel_script(PANEL_LINKS, text)
}

pub fn aggressive_links(text: &str) -> String {
    call_panel_script(AGGRESSIVE_LINKS, text)
}
