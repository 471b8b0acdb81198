//! In-page scripts evaluated by the Chrome surface.
//!
//! Scripts are templates with `__NAME__` placeholders filled with JSON
//! literals, so no user text is ever spliced into code unescaped.

use serde_json::{json, Value};

use crate::{Selector, TextPattern};

/// Attribute stamped on resolved elements so later actions can find them again.
pub(crate) const HANDLE_ATTR: &str = "data-formpilot-handle";

/// Shape returned by [`lookup_script`].
#[derive(Debug, serde::Deserialize)]
pub(crate) struct LookupResult {
    pub found: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shape returned by the handle-addressed scripts.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct HandleState {
    pub attached: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub value: Option<String>,
}

pub(crate) fn handle_css(id: &str) -> String {
    format!("[{HANDLE_ATTR}=\"{id}\"]")
}

fn selector_query(selector: &Selector) -> Value {
    match selector {
        Selector::Role { role, name } => json!({
            "kind": "role",
            "role": role,
            "pattern": name.as_ref().map(TextPattern::source),
        }),
        Selector::Label(p) => json!({ "kind": "label", "pattern": p.source() }),
        Selector::Text(p) => json!({ "kind": "text", "pattern": p.source() }),
        Selector::Placeholder(p) => json!({ "kind": "placeholder", "pattern": p.source() }),
        Selector::Css(css) => json!({ "kind": "css", "css": css }),
    }
}

const DOM_HELPERS: &str = r#"
    const HANDLE_ATTR = "__HANDLE_ATTR__";
    const IMPLICIT = {
        button: 'button, input[type="button"], input[type="submit"], input[type="reset"]',
        link: 'a[href]',
        textbox: 'input:not([type]), input[type="text"], input[type="email"], input[type="search"], input[type="tel"], input[type="url"], textarea',
        checkbox: 'input[type="checkbox"]',
        radio: 'input[type="radio"]',
        combobox: 'select:not([multiple]), input[list]',
        listbox: 'select[multiple]',
        option: 'option',
        heading: 'h1, h2, h3, h4, h5, h6',
    };
    const norm = (s) => (s || "").replace(/\s+/g, " ").trim();
    const isVisible = (el) => {
        const rect = el.getBoundingClientRect();
        if (!(rect.width > 0 && rect.height > 0)) return false;
        const style = window.getComputedStyle(el);
        return style.visibility !== "hidden" && style.display !== "none";
    };
    const isEnabled = (el) => !(el.disabled || el.getAttribute("aria-disabled") === "true");
    const labelText = (el) => {
        const parts = [];
        const aria = el.getAttribute("aria-label");
        if (aria) parts.push(aria);
        const by = el.getAttribute("aria-labelledby");
        if (by) {
            by.split(/\s+/).forEach((id) => {
                const node = document.getElementById(id);
                if (node) parts.push(node.innerText || node.textContent);
            });
        }
        if (el.labels) Array.from(el.labels).forEach((l) => parts.push(l.innerText || l.textContent));
        return norm(parts.join(" "));
    };
    const accessibleName = (el) => {
        const label = labelText(el);
        if (label) return label;
        const text = norm(el.innerText || el.textContent);
        if (text) return text;
        return norm(el.value || el.getAttribute("title") || el.getAttribute("placeholder") || "");
    };
    const roleOf = (el) => {
        const explicit = el.getAttribute("role");
        if (explicit) return explicit.toLowerCase();
        for (const [role, css] of Object.entries(IMPLICIT)) {
            if (el.matches(css)) return role;
        }
        return null;
    };
"#;

const LOOKUP_TEMPLATE: &str = r#"(() => {
    const query = __QUERY__;
    __HELPERS__
    const re = query.pattern == null ? null : new RegExp(query.pattern, "i");
    const candidates = () => {
        switch (query.kind) {
            case "role": {
                const implicit = IMPLICIT[query.role];
                const css = `[role="${query.role}"]` + (implicit ? `, ${implicit}` : "");
                return Array.from(document.querySelectorAll(css))
                    .filter((el) => !re || re.test(accessibleName(el)));
            }
            case "label": {
                const found = [];
                document.querySelectorAll("label").forEach((l) => {
                    if (!re.test(norm(l.innerText || l.textContent))) return;
                    const control = l.control || (l.htmlFor ? document.getElementById(l.htmlFor) : null);
                    if (control) found.push(control);
                });
                document.querySelectorAll("[aria-label], [aria-labelledby]").forEach((el) => {
                    if (re.test(labelText(el))) found.push(el);
                });
                return found;
            }
            case "text":
                return Array.from(document.body.querySelectorAll("*")).filter((el) => {
                    const text = norm(el.innerText);
                    if (!text || !re.test(text)) return false;
                    return !Array.from(el.children).some((child) => re.test(norm(child.innerText)));
                });
            case "placeholder":
                return Array.from(document.querySelectorAll("[placeholder]"))
                    .filter((el) => re.test(el.getAttribute("placeholder")));
            case "css":
                return Array.from(document.querySelectorAll(query.css));
            default:
                return [];
        }
    };
    let list;
    try {
        list = candidates();
    } catch (e) {
        return { found: false, error: String(e) };
    }
    const el = list.find(isVisible);
    if (!el) return { found: false };
    let id = el.getAttribute(HANDLE_ATTR);
    if (!id) {
        window.__formpilotSeq = (window.__formpilotSeq || 0) + 1;
        id = String(window.__formpilotSeq);
        el.setAttribute(HANDLE_ATTR, id);
    }
    return {
        found: true,
        id,
        tag: el.tagName.toLowerCase(),
        role: roleOf(el),
        name: accessibleName(el) || null,
        enabled: isEnabled(el),
    };
})()"#;

const STATE_TEMPLATE: &str = r#"(() => {
    __HELPERS__
    const el = document.querySelector(__TARGET__);
    if (!el) return { attached: false };
    return { attached: true, enabled: isEnabled(el) && isVisible(el) };
})()"#;

const CLEAR_TEMPLATE: &str = r#"(() => {
    const el = document.querySelector(__TARGET__);
    if (!el) return { attached: false };
    el.focus();
    if ("value" in el) {
        el.value = "";
    } else if (el.isContentEditable) {
        el.textContent = "";
    }
    el.dispatchEvent(new Event("input", { bubbles: true }));
    return { attached: true, ok: true };
})()"#;

const FOCUS_TEMPLATE: &str = r#"(() => {
    const el = document.querySelector(__TARGET__);
    if (!el) return { attached: false };
    if (document.activeElement !== el) el.focus();
    return { attached: true, ok: document.activeElement === el };
})()"#;

const READ_VALUE_TEMPLATE: &str = r#"(() => {
    const el = document.querySelector(__TARGET__);
    if (!el) return { attached: false };
    const value = "value" in el ? el.value : el.textContent;
    return { attached: true, ok: true, value: value == null ? "" : String(value) };
})()"#;

const SELECT_TEMPLATE: &str = r#"(() => {
    const el = document.querySelector(__TARGET__);
    if (!el) return { attached: false };
    const re = new RegExp(__PATTERN__, "i");
    const option = Array.from(el.options || [])
        .find((o) => re.test((o.label || o.text || "").replace(/\s+/g, " ").trim()));
    if (!option) return { attached: true, ok: false };
    el.value = option.value;
    el.dispatchEvent(new Event("input", { bubbles: true }));
    el.dispatchEvent(new Event("change", { bubbles: true }));
    return { attached: true, ok: true };
})()"#;

fn with_helpers(template: &str) -> String {
    template
        .replace("__HELPERS__", DOM_HELPERS)
        .replace("__HANDLE_ATTR__", HANDLE_ATTR)
}

fn target_literal(id: &str) -> String {
    Value::String(handle_css(id)).to_string()
}

pub(crate) fn lookup_script(selector: &Selector) -> String {
    with_helpers(LOOKUP_TEMPLATE).replace("__QUERY__", &selector_query(selector).to_string())
}

pub(crate) fn state_script(id: &str) -> String {
    with_helpers(STATE_TEMPLATE).replace("__TARGET__", &target_literal(id))
}

pub(crate) fn clear_script(id: &str) -> String {
    CLEAR_TEMPLATE.replace("__TARGET__", &target_literal(id))
}

pub(crate) fn focus_script(id: &str) -> String {
    FOCUS_TEMPLATE.replace("__TARGET__", &target_literal(id))
}

pub(crate) fn read_value_script(id: &str) -> String {
    READ_VALUE_TEMPLATE.replace("__TARGET__", &target_literal(id))
}

pub(crate) fn select_script(id: &str, label: &TextPattern) -> String {
    SELECT_TEMPLATE
        .replace("__TARGET__", &target_literal(id))
        .replace("__PATTERN__", &Value::String(label.source().to_string()).to_string())
}
