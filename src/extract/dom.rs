//! DOM extraction: raw markup plus accessibility tree into the region model.
//!
//! Two independent passes run over a [`PageSnapshot`]: a tree-based pass that
//! walks the accessibility tree and a markup-based pass that scans the raw
//! HTML. Their outputs are merged and deduplicated by exact locator equality;
//! which pass wins a collision is a config knob (`prefer_tree_pass`, default
//! true). Extraction never fails on malformed input — elements that cannot be
//! reliably re-targeted are dropped.

use crate::config::ExtractionConfig;
use crate::model::{
    infer_action_hint, ActionHint, AccessibilityNode, InteractiveElement, PageSnapshot, Region,
    RegionKind,
};
use crate::util::{collapse_whitespace, truncate_with_ellipsis};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Visible text used as a locator of last resort is capped at this length.
const TEXT_LOCATOR_MAX_CHARS: usize = 40;

/// Inline handler attributes recognized by the markup pass.
const INLINE_HANDLER_ATTRS: &[&str] = &[
    "onclick",
    "onsubmit",
    "onchange",
    "oninput",
    "onkeydown",
    "onkeyup",
    "onmousedown",
    "onmouseup",
];

/// Accessibility roles treated as interactive by the tree pass.
const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "textbox",
    "checkbox",
    "radio",
    "combobox",
    "listbox",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "option",
    "searchbox",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "treeitem",
];

/// Output of DOM extraction: grouped regions plus a total element count.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageModel {
    pub regions: Vec<Region>,
    pub element_count: usize,
}

/// Extract the normalized region model from one snapshot.
pub fn extract(snapshot: &PageSnapshot, config: &ExtractionConfig) -> PageModel {
    let tree_elements = snapshot
        .accessibility
        .as_ref()
        .map(|root| tree_pass(root))
        .unwrap_or_default();
    let markup_elements = markup_pass(&snapshot.html);

    let merged = if config.prefer_tree_pass {
        merge(tree_elements, markup_elements)
    } else {
        merge(markup_elements, tree_elements)
    };

    group_into_regions(merged)
}

/// An element paired with the landmark it was found under, before grouping.
struct Placed {
    region: Option<(RegionKind, Option<String>)>,
    element: InteractiveElement,
}

// ── Tree-based pass ─────────────────────────────────────────────

fn tree_pass(root: &AccessibilityNode) -> Vec<Placed> {
    let mut out = Vec::new();
    walk_tree(root, None, &mut out);
    out
}

fn walk_tree(
    node: &AccessibilityNode,
    landmark: Option<(RegionKind, Option<String>)>,
    out: &mut Vec<Placed>,
) {
    let landmark = match RegionKind::from_landmark_role(&node.role) {
        Some(kind) => Some((kind, node.name.clone().filter(|n| !n.is_empty()))),
        None => landmark,
    };

    if INTERACTIVE_ROLES.contains(&node.role.as_str()) {
        if let Some(element) = element_from_tree_node(node) {
            out.push(Placed {
                region: landmark.clone(),
                element,
            });
        }
    }

    for child in &node.children {
        walk_tree(child, landmark.clone(), out);
    }
}

fn element_from_tree_node(node: &AccessibilityNode) -> Option<InteractiveElement> {
    let tag = tag_for_role(&node.role);
    let name = node
        .name
        .as_deref()
        .map(collapse_whitespace)
        .filter(|n| !n.is_empty());

    // Named nodes get a text locator; anonymous ones fall back to the role.
    let locator = match &name {
        Some(name) => format!("text={}", truncate_with_ellipsis(name, TEXT_LOCATOR_MAX_CHARS)),
        None => format!("[role=\"{}\"]", node.role),
    };

    let input_type = input_type_for_role(&node.role);
    let hint = infer_action_hint(tag, input_type, Some(&node.role));
    let mut element = InteractiveElement::new(tag, locator, hint);
    element.role = Some(node.role.clone());
    element.input_type = input_type.map(str::to_string);
    element.label = name.clone();
    element.text = name;
    Some(element)
}

fn tag_for_role(role: &str) -> &'static str {
    match role {
        "button" | "tab" | "menuitem" | "menuitemcheckbox" | "menuitemradio" => "button",
        "link" => "a",
        "combobox" | "listbox" => "select",
        "option" => "option",
        "treeitem" => "li",
        _ => "input",
    }
}

fn input_type_for_role(role: &str) -> Option<&'static str> {
    match role {
        "checkbox" => Some("checkbox"),
        "radio" => Some("radio"),
        "searchbox" => Some("search"),
        "slider" => Some("range"),
        "spinbutton" => Some("number"),
        "switch" => Some("checkbox"),
        _ => None,
    }
}

// ── Markup-based pass ───────────────────────────────────────────

fn markup_pass(html: &str) -> Vec<Placed> {
    let document = Html::parse_document(html);
    let mut out = Vec::new();

    // Selector::parse on these literals cannot fail; guard anyway so a
    // library change degrades to an empty pass instead of a panic.
    let Ok(interactive) = Selector::parse("button, input, select, textarea, a") else {
        return out;
    };

    for el in document.select(&interactive) {
        if let Some(placed) = element_from_markup(el) {
            out.push(placed);
        }
    }

    // Any other element wired up through an inline handler attribute.
    if let Ok(all) = Selector::parse("*") {
        for el in document.select(&all) {
            let tag = el.value().name();
            if matches!(tag, "button" | "input" | "select" | "textarea" | "a") {
                continue;
            }
            if INLINE_HANDLER_ATTRS
                .iter()
                .any(|attr| el.value().attr(attr).is_some())
            {
                if let Some(placed) = element_from_markup(el) {
                    out.push(placed);
                }
            }
        }
    }

    out
}

fn element_from_markup(el: ElementRef<'_>) -> Option<Placed> {
    let tag = el.value().name().to_string();
    let id = el.value().attr("id").map(str::to_string);
    let name = el.value().attr("name").map(str::to_string);
    let aria_label = el.value().attr("aria-label").map(str::to_string);
    let placeholder = el.value().attr("placeholder").map(str::to_string);
    let input_type = el.value().attr("type").map(str::to_string);
    let href = el.value().attr("href").map(str::to_string);
    let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));

    if tag == "a" && !anchor_is_actionable(href.as_deref(), el) {
        return None;
    }

    // Locator preference: id, name, aria-label, placeholder, visible text.
    // An element with none of these cannot be re-targeted and is dropped.
    let locator = if let Some(id) = id.as_deref().filter(|v| !v.is_empty()) {
        format!("#{id}")
    } else if let Some(name) = name.as_deref().filter(|v| !v.is_empty()) {
        format!("[name=\"{}\"]", css_escape(name))
    } else if let Some(label) = aria_label.as_deref().filter(|v| !v.is_empty()) {
        format!("[aria-label=\"{}\"]", css_escape(label))
    } else if let Some(ph) = placeholder.as_deref().filter(|v| !v.is_empty()) {
        format!("[placeholder=\"{}\"]", css_escape(ph))
    } else if !text.is_empty() {
        format!(
            "text={}",
            truncate_with_ellipsis(&text, TEXT_LOCATOR_MAX_CHARS)
        )
    } else {
        return None;
    };

    let hint = infer_action_hint(&tag, input_type.as_deref(), el.value().attr("role"));
    let mut element = InteractiveElement::new(&tag, locator, hint);
    element.input_type = input_type;
    element.role = el.value().attr("role").map(str::to_string);
    element.label = aria_label;
    element.text = (!text.is_empty())
        .then(|| truncate_with_ellipsis(&text, TEXT_LOCATOR_MAX_CHARS));
    element.name = name;
    element.id = id;
    element.placeholder = placeholder;
    element.href = href;
    element.options = select_options(el);
    for (attr_name, attr_value) in el.value().attrs() {
        if let Some(key) = attr_name.strip_prefix("data-") {
            element
                .data_attributes
                .insert(key.to_string(), attr_value.to_string());
        }
    }

    Some(Placed {
        region: enclosing_landmark(el),
        element,
    })
}

fn anchor_is_actionable(href: Option<&str>, el: ElementRef<'_>) -> bool {
    let has_handler = INLINE_HANDLER_ATTRS
        .iter()
        .any(|attr| el.value().attr(attr).is_some());
    if has_handler {
        return true;
    }
    match href {
        Some(href) => {
            let href = href.trim();
            !href.is_empty() && href != "#" && !href.starts_with("javascript:")
        }
        None => false,
    }
}

fn select_options(el: ElementRef<'_>) -> Vec<String> {
    if el.value().name() != "select" {
        return Vec::new();
    }
    let Ok(option_sel) = Selector::parse("option") else {
        return Vec::new();
    };
    el.select(&option_sel)
        .map(|opt| {
            opt.value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| collapse_whitespace(&opt.text().collect::<String>()))
        })
        .filter(|v| !v.is_empty())
        .collect()
}

/// Walk ancestors looking for a landmark element (tag or explicit role).
fn enclosing_landmark(el: ElementRef<'_>) -> Option<(RegionKind, Option<String>)> {
    for ancestor in el.ancestors() {
        let Some(parent) = ElementRef::wrap(ancestor) else {
            continue;
        };
        let value = parent.value();
        let kind = value
            .attr("role")
            .and_then(RegionKind::from_landmark_role)
            .or_else(|| landmark_for_tag(value.name()));
        if let Some(kind) = kind {
            let label = value
                .attr("aria-label")
                .map(str::to_string)
                .filter(|l| !l.is_empty());
            return Some((kind, label));
        }
    }
    None
}

fn landmark_for_tag(tag: &str) -> Option<RegionKind> {
    match tag {
        "nav" => Some(RegionKind::Nav),
        "main" => Some(RegionKind::Main),
        "aside" => Some(RegionKind::Sidebar),
        "form" => Some(RegionKind::Form),
        "dialog" => Some(RegionKind::Dialog),
        "footer" => Some(RegionKind::Footer),
        "header" => Some(RegionKind::Header),
        "section" => Some(RegionKind::Section),
        _ => None,
    }
}

fn css_escape(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

// ── Merge + grouping ────────────────────────────────────────────

/// Union of both passes, deduplicated by exact locator equality.
/// Elements from `primary` win collisions.
fn merge(primary: Vec<Placed>, secondary: Vec<Placed>) -> Vec<Placed> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Placed> = Vec::new();

    for placed in primary.into_iter().chain(secondary) {
        match seen.get(&placed.element.locator) {
            Some(&idx) => {
                // The earlier entry wins, but adopt the loser's region when
                // the winner had none — landmark knowledge is additive.
                if out[idx].region.is_none() {
                    out[idx].region = placed.region;
                }
            }
            None => {
                seen.insert(placed.element.locator.clone(), out.len());
                out.push(placed);
            }
        }
    }

    out
}

fn group_into_regions(placed: Vec<Placed>) -> PageModel {
    let mut order: Vec<(RegionKind, Option<String>)> = Vec::new();
    let mut buckets: HashMap<(RegionKind, Option<String>), Vec<InteractiveElement>> =
        HashMap::new();
    let mut element_count = 0usize;

    for item in placed {
        let key = item
            .region
            .unwrap_or((RegionKind::Unknown, None));
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(item.element);
        element_count += 1;
    }

    let regions = order
        .into_iter()
        .map(|key| {
            let elements = buckets.remove(&key).unwrap_or_default();
            let (kind, label) = key;
            Region {
                locator: region_locator(kind, label.as_deref()),
                kind,
                label,
                elements,
            }
        })
        .collect();

    PageModel {
        regions,
        element_count,
    }
}

fn region_locator(kind: RegionKind, label: Option<&str>) -> String {
    let base = match kind {
        RegionKind::Nav => "nav",
        RegionKind::Main => "main",
        RegionKind::Sidebar => "aside",
        RegionKind::Form => "form",
        RegionKind::Dialog => "dialog",
        RegionKind::Footer => "footer",
        RegionKind::Header => "header",
        RegionKind::Section => "section",
        RegionKind::Unknown => "body",
    };
    match label {
        Some(label) => format!("{base}[aria-label=\"{}\"]", css_escape(label)),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_html(html: &str) -> PageSnapshot {
        PageSnapshot::new("https://example.com", "Test", html)
    }

    fn default_config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn empty_input_yields_empty_model() {
        let snap = snapshot_with_html("");
        let model = extract(&snap, &default_config());
        assert!(model.regions.is_empty());
        assert_eq!(model.element_count, 0);
    }

    #[test]
    fn id_locator_is_hash_id() {
        let snap = snapshot_with_html(r#"<body><button id="buy">Buy</button></body>"#);
        let model = extract(&snap, &default_config());
        assert_eq!(model.element_count, 1);
        let el = &model.regions[0].elements[0];
        assert_eq!(el.locator, "#buy");
        assert_eq!(el.action_hint, ActionHint::Trigger);
    }

    #[test]
    fn extraction_is_deterministic() {
        let html = r#"<body><nav><a href="/home">Home</a></nav>
            <main><button id="go">Go</button><input name="q" type="search"></main></body>"#;
        let snap = snapshot_with_html(html);
        let first = serde_json::to_string(&extract(&snap, &default_config())).unwrap();
        let second = serde_json::to_string(&extract(&snap, &default_config())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn locator_preference_order() {
        let html = r#"<body>
            <input id="a" name="n1">
            <input name="n2">
            <input aria-label="Search terms">
            <input placeholder="Type here">
            <button>Press me</button>
            <input type="text">
        </body>"#;
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());
        let locators: Vec<&str> = model
            .regions
            .iter()
            .flat_map(|r| r.elements.iter().map(|e| e.locator.as_str()))
            .collect();
        assert!(locators.contains(&"#a"));
        assert!(locators.contains(&"[name=\"n2\"]"));
        assert!(locators.contains(&"[aria-label=\"Search terms\"]"));
        assert!(locators.contains(&"[placeholder=\"Type here\"]"));
        assert!(locators.contains(&"text=Press me"));
        // The bare text input has no identifying attribute and is dropped.
        assert_eq!(model.element_count, 5);
    }

    #[test]
    fn anchors_without_real_href_are_dropped() {
        let html = r##"<body>
            <a href="/checkout" id="go">Checkout</a>
            <a href="#" id="noop">Noop</a>
            <a href="javascript:void(0)" id="js">Js</a>
            <a href="#" id="handled" onclick="open()">Handled</a>
        </body>"##;
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());
        let locators: Vec<&str> = model
            .regions
            .iter()
            .flat_map(|r| r.elements.iter().map(|e| e.locator.as_str()))
            .collect();
        assert!(locators.contains(&"#go"));
        assert!(locators.contains(&"#handled"));
        assert!(!locators.contains(&"#noop"));
        assert!(!locators.contains(&"#js"));
    }

    #[test]
    fn elements_group_by_enclosing_landmark() {
        let html = r#"<body>
            <nav aria-label="Primary"><a href="/a" id="l1">A</a><a href="/b" id="l2">B</a></nav>
            <main><button id="m1">Do</button></main>
            <button id="stray">Stray</button>
        </body>"#;
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());

        let nav = model
            .regions
            .iter()
            .find(|r| r.kind == RegionKind::Nav)
            .unwrap();
        assert_eq!(nav.label.as_deref(), Some("Primary"));
        assert_eq!(nav.elements.len(), 2);

        let main = model
            .regions
            .iter()
            .find(|r| r.kind == RegionKind::Main)
            .unwrap();
        assert_eq!(main.elements.len(), 1);

        let unknown = model
            .regions
            .iter()
            .find(|r| r.kind == RegionKind::Unknown)
            .unwrap();
        assert_eq!(unknown.elements[0].locator, "#stray");
    }

    #[test]
    fn select_options_are_captured() {
        let html = r#"<body><select id="size">
            <option value="s">Small</option>
            <option value="l">Large</option>
        </select></body>"#;
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());
        let el = &model.regions[0].elements[0];
        assert_eq!(el.options, vec!["s", "l"]);
        assert_eq!(el.action_hint, ActionHint::Selection);
    }

    #[test]
    fn tree_and_markup_passes_dedupe_by_locator() {
        let mut snap = snapshot_with_html(
            r#"<body><main><button aria-label="Add to cart">Add to cart</button></main></body>"#,
        );
        snap.accessibility = Some(AccessibilityNode {
            role: "main".into(),
            children: vec![AccessibilityNode {
                role: "button".into(),
                name: Some("Add to cart".into()),
                ..AccessibilityNode::default()
            }],
            ..AccessibilityNode::default()
        });
        let model = extract(&snap, &default_config());
        // Markup locator is [aria-label=...], tree locator is text=...; both
        // survive. Re-run with identical locators to check the dedup path.
        let total = model.element_count;
        assert!(total >= 1);

        let mut snap2 = snapshot_with_html(r#"<body><main><button>Add to cart</button></main></body>"#);
        snap2.accessibility = Some(AccessibilityNode {
            role: "main".into(),
            children: vec![AccessibilityNode {
                role: "button".into(),
                name: Some("Add to cart".into()),
                ..AccessibilityNode::default()
            }],
            ..AccessibilityNode::default()
        });
        let model2 = extract(&snap2, &default_config());
        // Both passes emit `text=Add to cart`; exactly one entry survives.
        assert_eq!(model2.element_count, 1);
        let el = &model2.regions[0].elements[0];
        assert_eq!(el.locator, "text=Add to cart");
        // Tree pass won the collision: role metadata is present.
        assert_eq!(el.role.as_deref(), Some("button"));
    }

    #[test]
    fn markup_pass_wins_when_configured() {
        let mut snap = snapshot_with_html(r#"<body><main><button>Add to cart</button></main></body>"#);
        snap.accessibility = Some(AccessibilityNode {
            role: "main".into(),
            children: vec![AccessibilityNode {
                role: "button".into(),
                name: Some("Add to cart".into()),
                ..AccessibilityNode::default()
            }],
            ..AccessibilityNode::default()
        });
        let config = ExtractionConfig {
            prefer_tree_pass: false,
            ..ExtractionConfig::default()
        };
        let model = extract(&snap, &config);
        assert_eq!(model.element_count, 1);
        // Markup pass won: no accessibility role was recorded.
        assert!(model.regions[0].elements[0].role.is_none());
    }

    #[test]
    fn tree_pass_uses_role_locator_for_anonymous_nodes() {
        let mut snap = snapshot_with_html("");
        snap.accessibility = Some(AccessibilityNode {
            role: "generic".into(),
            children: vec![AccessibilityNode {
                role: "searchbox".into(),
                ..AccessibilityNode::default()
            }],
            ..AccessibilityNode::default()
        });
        let model = extract(&snap, &default_config());
        assert_eq!(model.element_count, 1);
        assert_eq!(
            model.regions[0].elements[0].locator,
            "[role=\"searchbox\"]"
        );
    }

    #[test]
    fn data_attributes_are_collected() {
        let html = r#"<body><button id="b" data-sku="42" data-track="cta">Buy</button></body>"#;
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());
        let el = &model.regions[0].elements[0];
        assert_eq!(el.data_attributes.get("sku").map(String::as_str), Some("42"));
        assert_eq!(
            el.data_attributes.get("track").map(String::as_str),
            Some("cta")
        );
    }

    #[test]
    fn malformed_markup_never_panics() {
        let html = "<div><button id=\"x\">Un<terminated<<<>";
        let snap = snapshot_with_html(html);
        let model = extract(&snap, &default_config());
        assert!(model.element_count <= 1);
    }
}
