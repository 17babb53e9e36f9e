//! Tool code generation: typed proposals in, executable JavaScript tool
//! modules out.
//!
//! Emission is a pure function of the proposal list. Re-running on unchanged
//! input produces byte-identical output, and output order follows proposal
//! order. Each unit is an independent ES module exporting name, description,
//! schema, annotations, and an `execute` function; runtime faults inside
//! `execute` come back as `{ error }` results, never thrown.

use crate::proposal::{
    ActionDetails, DomActionDetails, DomStep, DomStepKind, InputSchema, JsCallDetails,
    PropertyKind, PropertySchema, ToolProposal,
};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Fixed success text for js-call tools with a `void` return type.
const VOID_SUCCESS_TEXT: &str = "Function invoked successfully.";

/// Fallback output when a final `read` step finds no element.
const READ_FALLBACK_TEXT: &str = "No value could be read from the page.";

/// One emitted tool source unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTool {
    pub file_name: String,
    pub source: String,
}

/// Generate one source unit per proposal, order-preserving.
pub fn generate(proposals: &[ToolProposal]) -> Vec<GeneratedTool> {
    proposals
        .iter()
        .map(|proposal| GeneratedTool {
            file_name: format!("{}.js", sanitize_file_stem(&proposal.name)),
            source: emit_tool(proposal),
        })
        .collect()
}

/// Write every generated unit into `dir`, creating it if needed.
pub fn write_all(dir: &Path, tools: &[GeneratedTool]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    for tool in tools {
        let path = dir.join(&tool.file_name);
        std::fs::write(&path, &tool.source)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    info!(count = tools.len(), dir = %dir.display(), "Generated tool sources");
    Ok(())
}

fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "tool".to_string()
    } else {
        stem
    }
}

fn emit_tool(proposal: &ToolProposal) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "import {{ z }} from \"zod\";");
    out.push('\n');
    let _ = writeln!(out, "const schema = {};", emit_schema(&proposal.input_schema));
    out.push('\n');
    out.push_str("export default {\n");
    let _ = writeln!(out, "  name: {},", js_string(&proposal.name));
    let _ = writeln!(out, "  description: {},", js_string(&proposal.description));
    out.push_str("  schema,\n");
    if let Some(annotations) = &proposal.annotations {
        let _ = writeln!(
            out,
            "  annotations: {{ readOnly: {}, destructive: {}, requiresConfirmation: {}, openWorld: {} }},",
            annotations.read_only,
            annotations.destructive,
            annotations.requires_confirmation,
            annotations.open_world
        );
    }
    if let Some(pattern) = &proposal.url_pattern {
        let _ = writeln!(out, "  urlPattern: {},", js_string(pattern));
    }
    out.push_str("  async execute(params) {\n");
    out.push_str("    try {\n");
    match &proposal.action {
        ActionDetails::JsCall(details) => emit_js_call_body(&mut out, details),
        ActionDetails::DomAction(details) => emit_dom_action_body(&mut out, details),
    }
    out.push_str("    } catch (err) {\n");
    out.push_str("      return { error: String(err) };\n");
    out.push_str("    }\n");
    out.push_str("  },\n");
    out.push_str("};\n");

    if matches!(proposal.action, ActionDetails::DomAction(_)) {
        out.push('\n');
        out.push_str(FIND_ELEMENT_HELPER);
    }
    out
}

// ── Schema emission ─────────────────────────────────────────────

fn emit_schema(schema: &InputSchema) -> String {
    if schema.properties.is_empty() {
        return "z.object({})".to_string();
    }
    let mut out = String::from("z.object({\n");
    for (name, property) in &schema.properties {
        let required = schema.required.iter().any(|r| r == name);
        let _ = writeln!(out, "  {}: {},", name, emit_property(property, required));
    }
    out.push_str("})");
    out
}

fn emit_property(property: &PropertySchema, required: bool) -> String {
    let mut expr = if !property.enum_values.is_empty() {
        let values: Vec<String> = property.enum_values.iter().map(|v| js_string(v)).collect();
        format!("z.enum([{}])", values.join(", "))
    } else {
        match property.kind {
            PropertyKind::String => "z.string()".to_string(),
            PropertyKind::Number => "z.number()".to_string(),
            PropertyKind::Integer => "z.number().int()".to_string(),
            PropertyKind::Boolean => "z.boolean()".to_string(),
        }
    };
    if matches!(property.kind, PropertyKind::Number | PropertyKind::Integer) {
        if let Some(minimum) = property.minimum {
            let _ = write!(expr, ".min({minimum})");
        }
        if let Some(maximum) = property.maximum {
            let _ = write!(expr, ".max({maximum})");
        }
    }
    if let Some(description) = &property.description {
        let _ = write!(expr, ".describe({})", js_string(description));
    }
    if !required {
        expr.push_str(".optional()");
    }
    expr
}

// ── Execution bodies ────────────────────────────────────────────

fn emit_js_call_body(out: &mut String, details: &JsCallDetails) {
    // Resolve the dotted path segment by segment at invocation time.
    let _ = writeln!(out, "      let target = globalThis;");
    for segment in details.function_path.split('.') {
        let _ = writeln!(
            out,
            "      target = target ? target[{}] : undefined;",
            js_string(segment)
        );
    }
    let _ = writeln!(out, "      if (typeof target !== \"function\") {{");
    let _ = writeln!(
        out,
        "        return {{ error: {} }};",
        js_string(&format!(
            "Function {} is not available on this page.",
            details.function_path
        ))
    );
    out.push_str("      }\n");

    let args: Vec<String> = details
        .args
        .iter()
        .map(|arg| format!("params.{}", arg.property))
        .collect();
    let call = format!("target({})", args.join(", "));

    if details.return_type == "void" {
        let _ = writeln!(out, "      await {call};");
        let _ = writeln!(out, "      return {{ message: {} }};", js_string(VOID_SUCCESS_TEXT));
    } else {
        let _ = writeln!(out, "      const result = await {call};");
        out.push_str("      return { result };\n");
    }
}

fn emit_dom_action_body(out: &mut String, details: &DomActionDetails) {
    let has_reads = details.steps.iter().any(|s| s.action == DomStepKind::Read);
    if has_reads {
        out.push_str("      let lastRead = null;\n");
    }

    for (index, step) in details.steps.iter().enumerate() {
        let var = format!("el{index}");
        let _ = writeln!(
            out,
            "      const {var} = findElement({});",
            js_string(&step.locator)
        );

        if step.action == DomStepKind::Read {
            // Reads never require the element to exist.
            let attribute = step.attribute.as_deref().unwrap_or("textContent");
            let access = match attribute {
                "textContent" | "innerHTML" | "outerHTML" | "value" => {
                    format!("{var}.{attribute}")
                }
                other => format!("{var}.getAttribute({})", js_string(other)),
            };
            let _ = writeln!(out, "      lastRead = {var} ? {access} : null;");
        } else {
            let _ = writeln!(out, "      if (!{var}) {{");
            let _ = writeln!(
                out,
                "        return {{ error: {} }};",
                js_string(&format!("Element not found: {}", step.locator))
            );
            out.push_str("      }\n");
            emit_dom_step(out, &var, step);
        }

        if let Some(delay) = step.delay_ms {
            let _ = writeln!(
                out,
                "      await new Promise((resolve) => setTimeout(resolve, {delay}));"
            );
        }
    }

    let final_is_read = details
        .steps
        .last()
        .is_some_and(|s| s.action == DomStepKind::Read);
    if final_is_read {
        let _ = writeln!(
            out,
            "      return lastRead !== null ? {{ result: lastRead }} : {{ result: {} }};",
            js_string(READ_FALLBACK_TEXT)
        );
    } else {
        out.push_str("      return { message: \"Action completed.\" };\n");
    }
}

fn emit_dom_step(out: &mut String, var: &str, step: &DomStep) {
    match step.action {
        DomStepKind::Click => {
            let _ = writeln!(out, "      {var}.click();");
        }
        DomStepKind::Fill | DomStepKind::Select => {
            let value = value_expr(step);
            let _ = writeln!(out, "      {var}.value = {value};");
            let _ = writeln!(
                out,
                "      {var}.dispatchEvent(new Event(\"input\", {{ bubbles: true }}));"
            );
            let _ = writeln!(
                out,
                "      {var}.dispatchEvent(new Event(\"change\", {{ bubbles: true }}));"
            );
        }
        DomStepKind::Check => {
            let _ = writeln!(out, "      {var}.checked = true;");
            let _ = writeln!(
                out,
                "      {var}.dispatchEvent(new Event(\"change\", {{ bubbles: true }}));"
            );
        }
        DomStepKind::Submit => {
            let _ = writeln!(
                out,
                "      const form{var} = {var} instanceof HTMLFormElement ? {var} : {var}.closest(\"form\");"
            );
            let _ = writeln!(out, "      if (form{var}) form{var}.submit();");
        }
        DomStepKind::Scroll => {
            let _ = writeln!(
                out,
                "      {var}.scrollIntoView({{ behavior: \"instant\", block: \"center\" }});"
            );
        }
        DomStepKind::Read => unreachable!("read steps are emitted inline"),
    }
}

fn value_expr(step: &DomStep) -> String {
    if let Some(property) = &step.input_property {
        return format!("params.{property}");
    }
    if let Some(literal) = &step.literal_value {
        return js_string(literal);
    }
    "\"\"".to_string()
}

/// Locator resolution shared by dom-action tools, covering all three
/// dialects recorded sessions can carry: `text=` (XPath text search),
/// `label=` (label-adjacent form controls or aria-label), and bare CSS.
const FIND_ELEMENT_HELPER: &str = r#"function findElement(locator) {
  const xpathFirst = (xpath) =>
    document.evaluate(xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null)
      .singleNodeValue;
  if (locator.startsWith("text=")) {
    const needle = JSON.stringify(locator.slice(5));
    return xpathFirst(`//*[contains(normalize-space(.), ${needle})]`);
  }
  if (locator.startsWith("label=")) {
    const needle = JSON.stringify(locator.slice(6));
    return xpathFirst(
      `(//label[contains(normalize-space(.), ${needle})]` +
        `/following::*[self::input or self::textarea or self::select][1]` +
        ` | //*[@aria-label and contains(normalize-space(@aria-label), ${needle})])`,
    );
  }
  return document.querySelector(locator);
}
"#;

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{InputSchema, JsCallArg, ToolAnnotations};
    use std::collections::BTreeMap;

    fn js_call_proposal(name: &str, path: &str, return_type: &str) -> ToolProposal {
        ToolProposal {
            name: name.into(),
            description: "test tool".into(),
            input_schema: InputSchema::default(),
            action: ActionDetails::JsCall(JsCallDetails {
                function_path: path.into(),
                args: Vec::new(),
                return_type: return_type.into(),
            }),
            annotations: None,
            url_pattern: None,
        }
    }

    fn add_to_cart_proposal() -> ToolProposal {
        let mut properties = BTreeMap::new();
        properties.insert("pizzaId".to_string(), PropertySchema::string());
        ToolProposal {
            name: "addToCart".into(),
            description: "Add a pizza to the cart".into(),
            input_schema: InputSchema {
                properties,
                required: vec!["pizzaId".into()],
            },
            action: ActionDetails::DomAction(DomActionDetails {
                steps: vec![
                    DomStep {
                        input_property: Some("pizzaId".into()),
                        ..DomStep::new(DomStepKind::Fill, "#pizza-id")
                    },
                    DomStep::new(DomStepKind::Click, "#add"),
                ],
            }),
            annotations: None,
            url_pattern: None,
        }
    }

    #[test]
    fn generation_is_deterministic_and_counts_match() {
        let proposals = vec![
            js_call_proposal("getMenu", "theMenuGetter", "object"),
            add_to_cart_proposal(),
        ];
        let first = generate(&proposals);
        let second = generate(&proposals);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].file_name, "getMenu.js");
        assert_eq!(first[1].file_name, "addToCart.js");
    }

    #[test]
    fn js_call_resolves_dotted_path_with_guard() {
        let tools = generate(&[js_call_proposal("t", "api.cart.add", "object")]);
        let source = &tools[0].source;
        assert!(source.contains("target[\"api\"]"));
        assert!(source.contains("target[\"cart\"]"));
        assert!(source.contains("target[\"add\"]"));
        assert!(source.contains("typeof target !== \"function\""));
        assert!(source.contains("Function api.cart.add is not available"));
    }

    #[test]
    fn void_return_never_captures_a_result() {
        let tools = generate(&[js_call_proposal("fireAndForget", "doIt", "void")]);
        let source = &tools[0].source;
        assert!(!source.contains("const result"));
        assert!(source.contains(VOID_SUCCESS_TEXT));
    }

    #[test]
    fn non_void_return_packages_result() {
        let tools = generate(&[js_call_proposal("getMenu", "theMenuGetter", "object")]);
        let source = &tools[0].source;
        assert!(source.contains("const result = await target()"));
        assert!(source.contains("return { result };"));
    }

    #[test]
    fn js_call_args_map_positionally() {
        let mut proposal = js_call_proposal("t", "add", "object");
        let ActionDetails::JsCall(details) = &mut proposal.action else {
            unreachable!()
        };
        details.args = vec![
            JsCallArg {
                name: "id".into(),
                property: "pizzaId".into(),
            },
            JsCallArg {
                name: "qty".into(),
                property: "quantity".into(),
            },
        ];
        let tools = generate(&[proposal]);
        assert!(tools[0]
            .source
            .contains("target(params.pizzaId, params.quantity)"));
    }

    #[test]
    fn dom_action_guards_non_read_steps() {
        let tools = generate(&[add_to_cart_proposal()]);
        let source = &tools[0].source;
        assert!(source.contains("\"addToCart\""));
        assert!(source.contains("pizzaId: z.string()"));
        assert!(source.contains("Element not found: #pizza-id"));
        assert!(source.contains("Element not found: #add"));
        assert!(source.contains("el0.value = params.pizzaId;"));
        assert!(source.contains("el1.click();"));
        assert!(source.contains("function findElement"));
    }

    #[test]
    fn locator_helper_handles_all_three_dialects() {
        let mut fill = DomStep::new(DomStepKind::Fill, "label=Email");
        fill.input_property = Some("email".into());
        let proposal = ToolProposal {
            name: "setEmail".into(),
            description: "d".into(),
            input_schema: InputSchema::default(),
            action: ActionDetails::DomAction(DomActionDetails { steps: vec![fill] }),
            annotations: None,
            url_pattern: None,
        };
        let source = &generate(&[proposal])[0].source;
        assert!(source.contains("locator.startsWith(\"text=\")"));
        assert!(source.contains("locator.startsWith(\"label=\")"));
        assert!(source.contains("@aria-label"));
        assert!(source.contains("document.querySelector(locator)"));
    }

    #[test]
    fn final_read_step_carries_its_value_as_output() {
        let mut read = DomStep::new(DomStepKind::Read, "#total");
        read.attribute = Some("textContent".into());
        let proposal = ToolProposal {
            name: "readTotal".into(),
            description: "Read the cart total".into(),
            input_schema: InputSchema::default(),
            action: ActionDetails::DomAction(DomActionDetails {
                steps: vec![DomStep::new(DomStepKind::Click, "#cart"), read],
            }),
            annotations: None,
            url_pattern: None,
        };
        let source = &generate(&[proposal])[0].source;
        assert!(source.contains("lastRead = el1 ? el1.textContent : null;"));
        assert!(source.contains(READ_FALLBACK_TEXT));
        // Reads never require the element to exist.
        assert!(!source.contains("Element not found: #total"));
    }

    #[test]
    fn read_of_custom_attribute_uses_get_attribute() {
        let mut read = DomStep::new(DomStepKind::Read, "#row");
        read.attribute = Some("data-sku".into());
        let proposal = ToolProposal {
            name: "readSku".into(),
            description: "d".into(),
            input_schema: InputSchema::default(),
            action: ActionDetails::DomAction(DomActionDetails { steps: vec![read] }),
            annotations: None,
            url_pattern: None,
        };
        let source = &generate(&[proposal])[0].source;
        assert!(source.contains("getAttribute(\"data-sku\")"));
    }

    #[test]
    fn schema_emits_enum_bounds_and_optional() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "size".to_string(),
            PropertySchema {
                kind: PropertyKind::String,
                description: Some("Pizza size".into()),
                enum_values: vec!["small".into(), "large".into()],
                minimum: None,
                maximum: None,
            },
        );
        properties.insert(
            "qty".to_string(),
            PropertySchema {
                kind: PropertyKind::Integer,
                description: None,
                enum_values: Vec::new(),
                minimum: Some(1.0),
                maximum: Some(10.0),
            },
        );
        let proposal = ToolProposal {
            name: "order".into(),
            description: "d".into(),
            input_schema: InputSchema {
                properties,
                required: vec!["size".into()],
            },
            action: ActionDetails::JsCall(JsCallDetails {
                function_path: "order".into(),
                args: Vec::new(),
                return_type: "object".into(),
            }),
            annotations: None,
            url_pattern: None,
        };
        let source = &generate(&[proposal])[0].source;
        assert!(source.contains("z.enum([\"small\", \"large\"]).describe(\"Pizza size\")"));
        assert!(source.contains("z.number().int().min(1).max(10).optional()"));
    }

    #[test]
    fn annotations_and_url_pattern_are_embedded() {
        let mut proposal = js_call_proposal("t", "f", "object");
        proposal.annotations = Some(ToolAnnotations {
            read_only: true,
            ..ToolAnnotations::default()
        });
        proposal.url_pattern = Some("https://example.com/*".into());
        let source = &generate(&[proposal])[0].source;
        assert!(source.contains("readOnly: true"));
        assert!(source.contains("urlPattern: \"https://example.com/*\""));
    }

    #[test]
    fn file_stems_are_sanitized() {
        let proposal = js_call_proposal("weird name/here", "f", "object");
        assert_eq!(generate(&[proposal])[0].file_name, "weird_name_here.js");
    }

    #[test]
    fn write_all_creates_one_file_per_tool() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = generate(&[
            js_call_proposal("a", "f", "object"),
            add_to_cart_proposal(),
        ]);
        write_all(tmp.path(), &tools).unwrap();
        assert!(tmp.path().join("a.js").exists());
        assert!(tmp.path().join("addToCart.js").exists());
    }
}
