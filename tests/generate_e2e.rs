//! End-to-end: agent reply text through proposal parsing and code generation.

use pageforge::codegen::{generate, write_all};
use pageforge::proposal::parse_proposals;
use tempfile::TempDir;

const AGENT_REPLY: &str = r##"Here are the tools I found:

```json
[
  {
    "name": "getMenu",
    "description": "Read the full menu",
    "inputSchema": {"properties": {}, "required": []},
    "actionType": "js-call",
    "actionDetails": {"functionPath": "theMenuGetter", "args": [], "returnType": "object"},
    "annotations": {"readOnly": true}
  },
  {
    "name": "addToCart",
    "description": "Add a pizza to the cart",
    "inputSchema": {
      "properties": {"pizzaId": {"type": "string", "description": "Menu id of the pizza"}},
      "required": ["pizzaId"]
    },
    "actionType": "dom-action",
    "actionDetails": {
      "steps": [
        {"action": "fill", "locator": "#pizza-id", "inputProperty": "pizzaId"},
        {"action": "click", "locator": "#add-to-cart"}
      ]
    },
    "urlPattern": "https://pizza.example/*"
  }
]
```

Let me know if you need more."##;

#[test]
fn reply_to_generated_sources() {
    let proposals = parse_proposals(AGENT_REPLY).unwrap();
    assert_eq!(proposals.len(), 2);

    let tools = generate(&proposals);
    assert_eq!(tools.len(), proposals.len());

    let get_menu = &tools[0];
    assert_eq!(get_menu.file_name, "getMenu.js");
    assert!(get_menu.source.contains("\"getMenu\""));
    assert!(get_menu.source.contains("theMenuGetter"));
    assert!(get_menu.source.contains("readOnly: true"));

    let add_to_cart = &tools[1];
    assert_eq!(add_to_cart.file_name, "addToCart.js");
    assert!(add_to_cart.source.contains("\"addToCart\""));
    assert!(add_to_cart
        .source
        .contains("pizzaId: z.string().describe(\"Menu id of the pizza\")"));
    // Not-found guard referencing the fill locator.
    assert!(add_to_cart.source.contains("Element not found: #pizza-id"));
    assert!(add_to_cart
        .source
        .contains("urlPattern: \"https://pizza.example/*\""));
}

#[test]
fn generation_is_idempotent() {
    let proposals = parse_proposals(AGENT_REPLY).unwrap();
    assert_eq!(generate(&proposals), generate(&proposals));
}

#[test]
fn one_file_written_per_proposal() {
    let proposals = parse_proposals(AGENT_REPLY).unwrap();
    let tools = generate(&proposals);

    let tmp = TempDir::new().unwrap();
    write_all(tmp.path(), &tools).unwrap();

    let written: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(written.len(), proposals.len());
    assert!(tmp.path().join("getMenu.js").exists());
    assert!(tmp.path().join("addToCart.js").exists());
}
