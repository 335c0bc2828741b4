use serde_json::Value;
use weavecore::NodeDataItem;

/// Replace `{{path}}` placeholders with fields of `item`.
///
/// Paths use the dotted syntax of [`NodeDataItem::field`]. Missing fields
/// render as the empty string; an unterminated `{{` is kept literally.
pub fn render(template: &str, item: &NodeDataItem) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                out.push_str(&display(item.field(path)));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Render every string inside `value`, leaving other JSON untouched
pub fn render_value(value: &Value, item: &NodeDataItem) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, item)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, item)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, item)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> NodeDataItem {
        NodeDataItem::from_value(json!({
            "topic": "owls",
            "count": 3,
            "scene": { "mood": "calm" }
        }))
    }

    #[test]
    fn test_render_fields() {
        assert_eq!(
            render("{{ count }} facts about {{topic}}, {{scene.mood}}", &item()),
            "3 facts about owls, calm"
        );
    }

    #[test]
    fn test_render_missing_and_unterminated() {
        assert_eq!(render("a{{nope}}b", &item()), "ab");
        assert_eq!(render("tail {{topic", &item()), "tail {{topic");
        assert_eq!(render("no placeholders", &item()), "no placeholders");
    }

    #[test]
    fn test_render_value_recurses() {
        let rendered = render_value(&json!({ "title": "{{topic}}", "n": 1, "tags": ["{{scene.mood}}"] }), &item());
        assert_eq!(rendered, json!({ "title": "owls", "n": 1, "tags": ["calm"] }));
    }
}
