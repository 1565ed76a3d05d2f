use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;

pub mod table;

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => render_table(value),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

fn render_table<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(match value {
        Value::Array(items) => render_array_table(&items),
        Value::Object(map) => {
            let rows = flatten_object(&map, "");
            table::render_entity_table(&["key", "value"], &rows)
        }
        scalar => table::render_entity_table(&["value"], &[vec![value_to_cell(&scalar)]]),
    })
}

/// Nested objects (a semester's deadlines) become dotted keys.
fn flatten_object(map: &serde_json::Map<String, Value>, prefix: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (key, value) in map {
        let key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => rows.extend(flatten_object(inner, &key)),
            other => rows.push(vec![key, value_to_cell(other)]),
        }
    }
    rows
}

fn render_array_table(items: &[Value]) -> String {
    if items.is_empty() {
        return String::from("(no rows)");
    }
    if !items.iter().all(Value::is_object) {
        let rows = items
            .iter()
            .map(|item| vec![value_to_cell(item)])
            .collect::<Vec<_>>();
        return table::render_entity_table(&["value"], &rows);
    }

    let mut headers = Vec::<String>::new();
    for map in items.iter().filter_map(Value::as_object) {
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let header_refs = headers.iter().map(String::as_str).collect::<Vec<_>>();
    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|header| map.get(header).map_or_else(|| String::from("-"), value_to_cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    table::render_entity_table(&header_refs, &rows)
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| String::from("<invalid-json>")),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    use super::render;
    use crate::cli::OutputFormat;

    #[derive(Serialize)]
    struct Window {
        registration: &'static str,
        submission: &'static str,
    }

    #[derive(Serialize)]
    struct Example {
        id: &'static str,
        slots: u32,
        thesis: Window,
    }

    fn example() -> Example {
        Example {
            id: "sem-1",
            slots: 3,
            thesis: Window {
                registration: "2026-03-15",
                submission: "2026-06-15",
            },
        }
    }

    #[test]
    fn json_render_is_valid_json() {
        let out = render(&example(), OutputFormat::Json).expect("json render should work");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed["id"], "sem-1");
        assert_eq!(parsed["thesis"]["submission"], "2026-06-15");
    }

    #[test]
    fn table_flattens_nested_objects() {
        let out = render(&example(), OutputFormat::Table).expect("table render should work");
        assert!(out.lines().next().is_some_and(|line| line.starts_with("key")));
        assert!(out.contains("thesis.registration"));
        assert!(out.contains("2026-06-15"));
    }

    #[test]
    fn empty_list_renders_placeholder() {
        let out = render(&Vec::<Example>::new(), OutputFormat::Table).unwrap();
        assert_eq!(out, "(no rows)");
    }
}
