//! Cypher literal rendering.

/// Escape a string for use inside a quoted Cypher literal.
///
/// Backslashes go first so the escapes added for quotes are not doubled.
/// Line breaks are escaped too, which keeps every row on one line.
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

/// `["a", "b"]`
pub fn array<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    let quoted: Vec<String> = items.into_iter().map(|s| quote(s.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}

/// Float literal that always reads back as a float.
pub fn float(value: f64) -> String {
    if value.is_finite() {
        format!("{:?}", value)
    } else {
        "0.0".to_string()
    }
}

/// A Cypher map literal built field by field, in insertion order.
#[derive(Debug, Default)]
pub struct MapLiteral {
    fields: Vec<String>,
}

impl MapLiteral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(mut self, key: &str, value: &str) -> Self {
        self.fields.push(format!("{}: {}", key, quote(value)));
        self
    }

    pub fn opt_str(mut self, key: &str, value: Option<&str>) -> Self {
        let rendered = value.map(quote).unwrap_or_else(|| "null".to_string());
        self.fields.push(format!("{}: {}", key, rendered));
        self
    }

    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.fields.push(format!("{}: {}", key, value));
        self
    }

    pub fn opt_int(mut self, key: &str, value: Option<i64>) -> Self {
        let rendered = value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string());
        self.fields.push(format!("{}: {}", key, rendered));
        self
    }

    pub fn float(mut self, key: &str, value: f64) -> Self {
        self.fields.push(format!("{}: {}", key, float(value)));
        self
    }

    pub fn bool(mut self, key: &str, value: bool) -> Self {
        self.fields.push(format!("{}: {}", key, value));
        self
    }

    pub fn list<S: AsRef<str>>(mut self, key: &str, items: impl IntoIterator<Item = S>) -> Self {
        self.fields.push(format!("{}: {}", key, array(items)));
        self
    }

    pub fn render(&self) -> String {
        format!("{{{}}}", self.fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_order() {
        assert_eq!(escape(r#"a\"b"#), r#"a\\\"b"#);
        assert_eq!(escape("it's"), r"it\'s");
        assert_eq!(escape("C:\\tmp"), "C:\\\\tmp");
        assert_eq!(escape("two\nlines"), "two\\nlines");
    }

    #[test]
    fn test_array_rendering() {
        assert_eq!(array(["a", "b"]), r#"["a", "b"]"#);
        assert_eq!(array(Vec::<String>::new()), "[]");
        assert_eq!(array([r#"say "hi""#]), r#"["say \"hi\""]"#);
    }

    #[test]
    fn test_map_literal() {
        let map = MapLiteral::new()
            .str("id", "m-1")
            .opt_str("superClass", None)
            .int("depth", -1)
            .float("weight", 1.0)
            .bool("isRootNode", true)
            .list("treeIds", ["tree:a"])
            .render();
        let expected = concat!(
            r#"{id: "m-1", superClass: null, depth: -1, weight: 1.0, "#,
            r#"isRootNode: true, treeIds: ["tree:a"]}"#,
        );
        assert_eq!(map, expected);
    }
}
