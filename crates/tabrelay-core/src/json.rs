//! JSON output helpers.

use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize `value` as pretty JSON indented by four spaces.
pub fn to_string_indented<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| Error::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_space_indent() {
        let value = serde_json::json!([{"id": 1}]);
        assert_eq!(
            to_string_indented(&value).unwrap(),
            "[\n    {\n        \"id\": 1\n    }\n]"
        );
    }
}
