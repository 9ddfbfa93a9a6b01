//! Wire codec: a frame is UTF-8 text, `KEY: VALUE` lines terminated by a
//! blank line. Grounded on `original_source/messages/utils/format.py`.

use std::collections::HashMap;

use crate::error::LsnpError;

pub type Frame = HashMap<String, String>;

/// Emits `K: V\n` per key in declaration order, followed by a blank line.
pub fn serialize(fields: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Parses a frame into a key/value map. Key order on ingress is irrelevant.
pub fn deserialize(raw: &str) -> Result<Frame, LsnpError> {
    let normalized = raw.replace("\r\n", "\n");
    if !normalized.ends_with("\n\n") {
        return Err(LsnpError::MalformedFrame(
            "frame is missing its terminating blank line".into(),
        ));
    }
    let mut map = HashMap::new();
    for line in normalized.trim_end_matches('\n').split('\n') {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| LsnpError::MalformedFrame(format!("line without ':': {line:?}")))?;
        let key = key.trim().to_string();
        let value = value.trim().to_string();
        if map.contains_key(&key) {
            return Err(LsnpError::MalformedFrame(format!("duplicate key: {key}")));
        }
        map.insert(key, value);
    }
    Ok(map)
}

/// Reads the first non-empty line and requires it to be `TYPE: <value>`.
pub fn extract_type(raw: &str) -> Result<String, LsnpError> {
    let normalized = raw.replace("\r\n", "\n");
    let first_line = normalized
        .split('\n')
        .find(|l| !l.is_empty())
        .ok_or_else(|| LsnpError::MalformedFrame("empty frame".into()))?;
    let (key, value) = first_line
        .split_once(':')
        .ok_or_else(|| LsnpError::MalformedFrame("first line is missing ':'".into()))?;
    if key.trim() != "TYPE" {
        return Err(LsnpError::MalformedFrame(
            "frame does not start with TYPE".into(),
        ));
    }
    Ok(value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_string_payloads() {
        let fields = [("TYPE", "PING".to_string()), ("USER_ID", "a@1.2.3.4".to_string())];
        let frame = serialize(&fields);
        let parsed = deserialize(&frame).unwrap();
        assert_eq!(parsed.get("TYPE").unwrap(), "PING");
        assert_eq!(parsed.get("USER_ID").unwrap(), "a@1.2.3.4");
    }

    #[test]
    fn rejects_missing_terminator() {
        assert!(deserialize("TYPE: PING\n").is_err());
    }

    #[test]
    fn rejects_line_without_colon() {
        assert!(deserialize("TYPE: PING\nGARBAGE\n\n").is_err());
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert!(deserialize("TYPE: PING\nTYPE: POST\n\n").is_err());
    }

    #[test]
    fn ignores_blank_lines_inside_body() {
        let parsed = deserialize("TYPE: PING\n\nUSER_ID: a@1.2.3.4\n\n").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn extract_type_reads_first_line() {
        assert_eq!(extract_type("TYPE: DM\nFROM: a@1.2.3.4\n\n").unwrap(), "DM");
    }

    #[test]
    fn extract_type_rejects_frame_not_starting_with_type() {
        assert!(extract_type("FROM: a@1.2.3.4\nTYPE: DM\n\n").is_err());
    }
}
