//! Schema validator: checks field presence and semantic types against a
//! declared per-message schema. Grounded on spec.md §4.2.

use crate::codec::Frame;
use crate::error::LsnpError;
use crate::fields::{MessageId, Timestamp, Token, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    UserId,
    MessageId,
    Timestamp,
    Token,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub required: bool,
}

pub const fn required(kind: FieldKind) -> FieldSpec {
    FieldSpec {
        kind,
        required: true,
    }
}

pub const fn optional(kind: FieldKind) -> FieldSpec {
    FieldSpec {
        kind,
        required: false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub msg_type: &'static str,
    pub fields: &'static [(&'static str, FieldSpec)],
}

impl Schema {
    /// (a) TYPE matches, (b) no field outside the schema, (c) every required
    /// field present, (d) every present field's value parses as its
    /// declared semantic type.
    pub fn validate(&self, frame: &Frame) -> Result<(), LsnpError> {
        match frame.get("TYPE") {
            Some(t) if t == self.msg_type => {}
            Some(_) => {
                return Err(LsnpError::SchemaError {
                    field: "TYPE".to_string(),
                })
            }
            None => {
                return Err(LsnpError::SchemaError {
                    field: "TYPE".to_string(),
                })
            }
        }

        for key in frame.keys() {
            if key == "TYPE" {
                continue;
            }
            if !self.fields.iter().any(|(name, _)| name == key) {
                return Err(LsnpError::SchemaError { field: key.clone() });
            }
        }

        for (name, spec) in self.fields {
            match frame.get(*name) {
                Some(value) => {
                    if !kind_matches(spec.kind, value) {
                        return Err(LsnpError::SchemaError {
                            field: (*name).to_string(),
                        });
                    }
                }
                None if spec.required => {
                    return Err(LsnpError::SchemaError {
                        field: (*name).to_string(),
                    })
                }
                None => {}
            }
        }

        Ok(())
    }
}

fn kind_matches(kind: FieldKind, value: &str) -> bool {
    match kind {
        FieldKind::Str => true,
        FieldKind::Int => value.parse::<i64>().is_ok(),
        FieldKind::UserId => value.parse::<UserId>().is_ok(),
        FieldKind::MessageId => value.parse::<MessageId>().is_ok(),
        FieldKind::Timestamp => value.parse::<Timestamp>().is_ok(),
        FieldKind::Token => value.parse::<Token>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const DM_SCHEMA: Schema = Schema {
        msg_type: "DM",
        fields: &[
            ("FROM", required(FieldKind::UserId)),
            ("TO", required(FieldKind::UserId)),
            ("CONTENT", required(FieldKind::Str)),
            ("TIMESTAMP", required(FieldKind::Timestamp)),
            ("MESSAGE_ID", required(FieldKind::MessageId)),
            ("TOKEN", required(FieldKind::Token)),
        ],
    };

    fn valid_frame() -> HashMap<String, String> {
        [
            ("TYPE", "DM"),
            ("FROM", "alice@10.0.0.1"),
            ("TO", "bob@10.0.0.2"),
            ("CONTENT", "hi"),
            ("TIMESTAMP", "1700000000"),
            ("MESSAGE_ID", "0123456789abcdef"),
            ("TOKEN", "alice@10.0.0.1|1700003600|chat"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn missing_required_field_names_it() {
        let mut frame = valid_frame();
        frame.remove("CONTENT");
        let err = DM_SCHEMA.validate(&frame).unwrap_err();
        assert!(matches!(err, LsnpError::SchemaError { field } if field == "CONTENT"));
    }

    #[test]
    fn extra_field_is_rejected() {
        let mut frame = valid_frame();
        frame.insert("EXTRA".to_string(), "nope".to_string());
        assert!(DM_SCHEMA.validate(&frame).is_err());
    }

    #[test]
    fn valid_frame_passes() {
        assert!(DM_SCHEMA.validate(&valid_frame()).is_ok());
    }
}
