use serde_json::Value;
use std::str::FromStr;

use super::error::EnvelopeError;
use crate::{field::Record, primitives::EntityKind};

pub const EXPECTED_FORMAT: &str = r#"{"<KIND>": [{...}, {...}]}"#;

/// A validated batch: one entity kind and its records.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: EntityKind,
    pub records: Vec<Record>,
}

impl Envelope {
    pub fn parse(payload: &Value) -> Result<Self, EnvelopeError> {
        let object = payload.as_object().ok_or(EnvelopeError::NotAnObject)?;
        if object.len() != 1 {
            return Err(EnvelopeError::KeyCount(object.len()));
        }
        let Some((key, value)) = object.iter().next() else {
            return Err(EnvelopeError::KeyCount(0));
        };
        let kind = EntityKind::from_str(key)
            .map_err(|_| EnvelopeError::UnsupportedKind(key.clone()))?;
        let items = value
            .as_array()
            .ok_or_else(|| EnvelopeError::NotAList(key.clone()))?;
        let records = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                item.as_object()
                    .cloned()
                    .ok_or_else(|| EnvelopeError::RecordNotAnObject {
                        kind: key.clone(),
                        index,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { kind, records })
    }
}
