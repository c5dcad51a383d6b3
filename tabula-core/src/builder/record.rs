//! Field-name keyed values written by inserts and updates

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::QueryError;
use crate::schema::DataType;
use crate::Value;

/// Values of one row keyed by field name
pub type Record = BTreeMap<String, Value>;

/// Trait to convert various types into a [`Record`]
///
/// Any serializable struct works by reference (`&animal`); its fields are
/// matched to columns by name and unknown keys are ignored. Maps of [`Value`]
/// should be passed by value.
pub trait IntoRecord {
    fn into_record(self) -> Result<Record, QueryError>;
}

impl IntoRecord for Record {
    fn into_record(self) -> Result<Record, QueryError> {
        Ok(self)
    }
}

impl IntoRecord for HashMap<String, Value> {
    fn into_record(self) -> Result<Record, QueryError> {
        Ok(self.into_iter().collect())
    }
}

impl IntoRecord for Vec<(&str, Value)> {
    fn into_record(self) -> Result<Record, QueryError> {
        Ok(self
            .into_iter()
            .map(|(field, value)| (field.to_string(), value))
            .collect())
    }
}

impl<T: Serialize> IntoRecord for &T {
    fn into_record(self) -> Result<Record, QueryError> {
        let json =
            serde_json::to_value(self).map_err(|e| QueryError::invalid_record(e.to_string()))?;
        match json {
            serde_json::Value::Object(fields) => Ok(fields
                .into_iter()
                .map(|(field, value)| (field, Value::from_json(value)))
                .collect()),
            other => Err(QueryError::invalid_record(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }
}

/// Narrow a serialized value to the column type where the textual JSON form
/// loses it (uuids, timestamps, decimals, wide integers, byte arrays)
pub(crate) fn coerce(value: Value, data_type: &DataType) -> Value {
    match (value, data_type) {
        (Value::I32(i), DataType::BigInt) => Value::I64(i64::from(i)),
        (Value::Json(serde_json::Value::Array(items)), DataType::Bytes) => {
            let bytes: Option<Vec<u8>> = items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            match bytes {
                Some(bytes) => Value::Bytes(bytes),
                None => Value::Json(serde_json::Value::Array(items)),
            }
        }
        #[cfg(feature = "uuid-support")]
        (Value::String(s), DataType::Uuid) => match uuid::Uuid::parse_str(&s) {
            Ok(id) => Value::Uuid(id),
            Err(_) => Value::String(s),
        },
        #[cfg(feature = "datetime-support")]
        (Value::String(s), DataType::Timestamp) => match chrono::DateTime::parse_from_rfc3339(&s) {
            Ok(at) => Value::DateTime(at.with_timezone(&chrono::Utc)),
            Err(_) => Value::String(s),
        },
        #[cfg(feature = "decimal-support")]
        (Value::String(s), DataType::Decimal) => match s.parse::<rust_decimal::Decimal>() {
            Ok(d) => Value::Decimal(d),
            Err(_) => Value::String(s),
        },
        (value, _) => value,
    }
}
