use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// Characters the document store refuses in an item id.
const FORBIDDEN_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Top-level fields the document store owns.
const RESERVED_FIELDS: [&str; 1] = ["_id"];

/// A stored document, addressed by `(id, pk)`.
///
/// Top-level fields other than the named ones are kept in `extra` and
/// round-trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Item {
    #[validate(length(min = 1, max = 255))]
    pub id: String,
    #[validate(length(min = 1))]
    pub pk: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Builds a new item from a create request body.
    ///
    /// `pk` must be a non-empty string. A missing, null or empty `id` is
    /// replaced with a fresh UUID.
    pub fn from_draft(mut body: Map<String, Value>) -> Result<Self, AppError> {
        match body.get("pk") {
            Some(Value::String(pk)) if !pk.is_empty() => {}
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Missing 'pk' (partition key) field"
                )));
            }
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "'pk' (partition key) must be a string"
                )));
            }
        }

        let needs_id = match body.get("id") {
            None | Some(Value::Null) => true,
            Some(Value::String(id)) => id.is_empty(),
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!("'id' must be a string")));
            }
        };
        if needs_id {
            body.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        Self::from_fields(body)
    }

    /// Overlays `patch` onto this item. Fields absent from the patch keep
    /// their values; `id` and `pk` stay those of the addressed item.
    pub fn merged(self, patch: Map<String, Value>) -> Result<Self, AppError> {
        let id = self.id.clone();
        let pk = self.pk.clone();

        let mut fields = self.into_fields();
        fields.extend(patch);
        fields.insert("id".to_string(), Value::String(id));
        fields.insert("pk".to_string(), Value::String(pk));

        Self::from_fields(fields)
    }

    /// Treats `body` as the complete new content of item `(item_id, pk)`.
    pub fn replacement(
        mut body: Map<String, Value>,
        item_id: &str,
        pk: &str,
    ) -> Result<Self, AppError> {
        body.insert("id".to_string(), Value::String(item_id.to_string()));
        body.insert("pk".to_string(), Value::String(pk.to_string()));
        Self::from_fields(body)
    }

    /// Flattens the item back into a JSON object.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = self.extra;
        fields.insert("id".to_string(), Value::String(self.id));
        fields.insert("pk".to_string(), Value::String(self.pk));
        fields.insert("name".to_string(), Value::String(self.name));
        if let Some(description) = self.description {
            fields.insert("description".to_string(), Value::String(description));
        }
        fields
    }

    fn from_fields(fields: Map<String, Value>) -> Result<Self, AppError> {
        if let Some(field) = RESERVED_FIELDS.iter().find(|f| fields.contains_key(**f)) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "'{}' is a reserved field",
                field
            )));
        }
        for (key, value) in &fields {
            check_storable(key, value)?;
        }

        let item: Item = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid item: {}", e)))?;
        item.validate()?;
        validate_item_id(&item.id)?;
        Ok(item)
    }
}

pub fn validate_item_id(id: &str) -> Result<(), AppError> {
    if let Some(c) = id.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "'id' must not contain '{}'",
            c
        )));
    }
    Ok(())
}

/// Rejects JSON the document store cannot hold: integers above `i64::MAX`
/// and field names containing NUL.
fn check_storable(path: &str, value: &Value) -> Result<(), AppError> {
    if path.contains('\0') {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Field names must not contain NUL"
        )));
    }
    match value {
        Value::Number(n) if n.as_i64().is_none() && n.as_u64().is_some() => {
            Err(AppError::BadRequest(anyhow::anyhow!(
                "'{}' is out of range: integers must fit in 64 signed bits",
                path
            )))
        }
        Value::Array(values) => values
            .iter()
            .enumerate()
            .try_for_each(|(i, v)| check_storable(&format!("{}[{}]", path, i), v)),
        Value::Object(fields) => fields
            .iter()
            .try_for_each(|(k, v)| check_storable(&format!("{}.{}", path, k), v)),
        _ => Ok(()),
    }
}

/// Picks the partition key for an update from the query string or the
/// body. When both are given they must agree.
pub fn update_partition_key(
    query_pk: Option<&str>,
    body: &Map<String, Value>,
) -> Result<String, AppError> {
    let body_pk = match body.get("pk") {
        None | Some(Value::Null) => None,
        Some(Value::String(pk)) => Some(pk.as_str()),
        Some(_) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "'pk' (partition key) must be a string"
            )));
        }
    };

    let query_pk = query_pk.filter(|pk| !pk.is_empty());
    let body_pk = body_pk.filter(|pk| !pk.is_empty());

    match (query_pk, body_pk) {
        (Some(q), Some(b)) if q != b => Err(AppError::BadRequest(anyhow::anyhow!(
            "Partition key in query ('{}') does not match body ('{}')",
            q,
            b
        ))),
        (Some(pk), _) | (None, Some(pk)) => Ok(pk.to_string()),
        (None, None) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Missing 'pk' (partition key)"
        ))),
    }
}
