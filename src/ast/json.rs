use serde_json::{Map, Value};

/// `json[key]`, treating `null` as absent
pub(crate) fn json_get<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    json.get(key).filter(|value| !value.is_null())
}

pub(crate) fn json_str<'a>(json: &'a Value, key: &str) -> Option<&'a str> {
    json_get(json, key).and_then(Value::as_str)
}

pub(crate) fn json_array<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    json_get(json, key).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

pub(crate) fn json_kind(json: &Value) -> Option<&str> {
    json_str(json, "kind")
}

pub(crate) fn json_key(json: &Value) -> Option<&str> {
    json_str(json, "key").filter(|key| !key.is_empty())
}

/// A type may be given as a full JSON object or just its kind (`"String"`)
pub(crate) fn parse_type_json_or_kind(json: Option<&Value>) -> Option<Value> {
    match json? {
        Value::String(kind) => Some(kind_json(kind)),
        Value::Null => None,
        json => Some(json.clone()),
    }
}

pub(crate) fn kind_json(kind: &str) -> Value {
    let mut object = Map::new();
    object.insert("kind".to_string(), Value::String(kind.to_string()));
    Value::Object(object)
}

/// Strips the fields consumed by node construction
pub(crate) fn without_key_and_kind(json: &Value) -> Value {
    match json {
        Value::Object(object) => Value::Object(
            object.iter()
                .filter(|(field, _)| field.as_str() != "key" && field.as_str() != "kind")
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        ),
        _ => Value::Object(Map::new()),
    }
}

/// `{ kind, ...json }` as an object: used to fill in the kind of children whose kind is implied
pub(crate) fn with_kind(json: &Value, kind: &str) -> Value {
    let mut object = match json {
        Value::Object(object) => object.clone(),
        _ => Map::new(),
    };
    object.insert("kind".to_string(), Value::String(kind.to_string()));
    Value::Object(object)
}

/// Serialized node object: `kind` always comes first and absent fields are skipped
pub(crate) struct JsonOut(Map<String, Value>);

impl JsonOut {
    pub fn new(kind: &str) -> Self {
        let mut object = Map::new();
        object.insert("kind".to_string(), Value::String(kind.to_string()));
        JsonOut(object)
    }

    pub fn put(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if !value.is_null() {
            self.0.insert(field.to_string(), value);
        }
        self
    }

    pub fn put_opt(&mut self, field: &str, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(value) = value {
            self.put(field, value);
        }
        self
    }

    /// Copies every non-null field of `object` except `kind`
    pub fn extend(&mut self, object: &Map<String, Value>) -> &mut Self {
        for (field, value) in object {
            if field != "kind" && !value.is_null() {
                self.0.insert(field.clone(), value.clone());
            }
        }
        self
    }

    pub fn finish(&mut self) -> Value {
        Value::Object(std::mem::take(&mut self.0))
    }
}
