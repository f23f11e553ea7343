//! Item-level semantics of the stub: key assignment, query filters and
//! update descriptors. Pure functions over `serde_json::Value`, kept apart
//! from the axum handlers so they can be tested without a router.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Ensure `item` is an object with a string `key`, generating one if absent.
/// Returns `None` for items the service would reject.
pub fn with_key(item: Value) -> Option<(String, Value)> {
    let Value::Object(mut fields) = item else {
        return None;
    };
    let key = match fields.get("key") {
        Some(Value::String(key)) if !key.is_empty() => key.clone(),
        Some(_) => return None,
        None => {
            let key = Uuid::new_v4().simple().to_string()[..12].to_string();
            fields.insert("key".to_string(), Value::String(key.clone()));
            key
        }
    };
    Some((key, Value::Object(fields)))
}

// ---------------------------------------------------------------------------
// Query filters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Prefix,
    Contains,
    NotContains,
    Range,
}

impl Op {
    fn parse(s: &str) -> Option<Op> {
        Some(match s {
            "ne" => Op::Ne,
            "lt" => Op::Lt,
            "gt" => Op::Gt,
            "lte" => Op::Lte,
            "gte" => Op::Gte,
            "pfx" => Op::Prefix,
            "contains" => Op::Contains,
            "not_contains" => Op::NotContains,
            "r" => Op::Range,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct Condition {
    path: Vec<String>,
    op: Op,
    operand: Value,
}

impl Condition {
    fn matches(&self, item: &Value) -> bool {
        let field = lookup(item, &self.path);
        match self.op {
            Op::Eq => field.is_some_and(|v| values_equal(v, &self.operand)),
            Op::Ne => !field.is_some_and(|v| values_equal(v, &self.operand)),
            Op::Lt => compare(field, &self.operand) == Some(Ordering::Less),
            Op::Gt => compare(field, &self.operand) == Some(Ordering::Greater),
            Op::Lte => matches!(
                compare(field, &self.operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Op::Gte => matches!(
                compare(field, &self.operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Op::Prefix => match (field, &self.operand) {
                (Some(Value::String(s)), Value::String(p)) => s.starts_with(p.as_str()),
                _ => false,
            },
            Op::Contains => field.is_some_and(|v| contains(v, &self.operand)),
            Op::NotContains => !field.is_some_and(|v| contains(v, &self.operand)),
            Op::Range => match self.operand.as_array().map(Vec::as_slice) {
                Some([low, high]) => {
                    matches!(
                        compare(field, low),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(
                        compare(field, high),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                }
                _ => false,
            },
        }
    }
}

/// A parsed query: items match when every condition of at least one group
/// holds. An empty query matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    groups: Vec<Vec<Condition>>,
}

impl Filter {
    pub fn parse(query: &[Value]) -> Result<Filter, String> {
        let mut groups = Vec::with_capacity(query.len());
        for group in query {
            let Value::Object(conditions) = group else {
                return Err("query conditions must be objects".to_string());
            };
            let mut parsed = Vec::with_capacity(conditions.len());
            for (field, operand) in conditions {
                let (path, op) = match field.split_once('?') {
                    Some((path, op)) => {
                        let op = Op::parse(op).ok_or_else(|| format!("unknown operator: {op}"))?;
                        (path, op)
                    }
                    None => (field.as_str(), Op::Eq),
                };
                if op == Op::Range && !operand.as_array().is_some_and(|r| r.len() == 2) {
                    return Err(format!("range on {path} needs two bounds"));
                }
                parsed.push(Condition {
                    path: path.split('.').map(str::to_string).collect(),
                    op,
                    operand: operand.clone(),
                });
            }
            groups.push(parsed);
        }
        Ok(Filter { groups })
    }

    pub fn matches(&self, item: &Value) -> bool {
        self.groups.is_empty()
            || self
                .groups
                .iter()
                .any(|group| group.iter().all(|c| c.matches(item)))
    }
}

fn lookup<'a>(item: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(item, |value, segment| value.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(field: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (field?, operand) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn contains(field: &Value, operand: &Value) -> bool {
    match (field, operand) {
        (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Value::Array(values), needle) => values.iter().any(|v| values_equal(v, needle)),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Update descriptors
// ---------------------------------------------------------------------------

/// Body of `PATCH /items/{key}` as the stub understands it.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Updates {
    #[serde(default)]
    pub set: Map<String, Value>,
    #[serde(default)]
    pub increment: Map<String, Value>,
    #[serde(default)]
    pub append: Map<String, Value>,
    #[serde(default)]
    pub prepend: Map<String, Value>,
    #[serde(default)]
    pub delete: Vec<String>,
}

impl Updates {
    /// Reject descriptors touching `key` or naming a field in more than one
    /// category.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        let fields = self
            .set
            .keys()
            .chain(self.increment.keys())
            .chain(self.append.keys())
            .chain(self.prepend.keys())
            .chain(self.delete.iter());
        for field in fields {
            if field == "key" {
                return Err("Cannot update key".to_string());
            }
            if !seen.insert(field.as_str()) {
                return Err(format!("Field {field} appears in more than one operation"));
            }
        }
        Ok(())
    }

    /// Apply every category to `item`. On error `item` may be partially
    /// modified; callers apply to a copy.
    pub fn apply(&self, item: &mut Value) -> Result<(), String> {
        for (field, value) in &self.set {
            *slot(item, field)? = value.clone();
        }
        for (field, delta) in &self.increment {
            let target = slot(item, field)?;
            let current = match target {
                Value::Null => Number::from(0),
                Value::Number(n) => n.clone(),
                _ => return Err(format!("Field {field} is not a number")),
            };
            let Value::Number(delta) = delta else {
                return Err(format!("Increment of {field} is not a number"));
            };
            *target = Value::Number(add(&current, delta)?);
        }
        for (field, values) in &self.append {
            extend_list(slot(item, field)?, field, values, false)?;
        }
        for (field, values) in &self.prepend {
            extend_list(slot(item, field)?, field, values, true)?;
        }
        for field in &self.delete {
            remove(item, field);
        }
        Ok(())
    }
}

/// Mutable reference to the value at a dotted path, creating intermediate
/// objects and a `null` leaf as needed.
fn slot<'a>(item: &'a mut Value, field: &str) -> Result<&'a mut Value, String> {
    let mut segments = field.split('.').peekable();
    let mut current = item;
    while let Some(segment) = segments.next() {
        let Value::Object(fields) = current else {
            return Err(format!("Field {field} crosses a non-object value"));
        };
        let next = fields.entry(segment.to_string()).or_insert(Value::Null);
        if next.is_null() && segments.peek().is_some() {
            *next = Value::Object(Map::new());
        }
        current = next;
    }
    Ok(current)
}

fn remove(item: &mut Value, field: &str) {
    let (parent, leaf) = match field.rsplit_once('.') {
        Some((parent, leaf)) => (
            parent
                .split('.')
                .try_fold(&mut *item, |value, segment| value.get_mut(segment)),
            leaf,
        ),
        None => (Some(item), field),
    };
    if let Some(Value::Object(fields)) = parent {
        fields.remove(leaf);
    }
}

fn add(a: &Number, b: &Number) -> Result<Number, String> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum).ok_or_else(|| "increment overflowed".to_string())
}

fn extend_list(target: &mut Value, field: &str, values: &Value, front: bool) -> Result<(), String> {
    let additions = match values {
        Value::Array(values) => values.clone(),
        single => vec![single.clone()],
    };
    if target.is_null() {
        *target = Value::Array(Vec::new());
    }
    let Value::Array(list) = target else {
        return Err(format!("Field {field} is not a list"));
    };
    if front {
        list.splice(0..0, additions);
    } else {
        list.extend(additions);
    }
    Ok(())
}
