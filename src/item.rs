//! Todo items, and the validation that turns client input into them

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ValidationError;

/// The format every due date is stored and returned in
pub const CANONICAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Formats a due date may be given in, tried in this order.
/// Single-digit months and days are accepted by the slash formats.
const ACCEPTED_DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Formats (besides RFC 3339 and the due date formats) accepted for the creation timestamp.
/// They carry no offset and are taken as UTC.
const ACCEPTED_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];


/// The identifier of a todo item, chosen by the client.
///
/// It is kept as the JSON type the client used (a number or a string), but
/// lookups always compare its string rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(serde_json::Number),
    Text(String),
}

impl ItemId {
    pub fn is_empty(&self) -> bool {
        match self {
            ItemId::Number(_) => false,
            ItemId::Text(t) => t.trim().is_empty(),
        }
    }

    /// Whether this id matches a raw id, e.g. taken from a URL path
    pub fn matches(&self, raw: &str) -> bool {
        self.to_string() == raw
    }

    /// Whether this id can never be a document id (CouchDB keeps `_`-prefixed ids for its own endpoints)
    pub fn is_reserved(&self) -> bool {
        self.to_string().starts_with('_')
    }

    /// Integral floats (e.g. `5.0`) become integers, so that they match `5` in URLs
    fn normalized(self) -> Self {
        if let ItemId::Number(n) = &self {
            if n.is_f64() {
                if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER) {
                    return ItemId::Number((f as i64).into());
                }
            }
        }
        self
    }
}

/// Above this, floats no longer hold every integer
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(n: u64) -> Self {
        ItemId::Number(n.into())
    }
}



/// A due date. It accepts several input formats, but is always rendered as `MM/DD/YYYY`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DueDate(NaiveDate);

impl DueDate {
    pub fn as_naive_date(&self) -> &NaiveDate {
        &self.0
    }
}

impl From<NaiveDate> for DueDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl FromStr for DueDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ACCEPTED_DATE_FORMATS.iter()
            .filter_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            // two-digit years would silently land in the first century
            .find(|date| (1000..=9999).contains(&date.year()))
            .map(DueDate)
            .ok_or_else(|| ValidationError::InvalidDate(s.to_string()))
    }
}

impl Display for DueDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_DATE_FORMAT))
    }
}

impl Serialize for DueDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D>(deserializer: D) -> Result<DueDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse the client-provided creation timestamp
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ACCEPTED_TIMESTAMP_FORMATS.iter() {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    let date: DueDate = raw.parse()?;
    Ok(Utc.from_utc_datetime(&date.0.and_time(NaiveTime::MIN)))
}



/// A todo item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    #[serde(rename = "ID")]
    id: ItemId,
    #[serde(rename = "Task")]
    task: String,
    /// When the client says this item was created
    #[serde(rename = "Current_date")]
    created_at: DateTime<Utc>,
    #[serde(rename = "Due_date")]
    due_date: DueDate,
    #[serde(rename = "Event_type")]
    event_type: String,
    #[serde(default)]
    completed: bool,
}

impl TodoItem {
    pub fn id(&self) -> &ItemId                 { &self.id         }
    pub fn task(&self) -> &str                  { &self.task       }
    pub fn created_at(&self) -> &DateTime<Utc>  { &self.created_at }
    pub fn due_date(&self) -> &DueDate          { &self.due_date   }
    pub fn event_type(&self) -> &str            { &self.event_type }
    pub fn completed(&self) -> bool             { self.completed   }

    /// Mark this item as completed. Nothing else is changed
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }
}



/// Item fields, as sent by a client. Nothing is checked yet, see [`NewItem::validate`]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub id: Option<ItemId>,
    pub task: Option<String>,
    pub current_date: Option<String>,
    pub due_date: Option<String>,
    pub event_type: Option<String>,
}

impl NewItem {
    /// Check every field is here and the dates make sense, and build a new (uncompleted) item
    pub fn validate(self) -> Result<TodoItem, ValidationError> {
        let id = match self.id {
            Some(id) if id.is_empty() == false => id.normalized(),
            _ => return Err(ValidationError::MissingFields),
        };
        let task = required(self.task)?;
        let current_date = required(self.current_date)?;
        let due_date = required(self.due_date)?;
        let event_type = required(self.event_type)?;

        if id.is_reserved() {
            return Err(ValidationError::ReservedId(id.to_string()));
        }

        let due_date: DueDate = due_date.parse()?;
        let created_at = parse_timestamp(&current_date)?;

        Ok(TodoItem {
            id,
            task,
            created_at,
            due_date,
            event_type,
            completed: false,
        })
    }
}

fn required(field: Option<String>) -> Result<String, ValidationError> {
    match field {
        Some(value) if value.trim().is_empty() == false => Ok(value),
        _ => Err(ValidationError::MissingFields),
    }
}

/// Validate every entry of a batch. Invalid entries are logged and dropped
pub fn validate_batch(entries: Vec<Value>) -> Vec<TodoItem> {
    entries.into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let result = serde_json::from_value::<NewItem>(entry)
                .map_err(|_| ValidationError::MalformedPayload)
                .and_then(NewItem::validate);
            match result {
                Ok(item) => Some(item),
                Err(err) => {
                    log::warn!("Ignoring invalid todo at index {}: {}", index, err);
                    None
                },
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn sample_item(id: u64, task: &str) -> TodoItem {
    NewItem {
        id: Some(ItemId::from(id)),
        task: Some(task.to_string()),
        current_date: Some("2024-03-01T09:30:00Z".to_string()),
        due_date: Some("2024-03-15".to_string()),
        event_type: Some("personal".to_string()),
    }.validate().unwrap()
}
