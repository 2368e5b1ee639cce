//! Response shape inference.
//!
//! The daemon answers every command with a flat `key: value` stream. Whether
//! that stream is one value, one object, a list of objects or a set of named
//! objects is not on the wire; it is inferred here from the number of lines,
//! from key repetition, and from the caller's [`Shape`] table.
//!
//! The heuristics are observable behaviour for existing verbs: a list of
//! single-field objects comes back as a list of plain strings, one object with
//! many fields comes back bare unless the verb is list-shaped, and so on.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::frame::{Frame, Line};
use super::shape::Shape;

/// Ordered `key -> value` object. A key appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Append a field. Callers check [`Record::contains_key`] first.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            record.push(key, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Ordered object whose keys may repeat; repeats accumulate in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiRecord {
    fields: Vec<(String, Vec<String>)>,
}

impl MultiRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into()),
            None => self.fields.push((key, vec![value.into()])),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Serialize for MultiRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, values) in &self.fields {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

/// Ordered `group name -> object` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups {
    entries: Vec<(String, MultiRecord)>,
}

impl Groups {
    pub fn get(&self, name: &str) -> Option<&MultiRecord> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, record)| record)
    }

    /// Insert or replace in place; a repeated name keeps its first position.
    pub fn insert(&mut self, name: String, record: MultiRecord) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = record,
            None => self.entries.push((name, record)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Groups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, record) in &self.entries {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }
}

/// Element of a list result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListItem {
    Scalar(String),
    Record(Record),
}

impl ListItem {
    /// Single-field records collapse to their value.
    fn collapse(record: Record) -> Self {
        match <[(String, String); 1]>::try_from(record.fields) {
            Ok([(_, value)]) => ListItem::Scalar(value),
            Err(fields) => ListItem::Record(Record { fields }),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ListItem::Scalar(value) => Some(value),
            ListItem::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            ListItem::Record(record) => Some(record),
            ListItem::Scalar(_) => None,
        }
    }
}

/// The parsed result of one response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    /// Bare `OK`.
    Unit,
    Scalar(String),
    Record(Record),
    List(Vec<ListItem>),
    Groups(Groups),
}

impl ParsedValue {
    pub fn is_unit(&self) -> bool {
        matches!(self, ParsedValue::Unit)
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParsedValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            ParsedValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ListItem]> {
        match self {
            ParsedValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&Groups> {
        match self {
            ParsedValue::Groups(groups) => Some(groups),
            _ => None,
        }
    }

    /// Every scalar this value carries: the scalar itself, or the scalar items
    /// of a list. Used to read `changed: <subsystem>` replies.
    pub fn scalars(&self) -> Vec<&str> {
        match self {
            ParsedValue::Scalar(value) => vec![value.as_str()],
            ParsedValue::List(items) => items.iter().filter_map(ListItem::as_scalar).collect(),
            _ => Vec::new(),
        }
    }
}

impl Serialize for ParsedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParsedValue::Unit => serializer.serialize_bool(true),
            ParsedValue::Scalar(value) => serializer.serialize_str(value),
            ParsedValue::Record(record) => record.serialize(serializer),
            ParsedValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ParsedValue::Groups(groups) => groups.serialize(serializer),
        }
    }
}

/// Infer the shape of one frame.
pub fn parse(frame: Frame, command: &str, shape: &Shape) -> ParsedValue {
    let lines = frame.into_lines();
    tracing::trace!("Parsing {} line(s) for {}", lines.len(), command);

    if lines.is_empty() {
        return if shape.expects_list {
            ParsedValue::List(Vec::new())
        } else {
            ParsedValue::Unit
        };
    }

    let lines = match <[Line; 1]>::try_from(lines) {
        Ok([line]) if shape.expects_list => {
            return ParsedValue::List(vec![ListItem::Scalar(line.value)])
        }
        Ok([line]) => return ParsedValue::Scalar(line.value),
        Err(lines) => lines,
    };

    match shape.grouping_key.as_deref() {
        Some(key) => ParsedValue::Groups(group_by(lines, key, command)),
        None => split_records(lines, shape.expects_list),
    }
}

/// Start a new group at every `key` line.
fn group_by(lines: Vec<Line>, key: &str, command: &str) -> Groups {
    let mut groups = Groups::default();
    let mut current: Option<(String, MultiRecord)> = None;

    for line in lines {
        if line.key == key {
            if let Some((name, record)) = current.take() {
                groups.insert(name, record);
            }
            current = Some((line.value, MultiRecord::new()));
        } else if let Some((_, record)) = current.as_mut() {
            record.append(line.key, line.value);
        } else {
            tracing::debug!("{}: dropping {:?} before first {:?} line", command, line.key, key);
        }
    }

    if let Some((name, record)) = current {
        groups.insert(name, record);
    }
    groups
}

/// A repeated key closes the working record and seeds the next one.
fn split_records(lines: Vec<Line>, expects_list: bool) -> ParsedValue {
    let mut records = Vec::new();
    let mut current = Record::new();

    for line in lines {
        if current.contains_key(&line.key) {
            records.push(std::mem::take(&mut current));
        }
        current.push(line.key, line.value);
    }
    records.push(current);

    if records.len() == 1 {
        let record = records.pop().unwrap_or_default();
        return if expects_list {
            ParsedValue::List(vec![ListItem::Record(record)])
        } else {
            ParsedValue::Record(record)
        };
    }

    ParsedValue::List(records.into_iter().map(ListItem::collapse).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(lines: &[(&str, &str)]) -> Frame {
        Frame::new(lines.iter().map(|(k, v)| Line::new(*k, *v)).collect())
    }

    fn plain() -> Shape {
        Shape::default()
    }

    fn list() -> Shape {
        Shape {
            expects_list: true,
            grouping_key: None,
        }
    }

    fn grouped(key: &str) -> Shape {
        Shape {
            expects_list: true,
            grouping_key: Some(key.to_string()),
        }
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(parse(Frame::default(), "play", &plain()), ParsedValue::Unit);
        assert_eq!(
            parse(Frame::default(), "playlistinfo", &list()),
            ParsedValue::List(Vec::new())
        );
    }

    #[test]
    fn test_single_line() {
        assert_eq!(
            parse(frame(&[("updating_db", "3")]), "update", &plain()),
            ParsedValue::Scalar("3".to_string())
        );
        assert_eq!(
            parse(frame(&[("file", "a.flac")]), "listplaylist", &list()),
            ParsedValue::List(vec![ListItem::Scalar("a.flac".to_string())])
        );
    }

    #[test]
    fn test_single_key_records_collapse_to_scalars() {
        let value = parse(frame(&[("file", "a"), ("file", "b")]), "listplaylist", &plain());
        assert_eq!(
            value,
            ParsedValue::List(vec![
                ListItem::Scalar("a".to_string()),
                ListItem::Scalar("b".to_string()),
            ])
        );
    }

    #[test]
    fn test_key_repetition_splits_records() {
        let value = parse(
            frame(&[("file", "a"), ("Time", "5"), ("file", "b"), ("Time", "7")]),
            "playlistinfo",
            &list(),
        );
        let expected_a: Record = [("file", "a"), ("Time", "5")].into_iter().collect();
        let expected_b: Record = [("file", "b"), ("Time", "7")].into_iter().collect();
        assert_eq!(
            value,
            ParsedValue::List(vec![ListItem::Record(expected_a), ListItem::Record(expected_b)])
        );
    }

    #[test]
    fn test_one_record_is_bare_unless_list_shaped() {
        let lines = [("volume", "40"), ("repeat", "0"), ("state", "play")];

        let status = parse(frame(&lines), "status", &plain());
        let record = status.as_record().expect("bare record");
        assert_eq!(record.get("state"), Some("play"));
        assert_eq!(record.len(), 3);

        let wrapped = parse(frame(&lines), "playlistinfo", &list());
        assert_eq!(wrapped.as_list().map(<[ListItem]>::len), Some(1));
        assert!(wrapped.as_list().unwrap()[0].as_record().is_some());
    }

    #[test]
    fn test_mixed_list_keeps_multi_field_records() {
        let value = parse(
            frame(&[
                ("directory", "Albums"),
                ("file", "x.flac"),
                ("Title", "X"),
                ("file", "y.flac"),
            ]),
            "lsinfo",
            &plain(),
        );
        let items = value.as_list().expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_record().and_then(|r| r.get("directory")), Some("Albums"));
        assert_eq!(items[1].as_scalar(), Some("y.flac"));
    }

    #[test]
    fn test_grouping_key_builds_named_map() {
        let value = parse(
            frame(&[
                ("plugin", "mad"),
                ("suffix", "mp3"),
                ("suffix", "mp2"),
                ("plugin", "ffmpeg"),
                ("suffix", "wav"),
            ]),
            "decoders",
            &grouped("plugin"),
        );
        let groups = value.as_groups().expect("groups");
        assert_eq!(groups.names().collect::<Vec<_>>(), vec!["mad", "ffmpeg"]);
        assert_eq!(
            groups.get("mad").and_then(|r| r.get("suffix")),
            Some(&["mp3".to_string(), "mp2".to_string()][..])
        );
        assert_eq!(
            groups.get("ffmpeg").and_then(|r| r.get("suffix")),
            Some(&["wav".to_string()][..])
        );
    }

    #[test]
    fn test_grouping_drops_lines_before_first_group() {
        let value = parse(
            frame(&[
                ("Last-Modified", "2024-01-01"),
                ("playlist", "road"),
                ("Last-Modified", "2024-02-01"),
            ]),
            "listplaylists",
            &grouped("playlist"),
        );
        let groups = value.as_groups().expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups.get("road").and_then(|r| r.get("Last-Modified")),
            Some(&["2024-02-01".to_string()][..])
        );
    }

    #[test]
    fn test_serializes_like_the_shapes_it_infers() {
        let unit = serde_json::to_value(ParsedValue::Unit).unwrap();
        assert_eq!(unit, serde_json::json!(true));

        let value = parse(
            frame(&[("plugin", "mad"), ("suffix", "mp3"), ("suffix", "mp2")]),
            "decoders",
            &grouped("plugin"),
        );
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            serde_json::json!({ "mad": { "suffix": ["mp3", "mp2"] } })
        );

        let list = parse(frame(&[("file", "a"), ("file", "b")]), "x", &plain());
        assert_eq!(serde_json::to_value(&list).unwrap(), serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_scalars_reads_changed_lines() {
        let one = parse(frame(&[("changed", "player")]), "idle", &plain());
        assert_eq!(one.scalars(), vec!["player"]);

        let two = parse(frame(&[("changed", "player"), ("changed", "mixer")]), "idle", &plain());
        assert_eq!(two.scalars(), vec!["player", "mixer"]);
    }
}
