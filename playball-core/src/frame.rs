//! Feed frame decoding.
//!
//! The live feed went through several wire revisions. All of them are decoded
//! here, once, into a [`Frame`] that records which revision it came from, so
//! the recorder and replay code never branch on payload shape themselves.
//!
//! ```text
//! Nested           {"value": {"games": {"sim": {..}, "schedule": [..]}}}
//! NestedSequenced  {"value": {"games": {..}, "lastUpdateTime": 1234}}
//! Flat             {"value": {"sim": {..}, "schedule": [..], "lastUpdateTime": 1234}}
//! ```

use serde_json::{Map, Value};

use crate::error::FrameError;

/// Housekeeping field carrying the monotonically non-decreasing update sequence
pub const SEQUENCE_FIELD: &str = "lastUpdateTime";

/// Wire schema revision a frame was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSchema {
    /// Games document nested under `value.games`, no update sequence
    Nested,
    /// Games document nested under `value.games`, sequence in `value.lastUpdateTime`
    NestedSequenced,
    /// Games document is `value` itself
    Flat,
}

impl std::fmt::Display for FrameSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSchema::Nested => write!(f, "nested"),
            FrameSchema::NestedSequenced => write!(f, "nested-sequenced"),
            FrameSchema::Flat => write!(f, "flat"),
        }
    }
}

/// Season and day ordinals of the simulation.
///
/// Ordering is lexicographic: a later season always sorts after any day of an
/// earlier season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimDay {
    pub season: i64,
    pub day: i64,
}

impl SimDay {
    pub fn new(season: i64, day: i64) -> Self {
        Self { season, day }
    }
}

impl std::fmt::Display for SimDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}d{}", self.season, self.day)
    }
}

/// Game counts for status output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameTally {
    pub total: usize,
    pub ongoing: usize,
    pub finished: usize,
}

impl std::fmt::Display for GameTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ongoing:{}/{} Finished:{}/{}",
            self.ongoing, self.total, self.finished, self.total
        )
    }
}

/// One decoded payload from the live feed
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    schema: FrameSchema,
    raw: Value,
    games: Value,
    sim_day: SimDay,
    sequence: Option<i64>,
}

impl Frame {
    /// Decode a frame from the text of one streamed event
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let raw: Value = serde_json::from_str(text)?;
        Self::from_value(raw)
    }

    /// Decode a frame from an already parsed document
    pub fn from_value(raw: Value) -> Result<Self, FrameError> {
        let value = raw
            .get("value")
            .and_then(Value::as_object)
            .ok_or(FrameError::MissingSection("value"))?;

        let sequence = parse_sequence(value)?;

        let (schema, games) = if let Some(games) = value.get("games") {
            let schema = match sequence {
                Some(_) => FrameSchema::NestedSequenced,
                None => FrameSchema::Nested,
            };
            (schema, games.clone())
        } else if value.contains_key("sim") {
            let mut games: Map<String, Value> = value.clone();
            games.remove(SEQUENCE_FIELD);
            (FrameSchema::Flat, Value::Object(games))
        } else {
            return Err(FrameError::UnknownSchema);
        };

        let sim_day = parse_sim_day(&games)?;
        match games.get("schedule") {
            Some(Value::Array(_)) => {}
            Some(_) => return Err(FrameError::InvalidSchedule),
            None => return Err(FrameError::MissingSection("schedule")),
        }

        Ok(Frame {
            schema,
            raw,
            games,
            sim_day,
            sequence,
        })
    }

    /// Wrap a bare games document (as stored in archive lines) into a nested frame
    pub fn from_games(games: Value) -> Result<Self, FrameError> {
        Self::from_value(nest_games(games))
    }

    pub fn schema(&self) -> FrameSchema {
        self.schema
    }

    /// The update-relevant section, without housekeeping fields
    pub fn games(&self) -> &Value {
        &self.games
    }

    pub fn sim_day(&self) -> SimDay {
        self.sim_day
    }

    pub fn sequence(&self) -> Option<i64> {
        self.sequence
    }

    /// The document exactly as it was received
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// True when the update-relevant content is identical to `games`
    pub fn same_content(&self, games: &Value) -> bool {
        &self.games == games
    }

    pub fn schedule(&self) -> &[Value] {
        match self.games.get("schedule") {
            Some(Value::Array(list)) => list.as_slice(),
            _ => &[],
        }
    }

    pub fn tally(&self) -> GameTally {
        let mut tally = GameTally::default();
        for game in self.schedule() {
            tally.total += 1;
            if flag(game, "gameComplete") {
                tally.finished += 1;
            } else if flag(game, "gameStart") {
                tally.ongoing += 1;
            }
        }
        tally
    }
}

fn flag(game: &Value, name: &str) -> bool {
    game.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn parse_sequence(value: &Map<String, Value>) -> Result<Option<i64>, FrameError> {
    match value.get(SEQUENCE_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| FrameError::InvalidSequence(v.to_string())),
    }
}

fn parse_sim_day(games: &Value) -> Result<SimDay, FrameError> {
    let sim = games
        .get("sim")
        .and_then(Value::as_object)
        .ok_or(FrameError::MissingSection("sim"))?;
    let season = sim
        .get("season")
        .and_then(Value::as_i64)
        .ok_or(FrameError::InvalidSimField("season"))?;
    let day = sim
        .get("day")
        .and_then(Value::as_i64)
        .ok_or(FrameError::InvalidSimField("day"))?;
    Ok(SimDay { season, day })
}

/// Wrap a bare games document as `{"value": {"games": ...}}`
pub fn nest_games(games: Value) -> Value {
    let mut value = Map::new();
    value.insert("games".to_string(), games);
    let mut raw = Map::new();
    raw.insert("value".to_string(), Value::Object(value));
    Value::Object(raw)
}

/// Locate the schedule list of a recorded payload, whatever its revision
pub fn schedule_of(payload: &Value) -> Option<&Value> {
    let value = payload.get("value")?;
    match value.get("games") {
        Some(games) => games.get("schedule"),
        None => value.get("schedule"),
    }
}

/// Overwrite the update sequence of a recorded payload.
///
/// Used to expand a compact entry back into the full payload it stands for.
pub fn graft_sequence(payload: &mut Value, sequence: i64) {
    if let Some(value) = payload.get_mut("value").and_then(Value::as_object_mut) {
        value.insert(SEQUENCE_FIELD.to_string(), Value::from(sequence));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn games(season: i64, day: i64) -> Value {
        json!({
            "sim": {"season": season, "day": day},
            "schedule": [
                {"id": "a", "gameStart": true, "gameComplete": false},
                {"id": "b", "gameStart": true, "gameComplete": true},
                {"id": "c", "gameStart": false, "gameComplete": false},
            ]
        })
    }

    #[test]
    fn test_decode_nested() {
        let text = json!({"value": {"games": games(11, 4)}}).to_string();
        let frame = Frame::decode(&text).unwrap();
        assert_eq!(frame.schema(), FrameSchema::Nested);
        assert_eq!(frame.sim_day(), SimDay::new(11, 4));
        assert_eq!(frame.sequence(), None);
        assert_eq!(frame.games(), &games(11, 4));
    }

    #[test]
    fn test_decode_nested_sequenced() {
        let raw = json!({"value": {"games": games(11, 4), "lastUpdateTime": 1700}});
        let frame = Frame::from_value(raw.clone()).unwrap();
        assert_eq!(frame.schema(), FrameSchema::NestedSequenced);
        assert_eq!(frame.sequence(), Some(1700));
        assert_eq!(frame.raw(), &raw);
    }

    #[test]
    fn test_decode_flat_excludes_sequence_from_content() {
        let mut value = games(12, 0);
        value["lastUpdateTime"] = json!(5);
        let frame = Frame::from_value(json!({ "value": value })).unwrap();
        assert_eq!(frame.schema(), FrameSchema::Flat);
        assert_eq!(frame.sequence(), Some(5));
        assert!(frame.same_content(&games(12, 0)));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(Frame::decode("not json"), Err(FrameError::Json(_))));
        assert!(matches!(
            Frame::from_value(json!({"other": 1})),
            Err(FrameError::MissingSection("value"))
        ));
        assert!(matches!(
            Frame::from_value(json!({"value": {"schedule": []}})),
            Err(FrameError::UnknownSchema)
        ));
        assert!(matches!(
            Frame::from_value(json!({"value": {"games": {"sim": {"season": 1, "day": "x"}, "schedule": []}}})),
            Err(FrameError::InvalidSimField("day"))
        ));
        assert!(matches!(
            Frame::from_value(json!({"value": {"games": games(1, 1), "lastUpdateTime": "x"}})),
            Err(FrameError::InvalidSequence(_))
        ));
        assert!(matches!(
            Frame::from_value(json!({"value": {"games": {"sim": {"season": 1, "day": 1}, "schedule": {}}}})),
            Err(FrameError::InvalidSchedule)
        ));
    }

    #[test]
    fn test_tally() {
        let frame = Frame::from_games(games(1, 2)).unwrap();
        let tally = frame.tally();
        assert_eq!(
            tally,
            GameTally {
                total: 3,
                ongoing: 1,
                finished: 1
            }
        );
        assert_eq!(tally.to_string(), "Ongoing:1/3 Finished:1/3");
    }

    #[test]
    fn test_sim_day_ordering() {
        assert!(SimDay::new(3, 0) > SimDay::new(2, 98));
        assert!(SimDay::new(2, 5) > SimDay::new(2, 4));
        assert!(SimDay::new(2, 4) <= SimDay::new(2, 4));
        assert_eq!(SimDay::new(11, 3).to_string(), "s11d3");
    }

    #[test]
    fn test_schedule_and_graft_on_both_shapes() {
        let mut nested = json!({"value": {"games": games(1, 1), "lastUpdateTime": 1}});
        graft_sequence(&mut nested, 9);
        assert_eq!(nested["value"]["lastUpdateTime"], json!(9));
        assert_eq!(schedule_of(&nested).unwrap().as_array().unwrap().len(), 3);

        let mut flat = json!({ "value": games(1, 1) });
        graft_sequence(&mut flat, 4);
        assert_eq!(flat["value"]["lastUpdateTime"], json!(4));
        assert!(schedule_of(&flat).is_some());
        assert!(schedule_of(&json!({})).is_none());
    }
}
