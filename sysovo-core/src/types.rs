use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kinds of entity that carry a rank and can be dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    List,
    Card,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::List => f.write_str("list"),
            EntityKind::Card => f.write_str("card"),
        }
    }
}

/// A user as the API returns it when a reference is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserShort {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_role: Option<String>,
}

/// Weak reference to a user. The API sends either the bare id or the
/// populated user document, depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    User(UserShort),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::User(user) => &user.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<UserRef>,
}

impl Board {
    pub fn owner_id(&self) -> Option<&str> {
        self.created_by.as_ref().map(UserRef::id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.id() == user_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    OnHold,
    Completed,
}

impl CardStatus {
    pub const ALL: [CardStatus; 4] = [
        CardStatus::Pending,
        CardStatus::InProgress,
        CardStatus::OnHold,
        CardStatus::Completed,
    ];

    /// Name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Pending => "Pending",
            CardStatus::InProgress => "In Progress",
            CardStatus::OnHold => "OnHold",
            CardStatus::Completed => "Completed",
        }
    }

    /// Parse a wire name, case-insensitively and ignoring spaces.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted: String = raw.split_whitespace().collect::<String>().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().replace(' ', "").to_lowercase() == wanted)
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: String,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<UserRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CardStatus,
    #[serde(default, with = "due_date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl Card {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assigned_to.as_ref().is_some_and(|a| a.id() == user_id)
    }
}

/// A list (column) of a board. `cards` is filled by the loader and is not
/// authoritative for membership: `Card::list_id` is. The API may send card
/// ids there instead of documents; those entries are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardList {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub board_id: String,
    #[serde(default, deserialize_with = "lenient_position")]
    pub position: usize,
    #[serde(default, deserialize_with = "loaded_cards")]
    pub cards: Vec<Card>,
}

/// The loaded tree of one board: its lists in display order, each holding
/// its cards in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub board_id: String,
    pub lists: Vec<BoardList>,
}

impl BoardState {
    pub fn new(board_id: impl Into<String>, lists: Vec<BoardList>) -> Self {
        Self {
            board_id: board_id.into(),
            lists,
        }
    }

    pub fn list(&self, list_id: &str) -> Option<&BoardList> {
        self.lists.iter().find(|l| l.id == list_id)
    }

    pub fn list_index(&self, list_id: &str) -> Option<usize> {
        self.lists.iter().position(|l| l.id == list_id)
    }

    /// Locate a card as `(list index, card index)`.
    pub fn find_card(&self, card_id: &str) -> Option<(usize, usize)> {
        self.lists.iter().enumerate().find_map(|(li, list)| {
            list.cards
                .iter()
                .position(|c| c.id == card_id)
                .map(|ci| (li, ci))
        })
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.find_card(card_id)
            .map(|(li, ci)| &self.lists[li].cards[ci])
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.lists.iter().flat_map(|l| l.cards.iter())
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|l| l.cards.len()).sum()
    }

    /// True when every sibling sequence carries dense positions and every
    /// card's `list_id` names the list holding it.
    pub fn is_consistent(&self) -> bool {
        crate::position::is_dense(&self.lists)
            && self.lists.iter().all(|l| {
                crate::position::is_dense(&l.cards) && l.cards.iter().all(|c| c.list_id == l.id)
            })
    }
}

/// Sparse list update. Absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ListPatch {
    pub fn position(position: usize) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.title.is_none()
    }
}

/// Sparse card update. `Some(None)` on the clearable fields sends an
/// explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CardStatus>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_patch_due_date"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Option<String>>,
}

impl CardPatch {
    /// The placement fields written after a card move.
    pub fn placement(position: usize, list_id: &str) -> Self {
        Self {
            position: Some(position),
            list_id: Some(list_id.to_string()),
            ..Self::default()
        }
    }

    pub fn status(status: CardStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moves_card().is_empty() && self.edited_fields().is_empty()
    }

    /// Names of the placement fields (position, listId) this patch sets.
    pub fn moves_card(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.position.is_some() {
            fields.push("position");
        }
        if self.list_id.is_some() {
            fields.push("listId");
        }
        fields
    }

    /// Names of the content fields this patch sets.
    pub fn edited_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.due_date.is_some() {
            fields.push("dueDate");
        }
        if self.assigned_to.is_some() {
            fields.push("assignedTo");
        }
        fields
    }

    /// Apply the content fields of this patch to `card`. Placement fields
    /// are ignored here; moves go through the reorder engine.
    pub fn apply_fields(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(description) = &self.description {
            card.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            card.status = status;
        }
        if let Some(due_date) = self.due_date {
            card.due_date = due_date;
        }
        if let Some(assigned_to) = &self.assigned_to {
            card.assigned_to = assigned_to.clone().map(UserRef::Id);
        }
    }
}

/// Parse a due date as sent by the API (RFC 3339) or by a date input
/// (`YYYY-MM-DD`, taken as midnight UTC).
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Ranks written by a JS backend can arrive as `1.0` or even `-1`.
/// Negatives clamp to 0 and fractions are floored; the loader reports
/// any resulting non-dense sequence.
fn lenient_position<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    struct PositionVisitor;

    impl<'de> Visitor<'de> for PositionVisitor {
        type Value = usize;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a numeric position")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<usize, E> {
            usize::try_from(v).map_err(|_| E::custom(format!("position {} is too large", v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<usize, E> {
            self.visit_u64(v.max(0) as u64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<usize, E> {
            if !v.is_finite() {
                return Err(E::custom(format!("invalid position {}", v)));
            }
            self.visit_u64(v.max(0.0).floor() as u64)
        }

        fn visit_unit<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<usize, E> {
            Ok(0)
        }
    }

    d.deserialize_any(PositionVisitor)
}

fn loaded_cards<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Card>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Card(Box<Card>),
        Other(de::IgnoredAny),
    }

    let entries = Option::<Vec<Entry>>::deserialize(d)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::Card(card) => Some(*card),
            Entry::Other(_) => None,
        })
        .collect())
}

fn serialize_patch_due_date<S: Serializer>(
    value: &Option<Option<DateTime<Utc>>>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(inner) => due_date::serialize(inner, s),
        None => s.serialize_none(),
    }
}

mod due_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SecondsFormat;

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => super::parse_due_date(text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid due date: {}", text))),
        }
    }
}
