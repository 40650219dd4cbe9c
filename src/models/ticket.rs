use serde::Deserialize;
use serde_json::Value;

/// Unprocessed ticket record exactly as returned by the API.
///
/// Records are heterogeneous: keys may be missing entirely between two
/// tickets of the same logical type, and `owner`, `createdBy`,
/// `customFieldValues` and `actions` arrive as nested structures.
pub type RawTicket = serde_json::Map<String, Value>;

/// The API answers either with a bare JSON array of tickets or with an
/// object wrapping the array under a `value` key. Both shapes must parse.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TicketResponse {
    Wrapped { value: Vec<RawTicket> },
    Bare(Vec<RawTicket>),
}

impl TicketResponse {
    pub fn into_tickets(self) -> Vec<RawTicket> {
        match self {
            TicketResponse::Wrapped { value } => value,
            TicketResponse::Bare(tickets) => tickets,
        }
    }
}

/// Field set of a person record (`owner` / `createdBy`). A missing or
/// null person still expands to every one of these columns, all null, so
/// reconciliation sees the same column set on every row.
pub const PERSON_FIELDS: [&str; 7] = [
    "id",
    "personType",
    "profileType",
    "businessName",
    "email",
    "phone",
    "pathPicture",
];
