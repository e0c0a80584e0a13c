//! Custom serde deserializers for flexible type handling
//!
//! The web API is not consistent about scalar encodings: numeric ids arrive as
//! JSON numbers from the versioned API and as strings from GraphQL, and
//! counters are occasionally `null`.

use serde::{Deserialize, Deserializer, de};

/// Deserialize an id that can be:
/// - JSON number: `123`
/// - String holding digits: `"123"`
/// - `null`, missing or empty string: `0`
///
/// Strings with non-digit content are rejected so that a changed id format
/// shows up as a decode error instead of a silent zero.
pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleId {
        Int(u64),
        String(String),
    }

    let value: Option<FlexibleId> = Option::deserialize(deserializer)?;

    match value {
        None => Ok(0),
        Some(FlexibleId::Int(i)) => Ok(i),
        Some(FlexibleId::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(0);
            }
            s.parse::<u64>()
                .map_err(|_| de::Error::custom(format!("invalid numeric id: {}", s)))
        }
    }
}

/// Deserialize a counter that may be `null`
pub fn deserialize_null_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// Deserialize a string that may be `null`
pub fn deserialize_null_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an optional opaque token that may arrive as a string or a number
///
/// Continuation cursors and login user ids use either encoding depending on
/// the endpoint. Empty strings are treated as absent.
pub fn deserialize_opt_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Int(i64),
        String(String),
    }

    match Option::<Token>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Token::Int(i)) => Ok(Some(i.to_string())),
        Some(Token::String(s)) if s.is_empty() => Ok(None),
        Some(Token::String(s)) => Ok(Some(s)),
    }
}
