/// Shared-group ids for friend pairs.
///
/// Each unordered pair of users owns exactly one shared group. Its id is the two user
/// ids sorted and joined with [`GROUP_ID_SEPARATOR`], so both players derive the same
/// key whichever of them asks.
use super::error::NetworkError;
use crate::config::network::GROUP_ID_SEPARATOR;

/// Group id of the pair `{a, b}`. Symmetric in its arguments.
///
/// Ids containing the separator are refused: two different pairs could share a key.
pub fn group_id(a: &str, b: &str) -> Result<String, NetworkError> {
    if let Some(bad) = [a, b].into_iter().find(|id| id.contains(GROUP_ID_SEPARATOR)) {
        return Err(NetworkError::InvalidUserId { user_id: bad.to_string() });
    }
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    Ok(format!("{}{}{}", first, GROUP_ID_SEPARATOR, second))
}
