use serde::{Deserialize, Deserializer};

/// Deserialize a possibly-`null` value, treating `null` as the type's default.
///
/// The remote API encodes empty lists as `null` in several responses.
pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
