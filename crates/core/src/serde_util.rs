//! Serde helpers for payloads produced by the Java backend, which
//! freely emits `null` for collections and primitives it never set.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` (or an absent field, together with
/// `#[serde(default)]`) as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
