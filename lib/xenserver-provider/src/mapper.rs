// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversions between remote record fields and local attribute values.
//!
//! Scalars are copied as-is. Key-value fields arrive untyped from the pool
//! and are narrowed here to the local element type; a value that does not
//! fit is the only field-level failure, and it names the field.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;
use xenapi_client::{ObjectApi, OpaqueRef, XenClass, XenMap};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("field {field}: {detail}")]
    Conversion { field: String, detail: String },

    #[error("field {field}: {source}")]
    Remote {
        field: String,
        #[source]
        source: xenapi_client::Error,
    },
}

impl MapError {
    fn conversion(field: &str, detail: String) -> Self {
        MapError::Conversion { field: field.to_string(), detail }
    }
}

/// Converts a remote key-value field into a string-to-string map.
pub fn string_map(
    field: &str,
    map: &XenMap,
) -> Result<BTreeMap<String, String>, MapError> {
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            other => Err(MapError::conversion(
                field,
                format!("value for key \"{key}\" is not a string: {other}"),
            )),
        })
        .collect()
}

/// Converts a local string map into the remote key-value representation.
pub fn xen_map(map: &BTreeMap<String, String>) -> XenMap {
    map.iter().map(|(k, v)| (k.clone(), Value::from(v.as_str()))).collect()
}

/// Copies an ordered remote list, preserving its order.
pub fn string_list<T: ToString>(items: &[T]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Narrows a remote integer to a 32-bit attribute.
pub fn int32(field: &str, value: i64) -> Result<i32, MapError> {
    i32::try_from(value).map_err(|_| {
        MapError::conversion(field, format!("{value} does not fit in int32"))
    })
}

/// Presents references as the UUIDs of the objects they point to.
///
/// The null reference becomes the empty string without a remote call.
pub struct RefResolver<'a, C: ?Sized> {
    api: &'a C,
}

impl<'a, C: ObjectApi + ?Sized> RefResolver<'a, C> {
    pub fn new(api: &'a C) -> Self {
        RefResolver { api }
    }

    pub async fn uuid(
        &self,
        field: &str,
        class: XenClass,
        reference: &OpaqueRef,
    ) -> Result<String, MapError> {
        if reference.is_null() {
            return Ok(String::new());
        }
        self.api.get_uuid(class, reference).await.map_err(|source| {
            MapError::Remote { field: field.to_string(), source }
        })
    }

    pub async fn uuids(
        &self,
        field: &str,
        class: XenClass,
        references: &[OpaqueRef],
    ) -> Result<Vec<String>, MapError> {
        let mut out = Vec::with_capacity(references.len());
        for reference in references {
            out.push(self.uuid(field, class, reference).await?);
        }
        Ok(out)
    }

    pub async fn uuid_map(
        &self,
        field: &str,
        class: XenClass,
        references: &BTreeMap<String, OpaqueRef>,
    ) -> Result<BTreeMap<String, String>, MapError> {
        let mut out = BTreeMap::new();
        for (key, reference) in references {
            out.insert(key.clone(), self.uuid(field, class, reference).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_map_converts_element_wise() {
        let mut map = XenMap::new();
        map.insert("a".to_string(), json!("1"));
        map.insert("b".to_string(), json!(""));
        let out = string_map("other_config", &map).unwrap();
        assert_eq!(out.get("a").map(String::as_str), Some("1"));
        assert_eq!(out.get("b").map(String::as_str), Some(""));
        assert_eq!(xen_map(&out), map);
    }

    #[test]
    fn non_string_value_names_the_field() {
        let mut map = XenMap::new();
        map.insert("mtu".to_string(), json!(9000));
        let err = string_map("other_config", &map).unwrap_err();
        match err {
            MapError::Conversion { field, detail } => {
                assert_eq!(field, "other_config");
                assert!(detail.contains("\"mtu\""));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn list_order_is_preserved() {
        let refs =
            [OpaqueRef::new("OpaqueRef:b"), OpaqueRef::new("OpaqueRef:a")];
        assert_eq!(string_list(&refs), vec!["OpaqueRef:b", "OpaqueRef:a"]);
    }

    #[test]
    fn int32_narrowing() {
        assert_eq!(int32("domid", -1).unwrap(), -1);
        assert!(matches!(
            int32("domid", i64::from(i32::MAX) + 1),
            Err(MapError::Conversion { ref field, .. }) if field == "domid"
        ));
    }
}
