//! The `{"value": [...]}` envelope used by every list endpoint, and the
//! validation applied to each record before it reaches callers.

use serde::Deserialize;
use tracing::warn;

/// List response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ODataList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// A record returned by the API that must carry a non-empty identifier.
pub(crate) trait Record {
    const KIND: &'static str;

    fn record_id(&self) -> &str;
}

impl<T: Record> ODataList<T> {
    /// Unwraps the envelope, dropping records without an identifier.
    pub(crate) fn into_valid(self) -> Vec<T> {
        let total = self.value.len();
        let valid: Vec<T> = self
            .value
            .into_iter()
            .filter(|rec| !rec.record_id().trim().is_empty())
            .collect();
        if valid.len() != total {
            warn!(
                kind = T::KIND,
                dropped = total - valid.len(),
                "ignoring records without an id"
            );
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Thing {
        #[serde(default)]
        id: String,
    }

    impl Record for Thing {
        const KIND: &'static str = "Thing";

        fn record_id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn drops_records_without_id() {
        let list: ODataList<Thing> =
            serde_json::from_str(r#"{"value":[{"id":"a"},{},{"id":" "},{"id":"b"}]}"#).unwrap();
        let ids: Vec<String> = list.into_valid().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_value_is_empty() {
        let list: ODataList<Thing> = serde_json::from_str(r#"{"@odata.context":"x"}"#).unwrap();
        assert!(list.into_valid().is_empty());
    }
}
