//! DIN to DPD drug code lookup

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::warn;

use crate::domain::product::CatalogEntry;
use crate::domain::value_objects::{ProductIdentifier, SourceCode};

/// Pure lookup built once per batch. Absence means "cannot discover".
#[derive(Debug, Clone, Default)]
pub struct IdentifierMapper {
    codes: HashMap<ProductIdentifier, SourceCode>,
}

impl IdentifierMapper {
    /// First mapping wins when a DIN repeats with a different code
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ProductIdentifier, Option<SourceCode>)>,
    {
        let mut codes = HashMap::new();
        for (din, code) in pairs {
            let Some(code) = code else { continue };
            if din.is_blank() {
                continue;
            }
            match codes.entry(din) {
                Entry::Vacant(slot) => {
                    slot.insert(code);
                }
                Entry::Occupied(existing) if existing.get() != &code => {
                    warn!(
                        "DIN {} maps to both {} and {}; keeping the first",
                        existing.key(),
                        existing.get(),
                        code
                    );
                }
                Entry::Occupied(_) => {}
            }
        }
        Self { codes }
    }

    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        Self::from_pairs(
            entries
                .iter()
                .map(|entry| (entry.din.clone(), entry.drug_code.clone())),
        )
    }

    #[must_use]
    pub fn map(&self, din: &ProductIdentifier) -> Option<&SourceCode> {
        self.codes.get(din)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(din: &str, code: &str) -> (ProductIdentifier, Option<SourceCode>) {
        (ProductIdentifier::new(din), SourceCode::parse(code))
    }

    #[test]
    fn maps_known_identifiers_only() {
        let mapper = IdentifierMapper::from_pairs([pair("02242963", "47406"), pair("00000001", "")]);
        assert_eq!(mapper.len(), 1);
        assert_eq!(
            mapper.map(&ProductIdentifier::new("02242963")).map(SourceCode::as_str),
            Some("47406")
        );
        assert!(mapper.map(&ProductIdentifier::new("00000001")).is_none());
        assert!(mapper.map(&ProductIdentifier::new("99999999")).is_none());
    }

    #[test]
    fn first_mapping_wins() {
        let mapper = IdentifierMapper::from_pairs([pair("02242963", "1"), pair("02242963", "2")]);
        assert_eq!(
            mapper.map(&ProductIdentifier::new("02242963")).map(SourceCode::as_str),
            Some("1")
        );
    }
}
