use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, ItemId, Timestamps};

/// Input for creating a catalogue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    /// Unit of measure (e.g. "pcs", "kg").
    pub unit: String,
    pub description: Option<String>,
}

impl NewItem {
    fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        Ok(())
    }
}

/// Entity: a catalogue item that can be stored in boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub description: Option<String>,
    pub timestamps: Timestamps,
}

impl Item {
    /// Build a validated item row. The id is chosen by the caller so that an
    /// attachment can reference the item before the row is persisted.
    pub fn create(id: ItemId, input: NewItem, now: DateTime<Utc>) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            unit: input.unit.trim().to_string(),
            description: input.description,
            timestamps: Timestamps::at(now),
        })
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            item_id: self.id,
            sku: self.sku.clone(),
            name: self.name.clone(),
            unit: self.unit.clone(),
        }
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Denormalized copy of the item fields a ledger row keeps readable after renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub item_id: ItemId,
    pub sku: String,
    pub name: String,
    pub unit: String,
}

/// Search keyword row derived from an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword {
    pub item_id: ItemId,
    pub value: String,
}

const MIN_KEYWORD_LEN: usize = 2;

/// Derive search keywords from the item's sku, name and description.
///
/// Tokens are split on anything that is not alphanumeric, lowercased, and kept
/// only if at least two characters long. Duplicates are dropped, keeping the
/// first occurrence.
pub fn derive_keywords(item: &Item) -> Vec<Keyword> {
    let sources = [
        Some(item.sku.as_str()),
        Some(item.name.as_str()),
        item.description.as_deref(),
    ];

    let mut seen = Vec::<String>::new();
    for text in sources.into_iter().flatten() {
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.chars().count() < MIN_KEYWORD_LEN {
                continue;
            }
            let token = token.to_lowercase();
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
    }

    seen.into_iter()
        .map(|value| Keyword { item_id: item.id, value })
        .collect()
}
