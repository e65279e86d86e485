use crate::line_item::LineItem;
use crate::period::Period;
use crate::schema::{StatementDocument, StatementKind};
use crate::utils::sanitize_item_name;

/// A named collection of line items in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    items: Vec<LineItem>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn statement_name(&self) -> &'static str {
        self.kind.display_name()
    }

    /// Adds an item. An existing item with the same name is replaced in place.
    pub fn add_item(&mut self, item: LineItem) {
        match self.items.iter_mut().find(|existing| existing.name == item.name) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn get_item(&self, name: &str) -> Option<&LineItem> {
        let key = sanitize_item_name(name);
        self.items.iter().find(|item| item.name == key)
    }

    pub fn get_item_mut(&mut self, name: &str) -> Option<&mut LineItem> {
        let key = sanitize_item_name(name);
        self.items.iter_mut().find(|item| item.name == key)
    }

    pub fn remove_item(&mut self, name: &str) -> Option<LineItem> {
        let key = sanitize_item_name(name);
        let index = self.items.iter().position(|item| item.name == key)?;
        Some(self.items.remove(index))
    }

    pub fn items(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the problems found: empty names or period labels that are not
    /// `YYYY` / `YYYYQn`. An empty list means the statement is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for item in &self.items {
            if item.name.is_empty() {
                problems.push(format!("{}: line item with empty name", self.statement_name()));
            }

            for period in item.historical.keys().chain(item.forecasted.keys()) {
                if Period::parse(period).is_err() {
                    problems.push(format!(
                        "{}: '{}' has invalid period '{}'",
                        self.statement_name(),
                        item.name,
                        period
                    ));
                }
            }
        }

        problems
    }

    pub fn to_document(&self) -> StatementDocument {
        StatementDocument(
            self.items
                .iter()
                .map(|item| (item.name.clone(), item.to_document()))
                .collect(),
        )
    }

    pub fn from_document(kind: StatementKind, document: StatementDocument) -> Self {
        let mut statement = Self::new(kind);
        for (name, item) in document.0 {
            statement.add_item(LineItem::from_document(&name, item));
        }
        statement
    }
}
