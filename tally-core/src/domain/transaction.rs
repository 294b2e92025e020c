//! Transaction domain model
//!
//! Transactions are owned by the ingestion pipeline. The categorization engine
//! reads the text fields and only ever writes `category_id`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single financial transaction belonging to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    /// Raw description from the bank feed
    pub name: String,
    /// Cleaned-up merchant name, when the feed provides one
    pub merchant_name: Option<String>,
    /// Text the user typed in themselves
    pub user_description: Option<String>,
    /// Assigned category, `None` while uncategorized
    pub category_id: Option<String>,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
}

/// Which transaction field supplied the search text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchField {
    UserDescription,
    MerchantName,
    Name,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::UserDescription => "userDescription",
            SearchField::MerchantName => "merchantName",
            SearchField::Name => "name",
        }
    }
}

impl std::fmt::Display for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn populated(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Transaction {
    /// Create an uncategorized transaction with only a raw name
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        amount: Decimal,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            merchant_name: None,
            user_description: None,
            category_id: None,
            amount,
            transaction_date,
        }
    }

    pub fn with_merchant(mut self, merchant_name: impl Into<String>) -> Self {
        self.merchant_name = Some(merchant_name.into());
        self
    }

    pub fn with_user_description(mut self, description: impl Into<String>) -> Self {
        self.user_description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    /// Select the text rules are matched against
    ///
    /// The first populated field wins, in order: user description, merchant
    /// name, raw name. Blank (whitespace-only) fields count as absent.
    /// Returns `None` when none of the three is populated.
    pub fn search_text(&self) -> Option<(SearchField, &str)> {
        if let Some(text) = populated(self.user_description.as_deref()) {
            return Some((SearchField::UserDescription, text));
        }
        if let Some(text) = populated(self.merchant_name.as_deref()) {
            return Some((SearchField::MerchantName, text));
        }
        populated(Some(self.name.as_str())).map(|text| (SearchField::Name, text))
    }

    pub fn is_categorized(&self) -> bool {
        self.category_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(name: &str) -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            name,
            Decimal::new(-1250, 2),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        )
    }

    #[test]
    fn test_user_description_wins() {
        let t = tx("C").with_merchant("B").with_user_description("A");
        assert_eq!(t.search_text(), Some((SearchField::UserDescription, "A")));
    }

    #[test]
    fn test_merchant_used_when_no_user_description() {
        let t = tx("CAMP BELLY RUB, LLC").with_merchant("Camp Belly Rub LLC");
        assert_eq!(
            t.search_text(),
            Some((SearchField::MerchantName, "Camp Belly Rub LLC"))
        );
    }

    #[test]
    fn test_blank_fields_are_skipped() {
        let t = tx("RAW NAME").with_merchant("   ").with_user_description("");
        assert_eq!(t.search_text(), Some((SearchField::Name, "RAW NAME")));
    }

    #[test]
    fn test_no_populated_field() {
        let t = tx("  ");
        assert_eq!(t.search_text(), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let t = tx("Coffee").with_category("coffee");
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["categoryId"], "coffee");
        assert!(json["merchantName"].is_null());
    }
}
