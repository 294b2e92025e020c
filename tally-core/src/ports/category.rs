//! Category validator port
//!
//! Categories live in a separate service. Rules only need to know that a
//! category id is usable as a reference; whether the category exists is not
//! checked, so rules survive categories being renamed or removed.

use crate::domain::result::{Error, Result};

/// Confirms a category identifier is syntactically usable
pub trait CategoryValidator: Send + Sync {
    fn validate(&self, category_id: &str) -> Result<()>;
}

/// Accepts any non-blank identifier without surrounding whitespace
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntacticCategoryValidator;

impl CategoryValidator for SyntacticCategoryValidator {
    fn validate(&self, category_id: &str) -> Result<()> {
        if category_id.trim().is_empty() {
            return Err(Error::validation("Category id cannot be empty"));
        }
        if category_id.trim() != category_id {
            return Err(Error::validation(format!(
                "Category id '{}' has leading or trailing whitespace",
                category_id
            )));
        }
        Ok(())
    }
}
