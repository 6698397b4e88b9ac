//! Opt-in gate on which statements the relay forwards.
//!
//! The default forwards everything verbatim. An allow-list only looks at the
//! leading keyword of the statement; it is not a SQL parser and is not a
//! substitute for database permissions.

use crate::error::RelayError;

pub const ALLOWED_STATEMENTS_VAR: &str = "RELAY_ALLOWED_STATEMENTS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatementPolicy {
    #[default]
    AllowAll,
    /// Upper-cased leading keywords, e.g. `SELECT`, `WITH`.
    AllowList(Vec<String>),
}

impl StatementPolicy {
    /// Read `RELAY_ALLOWED_STATEMENTS` (comma separated); unset or blank means `AllowAll`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let keywords: Vec<String> = lookup(ALLOWED_STATEMENTS_VAR)
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_ascii_uppercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            StatementPolicy::AllowAll
        } else {
            StatementPolicy::AllowList(keywords)
        }
    }

    /// # Errors
    /// Returns `RelayError::PolicyError` naming the rejected keyword.
    pub fn check(&self, sql: &str) -> Result<(), RelayError> {
        let StatementPolicy::AllowList(allowed) = self else {
            return Ok(());
        };
        let keyword = leading_keyword(sql);
        if allowed.iter().any(|k| *k == keyword) {
            Ok(())
        } else {
            Err(RelayError::PolicyError(if keyword.is_empty() {
                "empty statement".to_string()
            } else {
                keyword
            }))
        }
    }
}

fn leading_keyword(sql: &str) -> String {
    sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}
