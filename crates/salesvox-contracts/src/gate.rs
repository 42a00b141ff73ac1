//! Read-only query policy.
//!
//! The gate is a literal keyword check over the upper-cased text, not a SQL
//! parser. Matching is by substring, so identifiers such as `UPDATED_AT`
//! trip the `UPDATE` rule.

/// Keywords whose presence anywhere in a query causes rejection, checked in
/// this order. The first hit names the rejection reason.
pub const DENIED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "EXEC", "EXECUTE",
    "GRANT", "REVOKE", "MERGE", "REPLACE",
];

pub const ONLY_SELECT_REASON: &str = "Only SELECT queries are allowed for safety.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
    pub denied_keyword: Option<&'static str>,
}

impl GateVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            denied_keyword: None,
        }
    }

    fn not_select() -> Self {
        Self {
            allowed: false,
            reason: Some(ONLY_SELECT_REASON.to_string()),
            denied_keyword: None,
        }
    }

    fn denied(keyword: &'static str) -> Self {
        Self {
            allowed: false,
            reason: Some(format!(
                "Operation '{keyword}' is not allowed for safety reasons."
            )),
            denied_keyword: Some(keyword),
        }
    }
}

pub fn check(query: &str) -> GateVerdict {
    let normalized = query.trim().to_uppercase();
    if !normalized.starts_with("SELECT") {
        return GateVerdict::not_select();
    }
    match DENIED_KEYWORDS
        .iter()
        .find(|keyword| normalized.contains(*keyword))
    {
        Some(keyword) => GateVerdict::denied(keyword),
        None => GateVerdict::allow(),
    }
}

#[cfg(test)]
mod tests {
    use super::{check, ONLY_SELECT_REASON};

    #[test]
    fn plain_select_is_allowed() {
        let verdict = check("SELECT name FROM customers");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn leading_whitespace_and_case_are_ignored() {
        assert!(check("   select region, SUM(total_amount) FROM sales GROUP BY region").allowed);
        assert!(check("\n\tSeLeCt 1").allowed);
    }

    #[test]
    fn non_select_statements_get_the_only_select_reason() {
        for query in [
            "DELETE FROM sales",
            "with t as (select 1) select * from t",
            "",
            "   ",
            "PRAGMA table_info(sales)",
            "-- comment\nSELECT 1",
        ] {
            let verdict = check(query);
            assert!(!verdict.allowed, "{query:?} should be rejected");
            assert_eq!(verdict.reason.as_deref(), Some(ONLY_SELECT_REASON));
            assert_eq!(verdict.denied_keyword, None);
        }
    }

    #[test]
    fn denied_keyword_inside_identifier_is_rejected() {
        let verdict = check("SELECT * FROM t WHERE UPDATED_AT > 0");
        assert!(!verdict.allowed);
        assert_eq!(verdict.denied_keyword, Some("UPDATE"));
        assert_eq!(
            verdict.reason.as_deref(),
            Some("Operation 'UPDATE' is not allowed for safety reasons.")
        );
    }

    #[test]
    fn created_at_column_trips_create() {
        let verdict = check("select created_at from sales");
        assert_eq!(verdict.denied_keyword, Some("CREATE"));
    }

    #[test]
    fn first_listed_keyword_names_the_reason() {
        let verdict = check("SELECT 1; DROP TABLE sales; DELETE FROM customers");
        assert_eq!(verdict.denied_keyword, Some("DROP"));

        let verdict = check("SELECT 'EXECUTE'");
        assert_eq!(verdict.denied_keyword, Some("EXEC"));
    }

    #[test]
    fn verdict_is_stable_across_calls() {
        let query = "SELECT product FROM sales; INSERT INTO sales VALUES (1)";
        assert_eq!(check(query), check(query));
        let allowed = "SELECT name FROM customers";
        assert_eq!(check(allowed), check(allowed));
    }
}
