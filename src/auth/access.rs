//! Caller identity and record-visibility filters.
//!
//! Every client, project and delivery note is created by one user and is
//! also readable by users sharing its company id. Mutations of clients and
//! projects are reserved to the creator. Records the caller cannot see are
//! indistinguishable from missing ones.

use sqlx::{QueryBuilder, Sqlite};

/// Authenticated caller, as carried by the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: i64,
    pub email: String,
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    OwnerOrCompany,
    OwnerOnly,
}

/// Storage filter restricting a query to the records a caller may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessFilter {
    user_id: i64,
    company_id: Option<String>,
    scope: Scope,
    exclude_archived: bool,
}

impl AccessFilter {
    /// Default listings: not archived, created by the caller or shared through its company.
    pub fn listing(caller: &CallerContext) -> Self {
        Self {
            user_id: caller.user_id,
            company_id: caller.company_id.clone(),
            scope: Scope::OwnerOrCompany,
            exclude_archived: true,
        }
    }

    /// Direct lookups by id, where archive state does not block access.
    pub fn lookup(caller: &CallerContext) -> Self {
        Self {
            exclude_archived: false,
            ..Self::listing(caller)
        }
    }

    /// Creator-only access, used by mutations.
    pub fn owner(caller: &CallerContext) -> Self {
        Self {
            user_id: caller.user_id,
            company_id: None,
            scope: Scope::OwnerOnly,
            exclude_archived: false,
        }
    }

    /// Appends the filter predicate for the table aliased as `alias`.
    ///
    /// The fragment has no leading `WHERE`/`AND`; callers place it.
    pub fn push_predicate(&self, query: &mut QueryBuilder<'_, Sqlite>, alias: &str) {
        match (&self.scope, &self.company_id) {
            (Scope::OwnerOrCompany, Some(company_id)) => {
                query
                    .push(format!("({alias}.created_by = "))
                    .push_bind(self.user_id)
                    .push(format!(" OR {alias}.company_id = "))
                    .push_bind(company_id.clone())
                    .push(")");
            }
            // A caller without a company only ever matches its own records;
            // NULL company ids never match each other.
            (Scope::OwnerOrCompany, None) | (Scope::OwnerOnly, _) => {
                query
                    .push(format!("{alias}.created_by = "))
                    .push_bind(self.user_id);
            }
        }

        if self.exclude_archived {
            query.push(format!(" AND {alias}.archived = 0"));
        }
    }
}
