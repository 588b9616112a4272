//! Role-based visibility over invoice data.
//!
//! Every read path (listing, detail, renderer data supply, export data
//! supply) goes through [`AccessScope`]; no read path carries its own
//! filtering logic.

use crate::models::Invoice;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    User,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "user" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

/// Caller identity, supplied by the external authentication layer.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub customer_id: Option<Uuid>,
}

impl Caller {
    pub fn scope(&self) -> AccessScope {
        AccessScope::for_caller(self.role, self.customer_id)
    }
}

/// The single gate deciding which invoices a caller may read.
#[derive(Debug, Clone, Copy)]
pub struct AccessScope {
    restrict_to: Option<Uuid>,
    deny_all: bool,
}

impl AccessScope {
    /// `admin` and `staff` are unrestricted; `user` is bound to their own
    /// customer, and a `user` with no bound customer sees nothing.
    pub fn for_caller(role: Role, customer_id: Option<Uuid>) -> Self {
        match role {
            Role::Admin | Role::Staff => Self {
                restrict_to: None,
                deny_all: false,
            },
            Role::User => match customer_id {
                Some(id) => Self {
                    restrict_to: Some(id),
                    deny_all: false,
                },
                None => Self {
                    restrict_to: None,
                    deny_all: true,
                },
            },
        }
    }

    /// Customer restriction to push into store queries, if any.
    pub fn customer_filter(&self) -> Option<Uuid> {
        self.restrict_to
    }

    /// Whether this scope can never see any invoice.
    pub fn denies_everything(&self) -> bool {
        self.deny_all
    }

    /// Whether a specific invoice is visible under this scope.
    pub fn permits(&self, invoice: &Invoice) -> bool {
        if self.deny_all {
            return false;
        }
        match self.restrict_to {
            Some(customer_id) => invoice.customer_id == customer_id,
            None => true,
        }
    }
}
