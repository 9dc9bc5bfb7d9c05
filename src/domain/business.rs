//! Customers, vendors, employees and the bill terms they refer to.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{new_guid, Guid, Numeric};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub addr1: Option<String>,
    pub addr2: Option<String>,
    pub addr3: Option<String>,
    pub addr4: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillTerm {
    pub guid: Guid,
    pub name: String,
    pub description: String,
    pub refcount: i64,
    pub invisible: bool,
    pub parent: Option<Guid>,
    pub term_type: String,
    pub due_days: Option<i64>,
    pub discount_days: Option<i64>,
    pub discount: Option<Numeric>,
    pub cutoff: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub guid: Guid,
    pub id: String,
    pub name: String,
    pub notes: String,
    pub currency_guid: Guid,
    pub active: bool,
    pub tax_override: bool,
    pub addr: Address,
    pub terms: Option<Guid>,
    pub tax_included: Option<String>,
    pub tax_table: Option<Guid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub guid: Guid,
    pub id: String,
    pub name: String,
    pub notes: String,
    pub active: bool,
    pub discount: Numeric,
    pub credit: Numeric,
    pub currency_guid: Guid,
    pub tax_override: bool,
    pub addr: Address,
    pub ship_addr: Address,
    pub terms: Option<Guid>,
    pub tax_included: Option<i64>,
    pub tax_table: Option<Guid>,
}

/// GnuCash keeps an employee's name in the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub guid: Guid,
    pub id: String,
    pub username: String,
    pub language: String,
    pub acl: String,
    pub active: bool,
    pub currency_guid: Guid,
    pub ccard_guid: Option<Guid>,
    pub workday: Numeric,
    pub rate: Numeric,
    pub addr: Address,
}

/// Old-book guid to new-book guid, per object kind.
#[derive(Debug, Clone, Default)]
pub struct GuidMap {
    pub commodities: HashMap<Guid, Guid>,
    pub accounts: HashMap<Guid, Guid>,
    pub bill_terms: HashMap<Guid, Guid>,
}

impl GuidMap {
    fn commodity(&self, old: &str) -> Option<Guid> {
        self.commodities.get(old).cloned()
    }

    fn account(&self, old: Option<&Guid>) -> Option<Guid> {
        old.and_then(|g| self.accounts.get(g)).cloned()
    }

    fn bill_term(&self, old: Option<&Guid>) -> Option<Guid> {
        old.and_then(|g| self.bill_terms.get(g)).cloned()
    }
}

/// Common behavior of the business parties that get copied into a new book.
pub trait BusinessEntity: Sized {
    /// Plural name for reports, e.g. `vendors`.
    const KIND: &'static str;

    /// The user visible id (not the guid).
    fn entity_id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Old-book currency guid.
    fn currency_guid(&self) -> &str;

    /// Copy for the target book. `None` if the currency has no
    /// counterpart in `map`.
    fn clone_for(&self, map: &GuidMap) -> Option<Self>;
}

impl BusinessEntity for Vendor {
    const KIND: &'static str = "vendors";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn currency_guid(&self) -> &str {
        &self.currency_guid
    }

    fn clone_for(&self, map: &GuidMap) -> Option<Self> {
        Some(Self {
            guid: new_guid(),
            currency_guid: map.commodity(&self.currency_guid)?,
            terms: map.bill_term(self.terms.as_ref()),
            // Tax tables stay behind
            tax_table: None,
            ..self.clone()
        })
    }
}

impl BusinessEntity for Customer {
    const KIND: &'static str = "customers";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn currency_guid(&self) -> &str {
        &self.currency_guid
    }

    fn clone_for(&self, map: &GuidMap) -> Option<Self> {
        Some(Self {
            guid: new_guid(),
            currency_guid: map.commodity(&self.currency_guid)?,
            terms: map.bill_term(self.terms.as_ref()),
            tax_table: None,
            ..self.clone()
        })
    }
}

impl BusinessEntity for Employee {
    const KIND: &'static str = "employees";

    fn entity_id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        self.addr.name.as_deref().unwrap_or(&self.username)
    }

    fn currency_guid(&self) -> &str {
        &self.currency_guid
    }

    fn clone_for(&self, map: &GuidMap) -> Option<Self> {
        Some(Self {
            guid: new_guid(),
            currency_guid: map.commodity(&self.currency_guid)?,
            ccard_guid: map.account(self.ccard_guid.as_ref()),
            ..self.clone()
        })
    }
}

impl BillTerm {
    /// Bill terms are copied before the parties; parents come first.
    pub fn clone_for(&self, map: &GuidMap) -> Self {
        Self {
            guid: new_guid(),
            parent: map.bill_term(self.parent.as_ref()),
            ..self.clone()
        }
    }
}

/// Order bill terms so that every parent precedes its children.
pub fn parents_first(terms: &[BillTerm]) -> Vec<&BillTerm> {
    let mut ordered: Vec<&BillTerm> = Vec::with_capacity(terms.len());
    let mut pending: Vec<&BillTerm> = terms.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|term| {
            let ready = match &term.parent {
                None => true,
                Some(p) => {
                    ordered.iter().any(|o| &o.guid == p) || !terms.iter().any(|t| &t.guid == p)
                }
            };
            if ready {
                ordered.push(*term);
            }
            !ready
        });
        if pending.len() == before {
            // Parent cycle: keep the remaining order as is
            ordered.append(&mut pending);
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor() -> Vendor {
        Vendor {
            guid: new_guid(),
            id: "000001".into(),
            name: "Stadtwerke".into(),
            notes: "Strom und Gas".into(),
            currency_guid: "old-eur".into(),
            active: true,
            tax_override: false,
            addr: Address {
                name: Some("Stadtwerke GmbH".into()),
                addr1: Some("Hauptstr. 1".into()),
                ..Address::default()
            },
            terms: Some("old-term".into()),
            tax_included: Some("USEGLOBAL".into()),
            tax_table: Some("tt".into()),
        }
    }

    fn map() -> GuidMap {
        let mut map = GuidMap::default();
        map.commodities.insert("old-eur".into(), "new-eur".into());
        map.bill_terms.insert("old-term".into(), "new-term".into());
        map.accounts.insert("old-card".into(), "new-card".into());
        map
    }

    #[test]
    fn test_vendor_clone_remaps_references() {
        let original = vendor();
        let copy = original.clone_for(&map()).unwrap();
        assert_ne!(copy.guid, original.guid);
        assert_eq!(copy.id, "000001");
        assert_eq!(copy.name, "Stadtwerke");
        assert_eq!(copy.notes, "Strom und Gas");
        assert_eq!(copy.currency_guid, "new-eur");
        assert_eq!(copy.terms.as_deref(), Some("new-term"));
        assert_eq!(copy.tax_included.as_deref(), Some("USEGLOBAL"));
        assert_eq!(copy.tax_table, None);
        assert_eq!(copy.addr, original.addr);
    }

    #[test]
    fn test_clone_without_currency_mapping_fails() {
        let mut original = vendor();
        original.currency_guid = "unknown".into();
        assert!(original.clone_for(&map()).is_none());
    }

    #[test]
    fn test_employee_clone_remaps_card_account() {
        let employee = Employee {
            guid: new_guid(),
            id: "E1".into(),
            username: "jdoe".into(),
            language: "de".into(),
            acl: String::new(),
            active: true,
            currency_guid: "old-eur".into(),
            ccard_guid: Some("old-card".into()),
            workday: Numeric::new(8, 1).unwrap(),
            rate: Numeric::new(2500, 100).unwrap(),
            addr: Address {
                name: Some("Jo Doe".into()),
                ..Address::default()
            },
        };
        let copy = employee.clone_for(&map()).unwrap();
        assert_eq!(copy.ccard_guid.as_deref(), Some("new-card"));
        assert_eq!(copy.display_name(), "Jo Doe");
        assert_eq!(copy.rate, employee.rate);
    }

    #[test]
    fn test_parents_first() {
        let child = BillTerm {
            guid: "child".into(),
            name: "Net 30 child".into(),
            description: String::new(),
            refcount: 0,
            invisible: false,
            parent: Some("parent".into()),
            term_type: "GNC_TERM_TYPE_DAYS".into(),
            due_days: Some(30),
            discount_days: None,
            discount: None,
            cutoff: None,
        };
        let parent = BillTerm {
            guid: "parent".into(),
            parent: None,
            ..child.clone()
        };
        let terms = vec![child, parent];
        let ordered: Vec<&str> = parents_first(&terms).iter().map(|t| t.guid.as_str()).collect();
        assert_eq!(ordered, vec!["parent", "child"]);
    }
}
