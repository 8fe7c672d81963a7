//! Company registry collaborator
use super::error::EngineError;
use std::collections::HashMap;
use std::fmt;

/// Administrative status of a registered company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyStatus {
    pub is_closed: bool,
    pub is_dormant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    Closed,
    Dormant,
    NotRegistered,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ineligibility::Closed => "the establishment is closed",
            Ineligibility::Dormant => "the establishment is dormant",
            Ineligibility::NotRegistered => "the establishment is not registered",
        };
        f.write_str(s)
    }
}

pub trait CompanyRegistry {
    /// `None` when the identifier is unknown to the registry.
    fn lookup_status(&self, siret: &str) -> Option<CompanyStatus>;
}

/// Registry backed by a map, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    companies: HashMap<String, CompanyStatus>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_company(mut self, siret: &str, status: CompanyStatus) -> Self {
        self.companies.insert(siret.to_string(), status);
        self
    }
    pub fn with_active(self, siret: &str) -> Self {
        self.with_company(siret, CompanyStatus::default())
    }
}

impl CompanyRegistry for InMemoryRegistry {
    fn lookup_status(&self, siret: &str) -> Option<CompanyStatus> {
        self.companies.get(siret).copied()
    }
}

/// Refuse identifiers of closed, dormant or unregistered companies.
pub fn check_eligibility(registry: &impl CompanyRegistry, siret: &str) -> Result<(), EngineError> {
    let reason = match registry.lookup_status(siret) {
        None => Some(Ineligibility::NotRegistered),
        Some(status) if status.is_closed => Some(Ineligibility::Closed),
        Some(status) if status.is_dormant => Some(Ineligibility::Dormant),
        Some(_) => None,
    };
    match reason {
        Some(reason) => Err(EngineError::CompanyIneligible {
            siret: siret.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_by_status() {
        let registry = InMemoryRegistry::new()
            .with_active("1")
            .with_company(
                "2",
                CompanyStatus {
                    is_closed: true,
                    is_dormant: false,
                },
            )
            .with_company(
                "3",
                CompanyStatus {
                    is_closed: false,
                    is_dormant: true,
                },
            );

        assert!(check_eligibility(&registry, "1").is_ok());
        assert!(matches!(
            check_eligibility(&registry, "2"),
            Err(EngineError::CompanyIneligible {
                reason: Ineligibility::Closed,
                ..
            })
        ));
        assert!(matches!(
            check_eligibility(&registry, "3"),
            Err(EngineError::CompanyIneligible {
                reason: Ineligibility::Dormant,
                ..
            })
        ));
        assert!(matches!(
            check_eligibility(&registry, "4"),
            Err(EngineError::CompanyIneligible {
                reason: Ineligibility::NotRegistered,
                ..
            })
        ));
    }
}
