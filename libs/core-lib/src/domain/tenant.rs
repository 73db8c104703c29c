use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::CoreError;

// --- Tenant enums ---
// Closed sets; stored as text columns in the control schema and converted
// through `as_str`/`TryFrom<String>` so the database never sees free-form
// values.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Trial,
    Active,
    Inactive,
    Suspended,
    Expired,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Trial => "TRIAL",
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Inactive => "INACTIVE",
            TenantStatus::Suspended => "SUSPENDED",
            TenantStatus::Expired => "EXPIRED",
        }
    }
}

impl TryFrom<String> for TenantStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "TRIAL" => Ok(TenantStatus::Trial),
            "ACTIVE" => Ok(TenantStatus::Active),
            "INACTIVE" => Ok(TenantStatus::Inactive),
            "SUSPENDED" => Ok(TenantStatus::Suspended),
            "EXPIRED" => Ok(TenantStatus::Expired),
            other => Err(CoreError::Validation(format!(
                "unknown tenant status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business category; drives which default role types get seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantType {
    Gym,
    Studio,
    PersonalTrainer,
    Enterprise,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantType::Gym => "GYM",
            TenantType::Studio => "STUDIO",
            TenantType::PersonalTrainer => "PERSONAL_TRAINER",
            TenantType::Enterprise => "ENTERPRISE",
        }
    }
}

impl TryFrom<String> for TenantType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "GYM" => Ok(TenantType::Gym),
            "STUDIO" => Ok(TenantType::Studio),
            "PERSONAL_TRAINER" => Ok(TenantType::PersonalTrainer),
            "ENTERPRISE" => Ok(TenantType::Enterprise),
            other => Err(CoreError::Validation(format!(
                "unknown tenant type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for TenantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far schema provisioning has progressed for a tenant. Queryable so
/// operators can tell "never started" from "schema created, migrations
/// pending" from "fully ready".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningState {
    NotStarted,
    SchemaCreated,
    Ready,
}

impl ProvisioningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::NotStarted => "NOT_STARTED",
            ProvisioningState::SchemaCreated => "SCHEMA_CREATED",
            ProvisioningState::Ready => "READY",
        }
    }
}

impl TryFrom<String> for ProvisioningState {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "NOT_STARTED" => Ok(ProvisioningState::NotStarted),
            "SCHEMA_CREATED" => Ok(ProvisioningState::SchemaCreated),
            "READY" => Ok(ProvisioningState::Ready),
            other => Err(CoreError::Validation(format!(
                "unknown provisioning state: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Tenant record ---

/// One row of the control-schema `tenants` table: the single source of truth
/// for the domain -> schema-name -> status mapping.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TenantRecord {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub schema_name: String,
    #[sqlx(try_from = "String")]
    pub tenant_type: TenantType,
    #[sqlx(try_from = "String")]
    pub status: TenantStatus,
    #[sqlx(try_from = "String")]
    pub provisioning_state: ProvisioningState,
    pub description: Option<String>,
    pub settings: Option<Json>,
    pub contact: Option<Json>,
    pub trial_start_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// Schema creation and migrations both completed. The registry never
    /// reports a tenant usable before this holds.
    pub fn is_schema_created(&self) -> bool {
        self.provisioning_state == ProvisioningState::Ready
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn is_trial(&self) -> bool {
        self.status == TenantStatus::Trial
    }

    pub fn is_trial_expired(&self) -> bool {
        match self.trial_end_date {
            Some(end) => Utc::now() > end,
            None => false,
        }
    }

    pub fn days_until_trial_expires(&self) -> i64 {
        match self.trial_end_date {
            Some(end) => {
                let remaining = end - Utc::now();
                remaining.num_days().max(0)
            }
            None => 0,
        }
    }
}

// --- Inputs ---

/// Request to register a tenant. `domain` is the permanent human-facing key.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTenant {
    pub name: String,
    pub domain: String,
    pub tenant_type: TenantType,
    pub contact_email: Option<String>,
    pub description: Option<String>,
}

impl NewTenant {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("tenant name cannot be empty".into()));
        }
        if self.name.len() > 200 {
            return Err(CoreError::Validation(
                "tenant name exceeds 200 characters".into(),
            ));
        }
        validate_domain(&self.domain)?;
        Ok(())
    }
}

/// Field-level merge for `update_tenant`. `domain` and `schema_name` are
/// deliberately absent; neither may change after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub tenant_type: Option<TenantType>,
    pub status: Option<TenantStatus>,
    pub description: Option<String>,
    pub settings: Option<Json>,
    pub contact: Option<Json>,
}

/// Domain charset rule: lowercase alphanumerics and hyphens, 3-63 chars, no
/// leading or trailing hyphen. Rejected before any I/O.
pub fn validate_domain(domain: &str) -> Result<(), CoreError> {
    if domain.len() < 3 || domain.len() > 63 {
        return Err(CoreError::InvalidIdentifier(format!(
            "domain must be 3-63 characters: {domain:?}"
        )));
    }
    if domain.starts_with('-') || domain.ends_with('-') {
        return Err(CoreError::InvalidIdentifier(format!(
            "domain cannot start or end with a hyphen: {domain:?}"
        )));
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::InvalidIdentifier(format!(
            "domain may only contain lowercase letters, digits and hyphens: {domain:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(status: TenantStatus, state: ProvisioningState) -> TenantRecord {
        TenantRecord {
            id: Uuid::new_v4(),
            name: "Acme Gym".into(),
            domain: "acme-gym".into(),
            schema_name: "tenant_acmegym".into(),
            tenant_type: TenantType::Gym,
            status,
            provisioning_state: state,
            description: None,
            settings: None,
            contact: None,
            trial_start_date: Some(Utc::now()),
            trial_end_date: Some(Utc::now() + Duration::days(30)),
            last_access_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            TenantStatus::Trial,
            TenantStatus::Active,
            TenantStatus::Inactive,
            TenantStatus::Suspended,
            TenantStatus::Expired,
        ] {
            let parsed = TenantStatus::try_from(status.as_str().to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(TenantStatus::try_from("BOGUS".to_string()).is_err());
    }

    #[test]
    fn provisioning_state_gates_usability() {
        assert!(!record(TenantStatus::Active, ProvisioningState::NotStarted).is_schema_created());
        assert!(
            !record(TenantStatus::Active, ProvisioningState::SchemaCreated).is_schema_created()
        );
        assert!(record(TenantStatus::Active, ProvisioningState::Ready).is_schema_created());
    }

    #[test]
    fn trial_accessors() {
        let mut tenant = record(TenantStatus::Trial, ProvisioningState::Ready);
        assert!(tenant.is_trial());
        assert!(!tenant.is_trial_expired());
        assert!(tenant.days_until_trial_expires() >= 29);

        tenant.trial_end_date = Some(Utc::now() - Duration::days(1));
        assert!(tenant.is_trial_expired());
        assert_eq!(tenant.days_until_trial_expires(), 0);
    }

    #[test]
    fn validate_domain_accepts_normal_domains() {
        assert!(validate_domain("acme-gym").is_ok());
        assert!(validate_domain("fitmax2").is_ok());
        assert!(validate_domain("a-b-c-1").is_ok());
    }

    #[test]
    fn validate_domain_rejects_injection_attempts() {
        assert!(validate_domain("acme\"; DROP TABLE tenants; --").is_err());
        assert!(validate_domain("acme;drop").is_err());
        assert!(validate_domain("acme'gym").is_err());
        assert!(validate_domain("Acme-Gym").is_err());
        assert!(validate_domain("ab").is_err());
        assert!(validate_domain("-acme").is_err());
        assert!(validate_domain("acme-").is_err());
        assert!(validate_domain("").is_err());
    }

    #[test]
    fn new_tenant_validation() {
        let spec = NewTenant {
            name: "Acme Gym".into(),
            domain: "acme-gym".into(),
            tenant_type: TenantType::Gym,
            contact_email: Some("owner@acme-gym.test".into()),
            description: None,
        };
        assert!(spec.validate().is_ok());

        let empty_name = NewTenant {
            name: "  ".into(),
            ..spec.clone()
        };
        assert!(matches!(
            empty_name.validate(),
            Err(CoreError::Validation(_))
        ));

        let bad_domain = NewTenant {
            domain: "\"; DROP TABLE".into(),
            ..spec
        };
        assert!(matches!(
            bad_domain.validate(),
            Err(CoreError::InvalidIdentifier(_))
        ));
    }
}
