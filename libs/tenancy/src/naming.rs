use core_lib::CoreError;
use rand::Rng;

/// Fixed name of the control schema (tenant registry, subscriptions).
pub const SYS_SCHEMA: &str = "sys";
/// Fixed name of the shared reference-data schema.
pub const COMMON_SCHEMA: &str = "common";
/// Prefix applied to every tenant schema.
pub const TENANT_SCHEMA_PREFIX: &str = "tenant_";

/// Postgres truncates identifiers beyond this length.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const SUFFIX_LEN: usize = 6;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Which of the three schema kinds a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaClass {
    Sys,
    Common,
    Tenant,
}

/// Maps a tenant domain to its canonical schema name.
///
/// Sys and common resolve to their fixed names regardless of the domain.
/// Tenant names are deterministic: strip everything outside `[a-zA-Z0-9]`,
/// lowercase, prefix with `tenant_`. Collision handling (appending a random
/// suffix) is the registry's job, not the resolver's, so that independent
/// processes derive the same name without coordination.
pub fn resolve_schema_name(domain: &str, class: SchemaClass) -> Result<String, CoreError> {
    match class {
        SchemaClass::Sys => Ok(SYS_SCHEMA.to_string()),
        SchemaClass::Common => Ok(COMMON_SCHEMA.to_string()),
        SchemaClass::Tenant => {
            let cleaned: String = domain
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_lowercase();
            if cleaned.is_empty() {
                return Err(CoreError::InvalidIdentifier(format!(
                    "domain has no usable identifier characters: {domain:?}"
                )));
            }
            let name = format!("{TENANT_SCHEMA_PREFIX}{cleaned}");
            if name.len() > MAX_IDENTIFIER_LEN {
                return Err(CoreError::InvalidIdentifier(format!(
                    "schema name exceeds {MAX_IDENTIFIER_LEN} characters: {name}"
                )));
            }
            Ok(name)
        }
    }
}

/// Appends a fresh 6-char random suffix, truncating the base so the result
/// stays within the identifier limit.
pub fn with_random_suffix(base: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    let max_base = MAX_IDENTIFIER_LEN - SUFFIX_LEN - 1;
    let base = if base.len() > max_base {
        &base[..max_base]
    } else {
        base
    };
    format!("{base}_{suffix}")
}

/// The single gate in front of every DDL interpolation: schema names must
/// match `[a-zA-Z_][a-zA-Z0-9_]*` and fit the identifier limit. Quote
/// characters, semicolons and whitespace are rejected by construction.
pub fn validate_schema_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.len() > MAX_IDENTIFIER_LEN {
        return Err(CoreError::InvalidIdentifier(format!(
            "schema name must be 1-{MAX_IDENTIFIER_LEN} characters: {name:?}"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(CoreError::InvalidIdentifier(format!(
            "schema name must start with a letter or underscore: {name:?}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CoreError::InvalidIdentifier(format!(
            "schema name may only contain letters, digits and underscores: {name:?}"
        )));
    }
    Ok(())
}
