pub mod tenant;

pub use tenant::{ResolvedTenant, resolve_tenant};
