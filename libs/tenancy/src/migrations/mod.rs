//! Static migration sets, one closed list per schema class. Adding a script
//! means adding it to the list here; nothing is discovered at runtime.

mod common;
mod sys;
mod tenant;

use std::sync::Arc;

use crate::migrate::Migration;
use crate::naming::SchemaClass;

pub fn migrations_for(class: SchemaClass) -> Vec<Arc<dyn Migration>> {
    match class {
        SchemaClass::Sys => sys::migrations(),
        SchemaClass::Common => common::migrations(),
        SchemaClass::Tenant => tenant::migrations(),
    }
}
