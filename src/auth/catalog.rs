use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::str::FromStr;

use crate::models::Role;

/// Role -> modules the role may open, in display order
static ROLE_MODULES: Lazy<HashMap<Role, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        Role::Admin,
        vec!["appointments", "doctors", "patients", "pharmacy"],
    );
    m.insert(Role::Doctor, vec!["appointments", "doctors", "pharmacy"]);
    m.insert(Role::Patient, vec!["appointments", "patients", "pharmacy"]);
    m
});

pub fn modules_for_role(role: Role) -> Vec<&'static str> {
    ROLE_MODULES.get(&role).cloned().unwrap_or_default()
}

/// Modules for a role given by name. Unknown roles have no modules.
pub fn modules_for(role: &str) -> Vec<&'static str> {
    match Role::from_str(role) {
        Ok(role) => modules_for_role(role),
        Err(_) => Vec::new(),
    }
}
