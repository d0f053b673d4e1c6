//! Request classification and restricted-method key resolution.
//!
//! Every incoming method name is classified with a fixed priority: safe
//! pass-through first, then the two internal methods under the configured
//! prefix, then restricted-method authorization. A name listed as safe is
//! safe even when it also appears in the restricted table.

use std::collections::BTreeMap;

use crate::traits::RestrictedMethod;

/// How the middleware treats an incoming method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Always passed through to the next handler; no authorization.
    Safe,

    /// The internal permissions-enumeration method.
    GetPermissions,

    /// The internal permission-request method.
    RequestPermissions,

    /// Everything else: requires a capability for the resolved method key.
    Restricted,
}

/// Classify `method` with the routing priority above.
pub fn classify(method: &str, safe_methods: &[String], prefix: &str) -> MethodClass {
    if safe_methods.iter().any(|safe| safe == method) {
        return MethodClass::Safe;
    }
    if method == format!("{prefix}getPermissions") {
        return MethodClass::GetPermissions;
    }
    if method == format!("{prefix}requestPermissions") {
        return MethodClass::RequestPermissions;
    }
    MethodClass::Restricted
}

/// Resolve the restricted-method key authorizing `method`.
///
/// An exact table match wins. Otherwise, for namespaced methods, the
/// `_`-separated segments are accumulated each with a trailing underscore
/// and the shortest accumulated prefix present in the table wins — a single
/// `ns_` capability covers the whole family of virtual methods behind it
/// (`ns_foo`, `ns_foo_bar`, …). Returns `None` when no restricted key
/// matches.
pub fn get_method_key_for(
    method: &str,
    restricted: &BTreeMap<String, RestrictedMethod>,
) -> Option<String> {
    if restricted.contains_key(method) {
        return Some(method.to_string());
    }

    // Namespace resolution applies only when '_' occurs after position 0.
    match method.find('_') {
        Some(pos) if pos > 0 => {
            let mut prefix = String::new();
            for segment in method.split('_') {
                prefix.push_str(segment);
                prefix.push('_');
                if restricted.contains_key(&prefix) {
                    return Some(prefix);
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use crate::traits::{RestrictedMethod, MethodFn};

    use super::{classify, get_method_key_for, MethodClass};

    fn noop() -> MethodFn {
        Arc::new(|_req, _res| Ok(()))
    }

    fn table(keys: &[&str]) -> BTreeMap<String, RestrictedMethod> {
        keys.iter()
            .map(|k| (k.to_string(), RestrictedMethod::new(format!("{k} method"), noop())))
            .collect()
    }

    // ── classify ─────────────────────────────────────────────────────────────

    #[test]
    fn classify_routes_by_priority() {
        let safe = vec!["ping".to_string()];

        assert_eq!(classify("ping", &safe, "wallet_"), MethodClass::Safe);
        assert_eq!(
            classify("wallet_getPermissions", &safe, "wallet_"),
            MethodClass::GetPermissions
        );
        assert_eq!(
            classify("wallet_requestPermissions", &safe, "wallet_"),
            MethodClass::RequestPermissions
        );
        assert_eq!(classify("readContacts", &safe, "wallet_"), MethodClass::Restricted);
    }

    #[test]
    fn safe_listing_beats_internal_dispatch() {
        // A host may deliberately expose the enumeration method unauthenticated.
        let safe = vec!["wallet_getPermissions".to_string()];
        assert_eq!(
            classify("wallet_getPermissions", &safe, "wallet_"),
            MethodClass::Safe
        );
    }

    #[test]
    fn empty_prefix_still_routes_internal_methods() {
        assert_eq!(classify("getPermissions", &[], ""), MethodClass::GetPermissions);
        assert_eq!(
            classify("requestPermissions", &[], ""),
            MethodClass::RequestPermissions
        );
    }

    // ── get_method_key_for ───────────────────────────────────────────────────

    #[test]
    fn exact_match_resolves_to_itself() {
        let restricted = table(&["readContacts"]);
        assert_eq!(
            get_method_key_for("readContacts", &restricted),
            Some("readContacts".to_string())
        );
    }

    #[test]
    fn namespaced_method_resolves_to_its_family_key() {
        let restricted = table(&["plugin_"]);
        assert_eq!(
            get_method_key_for("plugin_foo_bar", &restricted),
            Some("plugin_".to_string())
        );
        assert_eq!(
            get_method_key_for("plugin_foo", &restricted),
            Some("plugin_".to_string())
        );
    }

    #[test]
    fn shortest_accumulated_prefix_wins() {
        let restricted = table(&["plugin_", "plugin_foo_"]);
        assert_eq!(
            get_method_key_for("plugin_foo_bar", &restricted),
            Some("plugin_".to_string())
        );
    }

    #[test]
    fn exact_match_beats_prefix_match() {
        let restricted = table(&["plugin_", "plugin_foo"]);
        assert_eq!(
            get_method_key_for("plugin_foo", &restricted),
            Some("plugin_foo".to_string())
        );
    }

    #[test]
    fn unmatched_methods_resolve_to_none() {
        let restricted = table(&["plugin_"]);
        assert_eq!(get_method_key_for("other_foo", &restricted), None);
        assert_eq!(get_method_key_for("plain", &restricted), None);
    }

    #[test]
    fn leading_underscore_disables_namespace_resolution() {
        let restricted = table(&["_", "_foo_"]);
        assert_eq!(get_method_key_for("_foo_bar", &restricted), None);
    }
}
