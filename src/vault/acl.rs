//! Idempotent edits of a vault's network ACL.
//!
//! Every operation takes the ACL as it appears on the vault, which may be absent
//! on a vault that never had network rules. Mutating operations report whether
//! anything changed so callers can skip the remote update when nothing did.

use crate::vault::models::{DefaultAction, IpRule, NetworkRuleSet, VirtualNetworkRule};

/// True if a vnet rule matches `subnet_resource_id`, ignoring case.
pub fn has_matching_vnet_rule(acl: Option<&NetworkRuleSet>, subnet_resource_id: &str) -> bool {
    acl.is_some_and(|acl| {
        acl.virtual_network_rules
            .iter()
            .any(|rule| rule.id.eq_ignore_ascii_case(subnet_resource_id))
    })
}

/// True if an IP rule matches `ip_address` exactly.
///
/// Unlike vnet rules, IP rules compare with plain string equality.
pub fn has_matching_ip_rule(acl: Option<&NetworkRuleSet>, ip_address: &str) -> bool {
    acl.is_some_and(|acl| acl.ip_rules.iter().any(|rule| rule.value == ip_address))
}

pub fn ensure_vnet_rule(acl: &mut Option<NetworkRuleSet>, subnet_resource_id: &str) -> bool {
    if has_matching_vnet_rule(acl.as_ref(), subnet_resource_id) {
        return false;
    }
    acl.get_or_insert_with(NetworkRuleSet::default)
        .virtual_network_rules
        .push(VirtualNetworkRule {
            id: subnet_resource_id.to_string(),
        });
    true
}

pub fn ensure_ip_rule(acl: &mut Option<NetworkRuleSet>, ip_address: &str) -> bool {
    if has_matching_ip_rule(acl.as_ref(), ip_address) {
        return false;
    }
    acl.get_or_insert_with(NetworkRuleSet::default)
        .ip_rules
        .push(IpRule {
            value: ip_address.to_string(),
        });
    true
}

/// Sets the default action to `Deny` when `enabled`, `Allow` otherwise.
///
/// An absent ACL already allows everything, so disabling it is a no-op.
pub fn set_enforcement(acl: &mut Option<NetworkRuleSet>, enabled: bool) -> bool {
    let target = if enabled {
        DefaultAction::Deny
    } else {
        DefaultAction::Allow
    };

    if acl.is_none() && !enabled {
        return false;
    }
    let acl = acl.get_or_insert_with(NetworkRuleSet::default);
    if acl.default_action == target {
        return false;
    }
    acl.default_action = target;
    true
}

/// Removes every rule and turns enforcement off.
pub fn clear_rules(acl: &mut Option<NetworkRuleSet>) -> bool {
    let Some(acl) = acl else {
        return false;
    };
    let changed = acl.default_action != DefaultAction::Allow
        || !acl.ip_rules.is_empty()
        || !acl.virtual_network_rules.is_empty();

    acl.default_action = DefaultAction::Allow;
    acl.ip_rules.clear();
    acl.virtual_network_rules.clear();
    changed
}
