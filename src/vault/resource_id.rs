//! Parsing of Azure resource identifiers.
//!
//! A resource identifier is a path of the form
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{provider}/{type}/{name}[/{childType}/{childName}]
//! ```
//!
//! Extraction is purely positional. At most one child resource level is
//! supported: anything past the tenth segment stays in the child name.

use std::fmt;
use std::str::FromStr;

use crate::vault::VaultError;

const SUBSCRIPTION_KEY: &str = "subscriptions";
const RESOURCE_GROUP_KEY: &str = "resourceGroups";
const PROVIDER_KEY: &str = "providers";

const NETWORK_PROVIDER: &str = "Microsoft.Network";
const VIRTUAL_NETWORK_TYPE: &str = "virtualNetworks";
const SUBNET_TYPE: &str = "subnets";

const MIN_SEGMENTS: usize = 8;
const MAX_SEGMENTS: usize = 10;

/// Typed coordinates of a resource, with at most one child resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentifier {
    subscription: String,
    resource_group: String,
    provider: String,
    resource_type: String,
    resource_name: String,
    child_type: Option<String>,
    child_name: Option<String>,
}

impl ResourceIdentifier {
    /// Parses a resource path into its coordinates.
    pub fn parse(resource_id: &str) -> Result<Self, VaultError> {
        if resource_id.trim().is_empty() {
            return Err(invalid("the resource identifier is empty"));
        }

        let tokens = tokenize(resource_id);
        if tokens.len() < MIN_SEGMENTS {
            return Err(invalid(format!(
                "expected at least {} segments, found {}",
                MIN_SEGMENTS,
                tokens.len()
            )));
        }
        if tokens.len() > MIN_SEGMENTS && tokens.len() < MAX_SEGMENTS {
            return Err(invalid("partial child resource segment"));
        }

        expect_keyword(tokens[0], SUBSCRIPTION_KEY)?;
        expect_keyword(tokens[2], RESOURCE_GROUP_KEY)?;
        expect_keyword(tokens[4], PROVIDER_KEY)?;

        let (child_type, child_name) = if tokens.len() == MAX_SEGMENTS {
            (Some(tokens[8].to_string()), Some(tokens[9].to_string()))
        } else {
            (None, None)
        };

        Ok(Self {
            subscription: tokens[1].to_string(),
            resource_group: tokens[3].to_string(),
            provider: tokens[5].to_string(),
            resource_type: tokens[6].to_string(),
            resource_name: tokens[7].to_string(),
            child_type,
            child_name,
        })
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn child_type(&self) -> Option<&str> {
        self.child_type.as_deref()
    }

    pub fn child_name(&self) -> Option<&str> {
        self.child_name.as_deref()
    }

    /// True when the identifier designates a virtual network or one of its subnets.
    pub fn is_virtual_network_or_subnet(&self) -> bool {
        self.provider.eq_ignore_ascii_case(NETWORK_PROVIDER)
            && self.resource_type.eq_ignore_ascii_case(VIRTUAL_NETWORK_TYPE)
            && self
                .child_type
                .as_deref()
                .is_none_or(|child| child.eq_ignore_ascii_case(SUBNET_TYPE))
    }
}

impl FromStr for ResourceIdentifier {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}/{}/{}/{}/{}",
            SUBSCRIPTION_KEY,
            self.subscription,
            RESOURCE_GROUP_KEY,
            self.resource_group,
            PROVIDER_KEY,
            self.provider,
            self.resource_type,
            self.resource_name
        )?;
        if let (Some(child_type), Some(child_name)) = (&self.child_type, &self.child_name) {
            write!(f, "/{}/{}", child_type, child_name)?;
        }
        Ok(())
    }
}

/// Coordinates of a subnet derived from a validated resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetCoordinates {
    pub subscription: String,
    pub resource_group: String,
    pub vnet_name: String,
    pub subnet_name: String,
    /// The identifier string as supplied, used verbatim as the ACL rule value.
    pub resource_id: String,
}

/// Parses `resource_id` and checks that it names a subnet of a virtual network.
pub fn subnet_coordinates(resource_id: &str) -> Result<SubnetCoordinates, VaultError> {
    let id = ResourceIdentifier::parse(resource_id)?;
    if !id.is_virtual_network_or_subnet() {
        return Err(invalid(format!(
            "'{}' does not designate a virtual network or subnet",
            resource_id
        )));
    }

    let subnet_name = id
        .child_name()
        .ok_or_else(|| invalid(format!("'{}' does not designate a subnet", resource_id)))?;

    Ok(SubnetCoordinates {
        subscription: id.subscription().to_string(),
        resource_group: id.resource_group().to_string(),
        vnet_name: id.resource_name().to_string(),
        subnet_name: subnet_name.to_string(),
        resource_id: resource_id.to_string(),
    })
}

/// Splits on `/`, dropping empty segments. The last permitted token keeps the
/// unsplit remainder of the path.
fn tokenize(path: &str) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(MAX_SEGMENTS);
    let mut rest = path;

    loop {
        rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            break;
        }
        if tokens.len() == MAX_SEGMENTS - 1 {
            tokens.push(rest.trim_end_matches('/'));
            break;
        }
        match rest.find('/') {
            Some(idx) => {
                tokens.push(&rest[..idx]);
                rest = &rest[idx..];
            }
            None => {
                tokens.push(rest);
                break;
            }
        }
    }

    tokens
}

fn expect_keyword(token: &str, keyword: &str) -> Result<(), VaultError> {
    if token.eq_ignore_ascii_case(keyword) {
        Ok(())
    } else {
        Err(invalid(format!("expected '{}', found '{}'", keyword, token)))
    }
}

fn invalid(reason: impl Into<String>) -> VaultError {
    VaultError::InvalidResourceIdentifier(reason.into())
}
