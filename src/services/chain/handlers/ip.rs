use std::{net::IpAddr, str::FromStr, sync::Arc};

use ipnetwork::IpNetwork;
use thiserror::Error;
use tracing::warn;

use crate::error::AppError;
use crate::services::chain::{ValidationContext, ValidationHandler};
use crate::services::routes::PathPatterns;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IpRestrictionError {
    #[error("invalid IP range '{0}'")]
    InvalidRange(String),
    #[error("invalid IP rule '{0}', expected pattern=range[,range]")]
    InvalidRule(String),
    #[error("invalid path pattern '{0}'")]
    InvalidPattern(String),
}

/// One allowed address form: `10.0.0.0/8`, `10.0.0.1-10.0.0.50` or `10.0.0.7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpRange {
    Cidr(IpNetwork),
    Range { start: IpAddr, end: IpAddr },
    Single(IpAddr),
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpRange::Cidr(net) => net.contains(ip),
            IpRange::Range { start, end } => {
                same_family(*start, ip) && *start <= ip && ip <= *end
            }
            IpRange::Single(addr) => *addr == ip,
        }
    }
}

fn same_family(a: IpAddr, b: IpAddr) -> bool {
    a.is_ipv4() == b.is_ipv4()
}

impl FromStr for IpRange {
    type Err = IpRestrictionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || IpRestrictionError::InvalidRange(s.to_string());

        if s.contains('/') {
            return s.parse::<IpNetwork>().map(IpRange::Cidr).map_err(|_| invalid());
        }
        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| invalid())?;
            let end: IpAddr = end.trim().parse().map_err(|_| invalid())?;
            if !same_family(start, end) || start > end {
                return Err(invalid());
            }
            return Ok(IpRange::Range { start, end });
        }
        s.parse().map(IpRange::Single).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone)]
struct IpRule {
    pattern: PathPatterns,
    ranges: Vec<IpRange>,
}

/// Per-route allow-lists, the route metadata the IP handler reads.
///
/// Parsed from `"/admin/**=10.0.0.0/8,192.168.1.10;/ops/*=172.16.0.1-172.16.0.9"`.
/// The first rule whose pattern matches the path applies.
#[derive(Debug, Clone, Default)]
pub struct IpRestrictions {
    rules: Vec<IpRule>,
}

impl IpRestrictions {
    pub fn parse(input: &str) -> Result<Self, IpRestrictionError> {
        let mut rules = Vec::new();
        for rule in input.split(';').map(str::trim).filter(|r| !r.is_empty()) {
            let (pattern, ranges) = rule
                .split_once('=')
                .ok_or_else(|| IpRestrictionError::InvalidRule(rule.to_string()))?;

            let ranges = ranges
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(IpRange::from_str)
                .collect::<Result<Vec<_>, _>>()?;
            if ranges.is_empty() {
                return Err(IpRestrictionError::InvalidRule(rule.to_string()));
            }

            let pattern = PathPatterns::new([pattern.trim()])
                .map_err(|_| IpRestrictionError::InvalidPattern(pattern.trim().to_string()))?;
            rules.push(IpRule { pattern, ranges });
        }
        Ok(Self { rules })
    }

    /// Allowed ranges for `path`, or `None` when the route carries no restriction.
    pub fn ranges_for(&self, path: &str) -> Option<&[IpRange]> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(path))
            .map(|rule| rule.ranges.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub struct IpAllowListHandler {
    restrictions: Arc<IpRestrictions>,
}

impl IpAllowListHandler {
    pub fn new(restrictions: Arc<IpRestrictions>) -> Self {
        Self { restrictions }
    }
}

impl ValidationHandler for IpAllowListHandler {
    fn name(&self) -> &'static str {
        "ip-allow-list"
    }

    fn handle(&self, ctx: &mut ValidationContext) -> bool {
        let Some(ranges) = self.restrictions.ranges_for(ctx.path()) else {
            return true;
        };

        match ctx.client_ip {
            Some(ip) if ranges.iter().any(|r| r.contains(ip)) => true,
            ip => {
                warn!(path = ctx.path(), client_ip = ?ip, "client address not in allow-list");
                ctx.fail(AppError::forbidden("client address is not allowed"))
            }
        }
    }
}
