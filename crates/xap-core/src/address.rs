//! Address parsing and pattern matching
//!
//! xAP addresses follow this format:
//! ```text
//! vendor.product.instance[:endpoint]
//! ACME.Lighting.apartment:Output 1
//! ```
//!
//! Matching is case-insensitive. Wildcards:
//! - `*` matches one whole subsection and never crosses `.` or `:`
//!   (`a.*.c` matches `a.b.c` but not `a.b.d.c`)
//! - `>` matches to the end of the section when written before `:`, or to
//!   the end of the tested address when it ends the pattern
//!
//! Matching is not symmetric: always call the matcher on the side that may
//! contain wildcards.

use crate::{Error, Result};
use regex_lite::{Regex, RegexBuilder};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// A parsed xAP address
#[derive(Clone)]
pub struct Address {
    vendor: String,
    product: String,
    instance: String,
    endpoint: Option<String>,
    raw: String,
    matchers: Arc<Matchers>,
}

/// Compiled matchers for the three match scopes
#[derive(Debug)]
struct Matchers {
    full: Matcher,
    base: Matcher,
    endpoint: Matcher,
}

impl Address {
    /// Parse an address string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (base, endpoint) = match s.split_once(':') {
            Some((base, endpoint)) => (base, Some(endpoint)),
            None => (s, None),
        };

        let mut parts = base.splitn(3, '.');
        let (Some(vendor), Some(product), Some(instance)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Address(format!(
                "expected vendor.product.instance, got {:?}",
                s
            )));
        };

        Self::new(vendor, product, instance, endpoint)
    }

    /// Build an address from its components
    pub fn new(
        vendor: &str,
        product: &str,
        instance: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        for (what, part) in [("vendor", vendor), ("product", product), ("instance", instance)] {
            if part.is_empty() {
                return Err(Error::Address(format!("empty {} component", what)));
            }
        }
        if endpoint.is_some_and(str::is_empty) {
            return Err(Error::Address("empty endpoint after ':'".to_string()));
        }

        let base = format!("{}.{}.{}", vendor, product, instance);
        let raw = match endpoint {
            Some(ep) => format!("{}:{}", base, ep),
            None => base.clone(),
        };
        validate_wildcards(&raw)?;

        let endpoint_matcher = match endpoint {
            Some(ep) => Matcher::compile(ep)?,
            // A trailing '>' on the base swallows any endpoint
            None if raw.ends_with('>') => Matcher::any(),
            None => Matcher::literal(""),
        };

        let matchers = Matchers {
            full: Matcher::compile(&raw)?,
            base: Matcher::compile(&base)?,
            endpoint: endpoint_matcher,
        };

        Ok(Self {
            vendor: vendor.to_string(),
            product: product.to_string(),
            instance: instance.to_string(),
            endpoint: endpoint.map(str::to_string),
            raw,
            matchers: Arc::new(matchers),
        })
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// The full address string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The `vendor.product.instance` part of the address
    pub fn base_str(&self) -> &str {
        match &self.endpoint {
            Some(ep) => &self.raw[..self.raw.len() - ep.len() - 1],
            None => &self.raw,
        }
    }

    /// Whether any part of the address contains a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.matchers.full.wildcard
    }

    /// Whether the base part contains a wildcard
    pub fn is_base_wildcard(&self) -> bool {
        self.matchers.base.wildcard
    }

    /// Whether the endpoint part contains a wildcard
    pub fn is_endpoint_wildcard(&self) -> bool {
        self.matchers.endpoint.wildcard
    }

    /// The base of this address with no endpoint. Wildcards are preserved.
    pub fn base(&self) -> Address {
        match self.endpoint {
            None => self.clone(),
            Some(_) => Address {
                vendor: self.vendor.clone(),
                product: self.product.clone(),
                instance: self.instance.clone(),
                endpoint: None,
                raw: self.base_str().to_string(),
                matchers: Arc::new(Matchers {
                    full: self.matchers.base.clone(),
                    base: self.matchers.base.clone(),
                    endpoint: if self.base_str().ends_with('>') {
                        Matcher::any()
                    } else {
                        Matcher::literal("")
                    },
                }),
            },
        }
    }

    /// A new address with this address's base and the given endpoint
    pub fn for_endpoint(&self, name: &str) -> Result<Address> {
        Address::new(&self.vendor, &self.product, &self.instance, Some(name))
    }

    /// True if `candidate` equals this address or this wildcard address
    /// matches it
    pub fn matches(&self, candidate: &Address) -> bool {
        self.matchers.full.matches(candidate.as_str())
    }

    /// Like [`matches`](Self::matches), against a raw address string
    pub fn matches_str(&self, candidate: &str) -> bool {
        self.matchers.full.matches(candidate)
    }

    /// Match only the `vendor.product.instance` parts
    pub fn base_matches(&self, candidate: &Address) -> bool {
        self.matchers.base.matches(candidate.base_str())
    }

    /// Match only the endpoint part against an endpoint name
    pub fn endpoint_matches(&self, name: &str) -> bool {
        self.matchers.endpoint.matches(name)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.raw).finish()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.to_ascii_lowercase().hash(state);
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl TryFrom<&str> for Address {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Address::parse(&s)
    }
}

/// Reject `*` that is not a whole subsection and `>` that does not end a
/// section
fn validate_wildcards(s: &str) -> Result<()> {
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        match c {
            '*' => {
                let alone_before = prev.map_or(true, is_separator);
                let alone_after = next.map_or(true, is_separator);
                if !alone_before || !alone_after {
                    return Err(Error::Address(format!(
                        "{} contains * in the middle of a word",
                        s
                    )));
                }
            }
            '>' => {
                if !matches!(next, None | Some(':')) {
                    return Err(Error::Address(format!(
                        "{} contains > not at the end of a section",
                        s
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn is_separator(c: char) -> bool {
    c == '.' || c == ':'
}

/// A compiled matcher for one scope of an address
#[derive(Debug, Clone)]
struct Matcher {
    literal: String,
    wildcard: bool,
    regex: Option<Regex>,
}

impl Matcher {
    fn literal(s: &str) -> Self {
        Self {
            literal: s.to_string(),
            wildcard: false,
            regex: None,
        }
    }

    /// Matches every candidate, including an absent endpoint
    fn any() -> Self {
        Self {
            literal: String::new(),
            wildcard: true,
            regex: None,
        }
    }

    fn compile(pattern: &str) -> Result<Self> {
        if !pattern.contains(['*', '>']) {
            return Ok(Self::literal(pattern));
        }

        let regex_str = format!("^{}$", pattern_to_regex(pattern));
        let regex = RegexBuilder::new(&regex_str)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Address(format!("{}: {}", pattern, e)))?;

        Ok(Self {
            literal: pattern.to_string(),
            wildcard: true,
            regex: Some(regex),
        })
    }

    fn matches(&self, candidate: &str) -> bool {
        if candidate.eq_ignore_ascii_case(&self.literal) {
            return true;
        }
        match &self.regex {
            Some(regex) => regex.is_match(candidate),
            None => self.wildcard,
        }
    }
}

/// Translate a validated wildcard pattern into a regex body
fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;

    loop {
        let end = rest.find(is_separator).unwrap_or(rest.len());
        let section = &rest[..end];
        let next_sep = rest[end..].chars().next();

        if section == "*" {
            out.push_str("[^.:]*");
        } else if let Some(prefix) = section.strip_suffix('>') {
            out.push_str(&regex_lite::escape(prefix));
            if next_sep == Some(':') {
                out.push_str("[^:]*");
            } else {
                out.push_str(".*");
            }
        } else {
            out.push_str(&regex_lite::escape(section));
        }

        match next_sep {
            Some(sep) => {
                out.push_str(&regex_lite::escape(&sep.to_string()));
                rest = &rest[end + sep.len_utf8()..];
            }
            None => break,
        }
    }

    out
}
