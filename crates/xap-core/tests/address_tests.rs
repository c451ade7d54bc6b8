//! Address parsing and matching tests

use xap_core::{Address, Error};

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

#[test]
fn test_address_parse() {
    let a = addr("ACME.Lighting.apartment");
    assert_eq!(a.vendor(), "ACME");
    assert_eq!(a.product(), "Lighting");
    assert_eq!(a.instance(), "apartment");
    assert_eq!(a.endpoint(), None);
    assert_eq!(a.to_string(), "ACME.Lighting.apartment");
}

#[test]
fn test_address_parse_errors() {
    for bad in ["", "ACME", "ACME.Lighting", ".b.c", "a.b.", "a.b.c:", "a*.b.c", "a.b.c:*x", "a.b>.c"] {
        assert!(
            matches!(Address::parse(bad), Err(Error::Address(_))),
            "expected address error for {:?}",
            bad
        );
    }
}

#[test]
fn test_equality_is_case_insensitive() {
    assert_eq!(addr("ACME.Lighting.Apartment:Output 1"), addr("acme.lighting.apartment:output 1"));
    assert_ne!(addr("a.b.c"), addr("a.b.c:d"));
}

#[test]
fn test_matching_is_reflexive() {
    for s in ["a.b.c", "ACME.Lighting.apartment:Output 1", "a.b.c.d"] {
        let a = addr(s);
        assert!(a.matches(&a));
    }
}

#[test]
fn test_matching_is_asymmetric() {
    let pattern = addr("V.P.*");
    let candidate = addr("V.P.Inst");
    assert!(pattern.matches(&candidate));
    assert!(!candidate.matches(&pattern));
}

#[test]
fn test_star_never_crosses_separators() {
    let pattern = addr("a.*.c");
    assert!(pattern.matches(&addr("a.b.c")));
    assert!(pattern.matches(&addr("A.XYZ.C")));
    assert!(!pattern.matches(&addr("a.b.d.c")));
    assert!(!pattern.matches(&addr("a.b.c:ep")));
}

#[test]
fn test_trailing_gt_matches_rest() {
    let pattern = addr("a.b.>");
    assert!(pattern.is_wildcard());
    assert!(pattern.matches(&addr("a.b.c")));
    assert!(pattern.matches(&addr("a.b.c.d")));
    assert!(pattern.matches(&addr("a.b.c:Output 1")));
    assert!(!pattern.matches(&addr("a.x.c")));
}

#[test]
fn test_gt_before_endpoint() {
    let pattern = addr("a.b.>:lamp");
    assert!(pattern.matches(&addr("a.b.c:lamp")));
    assert!(pattern.matches(&addr("a.b.c.d:LAMP")));
    assert!(!pattern.matches(&addr("a.b.c:fan")));
}

#[test]
fn test_endpoint_wildcard() {
    let pattern = addr("ACME.Lighting.apartment:*");
    assert!(pattern.is_endpoint_wildcard());
    assert!(!pattern.is_base_wildcard());
    assert!(pattern.endpoint_matches("Output 1"));
    assert!(pattern.endpoint_matches("anything"));
    assert!(pattern.base_matches(&addr("acme.lighting.apartment")));
}

#[test]
fn test_scoped_matchers() {
    let pattern = addr("ACME.*.apartment:Output 1");
    assert!(pattern.base_matches(&addr("ACME.Lighting.apartment")));
    assert!(pattern.base_matches(&addr("ACME.Heating.apartment:other")));
    assert!(!pattern.base_matches(&addr("ACME.Lighting.house")));
    assert!(pattern.endpoint_matches("output 1"));
    assert!(!pattern.endpoint_matches("Output 2"));
}

#[test]
fn test_literal_endpoint_matching() {
    let target = addr("a.b.c:Lamp");
    assert!(!target.is_wildcard());
    assert!(target.endpoint_matches("LAMP"));
    assert!(!target.endpoint_matches("Fan"));
}

#[test]
fn test_for_endpoint() {
    let device = addr("ACME.Lighting.apartment");
    let ep = device.for_endpoint("Output 1").unwrap();
    assert_eq!(ep.as_str(), "ACME.Lighting.apartment:Output 1");
    assert_eq!(ep.base(), device);
    assert!(device.for_endpoint("").is_err());
}

#[test]
fn test_from_str_and_try_from() {
    let a: Address = "a.b.c:d".parse().unwrap();
    let b = Address::try_from("A.B.C:D").unwrap();
    let c = Address::try_from(String::from("a.b.c:d")).unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
}
