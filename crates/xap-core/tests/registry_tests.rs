//! Registry dispatch tests

use xap_core::codec::{self, Packet};
use xap_core::{Error, Message, Registry, Result, Unsupported};
use xap_test_utils::{BSC_COMMAND, BSC_INFO, BSC_QUERY, HEARTBEAT, UNKNOWN_CLASS};

fn dispatch(text: &str) -> Result<Message> {
    Registry::standard().dispatch(&codec::parse(text)?)
}

#[test]
fn test_dispatch_known_classes() {
    assert!(matches!(dispatch(HEARTBEAT).unwrap(), Message::Heartbeat(_)));
    assert!(matches!(dispatch(BSC_COMMAND).unwrap(), Message::BscCommand(_)));
    assert!(matches!(dispatch(BSC_QUERY).unwrap(), Message::BscQuery(_)));
    assert!(matches!(dispatch(BSC_INFO).unwrap(), Message::BscInfo(_)));
}

#[test]
fn test_dispatch_class_is_case_insensitive() {
    let text = BSC_QUERY.replace("xAPBSC.query", "XAPBSC.QUERY");
    assert!(matches!(dispatch(&text).unwrap(), Message::BscQuery(_)));
}

#[test]
fn test_unknown_class_falls_back() {
    let message = dispatch(UNKNOWN_CLASS).unwrap();
    let Message::Unsupported(unsupported) = &message else {
        panic!("expected fallback, got {:?}", message.kind());
    };
    assert_eq!(unsupported.blocks().len(), 1);
    assert_eq!(message.class(), "Weather.Report");
    // Unsupported messages keep enough to re-serialize exactly
    assert_eq!(message.encode(), UNKNOWN_CLASS);
}

#[test]
fn test_unknown_header() {
    let text = "my-header\n{\nclass=a.b\n}\n";
    assert!(matches!(dispatch(text), Err(Error::UnknownHeader(h)) if h == "my-header"));
}

#[test]
fn test_missing_and_unknown_class_without_fallback() {
    fn query(packet: &Packet) -> Result<Message> {
        xap_core::BscQuery::from_packet(packet).map(Message::BscQuery)
    }

    let mut registry = Registry::new();
    registry
        .register("xap-header", Some("xAPBSC.query"), query)
        .unwrap();

    let no_class = codec::parse("xap-header\n{\nv=12\n}\n").unwrap();
    assert!(matches!(
        registry.dispatch(&no_class),
        Err(Error::MissingClass(_))
    ));

    let other = codec::parse(UNKNOWN_CLASS).unwrap();
    assert!(matches!(
        registry.dispatch(&other),
        Err(Error::UnknownClass { class, .. }) if class == "weather.report"
    ));
}

#[test]
fn test_missing_class_uses_fallback() {
    let mut registry = Registry::new();
    registry
        .register("xap-header", None, |packet| {
            Unsupported::from_packet(packet).map(Message::Unsupported)
        })
        .unwrap();
    let text = "xap-header\n{\nv=12\nhop=1\nuid=FF345600\nsource=a.b.c\n}\nbody\n{\nk=v\n}\n";
    let message = registry.dispatch(&codec::parse(text).unwrap()).unwrap();
    let Message::Unsupported(unsupported) = &message else {
        panic!("expected an unsupported message, got {}", message.kind());
    };
    assert!(message.class().is_empty());
    assert_eq!(unsupported.blocks().len(), 1);
    assert_eq!(message.encode(), text);
}

#[test]
fn test_standard_decodes_classless_message() {
    let message = Registry::standard()
        .decode(b"xap-header\n{\nv=12\nhop=1\nuid=FF345600\nsource=a.b.c\n}\n")
        .unwrap();
    assert!(matches!(message, Message::Unsupported(_)));
    assert_eq!(message.source().as_str(), "a.b.c");
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = Registry::standard();
    let err = registry
        .register("XAP-HEADER", Some("xapbsc.CMD"), |packet| {
            Unsupported::from_packet(packet).map(Message::Unsupported)
        })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration { .. }));
    // The original constructor is still in place
    assert!(matches!(dispatch(BSC_COMMAND).unwrap(), Message::BscCommand(_)));
}

#[test]
fn test_decode_bytes() {
    let registry = Registry::standard();
    assert!(matches!(
        registry.decode(HEARTBEAT.as_bytes()).unwrap(),
        Message::Heartbeat(_)
    ));
    assert!(matches!(registry.decode(&[0xFF, 0xFE]), Err(Error::Format(_))));
    assert!(matches!(
        registry.decode(b"xap-header\n{\n"),
        Err(Error::Format(_))
    ));
}

#[test]
fn test_header_errors_surface_from_constructor() {
    // A command without a target
    let text = BSC_COMMAND.replace("target=ACME.Lighting.apartment:Output 1\n", "");
    assert!(matches!(dispatch(&text), Err(Error::InvalidHeader(_))));

    // A bad source address
    let text = HEARTBEAT.replace("source=ACME.Lighting.apartment", "source=ACME");
    assert!(matches!(dispatch(&text), Err(Error::Address(_))));
}
