//! Handler routing tests

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use xap_core::{Address, Message, Registry, State, Uid};
use xap_device::{BaseDevice, BscDevice, Device, DeviceError, EndpointSpec, Outbox};
use xap_test_utils::{drain, BSC_COMMAND, BSC_INFO, BSC_QUERY, HEARTBEAT, UNKNOWN_CLASS};
use xap_transport::{TransportError, XapHandler};

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn handler() -> (XapHandler, UnboundedReceiver<Message>) {
    let (outbox, rx) = Outbox::channel();
    (XapHandler::new(Arc::new(Registry::standard()), outbox), rx)
}

fn apartment() -> BscDevice {
    BscDevice::with_endpoints(
        addr("ACME.Lighting.apartment"),
        Uid::parse("FF345600").unwrap(),
        60,
        [
            EndpointSpec::output("Output 1").with_state(State::Off),
            EndpointSpec::input("Switch").with_state(State::Off),
        ],
    )
    .unwrap()
}

/// Fails on every message it receives
struct Broken {
    base: BaseDevice,
}

impl Device for Broken {
    fn address(&self) -> &Address {
        self.base.address()
    }

    fn uid(&self) -> &Uid {
        self.base.uid()
    }

    fn interval(&self) -> u32 {
        self.base.interval()
    }

    fn attach(&mut self, outbox: Outbox) {
        self.base.attach(outbox);
    }

    fn detach(&mut self) {
        self.base.detach();
    }

    fn receive_message(&mut self, _message: &Message) -> xap_device::Result<()> {
        Err(DeviceError::Validation("broken".into()))
    }
}

#[test]
fn test_add_device_attaches_and_announces() {
    let (mut handler, mut rx) = handler();
    let id = handler.add_device(Box::new(apartment()));
    assert_eq!(handler.len(), 1);
    assert_eq!(handler.device(id).unwrap().address().as_str(), "ACME.Lighting.apartment");

    let sent = drain(&mut rx);
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| matches!(m, Message::BscInfo(_))));
}

#[test]
fn test_routes_by_target_base() {
    let (mut handler, mut rx) = handler();
    handler.add_device(Box::new(apartment()));
    let other = BscDevice::with_endpoints(
        addr("ACME.Lighting.garage"),
        Uid::parse("FF345700").unwrap(),
        60,
        [EndpointSpec::output("Output 1").with_state(State::Off)],
    )
    .unwrap();
    handler.add_device(Box::new(other));
    drain(&mut rx);

    let message = handler.receive_datagram(BSC_COMMAND.as_bytes()).unwrap();
    assert!(matches!(message, Message::BscCommand(_)));

    let sent = drain(&mut rx);
    assert_eq!(sent.len(), 1);
    let Message::BscEvent(event) = &sent[0] else {
        panic!("expected an event, got {}", sent[0].kind());
    };
    assert_eq!(
        event.header().source.as_str(),
        "ACME.Lighting.apartment:Output 1"
    );
}

#[test]
fn test_wildcard_query_reaches_device() {
    let (mut handler, mut rx) = handler();
    handler.add_device(Box::new(apartment()));
    drain(&mut rx);

    handler.receive_datagram(BSC_QUERY.as_bytes()).unwrap();
    assert_eq!(drain(&mut rx).len(), 2);
}

#[test]
fn test_device_error_does_not_stop_others() {
    let (mut handler, mut rx) = handler();
    let broken = Broken {
        base: BaseDevice::new(
            addr("ACME.Lighting.apartment"),
            Uid::parse("FF111100").unwrap(),
            60,
        )
        .unwrap(),
    };
    handler.add_device(Box::new(broken));
    handler.add_device(Box::new(apartment()));
    drain(&mut rx);

    let message = xap_core::Registry::standard()
        .decode(BSC_COMMAND.as_bytes())
        .unwrap();
    assert_eq!(handler.deliver(&message), 1);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn test_messages_without_target_reach_receivers_only() {
    let (mut handler, mut rx) = handler();
    handler.add_device(Box::new(apartment()));
    drain(&mut rx);
    let mut all = handler.add_receiver(addr("*.*.>"));
    let mut switches = handler.add_receiver(addr("ACME.Lighting.apartment:switch"));
    let mut garage = handler.add_receiver(addr("ACME.Lighting.garage"));

    handler.receive_datagram(HEARTBEAT.as_bytes()).unwrap();
    handler.receive_datagram(BSC_INFO.as_bytes()).unwrap();
    assert!(drain(&mut rx).is_empty());

    assert_eq!(drain(&mut all).len(), 2);
    let matched = drain(&mut switches);
    assert_eq!(matched.len(), 1);
    assert!(matches!(matched[0], Message::BscInfo(_)));
    assert!(drain(&mut garage).is_empty());
}

#[test]
fn test_unknown_class_is_unsupported() {
    let (mut handler, _rx) = handler();
    let mut all = handler.add_receiver(addr("ACME.*.>"));
    let message = handler.receive_datagram(UNKNOWN_CLASS.as_bytes()).unwrap();
    assert!(matches!(message, Message::Unsupported(_)));
    assert_eq!(drain(&mut all).len(), 1);
}

#[test]
fn test_invalid_datagram_is_an_error() {
    let (mut handler, mut rx) = handler();
    handler.add_device(Box::new(apartment()));
    drain(&mut rx);
    let mut all = handler.add_receiver(addr("*.*.>"));

    for bad in ["", "garbage", "xap-header\n{\nv=12\n"] {
        assert!(matches!(
            handler.receive_datagram(bad.as_bytes()),
            Err(TransportError::Core(_))
        ));
    }
    assert!(drain(&mut rx).is_empty());
    assert!(drain(&mut all).is_empty());
}

#[test]
fn test_closed_receivers_are_dropped() {
    let (mut handler, _rx) = handler();
    let receiver = handler.add_receiver(addr("*.*.>"));
    drop(receiver);
    handler.receive_datagram(HEARTBEAT.as_bytes()).unwrap();
    assert!(format!("{:?}", handler).contains("receivers: 0"));
}

#[test]
fn test_remove_device_detaches() {
    let (mut handler, mut rx) = handler();
    let id = handler.add_device(Box::new(apartment()));
    drain(&mut rx);

    let mut device = handler.remove_device(id).unwrap();
    assert!(handler.is_empty());
    assert!(handler.remove_device(id).is_none());

    // A detached device stays silent
    let message = Registry::standard().decode(BSC_QUERY.as_bytes()).unwrap();
    device.receive_message(&message).unwrap();
    assert!(drain(&mut rx).is_empty());

    // Nothing routes to it any more
    handler.receive_datagram(BSC_QUERY.as_bytes()).unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_heartbeat_payload() {
    let (mut handler, _rx) = handler();
    let id = handler.add_device(Box::new(apartment()));
    assert_eq!(handler.interval(id), Some(60));
    assert_eq!(
        &handler.heartbeat_payload(id).unwrap()[..],
        HEARTBEAT.as_bytes()
    );
}

#[test]
fn test_detach_all() {
    let (mut handler, mut rx) = handler();
    let id = handler.add_device(Box::new(apartment()));
    drain(&mut rx);
    handler.detach_all();

    handler.receive_datagram(BSC_QUERY.as_bytes()).unwrap();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(handler.device_ids().collect::<Vec<_>>(), vec![id]);
}
