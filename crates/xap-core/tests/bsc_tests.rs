//! BSC schema message tests

use xap_core::bsc::{CMD_CLASS, EVENT_CLASS};
use xap_core::codec;
use xap_core::{
    Address, BlockId, BlockState, BscCommand, BscQuery, BscResponse, Direction, Error, Level,
    Message, Registry,
};
use xap_test_utils::{BSC_COMMAND, BSC_INFO, BSC_QUERY};

fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

fn decode(text: &str) -> Message {
    Registry::standard().decode(text.as_bytes()).unwrap()
}

#[test]
fn test_command_from_wire() {
    let Message::BscCommand(cmd) = decode(BSC_COMMAND) else {
        panic!("expected a command");
    };
    assert_eq!(cmd.header().class, CMD_CLASS);
    assert_eq!(cmd.target().unwrap().endpoint(), Some("Output 1"));
    assert_eq!(cmd.blocks().len(), 1);

    let block = &cmd.blocks()[0];
    assert_eq!(block.direction, Direction::Output);
    assert_eq!(block.index, Some(1));
    assert_eq!(block.id, Some(BlockId::All));
    assert_eq!(block.state, Some(BlockState::On));
    assert_eq!(block.level, Some(Level::Percent(40)));
}

#[test]
fn test_built_command_matches_wire() {
    let mut cmd = BscCommand::new(
        addr("ACME.Controller.Central"),
        "FF123400",
        addr("ACME.Lighting.apartment:Output 1"),
    );
    let block = cmd.block_mut(0);
    block.id = Some(BlockId::All);
    block.state = Some(BlockState::On);
    block.level = Some(Level::Percent(40));

    assert_eq!(Message::from(cmd.clone()).encode(), BSC_COMMAND);
    assert_eq!(decode(BSC_COMMAND), Message::BscCommand(cmd));
}

#[test]
fn test_block_mut_grows_blocks() {
    let mut cmd = BscCommand::new(addr("a.b.c"), "FF123400", addr("d.e.f:*"));
    cmd.block_mut(2).state = Some(BlockState::Toggle);
    let names: Vec<String> = cmd.blocks().iter().map(|b| b.block_name()).collect();
    assert_eq!(names, vec!["output.state.1", "output.state.2", "output.state.3"]);
}

#[test]
fn test_built_query_matches_wire() {
    let query = BscQuery::new(
        addr("ACME.Controller.Central"),
        "FF123400",
        addr("ACME.Lighting.apartment:*"),
    );
    assert_eq!(Message::from(query.clone()).encode(), BSC_QUERY);
    assert_eq!(decode(BSC_QUERY), Message::BscQuery(query));
}

#[test]
fn test_built_info_matches_wire() {
    let mut info = BscResponse::info(
        addr("ACME.Lighting.apartment:Switch"),
        "FF345602",
        Direction::Input,
    );
    info.block_mut().state = Some(BlockState::Off);
    assert!(!info.is_event());

    let message = Message::from(info);
    assert!(matches!(message, Message::BscInfo(_)));
    assert_eq!(message.encode(), BSC_INFO);
}

#[test]
fn test_event_response() {
    let mut event = BscResponse::event(addr("a.b.c:lamp"), "FF345601", Direction::Output);
    event.block_mut().level = Some(Level::Ratio {
        numerator: 3,
        denominator: 10,
    });
    event.block_mut().set_text("dimmed").unwrap();

    let message = Message::from(event);
    assert!(matches!(message, Message::BscEvent(_)));
    assert_eq!(message.class(), EVENT_CLASS);

    let decoded = decode(&message.encode());
    let Message::BscEvent(decoded) = decoded else {
        panic!("expected an event");
    };
    assert_eq!(decoded.direction(), Direction::Output);
    assert_eq!(decoded.text(), Some("dimmed"));
    assert_eq!(decoded.level().unwrap().to_string(), "3/10");
}

#[test]
fn test_query_requires_target() {
    let text = BSC_QUERY.replace("target=ACME.Lighting.apartment:*\n", "");
    assert!(matches!(
        Registry::standard().decode(text.as_bytes()),
        Err(Error::InvalidHeader(_))
    ));
}

#[test]
fn test_command_requires_state_block() {
    let text = "xap-header\n{\nv=12\nhop=1\nuid=FF123400\nclass=xAPBSC.cmd\nsource=a.b.c\ntarget=d.e.f\n}\nother\n{\n}\n";
    assert!(matches!(
        Registry::standard().decode(text.as_bytes()),
        Err(Error::InvalidBody(_))
    ));
}

#[test]
fn test_invalid_level_is_rejected() {
    let text = BSC_COMMAND.replace("Level=40%", "Level=forty");
    assert!(matches!(
        Registry::standard().decode(text.as_bytes()),
        Err(Error::InvalidField(_))
    ));
}

#[test]
fn test_unrecognized_state_is_ignored() {
    let text = BSC_COMMAND.replace("State=ON", "State=dim");
    let Message::BscCommand(cmd) = decode(&text) else {
        panic!("expected a command");
    };
    assert_eq!(cmd.blocks()[0].state, None);
}

#[test]
fn test_hex_id_and_extras_survive() {
    let text = BSC_COMMAND.replace("ID=*", "ID=1a\nColour=red");
    let Message::BscCommand(cmd) = decode(&text) else {
        panic!("expected a command");
    };
    let block = &cmd.blocks()[0];
    assert_eq!(block.id, Some(BlockId::Uid(0x1A)));
    assert_eq!(block.extra.len(), 1);
    assert!(Message::BscCommand(cmd).encode().contains("ID=1A\n"));
}
