//! Console behaviour against a recording driver.

use std::cell::RefCell;
use std::fs;

use relaybank_host::{ConnectionStatus, NotesStore, TransportError};
use relaybank_protocol::{PinId, PinSet, RelayState};
use relaybank_runner::{Console, RelayDriver};

fn pin(gpio: u8) -> PinId {
    PinId::new(gpio).unwrap()
}

/// Records every relay request; optionally fails them.
struct FakeDriver {
    status: RefCell<ConnectionStatus>,
    sent: RefCell<Vec<(PinId, RelayState)>>,
    fail: bool,
}

impl FakeDriver {
    fn connected() -> Self {
        FakeDriver {
            status: RefCell::new(ConnectionStatus::Connected { port: "/dev/ttyACM0".to_string() }),
            sent: RefCell::new(Vec::new()),
            fail: false,
        }
    }
}

impl RelayDriver for &FakeDriver {
    fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    fn pins(&self) -> PinSet {
        PinSet::default()
    }

    fn send_relay(&self, pin: PinId, state: RelayState) -> Result<(), TransportError> {
        self.sent.borrow_mut().push((pin, state));
        if self.fail {
            Err(TransportError::NotConnected)
        } else {
            Ok(())
        }
    }

    fn set_all(&self, state: RelayState) -> Result<(), TransportError> {
        for pin in self.pins().iter() {
            self.send_relay(pin, state)?;
        }
        Ok(())
    }
}

fn run(console: &mut Console<&FakeDriver>, lines: &[&str]) -> String {
    let mut out = Vec::new();
    for line in lines {
        assert!(console.handle_line(line, &mut out).unwrap());
    }
    String::from_utf8(out).unwrap()
}

#[test]
fn test_toggle_is_optimistic() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver::connected();
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    run(&mut console, &["toggle 10", "toggle 10", "toggle GP11"]);

    assert_eq!(
        *driver.sent.borrow(),
        vec![
            (pin(10), RelayState::On),
            (pin(10), RelayState::Off),
            (pin(11), RelayState::On),
        ]
    );
    assert_eq!(console.switch(pin(10)), Some(RelayState::Off));
    assert_eq!(console.switch(pin(11)), Some(RelayState::On));
}

#[test]
fn test_failed_send_keeps_optimistic_state() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver { fail: true, ..FakeDriver::connected() };
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    let output = run(&mut console, &["on 12"]);

    assert!(output.contains("not confirmed"));
    assert_eq!(console.switch(pin(12)), Some(RelayState::On));
}

#[test]
fn test_controls_disabled_while_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver::connected();
    *driver.status.borrow_mut() = ConnectionStatus::Disconnected;
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    let output = run(&mut console, &["on 10", "all on"]);

    assert!(output.contains("controls disabled"));
    assert!(driver.sent.borrow().is_empty());
    assert_eq!(console.switch(pin(10)), Some(RelayState::Off));
}

#[test]
fn test_all_on_and_off() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver::connected();
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    run(&mut console, &["all on"]);
    assert!(PinSet::default().iter().all(|p| console.switch(p) == Some(RelayState::On)));

    run(&mut console, &["all off"]);
    assert!(PinSet::default().iter().all(|p| console.switch(p) == Some(RelayState::Off)));
    assert_eq!(driver.sent.borrow().len(), 8);
}

#[test]
fn test_unknown_channel_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver::connected();
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    let output = run(&mut console, &["on 3", "bogus"]);

    assert!(output.contains("GP03 is not a relay channel"));
    assert!(output.contains("unknown command 'bogus'"));
    assert!(driver.sent.borrow().is_empty());
}

#[test]
fn test_notes_and_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.conf");
    let driver = FakeDriver::connected();
    let mut console = Console::new(&driver, NotesStore::load(&path).unwrap());

    let output = run(&mut console, &["note 10 Vocal mic", "save", "status"]);

    assert!(output.contains("notes saved"));
    assert!(output.contains("GP10 [OFF] Vocal mic"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "10:Vocal mic\n11:\n12:\n13:\n");
}

#[test]
fn test_quit() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeDriver::connected();
    let mut console = Console::new(&driver, NotesStore::load(dir.path().join("notes.conf")).unwrap());

    let mut out = Vec::new();
    assert!(!console.handle_line("quit", &mut out).unwrap());
}
