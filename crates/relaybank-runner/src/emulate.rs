//! Run the relay controller against a real serial port.
//!
//! Useful with one end of a pty pair (`socat -d -d pty,raw,echo=0
//! pty,raw,echo=0`) to exercise `relayctl run` without hardware. Output
//! lines are simulated and log every level change.

use std::time::Duration;

use relaybank_firmware::sim::{SimPin, StdDelay};
use relaybank_firmware::{IoSerial, RelayBank, RelayController, RelayTable};

use crate::error::RunnerError;

/// Read timeout on the emulator's port. Short, so a poll never stalls.
const EMULATOR_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Open `port` and serve relay commands until the port fails.
pub fn run_emulator(port: &str, baud_rate: u32, table: &RelayTable) -> Result<(), RunnerError> {
    let bank = RelayBank::new(table, SimPin::new).map_err(|e| RunnerError::Device(e.to_string()))?;
    let serial = serialport::new(port, baud_rate)
        .timeout(EMULATOR_READ_TIMEOUT)
        .open()?;

    tracing::info!(port, baud_rate, channels = table.channels.len(), "emulating relay controller");

    let mut controller = RelayController::new(bank, IoSerial::new(serial));
    controller.run(&mut StdDelay)?;
    Ok(())
}
