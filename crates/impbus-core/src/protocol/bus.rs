//! Bus orchestrator
//!
//! Owns the transport, the catalog, a command builder and a response
//! parser, and runs one exchange at a time:
//! encode -> write -> inter-frame delay -> bounded read -> decode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use super::{
    scanner, BusError, CommandBuilder, CommandError, FrameHeader, MeasureMode, Request,
    ResponseParser, TdrPoint, TdrScanParams, Transport, BAUD_RATES, BROADCAST_SERIAL,
    DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, HEADER_LEN, SERIAL_MASK,
};
use crate::catalog::{Catalog, ParamRef, Table, TableRef, Value};

const SYSTEM_TABLE: &str = "SYSTEM_PARAMETER";
const BAUDRATE_PARAM: &str = "Baudrate";
const PASSWORD_PARAM: &str = "Password";
const ACTION_TABLE: &str = "ACTION_PARAMETER";
const MEAS_MODE_PARAM: &str = "MeasMode";

/// Bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
    /// Timeout for single-byte presence answers in milliseconds
    pub ack_timeout_ms: u64,
    /// Added to every command's process time, in milliseconds
    pub extra_process_time_ms: u64,
    /// Pause after each broadcast during baud rate synchronization
    pub settle_delay_ms: u64,
    /// Read-backs before a measure mode change is given up
    pub confirm_attempts: u32,
    /// Pause between read-backs in milliseconds
    pub confirm_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            ack_timeout_ms: 200,
            extra_process_time_ms: 0,
            settle_delay_ms: 500,
            confirm_attempts: 3,
            confirm_delay_ms: 100,
        }
    }
}

/// A module known to this bus session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Serial number
    pub serial: u32,
    /// Whether protected tables may be written
    pub unlocked: bool,
}

/// IMPBUS-2 master over a transport
pub struct Bus<T: Transport> {
    transport: T,
    catalog: Arc<Catalog>,
    config: BusConfig,
    builder: CommandBuilder,
    parser: ResponseParser,
    modules: BTreeMap<u32, Module>,
    baud_rate: u32,
    open: bool,
    /// Metrics: cumulative bytes/packets sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_packets: u64,
    rx_packets: u64,
}

impl<T: Transport> Bus<T> {
    /// Create a bus (transport not yet opened)
    pub fn new(transport: T, catalog: impl Into<Arc<Catalog>>, config: BusConfig) -> Self {
        let baud_rate = config.baud_rate;
        Self {
            transport,
            catalog: catalog.into(),
            config,
            builder: CommandBuilder::new(),
            parser: ResponseParser::new(),
            modules: BTreeMap::new(),
            baud_rate,
            open: false,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_packets: 0,
            rx_packets: 0,
        }
    }

    /// Create a bus and open the transport at the configured baud rate
    pub fn open(transport: T, catalog: impl Into<Arc<Catalog>>, config: BusConfig) -> Result<Self, BusError> {
        let mut bus = Self::new(transport, catalog, config);
        bus.connect()?;
        Ok(bus)
    }

    /// Open (or reopen) the transport at the configured baud rate
    pub fn connect(&mut self) -> Result<(), BusError> {
        self.reopen(self.config.baud_rate)
    }

    /// Close the transport
    pub fn close(&mut self) -> Result<(), BusError> {
        self.open = false;
        self.transport.close()
    }

    /// Whether the transport is open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Current line speed
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// The parameter catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Get cumulative tx/rx bytes and packet counters
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (
            self.tx_bytes,
            self.rx_bytes,
            self.tx_packets,
            self.rx_packets,
        )
    }

    /// Modules discovered or registered so far, by serial number
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Look up a known module
    pub fn module(&self, serial: u32) -> Option<&Module> {
        self.modules.get(&serial)
    }

    /// Add a module to the session without probing it
    pub fn register_module(&mut self, serial: u32) -> Result<&Module, BusError> {
        if serial & !SERIAL_MASK != 0 {
            return Err(CommandError::InvalidSerial(serial).into());
        }
        Ok(self.modules.entry(serial).or_insert(Module {
            serial,
            unlocked: false,
        }))
    }

    fn reopen(&mut self, baud_rate: u32) -> Result<(), BusError> {
        self.open = false;
        self.transport.open(baud_rate)?;
        self.baud_rate = baud_rate;
        self.open = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::NotConnected);
        }
        Ok(())
    }

    /// Time the request spends on the wire plus the module's process time
    fn inter_frame_delay(&self, request: &Request) -> Duration {
        // Each byte = 10 bits (1 start + 8 data + 1 stop)
        let bits = request.bytes.len() as u64 * 10;
        let transmit_ms = (bits * 1000).div_ceil(u64::from(self.baud_rate.max(1)));
        Duration::from_millis(
            transmit_ms + request.command.process_time_ms() + self.config.extra_process_time_ms,
        )
    }

    /// Write a request and wait for the module to process it
    fn transmit(&mut self, request: &Request) -> Result<(), BusError> {
        self.ensure_open()?;
        self.transport.clear()?;

        tracing::trace!("tx {:?} -> {}: {:02x?}", request.command, request.serial, request.bytes);
        let written = self.transport.write(&request.bytes)?;
        self.tx_bytes = self.tx_bytes.saturating_add(written as u64);
        self.tx_packets = self.tx_packets.saturating_add(1);

        std::thread::sleep(self.inter_frame_delay(request));
        Ok(())
    }

    fn record_rx(&mut self, bytes: &[u8]) {
        tracing::trace!("rx {} bytes: {:02x?}", bytes.len(), bytes);
        self.rx_bytes = self.rx_bytes.saturating_add(bytes.len() as u64);
        self.rx_packets = self.rx_packets.saturating_add(1);
    }

    /// Send a request and read one framed response
    fn exchange(&mut self, request: &Request) -> Result<Vec<u8>, BusError> {
        self.transmit(request)?;
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let mut bytes = self.transport.read_exact(HEADER_LEN, timeout)?;
        let header = FrameHeader::from_bytes(&bytes)?;
        if header.data_len() > 0 {
            bytes.extend(self.transport.read_exact(header.data_len(), timeout)?);
        }
        self.record_rx(&bytes);

        tracing::debug!(
            "{:?} {}: state {:#04x}, {} data bytes",
            request.command,
            request.serial,
            header.state,
            header.data_len()
        );
        Ok(bytes)
    }

    fn check_unlocked(&self, serial: u32, table: &Table) -> Result<(), CommandError> {
        if !table.protected {
            return Ok(());
        }
        match self.modules.get(&serial) {
            Some(module) if module.unlocked => Ok(()),
            _ => Err(CommandError::Locked(serial)),
        }
    }

    /// Addressed presence check with a full response frame
    pub fn long_ack(&mut self, serial: u32) -> Result<bool, BusError> {
        let request = self.builder.long_ack(serial)?;
        let response = self.exchange(&request)?;
        self.parser.long_ack(&request, &response)
    }

    /// Addressed presence check answered by one CRC byte
    pub fn short_ack(&mut self, serial: u32) -> Result<bool, BusError> {
        let request = self.builder.short_ack(serial)?;
        self.transmit(&request)?;
        let response = self
            .transport
            .read_exact(1, Duration::from_millis(self.config.ack_timeout_ms))?;
        self.record_rx(&response);

        let present = self.parser.short_ack(&request, &response);
        if !present {
            tracing::warn!("garbled short ack from {}: {:02x?}", serial, response);
        }
        Ok(present)
    }

    /// Presence check over the block encoded by `broadcast`
    pub fn range_ack(&mut self, broadcast: u32) -> Result<bool, BusError> {
        let request = self.builder.range_ack(broadcast)?;
        self.transmit(&request)?;
        let response = self
            .transport
            .read_any(Duration::from_millis(self.config.ack_timeout_ms))?;
        if response.is_empty() {
            return Err(BusError::Timeout);
        }
        self.record_rx(&response);

        if response.len() > 1 {
            // overlapping answers; presence is all that matters here
            tracing::debug!("range {:#08x}: {} bytes collided", broadcast, response.len());
            return Ok(true);
        }
        Ok(self.parser.range_ack(&response))
    }

    /// Serial number of the only module on the bus
    pub fn negative_ack(&mut self) -> Result<u32, BusError> {
        let request = self.builder.negative_ack()?;
        let response = self.exchange(&request)?;
        self.parser.negative_ack(&response)
    }

    /// Ask a lone module for its serial number and register it
    pub fn get_serial_number_via_nack(&mut self) -> Result<u32, BusError> {
        let serial = self.negative_ack()?;
        tracing::info!("module {} answered negative acknowledge", serial);
        self.register_module(serial)?;
        Ok(serial)
    }

    /// Find every module in `[min, max]` and register it
    pub fn scan(&mut self, min: u32, max: u32) -> Result<Vec<u32>, BusError> {
        let found = scanner::scan(self, min, max)?;
        for &serial in &found {
            self.register_module(serial)?;
        }
        tracing::info!("found {} module(s) in [{}, {}]", found.len(), min, max);
        Ok(found)
    }

    /// Read one parameter
    pub fn get_parameter<'a, 'b>(
        &mut self,
        serial: u32,
        table: impl Into<TableRef<'a>>,
        param: impl Into<ParamRef<'b>>,
    ) -> Result<Value, BusError> {
        let catalog = Arc::clone(&self.catalog);
        let (table, param) = catalog.lookup_param(table, param)?;
        let request = self.builder.get_parameter(serial, table, param)?;
        let response = self.exchange(&request)?;
        self.parser.get_parameter(&request, table, param, &response)
    }

    /// Write one parameter
    pub fn set_parameter<'a, 'b>(
        &mut self,
        serial: u32,
        table: impl Into<TableRef<'a>>,
        param: impl Into<ParamRef<'b>>,
        value: impl Into<Value>,
    ) -> Result<bool, BusError> {
        self.set_parameter_indexed(serial, table, param, 0, value)
    }

    /// Write one parameter with an explicit address parameter byte
    pub fn set_parameter_indexed<'a, 'b>(
        &mut self,
        serial: u32,
        table: impl Into<TableRef<'a>>,
        param: impl Into<ParamRef<'b>>,
        address_param: u8,
        value: impl Into<Value>,
    ) -> Result<bool, BusError> {
        let catalog = Arc::clone(&self.catalog);
        let (table, param) = catalog.lookup_param(table, param)?;
        let request = self
            .builder
            .set_parameter(serial, table, param, address_param, &value.into())?;
        self.check_unlocked(serial, table)?;
        let response = self.exchange(&request)?;
        self.parser.set(&request, table, &response)
    }

    /// Read every parameter of a table
    pub fn get_table<'a>(
        &mut self,
        serial: u32,
        table: impl Into<TableRef<'a>>,
    ) -> Result<Vec<(String, Value)>, BusError> {
        let catalog = Arc::clone(&self.catalog);
        let table = catalog.lookup_table(table)?;
        let request = self.builder.get_table(serial, table)?;
        let response = self.exchange(&request)?;
        self.parser.get_table(&request, table, &response)
    }

    /// Write every parameter of a table
    pub fn set_table<'a>(
        &mut self,
        serial: u32,
        table: impl Into<TableRef<'a>>,
        values: &[(&str, Value)],
    ) -> Result<bool, BusError> {
        let catalog = Arc::clone(&self.catalog);
        let table = catalog.lookup_table(table)?;
        let request = self.builder.set_table(serial, table, values)?;
        self.check_unlocked(serial, table)?;
        let response = self.exchange(&request)?;
        self.parser.set(&request, table, &response)
    }

    /// Record a TDR curve
    pub fn tdr_scan(&mut self, serial: u32, params: TdrScanParams) -> Result<Vec<TdrPoint>, BusError> {
        let request = self.builder.tdr_scan(serial, params)?;
        let response = self.exchange(&request)?;
        self.parser.tdr_scan(&request, &response)
    }

    /// Read one EEPROM page
    pub fn get_epr_page(&mut self, serial: u32, page_nr: u8) -> Result<Vec<u8>, BusError> {
        let request = self.builder.get_epr_page(serial, page_nr)?;
        let response = self.exchange(&request)?;
        self.parser.get_epr_page(&request, &response)
    }

    /// Write one EEPROM page
    pub fn set_epr_page(&mut self, serial: u32, page_nr: u8, page: &[u8]) -> Result<bool, BusError> {
        let request = self.builder.set_epr_page(serial, page_nr, page)?;
        let response = self.exchange(&request)?;
        self.parser.set_epr_page(&request, &response)
    }

    /// Read consecutive EEPROM pages into one buffer
    pub fn read_eeprom(&mut self, serial: u32, pages: Range<u8>) -> Result<Vec<u8>, BusError> {
        let mut image = Vec::new();
        for page_nr in pages {
            image.extend(self.get_epr_page(serial, page_nr)?);
        }
        Ok(image)
    }

    /// Send the password and allow writes to protected tables for this session
    pub fn unlock(&mut self, serial: u32, password: u32) -> Result<(), BusError> {
        self.set_parameter(serial, SYSTEM_TABLE, PASSWORD_PARAM, f64::from(password))?;
        let module = self.modules.entry(serial).or_insert(Module {
            serial,
            unlocked: false,
        });
        module.unlocked = true;
        tracing::info!("module {} unlocked", serial);
        Ok(())
    }

    /// Current measure mode, `None` for a value outside the known modes
    pub fn measure_mode(&mut self, serial: u32) -> Result<Option<MeasureMode>, BusError> {
        let value = self.get_parameter(serial, ACTION_TABLE, MEAS_MODE_PARAM)?;
        Ok(value
            .as_scalar()
            .and_then(|v| MeasureMode::from_value(v as u8)))
    }

    /// Change the measure mode and read it back until the module reports it
    pub fn set_measure_mode(&mut self, serial: u32, mode: MeasureMode) -> Result<(), BusError> {
        self.set_parameter(serial, ACTION_TABLE, MEAS_MODE_PARAM, f64::from(mode.value()))?;

        let attempts = self.config.confirm_attempts;
        for attempt in 1..=attempts {
            std::thread::sleep(Duration::from_millis(self.config.confirm_delay_ms));
            match self.measure_mode(serial) {
                Ok(Some(current)) if current == mode => {
                    tracing::debug!("module {} in {:?} after {} read(s)", serial, mode, attempt);
                    return Ok(());
                }
                Ok(current) => {
                    tracing::warn!("module {} reports {:?}, waiting for {:?}", serial, current, mode);
                }
                Err(BusError::Timeout) => {
                    tracing::warn!("mode read-back {}/{} from {} timed out", attempt, attempts, serial);
                }
                Err(e) => return Err(e),
            }
        }
        Err(BusError::ConfirmationFailed { attempts })
    }

    /// Bring every module on the line to `target` baud
    ///
    /// Modules may sit at any supported rate, so the "set baudrate" broadcast
    /// is repeated at each of them before the transport settles on `target`.
    pub fn sync_baudrate(&mut self, target: u32) -> Result<(), BusError> {
        if !BAUD_RATES.contains(&target) {
            return Err(CommandError::ValueOutOfRange {
                param: BAUDRATE_PARAM.to_string(),
                value: f64::from(target),
            }
            .into());
        }

        let catalog = Arc::clone(&self.catalog);
        let (table, param) = catalog.lookup_param(SYSTEM_TABLE, BAUDRATE_PARAM)?;
        let value = Value::Scalar(f64::from(target / 100));
        let request = self
            .builder
            .set_parameter(BROADCAST_SERIAL, table, param, 0, &value)?;

        for baud in BAUD_RATES {
            tracing::debug!("broadcasting baud rate {} at {}", target, baud);
            self.reopen(baud)?;
            self.transmit(&request)?;
            std::thread::sleep(Duration::from_millis(self.config.settle_delay_ms));
        }

        self.reopen(target)?;
        self.config.baud_rate = target;
        tracing::info!("bus synchronized to {} baud", target);
        Ok(())
    }
}

impl<T: Transport> Drop for Bus<T> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, ProtocolError};
    use std::collections::VecDeque;

    /// Answers each write with the next scripted reply
    #[derive(Default)]
    struct ScriptedTransport {
        replies: VecDeque<Vec<u8>>,
        pending: VecDeque<u8>,
        written: Vec<Vec<u8>>,
        opened: Vec<u32>,
    }

    impl ScriptedTransport {
        fn with_replies(replies: Vec<Vec<u8>>) -> Self {
            Self {
                replies: replies.into(),
                ..Default::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn open(&mut self, baud_rate: u32) -> Result<(), BusError> {
            self.opened.push(baud_rate);
            Ok(())
        }

        fn close(&mut self) -> Result<(), BusError> {
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, BusError> {
            self.written.push(data.to_vec());
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend(reply);
            }
            Ok(data.len())
        }

        fn read_exact(&mut self, n: usize, _timeout: Duration) -> Result<Vec<u8>, BusError> {
            if self.pending.len() < n {
                self.pending.clear();
                return Err(BusError::Timeout);
            }
            Ok(self.pending.drain(..n).collect())
        }

        fn read_any(&mut self, _timeout: Duration) -> Result<Vec<u8>, BusError> {
            Ok(self.pending.drain(..).collect())
        }
    }

    fn reply(cmd: u8, serial: u32, payload: Option<Vec<u8>>) -> Vec<u8> {
        Frame::new(0x00, cmd, serial, payload).unwrap().to_bytes()
    }

    fn config() -> BusConfig {
        BusConfig {
            settle_delay_ms: 0,
            confirm_delay_ms: 0,
            ..Default::default()
        }
    }

    fn bus(replies: Vec<Vec<u8>>) -> Bus<ScriptedTransport> {
        let catalog = Catalog::builtin().unwrap();
        Bus::open(ScriptedTransport::with_replies(replies), catalog, config()).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = BusConfig::default();
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.confirm_attempts, 3);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: BusConfig =
            serde_json::from_str(r#"{ "port_name": "/dev/ttyUSB0", "baud_rate": 2400 }"#).unwrap();
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 2400);
        assert_eq!(config.confirm_attempts, 3);
    }

    #[test]
    fn test_not_connected() {
        let catalog = Catalog::builtin().unwrap();
        let mut bus = Bus::new(ScriptedTransport::default(), catalog, config());
        assert!(!bus.is_open());
        assert!(matches!(bus.long_ack(1), Err(BusError::NotConnected)));
        assert!(bus.transport().written.is_empty());
    }

    #[test]
    fn test_inter_frame_delay() {
        let bus = bus(vec![]);
        let request = CommandBuilder::new().long_ack(1).unwrap();
        // 70 bits at 9600 baud round up to 8 ms, plus 5 ms processing
        assert_eq!(bus.inter_frame_delay(&request), Duration::from_millis(13));
    }

    #[test]
    fn test_long_ack() {
        let mut bus = bus(vec![reply(0x02, 31001, None)]);
        assert!(bus.long_ack(31001).unwrap());
        assert_eq!(
            bus.transport().written[0],
            vec![0xFD, 0x02, 0x00, 0x19, 0x79, 0x00, 0x7B]
        );
        assert_eq!(bus.get_counters(), (7, 7, 1, 1));
    }

    #[test]
    fn test_long_ack_timeout() {
        let mut bus = bus(vec![]);
        assert!(bus.long_ack(31001).unwrap_err().is_timeout());
    }

    #[test]
    fn test_short_ack() {
        let mut bus = bus(vec![vec![0xC0], vec![0x11]]);
        assert!(bus.short_ack(31001).unwrap());
        assert!(!bus.short_ack(31001).unwrap());
        assert!(bus.short_ack(31001).unwrap_err().is_timeout());
    }

    #[test]
    fn test_range_ack() {
        let mut bus = bus(vec![vec![0x42], vec![0x42, 0x17]]);
        assert!(bus.range_ack(0x80_0000).unwrap());
        assert!(bus.range_ack(0x80_0000).unwrap());
        assert!(bus.range_ack(0x80_0000).unwrap_err().is_timeout());
    }

    #[test]
    fn test_serial_via_nack() {
        let mut bus = bus(vec![reply(0x08, BROADCAST_SERIAL, Some(vec![0x19, 0x79, 0x00]))]);
        assert_eq!(bus.get_serial_number_via_nack().unwrap(), 31001);
        assert_eq!(bus.module(31001).map(|m| m.unlocked), Some(false));
    }

    #[test]
    fn test_get_parameter_by_name_and_number() {
        let moist = Some(25.5f32.to_le_bytes().to_vec());
        let mut bus = bus(vec![reply(14, 7, moist.clone()), reply(14, 7, moist)]);
        assert_eq!(
            bus.get_parameter(7, "MEASURE_PARAMETER", "Moist").unwrap(),
            Value::Scalar(25.5)
        );
        assert_eq!(bus.get_parameter(7, 14u8, 1u8).unwrap(), Value::Scalar(25.5));
    }

    #[test]
    fn test_device_status_propagates() {
        let refused = Frame::new(0x07, 17, 7, None).unwrap().to_bytes();
        let mut bus = bus(vec![refused]);
        let err = bus.set_parameter(7, "ACTION_PARAMETER", "StartMeasure", 1.0).unwrap_err();
        assert!(matches!(err, BusError::Protocol(ProtocolError::DeviceStatus(0x07))));
    }

    #[test]
    fn test_protected_table_requires_unlock() {
        let mut bus = bus(vec![reply(11, 7, None), reply(25, 7, None)]);
        let err = bus.set_parameter(7, "TDR_CONFIGURATION", "TDRStart", 3.0).unwrap_err();
        assert!(matches!(err, BusError::Command(CommandError::Locked(7))));
        assert!(bus.transport().written.is_empty());

        bus.unlock(7, 1234).unwrap();
        assert!(bus.module(7).unwrap().unlocked);
        assert!(bus.set_parameter(7, "TDR_CONFIGURATION", "TDRStart", 3.0).unwrap());

        let password = &bus.transport().written[0];
        assert_eq!(&password[7..13], &[5, 0, 0xD2, 0x04, 0, 0]);
    }

    #[test]
    fn test_read_only_writes_nothing() {
        let mut bus = bus(vec![]);
        let err = bus.set_parameter(7, "SYSTEM_PARAMETER", "SerialNum", 1.0).unwrap_err();
        assert!(matches!(err, BusError::Command(CommandError::NotWritable(_))));
        assert!(bus.transport().written.is_empty());
    }

    #[test]
    fn test_set_measure_mode_confirmed() {
        let mut bus = bus(vec![reply(17, 9, None), reply(16, 9, Some(vec![0])), reply(16, 9, Some(vec![2]))]);
        bus.set_measure_mode(9, MeasureMode::ModeC).unwrap();
        assert_eq!(bus.transport().written.len(), 3);
    }

    #[test]
    fn test_set_measure_mode_gives_up() {
        let mut bus = bus(vec![
            reply(17, 9, None),
            reply(16, 9, Some(vec![0])),
            vec![],
            reply(16, 9, Some(vec![0])),
        ]);
        let err = bus.set_measure_mode(9, MeasureMode::ModeB).unwrap_err();
        assert!(matches!(err, BusError::ConfirmationFailed { attempts: 3 }));
    }

    #[test]
    fn test_read_eeprom() {
        let mut bus = bus(vec![reply(0x3C, 3, Some(vec![1, 2])), reply(0x3C, 3, Some(vec![3]))]);
        assert_eq!(bus.read_eeprom(3, 4..6).unwrap(), vec![1, 2, 3]);
        assert_eq!(&bus.transport().written[1][7..9], &[0xFF, 5]);
    }

    #[test]
    fn test_sync_baudrate() {
        let mut bus = bus(vec![]);
        bus.sync_baudrate(4800).unwrap();

        let transport = bus.transport();
        assert_eq!(transport.opened, vec![9600, 1200, 2400, 4800, 9600, 4800]);
        assert_eq!(transport.written.len(), 4);
        for frame in &transport.written {
            assert_eq!(&frame[3..6], &[0xFF, 0xFF, 0xFF]);
            assert_eq!(&frame[7..10], &[4, 0, 48]);
        }
        assert_eq!(bus.baud_rate(), 4800);
    }

    #[test]
    fn test_sync_baudrate_rejects_unknown_rate() {
        let mut bus = bus(vec![]);
        assert!(matches!(
            bus.sync_baudrate(19200),
            Err(BusError::Command(CommandError::ValueOutOfRange { .. }))
        ));
        assert_eq!(bus.transport().opened, vec![9600]);
    }
}
