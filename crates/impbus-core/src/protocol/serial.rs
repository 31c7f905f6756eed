//! Serial port handling
//!
//! The [`Transport`] trait is the byte-level seam between the bus
//! orchestrator and the wire. [`SerialTransport`] implements it on top of
//! the `serialport` crate.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::BusError;

/// Gap after which a burst of incoming bytes is considered complete
const INTER_CHAR_TIMEOUT: Duration = Duration::from_millis(20);

/// Polling interval while waiting for bytes
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Byte-level access to the bus line
pub trait Transport {
    /// Open (or reopen) the line at `baud_rate`
    fn open(&mut self, baud_rate: u32) -> Result<(), BusError>;

    /// Close the line
    fn close(&mut self) -> Result<(), BusError>;

    /// Write all of `data`, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize, BusError>;

    /// Read exactly `n` bytes, failing with [`BusError::Timeout`] if they do not arrive in time
    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, BusError>;

    /// Read whatever arrives within `timeout`, possibly nothing
    fn read_any(&mut self, timeout: Duration) -> Result<Vec<u8>, BusError>;

    /// Drop stale input
    fn clear(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product,
            },
            _ => Self::named(info.port_name),
        }
    }
}

impl PortInfo {
    fn named(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            product: None,
        }
    }
}

/// USB-RS485 adapters show up as ttyUSB*, list those first
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyUSB"), (1, "ttyACM")] {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (2, 0, basename.to_string())
}

/// List available serial ports in deterministic order
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo::named(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Serial port transport, 8N1 without flow control
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create a transport for `port_name`; nothing is opened yet
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            port: None,
        }
    }

    /// Port name
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, BusError> {
        self.port.as_mut().ok_or(BusError::NotConnected)
    }

    /// Read into `buf` until it is full, the deadline passes, or (with
    /// `burst`) the line stays quiet for [`INTER_CHAR_TIMEOUT`] after data arrived
    fn read_until(&mut self, buf: &mut Vec<u8>, limit: usize, timeout: Duration, burst: bool) -> Result<(), BusError> {
        let port = self.port()?;
        let start = Instant::now();
        let mut last_data = Instant::now();
        let mut chunk = [0u8; 256];

        while buf.len() < limit && start.elapsed() < timeout {
            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                if burst && !buf.is_empty() && last_data.elapsed() > INTER_CHAR_TIMEOUT {
                    break;
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            let to_read = available.min(chunk.len()).min(limit - buf.len());
            match port.read(&mut chunk[..to_read]) {
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    last_data = Instant::now();
                }
                Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, baud_rate: u32) -> Result<(), BusError> {
        self.port = None;
        let port = serialport::new(&self.port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.clear(serialport::ClearBuffer::All)?;
        tracing::debug!("opened {} at {} baud", self.port_name, baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BusError> {
        if self.port.take().is_some() {
            tracing::debug!("closed {}", self.port_name);
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BusError> {
        let port = self.port()?;
        port.write_all(data)?;
        Ok(data.len())
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>, BusError> {
        let mut buf = Vec::with_capacity(n);
        self.read_until(&mut buf, n, timeout, false)?;
        if buf.len() < n {
            tracing::trace!("read_exact: got {} of {} bytes before timeout", buf.len(), n);
            return Err(BusError::Timeout);
        }
        Ok(buf)
    }

    fn read_any(&mut self, timeout: Duration) -> Result<Vec<u8>, BusError> {
        let mut buf = Vec::new();
        self.read_until(&mut buf, usize::MAX, timeout, true)?;
        Ok(buf)
    }

    fn clear(&mut self) -> Result<(), BusError> {
        self.port()?.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}
