//! Simulated IMPBUS-2 line shared by the integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use impbus_core::catalog::Catalog;
use impbus_core::protocol::crc::crc8;
use impbus_core::protocol::{
    packet, AddressRange, Bus, BusConfig, BusError, Frame, Transport, BROADCAST_SERIAL, PARAM_ALL,
};

/// One simulated probe module
#[derive(Debug, Clone, Default)]
pub struct SimModule {
    /// Raw parameter bytes by (get command, parameter number)
    pub params: HashMap<(u8, u8), Vec<u8>>,
    /// EEPROM pages
    pub pages: HashMap<u8, Vec<u8>>,
}

/// A line with zero or more modules attached
pub struct SimulatedBus {
    pub catalog: Catalog,
    pub modules: BTreeMap<u32, SimModule>,
    pub written: Vec<Vec<u8>>,
    pub opened: Vec<u32>,
    pub range_probes: usize,
    pub point_probes: usize,
    pending: VecDeque<u8>,
}

impl SimulatedBus {
    pub fn new(serials: &[u32]) -> Self {
        let catalog = Catalog::builtin().unwrap();
        let mut modules = BTreeMap::new();
        for &serial in serials {
            let mut module = SimModule::default();
            for table in catalog.tables() {
                for param in &table.params {
                    module
                        .params
                        .insert((table.get_command, param.number), vec![0; param.byte_length]);
                }
            }
            let mut bytes = vec![0; 4];
            LittleEndian::write_u32(&mut bytes, serial);
            module.params.insert((10, 1), bytes);
            modules.insert(serial, module);
        }

        Self {
            catalog,
            modules,
            written: Vec::new(),
            opened: Vec::new(),
            range_probes: 0,
            point_probes: 0,
            pending: VecDeque::new(),
        }
    }

    /// Store raw parameter bytes on a module
    pub fn set_raw(&mut self, serial: u32, table: &str, param: &str, bytes: Vec<u8>) {
        let (table, param) = self.catalog.lookup_param(table, param).unwrap();
        let key = (table.get_command, param.number);
        self.modules.get_mut(&serial).unwrap().params.insert(key, bytes);
    }

    /// Raw parameter bytes held by a module
    pub fn raw(&self, serial: u32, table: &str, param: &str) -> Vec<u8> {
        let (table, param) = self.catalog.lookup_param(table, param).unwrap();
        self.modules[&serial].params[&(table.get_command, param.number)].clone()
    }

    fn answer(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        let (header, data) = packet::decode(request).ok()?;
        let data = data.unwrap_or_default();
        let serial = header.serial;

        match header.cmd {
            0x02 => {
                self.modules.get(&serial)?;
                Some(frame(0x02, serial, None))
            }
            0x04 => {
                self.point_probes += 1;
                self.modules.get(&serial)?;
                let mut bytes = [0u8; 3];
                LittleEndian::write_u24(&mut bytes, serial);
                Some(vec![crc8(&bytes)])
            }
            0x06 => {
                self.range_probes += 1;
                let range = AddressRange::from_broadcast(serial);
                let present = self.modules.keys().filter(|s| range.contains(**s)).count();
                match present {
                    0 => None,
                    1 => Some(vec![0x5A]),
                    _ => Some(vec![0x5A, 0xA5]),
                }
            }
            0x08 => {
                if self.modules.len() != 1 {
                    return None;
                }
                let serial = *self.modules.keys().next()?;
                let mut bytes = vec![0u8; 3];
                LittleEndian::write_u24(&mut bytes, serial);
                Some(frame(0x08, BROADCAST_SERIAL, Some(bytes)))
            }
            0x3C => {
                let page = self.modules.get(&serial)?.pages.get(data.get(1)?).cloned();
                Some(frame(0x3C, serial, Some(page.unwrap_or_default())))
            }
            0x3D => {
                let module = self.modules.get_mut(&serial)?;
                module.pages.insert(*data.get(1)?, data[2..].to_vec());
                Some(frame(0x3D, serial, None))
            }
            cmd => self.answer_table(cmd, serial, &data),
        }
    }

    fn answer_table(&mut self, cmd: u8, serial: u32, data: &[u8]) -> Option<Vec<u8>> {
        let table = self.catalog.lookup_table(cmd).ok()?.clone();
        let number = *data.first()?;
        let targets: Vec<u32> = if serial == BROADCAST_SERIAL {
            self.modules.keys().copied().collect()
        } else {
            self.modules.get(&serial)?;
            vec![serial]
        };

        if cmd == table.get_command {
            let module = self.modules.get(&serial)?;
            let payload = if number == PARAM_ALL {
                table
                    .params
                    .iter()
                    .flat_map(|p| module.params[&(cmd, p.number)].clone())
                    .collect()
            } else {
                module.params.get(&(cmd, number))?.clone()
            };
            return Some(frame(cmd, serial, Some(payload)));
        }

        let values = &data[2..];
        for target in targets {
            let module = self.modules.get_mut(&target)?;
            if number == PARAM_ALL {
                let mut offset = 0;
                for param in &table.params {
                    let end = offset + param.byte_length;
                    module
                        .params
                        .insert((table.get_command, param.number), values[offset..end].to_vec());
                    offset = end;
                }
            } else {
                module
                    .params
                    .insert((table.get_command, number), values.to_vec());
            }
        }

        if serial == BROADCAST_SERIAL {
            return None;
        }
        Some(frame(cmd, serial, None))
    }
}

fn frame(cmd: u8, serial: u32, payload: Option<Vec<u8>>) -> Vec<u8> {
    Frame::new(0x00, cmd, serial, payload).unwrap().to_bytes()
}

impl Transport for SimulatedBus {
    fn open(&mut self, baud_rate: u32) -> Result<(), BusError> {
        self.opened.push(baud_rate);
        Ok(())
    }

    fn close(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, BusError> {
        self.written.push(data.to_vec());
        if let Some(reply) = self.answer(data) {
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

    fn clear(&mut self) -> Result<(), BusError> {
        self.pending.clear();
        Ok(())
    }
}

/// Short pauses so the suites run quickly
pub fn test_config() -> BusConfig {
    BusConfig {
        settle_delay_ms: 0,
        confirm_delay_ms: 0,
        ..Default::default()
    }
}

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An opened bus over a simulated line with `serials` attached
pub fn simulated_bus(serials: &[u32]) -> Bus<SimulatedBus> {
    init_tracing();
    let transport = SimulatedBus::new(serials);
    let catalog = transport.catalog.clone();
    Bus::open(transport, catalog, test_config()).unwrap()
}
