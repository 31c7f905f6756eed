//! Async facade over the blocking bus
//!
//! Every call runs on tokio's blocking pool while holding the bus lock, so
//! only one exchange is ever in flight.

use std::sync::{Arc, Mutex};

use super::{Bus, BusError, MeasureMode, TdrPoint, TdrScanParams, Transport};
use crate::catalog::Value;

/// Shareable async handle to a [`Bus`]
pub struct AsyncBus<T: Transport + Send + 'static> {
    inner: Arc<Mutex<Bus<T>>>,
}

impl<T: Transport + Send + 'static> Clone for AsyncBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + Send + 'static> AsyncBus<T> {
    /// Wrap an (already opened) bus
    pub fn new(bus: Bus<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    /// Run `f` against the bus on the blocking pool
    pub async fn run<R, F>(&self, f: F) -> Result<R, BusError>
    where
        F: FnOnce(&mut Bus<T>) -> Result<R, BusError> + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut bus = inner
                .lock()
                .map_err(|_| BusError::TaskFailed("bus lock poisoned".to_string()))?;
            f(&mut *bus)
        })
        .await
        .map_err(|e| BusError::TaskFailed(e.to_string()))?
    }

    /// See [`Bus::scan`]
    pub async fn scan(&self, min: u32, max: u32) -> Result<Vec<u32>, BusError> {
        self.run(move |bus| bus.scan(min, max)).await
    }

    /// See [`Bus::long_ack`]
    pub async fn long_ack(&self, serial: u32) -> Result<bool, BusError> {
        self.run(move |bus| bus.long_ack(serial)).await
    }

    /// See [`Bus::get_parameter`]
    pub async fn get_parameter(&self, serial: u32, table: String, param: String) -> Result<Value, BusError> {
        self.run(move |bus| bus.get_parameter(serial, table.as_str(), param.as_str()))
            .await
    }

    /// See [`Bus::set_parameter`]
    pub async fn set_parameter(
        &self,
        serial: u32,
        table: String,
        param: String,
        value: Value,
    ) -> Result<bool, BusError> {
        self.run(move |bus| bus.set_parameter(serial, table.as_str(), param.as_str(), value))
            .await
    }

    /// See [`Bus::get_table`]
    pub async fn get_table(&self, serial: u32, table: String) -> Result<Vec<(String, Value)>, BusError> {
        self.run(move |bus| bus.get_table(serial, table.as_str())).await
    }

    /// See [`Bus::tdr_scan`]
    pub async fn tdr_scan(&self, serial: u32, params: TdrScanParams) -> Result<Vec<TdrPoint>, BusError> {
        self.run(move |bus| bus.tdr_scan(serial, params)).await
    }

    /// See [`Bus::set_measure_mode`]
    pub async fn set_measure_mode(&self, serial: u32, mode: MeasureMode) -> Result<(), BusError> {
        self.run(move |bus| bus.set_measure_mode(serial, mode)).await
    }

    /// See [`Bus::sync_baudrate`]
    pub async fn sync_baudrate(&self, target: u32) -> Result<(), BusError> {
        self.run(move |bus| bus.sync_baudrate(target)).await
    }

    /// See [`Bus::close`]
    pub async fn close(&self) -> Result<(), BusError> {
        self.run(|bus| bus.close()).await
    }
}
