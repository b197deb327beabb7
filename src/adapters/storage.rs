use crate::domain::model::{normalize_radius, RecyclingZone};
use crate::domain::ports::{Storage, XpLedger, ZoneRegistry};
use crate::utils::error::{Result, XpError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fixed zone list, e.g. the demo zones or a list loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticZoneRegistry {
    zones: Vec<RecyclingZone>,
}

impl StaticZoneRegistry {
    pub fn new(zones: Vec<RecyclingZone>) -> Self {
        Self { zones }
    }
}

#[async_trait]
impl ZoneRegistry for StaticZoneRegistry {
    async fn fetch_zones(&self) -> Result<Vec<RecyclingZone>> {
        Ok(self.zones.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ZoneRow {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    radius_meters: Option<f64>,
    active: Option<bool>,
}

impl From<ZoneRow> for RecyclingZone {
    fn from(row: ZoneRow) -> Self {
        RecyclingZone {
            id: row.id,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            radius_meters: normalize_radius(row.radius_meters),
            active: row.active.unwrap_or(true),
        }
    }
}

/// Zones read from a CSV file with header
/// `id,name,latitude,longitude,radius_meters,active`. Re-read on every fetch.
pub struct CsvZoneRegistry<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> CsvZoneRegistry<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

pub fn parse_zone_csv(data: &[u8]) -> Result<Vec<RecyclingZone>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut zones = Vec::new();
    for row in reader.deserialize::<ZoneRow>() {
        zones.push(row?.into());
    }
    Ok(zones)
}

#[async_trait]
impl<S: Storage> ZoneRegistry for CsvZoneRegistry<S> {
    async fn fetch_zones(&self) -> Result<Vec<RecyclingZone>> {
        let data = self.storage.read_file(&self.path).await?;
        let zones = parse_zone_csv(&data)?;
        tracing::debug!("Read {} zone(s) from {}", zones.len(), self.path);
        Ok(zones)
    }
}

/// Process-local ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<Mutex<LedgerState>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, u64>,
    credited: HashSet<Uuid>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl XpLedger for InMemoryLedger {
    async fn credit(&self, user_id: &str, attempt_id: Uuid, points: u32) -> Result<u64> {
        let mut state = self.inner.lock().await;
        let LedgerState { balances, credited } = &mut *state;
        let balance = balances.entry(user_id.to_string()).or_insert(0);

        if credited.insert(attempt_id) {
            *balance = balance.saturating_add(u64::from(points));
        } else {
            tracing::warn!("Attempt {} already credited; ignoring", attempt_id);
        }
        Ok(*balance)
    }

    async fn balance(&self, user_id: &str) -> Result<u64> {
        let state = self.inner.lock().await;
        Ok(state.balances.get(user_id).copied().unwrap_or(0))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    balances: BTreeMap<String, u64>,
    #[serde(default)]
    credited_attempts: BTreeSet<Uuid>,
}

/// Ledger persisted as one JSON document through a `Storage` backend.
pub struct FileLedger<S: Storage> {
    storage: S,
    path: String,
    lock: Mutex<()>,
}

impl<S: Storage> FileLedger<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<LedgerFile> {
        if !self.storage.exists(&self.path).await {
            return Ok(LedgerFile::default());
        }
        let data = self.storage.read_file(&self.path).await?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(LedgerFile::default());
        }
        serde_json::from_slice(&data).map_err(|e| XpError::LedgerError {
            message: format!("{} is not a valid ledger: {}", self.path, e),
        })
    }

    async fn save(&self, ledger: &LedgerFile) -> Result<()> {
        let json_data = serde_json::to_vec_pretty(ledger)?;
        self.storage.write_file(&self.path, &json_data).await
    }
}

#[async_trait]
impl<S: Storage> XpLedger for FileLedger<S> {
    async fn credit(&self, user_id: &str, attempt_id: Uuid, points: u32) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut ledger = self.load().await?;

        if !ledger.credited_attempts.insert(attempt_id) {
            tracing::warn!("Attempt {} already credited; ignoring", attempt_id);
            return Ok(ledger.balances.get(user_id).copied().unwrap_or(0));
        }

        let balance = ledger.balances.entry(user_id.to_string()).or_insert(0);
        *balance = balance.saturating_add(u64::from(points));
        let balance = *balance;

        self.save(&ledger).await?;
        tracing::debug!("Ledger {} updated: {} -> {}", self.path, user_id, balance);
        Ok(balance)
    }

    async fn balance(&self, user_id: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let ledger = self.load().await?;
        Ok(ledger.balances.get(user_id).copied().unwrap_or(0))
    }
}
