// Durable repository - append-only JSON-lines journal replayed into memory on open
use crate::application::repository::{FleetDirectory, TripRepository, VehicleStateStore};
use crate::domain::error::{CoreError, CoreResult};
use crate::domain::telemetry::{
    DiagnosticSample, LocationSample, StoredDiagnostic, StoredLocation,
};
use crate::domain::trip::{RouteStep, TripSession};
use crate::domain::vehicle::{Driver, NewDriver, NewVehicle, Vehicle, VehicleUpdate};
use crate::infrastructure::memory_repository::MemoryIndex;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

/// One line of the journal. Vehicles and drivers are stored whole on every
/// change. Trips are stored whole when they start or complete; a sample that
/// extends a trip carries only the step it added, so the journal grows
/// linearly with the route.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
enum JournalEntry {
    Location {
        location: StoredLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<RouteStep>,
    },
    Diagnostic(StoredDiagnostic),
    Trip(TripSession),
    Vehicle(Vehicle),
    Driver(Driver),
}

impl JournalEntry {
    fn apply(self, index: &mut MemoryIndex) -> Result<()> {
        match self {
            JournalEntry::Location { location, step } => {
                if let (Some(trip_id), Some(step)) = (location.trip_id, step) {
                    anyhow::ensure!(
                        index.advance_trip(trip_id, &step),
                        "location {} extends unknown or closed trip {}",
                        location.id,
                        trip_id
                    );
                }
                index.put_location(location);
            }
            JournalEntry::Diagnostic(s) => index.put_diagnostic(s),
            JournalEntry::Trip(t) => index.put_trip(t),
            JournalEntry::Vehicle(v) => index.put_vehicle(v),
            JournalEntry::Driver(d) => index.put_driver(d),
        }
        Ok(())
    }
}

#[derive(Default)]
struct Replay {
    index: MemoryIndex,
    /// Bytes up to and including the last intact line
    valid_len: u64,
    torn: bool,
    missing_newline: bool,
}

/// The open journal file and the length of its last complete line.
struct JournalFile {
    file: File,
    len: u64,
    /// A failed append may have left bytes past `len`
    dirty: bool,
}

impl JournalFile {
    /// Append one line. A failed write is cut back to the previous line end
    /// so the next append never lands on a fragment.
    async fn append(&mut self, line: &[u8]) -> Result<()> {
        if self.dirty {
            self.file
                .set_len(self.len)
                .await
                .context("Failed to discard partial journal write")?;
            self.dirty = false;
        }

        let file = &mut self.file;
        let written = async {
            file.write_all(line).await?;
            file.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                if self.file.set_len(self.len).await.is_ok() {
                    self.dirty = false;
                }
                Err(e).context("Failed to append to journal")
            }
        }
    }
}

pub struct JournalRepository {
    path: PathBuf,
    index: RwLock<MemoryIndex>,
    /// Serializes writers so journal order matches index order
    journal: Mutex<JournalFile>,
}

impl JournalRepository {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create journal directory {}", parent.display()))?;
        }

        let replay = Self::replay(&path).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open journal {}", path.display()))?;

        if replay.torn {
            file.set_len(replay.valid_len)
                .await
                .context("Failed to truncate torn journal tail")?;
        } else if replay.missing_newline {
            file.write_all(b"\n")
                .await
                .context("Failed to terminate journal tail")?;
            file.flush().await.context("Failed to flush journal")?;
        }
        let len = file
            .metadata()
            .await
            .context("Failed to stat journal")?
            .len();

        Ok(Self {
            path,
            index: RwLock::new(replay.index),
            journal: Mutex::new(JournalFile {
                file,
                len,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the journal line by line into a fresh index.
    async fn replay(path: &Path) -> Result<Replay> {
        let mut replay = Replay::default();
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(replay),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read journal {}", path.display()));
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut offset = 0u64;
        let mut line_no = 0usize;
        let mut applied = 0usize;
        // A parse failure is only a torn tail if nothing follows it
        let mut unparsed: Option<(usize, serde_json::Error)> = None;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .with_context(|| format!("Failed to read journal {}", path.display()))?;
            if read == 0 {
                break;
            }
            line_no += 1;
            offset += read as u64;

            if let Some((n, e)) = unparsed.take() {
                return Err(e)
                    .with_context(|| format!("Corrupt journal {} at line {}", path.display(), n));
            }

            let line = buf.trim_ascii();
            if line.is_empty() {
                replay.valid_len = offset;
                replay.missing_newline = false;
                continue;
            }
            match serde_json::from_slice::<JournalEntry>(line) {
                Ok(entry) => {
                    entry.apply(&mut replay.index).with_context(|| {
                        format!("Corrupt journal {} at line {}", path.display(), line_no)
                    })?;
                    replay.valid_len = offset;
                    replay.missing_newline = buf.last() != Some(&b'\n');
                    applied += 1;
                }
                Err(e) => unparsed = Some((line_no, e)),
            }
        }

        // A torn final line is what a crash mid-append leaves behind
        if let Some((_, e)) = unparsed {
            tracing::warn!(path = %path.display(), error = %e, "dropping torn journal tail");
            replay.torn = true;
            replay.missing_newline = false;
        }

        tracing::info!(path = %path.display(), entries = applied, "journal replayed");
        Ok(replay)
    }

    /// Append and flush `entry`, then fold it into the index. Nothing is
    /// visible to readers unless the write succeeded.
    async fn commit(&self, journal: &mut JournalFile, entry: JournalEntry) -> CoreResult<()> {
        let mut line = serde_json::to_vec(&entry).context("Failed to encode journal entry")?;
        line.push(b'\n');

        journal.append(&line).await?;

        entry.apply(&mut self.write())?;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryIndex> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryIndex> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VehicleStateStore for JournalRepository {
    async fn record_location(
        &self,
        sample: LocationSample,
        trip: Option<TripSession>,
    ) -> CoreResult<StoredLocation> {
        let mut journal = self.journal.lock().await;
        let step = match &trip {
            Some(trip) => {
                self.read().check_extendable(trip)?;
                let step = trip.last_step().ok_or_else(|| {
                    CoreError::Conflict(format!("trip {} has no route to record", trip.id))
                })?;
                Some(step)
            }
            None => None,
        };

        let stored = StoredLocation::new(sample, trip.as_ref().map(|t| t.id));
        let entry = JournalEntry::Location {
            location: stored.clone(),
            step,
        };
        self.commit(&mut journal, entry).await?;
        Ok(stored)
    }

    async fn record_diagnostic(&self, sample: DiagnosticSample) -> CoreResult<StoredDiagnostic> {
        let stored = StoredDiagnostic::new(sample);
        let mut journal = self.journal.lock().await;
        self.commit(&mut journal, JournalEntry::Diagnostic(stored.clone()))
            .await?;
        Ok(stored)
    }

    async fn current_location(&self, vehicle_id: &str) -> CoreResult<Option<StoredLocation>> {
        Ok(self.read().current_location(vehicle_id))
    }

    async fn current_diagnostic(&self, vehicle_id: &str) -> CoreResult<Option<StoredDiagnostic>> {
        Ok(self.read().current_diagnostic(vehicle_id))
    }

    async fn all_current_locations(&self) -> CoreResult<Vec<StoredLocation>> {
        Ok(self.read().all_current_locations())
    }

    async fn history_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<StoredLocation>> {
        Ok(self.read().history_for_trip(trip_id))
    }
}

#[async_trait]
impl TripRepository for JournalRepository {
    async fn insert_trip(&self, trip: TripSession) -> CoreResult<TripSession> {
        let mut journal = self.journal.lock().await;
        if self.read().has_trip(trip.id) {
            return Err(CoreError::Conflict(format!("trip {} already exists", trip.id)));
        }
        self.commit(&mut journal, JournalEntry::Trip(trip.clone()))
            .await?;
        Ok(trip)
    }

    async fn save_trip(&self, trip: TripSession) -> CoreResult<TripSession> {
        let mut journal = self.journal.lock().await;
        if !self.read().has_trip(trip.id) {
            return Err(CoreError::not_found("trip", trip.id.to_string()));
        }
        self.commit(&mut journal, JournalEntry::Trip(trip.clone()))
            .await?;
        Ok(trip)
    }

    async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Option<TripSession>> {
        Ok(self.read().trip(trip_id))
    }

    async fn active_trip_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Option<TripSession>> {
        Ok(self.read().active_trip_for_vehicle(vehicle_id))
    }

    async fn trips_for_vehicle(&self, vehicle_id: &str) -> CoreResult<Vec<TripSession>> {
        Ok(self.read().trips_for_vehicle(vehicle_id))
    }
}

#[async_trait]
impl FleetDirectory for JournalRepository {
    async fn get_vehicles(&self) -> CoreResult<Vec<Vehicle>> {
        Ok(self.read().vehicles())
    }

    async fn get_vehicle(&self, id: &str) -> CoreResult<Option<Vehicle>> {
        Ok(self.read().vehicle(id))
    }

    async fn find_vehicle_by_plate(&self, plate: &str) -> CoreResult<Option<Vehicle>> {
        Ok(self.read().vehicle_by_plate(plate))
    }

    async fn create_vehicle(&self, fields: NewVehicle) -> CoreResult<Vehicle> {
        let vehicle = Vehicle::from_new(fields);
        let mut journal = self.journal.lock().await;
        self.commit(&mut journal, JournalEntry::Vehicle(vehicle.clone()))
            .await?;
        Ok(vehicle)
    }

    async fn update_vehicle(
        &self,
        id: &str,
        update: VehicleUpdate,
    ) -> CoreResult<Option<Vehicle>> {
        let mut journal = self.journal.lock().await;
        let existing = self.read().vehicle(id);
        let Some(mut vehicle) = existing else {
            return Ok(None);
        };
        vehicle.apply(update);
        self.commit(&mut journal, JournalEntry::Vehicle(vehicle.clone()))
            .await?;
        Ok(Some(vehicle))
    }

    async fn get_driver(&self, id: &str) -> CoreResult<Option<Driver>> {
        Ok(self.read().driver(id))
    }

    async fn create_driver(&self, fields: NewDriver) -> CoreResult<Driver> {
        let driver = Driver::from_new(fields);
        let mut journal = self.journal.lock().await;
        self.commit(&mut journal, JournalEntry::Driver(driver.clone()))
            .await?;
        Ok(driver)
    }
}
