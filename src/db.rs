use crate::{
    codec::diagnostic::now_millis,
    error::NetsnapError,
    store::{
        Device, DeviceId, FactKind, FactRow, InterfaceId, InterfaceRow, InterfaceState,
        NetworkStore, Snapshot, SnapshotId,
    },
};
use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator},
    sqlite::{Sqlite, SqliteConnectOptions, SqliteRow},
    Pool, Row, SqliteConnection,
};
use std::{collections::HashMap, path::Path, str::FromStr};

pub const NETSNAP_DB: &str = "netsnap.db";

/// SQLite-backed [`NetworkStore`].
#[derive(Debug, Clone)]
pub struct DbConnection(pub Pool<Sqlite>);

const UPSERT_INTERFACE: &str = "\
    INSERT INTO interfaces (device_id, snapshot_id, name, phy, protocol, admin_down, ip_address, \
        vpn_instance, in_util, out_util, in_errors, out_errors) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
    ON CONFLICT(device_id, snapshot_id, name) DO UPDATE SET \
        phy = COALESCE(excluded.phy, interfaces.phy), \
        protocol = COALESCE(excluded.protocol, interfaces.protocol), \
        admin_down = COALESCE(excluded.admin_down, interfaces.admin_down), \
        ip_address = COALESCE(excluded.ip_address, interfaces.ip_address), \
        vpn_instance = COALESCE(excluded.vpn_instance, interfaces.vpn_instance), \
        in_util = COALESCE(excluded.in_util, interfaces.in_util), \
        out_util = COALESCE(excluded.out_util, interfaces.out_util), \
        in_errors = COALESCE(excluded.in_errors, interfaces.in_errors), \
        out_errors = COALESCE(excluded.out_errors, interfaces.out_errors) \
    RETURNING id";

const UPSERT_FACT: &str = "\
    INSERT INTO facts (device_id, snapshot_id, kind, natural_key, interface_id, payload) \
    VALUES (?, ?, ?, ?, ?, ?) \
    ON CONFLICT(device_id, snapshot_id, kind, natural_key) DO UPDATE SET \
        interface_id = excluded.interface_id, \
        payload = excluded.payload";

async fn upsert_interface_on(
    conn: &mut SqliteConnection,
    device: DeviceId,
    snapshot: SnapshotId,
    name: &str,
    state: &InterfaceState,
) -> Result<InterfaceId, NetsnapError> {
    let row = sqlx::query(UPSERT_INTERFACE)
        .bind(device.0)
        .bind(snapshot.0)
        .bind(name)
        .bind(state.phy.clone())
        .bind(state.protocol.clone())
        .bind(state.admin_down)
        .bind(state.ip_address.clone())
        .bind(state.vpn_instance.clone())
        .bind(state.in_util)
        .bind(state.out_util)
        .bind(state.in_errors.map(i64::try_from).transpose()?)
        .bind(state.out_errors.map(i64::try_from).transpose()?)
        .fetch_one(&mut *conn)
        .await?;
    Ok(InterfaceId(row.try_get("id")?))
}

async fn upsert_fact_on(conn: &mut SqliteConnection, fact: &FactRow) -> Result<(), NetsnapError> {
    sqlx::query(UPSERT_FACT)
        .bind(fact.device_id.0)
        .bind(fact.snapshot_id.0)
        .bind(fact.kind.as_str())
        .bind(fact.natural_key.as_str())
        .bind(fact.interface_id.map(|id| id.0))
        .bind(fact.payload.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn device_from_row(row: &SqliteRow) -> Result<Device, NetsnapError> {
    Ok(Device {
        id: DeviceId(row.try_get("id")?),
        hostname: row.try_get("hostname")?,
        model: row.try_get("model")?,
        software_version: row.try_get("software_version")?,
    })
}

fn interface_from_row(row: &SqliteRow) -> Result<InterfaceRow, NetsnapError> {
    Ok(InterfaceRow {
        id: InterfaceId(row.try_get("id")?),
        device_id: DeviceId(row.try_get("device_id")?),
        snapshot_id: SnapshotId(row.try_get("snapshot_id")?),
        name: row.try_get("name")?,
        state: InterfaceState {
            phy: row.try_get("phy")?,
            protocol: row.try_get("protocol")?,
            admin_down: row.try_get("admin_down")?,
            ip_address: row.try_get("ip_address")?,
            vpn_instance: row.try_get("vpn_instance")?,
            in_util: row.try_get("in_util")?,
            out_util: row.try_get("out_util")?,
            in_errors: row
                .try_get::<Option<i64>, _>("in_errors")?
                .map(u64::try_from)
                .transpose()?,
            out_errors: row
                .try_get::<Option<i64>, _>("out_errors")?
                .map(u64::try_from)
                .transpose()?,
        },
    })
}

fn fact_from_row(row: &SqliteRow) -> Result<FactRow, NetsnapError> {
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;
    Ok(FactRow {
        device_id: DeviceId(row.try_get("device_id")?),
        snapshot_id: SnapshotId(row.try_get("snapshot_id")?),
        kind: FactKind::from_str(&kind)?,
        natural_key: row.try_get("natural_key")?,
        interface_id: row.try_get::<Option<i64>, _>("interface_id")?.map(InterfaceId),
        payload: serde_json::from_str(&payload)?,
    })
}

impl DbConnection {
    pub async fn open(db_path: &Path) -> Result<DbConnection, NetsnapError> {
        Ok(DbConnection(db_init(db_path).await?))
    }

    async fn fetch_device(&self, device: DeviceId) -> Result<Device, NetsnapError> {
        let row = sqlx::query("SELECT * FROM devices WHERE id = ?")
            .bind(device.0)
            .fetch_optional(&self.0)
            .await?
            .ok_or_else(|| NetsnapError::NotFound(format!("device {device}")))?;
        device_from_row(&row)
    }

    pub async fn counts(&self) -> Result<(usize, usize, usize), NetsnapError> {
        let row = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM devices) AS devices, \
                    (SELECT COUNT(*) FROM interfaces) AS interfaces, \
                    (SELECT COUNT(*) FROM facts) AS facts",
        )
        .fetch_one(&self.0)
        .await?;
        Ok((
            usize::try_from(row.try_get::<i64, _>("devices")?)?,
            usize::try_from(row.try_get::<i64, _>("interfaces")?)?,
            usize::try_from(row.try_get::<i64, _>("facts")?)?,
        ))
    }
}

impl NetworkStore for DbConnection {
    #[tracing::instrument(skip(self))]
    async fn create_snapshot(&self, label: Option<String>) -> Result<Snapshot, NetsnapError> {
        let created_at = now_millis();
        let row = sqlx::query("INSERT INTO snapshots (label, created_at) VALUES (?, ?) RETURNING id")
            .bind(label.clone())
            .bind(i64::try_from(created_at)?)
            .fetch_one(&self.0)
            .await?;
        Ok(Snapshot {
            id: SnapshotId(row.try_get("id")?),
            label,
            created_at,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn upsert_device(&self, hostname: &str) -> Result<Device, NetsnapError> {
        if hostname.trim().is_empty() {
            return Err(NetsnapError::Store("device hostname is empty".to_string()));
        }
        sqlx::query("INSERT INTO devices (hostname) VALUES (?) ON CONFLICT(hostname) DO NOTHING")
            .bind(hostname)
            .execute(&self.0)
            .await?;
        let row = sqlx::query("SELECT * FROM devices WHERE hostname = ?")
            .bind(hostname)
            .fetch_one(&self.0)
            .await?;
        device_from_row(&row)
    }

    #[tracing::instrument(skip(self))]
    async fn rename_device(&self, device: DeviceId, hostname: &str) -> Result<Device, NetsnapError> {
        if hostname.trim().is_empty() {
            return Err(NetsnapError::Store("device hostname is empty".to_string()));
        }
        let current = self.fetch_device(device).await?;
        if current.hostname == hostname {
            return Ok(current);
        }
        let owner = self.device_by_hostname(hostname).await?;
        let mut tx = self.0.begin().await?;
        let target = match owner {
            None => {
                sqlx::query("UPDATE devices SET hostname = ? WHERE id = ?")
                    .bind(hostname)
                    .bind(device.0)
                    .execute(&mut *tx)
                    .await?;
                device
            }
            Some(owner) => {
                // Re-home interfaces first so moved facts can point at the surviving rows.
                let rows = sqlx::query("SELECT * FROM interfaces WHERE device_id = ?")
                    .bind(device.0)
                    .fetch_all(&mut *tx)
                    .await?;
                let mut remap: HashMap<InterfaceId, InterfaceId> = HashMap::new();
                for row in rows.iter() {
                    let iface = interface_from_row(row)?;
                    let id = upsert_interface_on(
                        &mut tx,
                        owner.id,
                        iface.snapshot_id,
                        &iface.name,
                        &iface.state,
                    )
                    .await?;
                    remap.insert(iface.id, id);
                }
                let rows = sqlx::query("SELECT * FROM facts WHERE device_id = ?")
                    .bind(device.0)
                    .fetch_all(&mut *tx)
                    .await?;
                for row in rows.iter() {
                    let mut fact = fact_from_row(row)?;
                    fact.device_id = owner.id;
                    fact.interface_id = fact.interface_id.and_then(|id| remap.get(&id).copied());
                    upsert_fact_on(&mut tx, &fact).await?;
                }
                sqlx::query("DELETE FROM facts WHERE device_id = ?")
                    .bind(device.0)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM interfaces WHERE device_id = ?")
                    .bind(device.0)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE devices SET model = COALESCE(model, ?), \
                     software_version = COALESCE(software_version, ?) WHERE id = ?",
                )
                .bind(current.model.clone())
                .bind(current.software_version.clone())
                .bind(owner.id.0)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM devices WHERE id = ?")
                    .bind(device.0)
                    .execute(&mut *tx)
                    .await?;
                owner.id
            }
        };
        tx.commit().await?;
        self.fetch_device(target).await
    }

    #[tracing::instrument(skip(self))]
    async fn correct_device(
        &self,
        device: DeviceId,
        model: Option<String>,
        software_version: Option<String>,
    ) -> Result<Device, NetsnapError> {
        let result = sqlx::query(
            "UPDATE devices SET model = COALESCE(?, model), \
             software_version = COALESCE(?, software_version) WHERE id = ?",
        )
        .bind(model)
        .bind(software_version)
        .bind(device.0)
        .execute(&self.0)
        .await?;
        if result.rows_affected() == 0 {
            return Err(NetsnapError::NotFound(format!("device {device}")));
        }
        self.fetch_device(device).await
    }

    #[tracing::instrument(skip(self))]
    async fn device_by_hostname(&self, hostname: &str) -> Result<Option<Device>, NetsnapError> {
        sqlx::query("SELECT * FROM devices WHERE hostname = ?")
            .bind(hostname)
            .fetch_optional(&self.0)
            .await?
            .as_ref()
            .map(device_from_row)
            .transpose()
    }

    #[tracing::instrument(skip(self, state))]
    async fn upsert_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
        state: &InterfaceState,
    ) -> Result<InterfaceId, NetsnapError> {
        let mut conn = self.0.acquire().await?;
        upsert_interface_on(&mut conn, device, snapshot, name, state).await
    }

    #[tracing::instrument(skip(self))]
    async fn find_interface(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        name: &str,
    ) -> Result<Option<InterfaceId>, NetsnapError> {
        let row = sqlx::query(
            "SELECT id FROM interfaces WHERE device_id = ? AND snapshot_id = ? AND name = ?",
        )
        .bind(device.0)
        .bind(snapshot.0)
        .bind(name)
        .fetch_optional(&self.0)
        .await?;
        match row {
            Some(row) => Ok(Some(InterfaceId(row.try_get("id")?))),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, fact), fields(kind = %fact.kind, key = %fact.natural_key))]
    async fn upsert_fact(&self, fact: FactRow) -> Result<(), NetsnapError> {
        let mut conn = self.0.acquire().await?;
        upsert_fact_on(&mut conn, &fact).await
    }

    #[tracing::instrument(skip(self))]
    async fn interfaces(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
    ) -> Result<Vec<InterfaceRow>, NetsnapError> {
        sqlx::query("SELECT * FROM interfaces WHERE device_id = ? AND snapshot_id = ? ORDER BY name")
            .bind(device.0)
            .bind(snapshot.0)
            .fetch_all(&self.0)
            .await?
            .iter()
            .map(interface_from_row)
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn facts(
        &self,
        device: DeviceId,
        snapshot: SnapshotId,
        kind: Option<FactKind>,
    ) -> Result<Vec<FactRow>, NetsnapError> {
        sqlx::query(
            "SELECT * FROM facts WHERE device_id = ? AND snapshot_id = ? \
             AND (? IS NULL OR kind = ?) ORDER BY kind, natural_key",
        )
        .bind(device.0)
        .bind(snapshot.0)
        .bind(kind.map(|k| k.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.0)
        .await?
        .iter()
        .map(fact_from_row)
        .collect()
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
    pub kind: MigrationType,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            let mut migrations = Vec::new();
            for migration in self.0 {
                if matches!(migration.kind, MigrationType::ReversibleUp) {
                    migrations.push(SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        migration.kind,
                        migration.sql.into(),
                        false,
                    ));
                }
            }
            Ok(migrations)
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![
        Migration {
            version: 1,
            description: "create_snapshot_tables",
            sql: "\
            CREATE TABLE snapshots (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT, created_at INTEGER NOT NULL); \
            CREATE TABLE devices (id INTEGER PRIMARY KEY AUTOINCREMENT, hostname TEXT NOT NULL UNIQUE, model TEXT, software_version TEXT); \
            CREATE TABLE interfaces (id INTEGER PRIMARY KEY AUTOINCREMENT, device_id INTEGER NOT NULL REFERENCES devices(id), snapshot_id INTEGER NOT NULL REFERENCES snapshots(id), name TEXT NOT NULL, phy TEXT, protocol TEXT, admin_down INTEGER, ip_address TEXT, vpn_instance TEXT, in_util REAL, out_util REAL, in_errors INTEGER, out_errors INTEGER, UNIQUE(device_id, snapshot_id, name)); \
            CREATE TABLE facts (device_id INTEGER NOT NULL REFERENCES devices(id), snapshot_id INTEGER NOT NULL REFERENCES snapshots(id), kind TEXT NOT NULL, natural_key TEXT NOT NULL, interface_id INTEGER REFERENCES interfaces(id), payload TEXT NOT NULL, UNIQUE(device_id, snapshot_id, kind, natural_key));",
            kind: MigrationType::ReversibleUp,
        },
        Migration {
            version: 2,
            description: "fact_interface_scope",
            sql: "\
            CREATE TRIGGER facts_interface_scope_insert BEFORE INSERT ON facts \
            WHEN NEW.interface_id IS NOT NULL AND NOT EXISTS ( \
                SELECT 1 FROM interfaces i WHERE i.id = NEW.interface_id \
                AND i.device_id = NEW.device_id AND i.snapshot_id = NEW.snapshot_id) \
            BEGIN SELECT RAISE(ABORT, 'interface belongs to another device or snapshot'); END; \
            CREATE TRIGGER facts_interface_scope_update BEFORE UPDATE ON facts \
            WHEN NEW.interface_id IS NOT NULL AND NOT EXISTS ( \
                SELECT 1 FROM interfaces i WHERE i.id = NEW.interface_id \
                AND i.device_id = NEW.device_id AND i.snapshot_id = NEW.snapshot_id) \
            BEGIN SELECT RAISE(ABORT, 'interface belongs to another device or snapshot'); END;",
            kind: MigrationType::ReversibleUp,
        },
    ])
}

pub async fn db_init(db_path: &Path) -> Result<Pool<Sqlite>, NetsnapError> {
    let fqdb = format!("sqlite:{}", db_path.to_string_lossy());
    tracing::debug!("Initializing snapshot db from file: {:?}", fqdb);
    if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
        Sqlite::create_database(&fqdb).await?;
    }
    let options = SqliteConnectOptions::from_str(&fqdb)?
        .read_only(false)
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
        .connect_with(options)
        .await?;

    let migrator = Migrator::new(migrations()).await?;
    migrator.run(&pool).await?;

    let count_res = sqlx::query("SELECT COUNT(*) AS dcount FROM devices;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "DB Connection initialized. Known device count: {:?}",
        count_res.try_get::<i64, _>(0)?
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, DbConnection) {
        let dir = tempfile::tempdir().unwrap();
        let db = DbConnection::open(&dir.path().join(NETSNAP_DB)).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn interface_merge_keeps_known_values() {
        let (_dir, db) = open_temp().await;
        let snap = db.create_snapshot(Some("t".into())).await.unwrap();
        let dev = db.upsert_device("R1").await.unwrap();
        let state = InterfaceState {
            phy: Some("up".into()),
            in_errors: Some(7),
            ..Default::default()
        };
        let a = db
            .upsert_interface(dev.id, snap.id, "GigabitEthernet0/0/1", &state)
            .await
            .unwrap();
        let b = db
            .upsert_interface(
                dev.id,
                snap.id,
                "GigabitEthernet0/0/1",
                &InterfaceState {
                    ip_address: Some("10.0.0.1/30".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(a, b);
        let rows = db.interfaces(dev.id, snap.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state.phy.as_deref(), Some("up"));
        assert_eq!(rows[0].state.in_errors, Some(7));
        assert_eq!(rows[0].state.ip_address.as_deref(), Some("10.0.0.1/30"));
    }

    #[tokio::test]
    async fn cross_snapshot_interface_is_rejected() {
        let (_dir, db) = open_temp().await;
        let s1 = db.create_snapshot(None).await.unwrap();
        let s2 = db.create_snapshot(None).await.unwrap();
        let dev = db.upsert_device("R1").await.unwrap();
        let iface = db
            .upsert_interface(dev.id, s1.id, "Vlanif10", &InterfaceState::default())
            .await
            .unwrap();
        let fact = FactRow {
            device_id: dev.id,
            snapshot_id: s2.id,
            kind: FactKind::Arp,
            natural_key: "10.0.0.1|".into(),
            interface_id: Some(iface),
            payload: json!({"ip": "10.0.0.1"}),
        };
        assert!(matches!(
            db.upsert_fact(fact.clone()).await,
            Err(NetsnapError::Store(_))
        ));
        db.upsert_fact(FactRow {
            snapshot_id: s1.id,
            ..fact
        })
        .await
        .unwrap();
        assert_eq!(db.counts().await.unwrap(), (1, 1, 1));
    }

    #[tokio::test]
    async fn rename_merges_into_existing_device() {
        let (_dir, db) = open_temp().await;
        let snap = db.create_snapshot(None).await.unwrap();
        let existing = db.upsert_device("CORE-01").await.unwrap();
        let placeholder = db.upsert_device("site-a").await.unwrap();
        let iface = db
            .upsert_interface(placeholder.id, snap.id, "LoopBack0", &InterfaceState::default())
            .await
            .unwrap();
        db.upsert_fact(FactRow {
            device_id: placeholder.id,
            snapshot_id: snap.id,
            kind: FactKind::Route,
            natural_key: "Public|1.1.1.1/32|127.0.0.1".into(),
            interface_id: Some(iface),
            payload: json!({}),
        })
        .await
        .unwrap();

        let merged = db.rename_device(placeholder.id, "CORE-01").await.unwrap();
        assert_eq!(merged.id, existing.id);
        assert!(db.device_by_hostname("site-a").await.unwrap().is_none());
        let facts = db.facts(existing.id, snap.id, Some(FactKind::Route)).await.unwrap();
        assert_eq!(facts.len(), 1);
        let moved = db
            .find_interface(existing.id, snap.id, "LoopBack0")
            .await
            .unwrap();
        assert_eq!(facts[0].interface_id, moved);
    }
}
