use std::str::FromStr;

use chrono::{DateTime, Utc};
use liveops_storage::{
    CreateCredentialParams, CreatePrincipalParams, Credential, CredentialId, CredentialStore,
    EventId, EventParams, EventStore, LiveEvent, Principal, PrincipalId, Role, StoreError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type PrincipalRow = (String, String, String, i64);
type CredentialRow = (String, String, String, i64, i64, i64);
type EventRow = (String, String, Option<String>, i64, i64, Option<String>);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        // A single connection that never idles out: the database lives and dies with it.
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options.foreign_keys(true))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::migrate(pool).await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map constraint violations onto the storage taxonomy.
fn write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => backend(e),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_micros(v: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(v)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {v}")))
}

fn principal_from_row((id, name, role, created_at): PrincipalRow) -> Result<Principal, StoreError> {
    Ok(Principal {
        id: PrincipalId(parse_uuid(&id)?),
        name,
        role: Role::from_str(&role).map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: from_micros(created_at)?,
    })
}

fn credential_from_row(
    (id, principal_id, token, created_at, expires_at, last_used_at): CredentialRow,
) -> Result<Credential, StoreError> {
    Ok(Credential {
        id: CredentialId(parse_uuid(&id)?),
        principal_id: PrincipalId(parse_uuid(&principal_id)?),
        token,
        created_at: from_micros(created_at)?,
        expires_at: from_micros(expires_at)?,
        last_used_at: from_micros(last_used_at)?,
    })
}

fn event_from_row(
    (id, title, description, start_time, end_time, rewards): EventRow,
) -> Result<LiveEvent, StoreError> {
    Ok(LiveEvent {
        id: EventId(parse_uuid(&id)?),
        title,
        description,
        start_time: from_micros(start_time)?,
        end_time: from_micros(end_time)?,
        rewards,
    })
}

#[async_trait::async_trait]
impl CredentialStore for SqliteStore {
    // ───────────────────────────── Principals ─────────────────────────────

    async fn create_principal(
        &self,
        params: &CreatePrincipalParams,
    ) -> Result<Principal, StoreError> {
        let principal = Principal {
            id: PrincipalId(Uuid::now_v7()),
            name: params.name.clone(),
            role: params.role,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO principals(id,name,role,created_at) VALUES(?,?,?,?)")
            .bind(principal.id.0.to_string())
            .bind(&principal.name)
            .bind(principal.role.as_str())
            .bind(to_micros(principal.created_at))
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        // Round-trip through the stored precision.
        Ok(Principal {
            created_at: from_micros(to_micros(principal.created_at))?,
            ..principal
        })
    }

    async fn get_principal(&self, principal_id: &PrincipalId) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id,name,role,created_at FROM principals WHERE id=?",
        )
        .bind(principal_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(principal_from_row)
            .unwrap_or(Err(StoreError::NotFound))
    }

    async fn get_principal_by_name(&self, name: &str) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id,name,role,created_at FROM principals WHERE name=?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(principal_from_row)
            .unwrap_or(Err(StoreError::NotFound))
    }

    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError> {
        let rows = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id,name,role,created_at FROM principals ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(principal_from_row).collect()
    }

    async fn delete_principal(&self, principal_id: &PrincipalId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM principals WHERE id=?")
            .bind(principal_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ───────────────────────────── Credentials ────────────────────────────

    async fn create_credential(
        &self,
        params: &CreateCredentialParams,
    ) -> Result<Credential, StoreError> {
        let id = CredentialId(Uuid::now_v7());
        sqlx::query(
            "INSERT INTO credentials(id,principal_id,token,created_at,expires_at,last_used_at)
             VALUES(?,?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(params.principal_id.0.to_string())
        .bind(&params.token)
        .bind(to_micros(params.created_at))
        .bind(to_micros(params.expires_at))
        .bind(to_micros(params.created_at))
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(Credential {
            id,
            principal_id: params.principal_id,
            token: params.token.clone(),
            created_at: from_micros(to_micros(params.created_at))?,
            expires_at: from_micros(to_micros(params.expires_at))?,
            last_used_at: from_micros(to_micros(params.created_at))?,
        })
    }

    async fn get_credential_by_token(&self, token: &str) -> Result<Credential, StoreError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id,principal_id,token,created_at,expires_at,last_used_at
               FROM credentials WHERE token=?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(credential_from_row)
            .unwrap_or(Err(StoreError::NotFound))
    }

    async fn touch_credential(
        &self,
        credential_id: &CredentialId,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE credentials SET last_used_at=? WHERE id=?")
            .bind(to_micros(used_at))
            .bind(credential_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_credential(&self, credential_id: &CredentialId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM credentials WHERE id=?")
            .bind(credential_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_credentials(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Vec<Credential>, StoreError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT id,principal_id,token,created_at,expires_at,last_used_at
               FROM credentials
              WHERE principal_id=?
              ORDER BY created_at DESC, id DESC",
        )
        .bind(principal_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(credential_from_row).collect()
    }
}

#[async_trait::async_trait]
impl EventStore for SqliteStore {
    async fn create_event(&self, params: &EventParams) -> Result<LiveEvent, StoreError> {
        let id = EventId(Uuid::now_v7());
        let now = to_micros(Utc::now());
        sqlx::query(
            "INSERT INTO events(id,title,description,start_time,end_time,rewards,created_at,updated_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(&params.title)
        .bind(&params.description)
        .bind(to_micros(params.start_time))
        .bind(to_micros(params.end_time))
        .bind(&params.rewards)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_event(&id).await
    }

    async fn get_event(&self, event_id: &EventId) -> Result<LiveEvent, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id,title,description,start_time,end_time,rewards FROM events WHERE id=?",
        )
        .bind(event_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(event_from_row).unwrap_or(Err(StoreError::NotFound))
    }

    async fn update_event(
        &self,
        event_id: &EventId,
        params: &EventParams,
    ) -> Result<LiveEvent, StoreError> {
        let result = sqlx::query(
            "UPDATE events
                SET title=?, description=?, start_time=?, end_time=?, rewards=?, updated_at=?
              WHERE id=?",
        )
        .bind(&params.title)
        .bind(&params.description)
        .bind(to_micros(params.start_time))
        .bind(to_micros(params.end_time))
        .bind(&params.rewards)
        .bind(to_micros(Utc::now()))
        .bind(event_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_event(event_id).await
    }

    async fn delete_event(&self, event_id: &EventId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM events WHERE id=?")
            .bind(event_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_events(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<LiveEvent>, StoreError> {
        let rows = match active_at {
            Some(now) => {
                let now = to_micros(now);
                sqlx::query_as::<_, EventRow>(
                    "SELECT id,title,description,start_time,end_time,rewards
                       FROM events
                      WHERE start_time <= ? AND end_time > ?
                      ORDER BY start_time",
                )
                .bind(now)
                .bind(now)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, EventRow>(
                    "SELECT id,title,description,start_time,end_time,rewards
                       FROM events
                      ORDER BY start_time",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(backend)?;

        rows.into_iter().map(event_from_row).collect()
    }
}
