use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::sync::{Mutex, MutexGuard};

use crate::domain::credential::Credential;
use crate::store::repo::CredentialStore;

pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.migrate()?;
        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("credential database lock poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS credentials (
                email          TEXT PRIMARY KEY,
                token          TEXT NOT NULL,
                refresh_token  TEXT,
                token_uri      TEXT NOT NULL,
                client_id      TEXT NOT NULL,
                client_secret  TEXT NOT NULL,
                scopes         TEXT NOT NULL,
                expiry         TEXT,
                updated_at     INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl CredentialStore for SqliteRepo {
    fn load(&self, identity: &str) -> Result<Option<Credential>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT token, refresh_token, token_uri, client_id, client_secret, scopes, expiry
                FROM credentials
                WHERE email=?1
                "#,
                params![identity],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((token, refresh_token, token_uri, client_id, client_secret, scopes, expiry)) = row
        else {
            return Ok(None);
        };

        let scopes: Vec<String> = serde_json::from_str(&scopes)
            .with_context(|| format!("corrupt scope list stored for {identity}"))?;
        let expiry = expiry
            .map(|e| DateTime::parse_from_rfc3339(&e).map(|d| d.with_timezone(&Utc)))
            .transpose()
            .with_context(|| format!("corrupt expiry stored for {identity}"))?;

        Ok(Some(Credential {
            token,
            refresh_token,
            token_uri,
            client_id,
            client_secret,
            scopes,
            expiry,
        }))
    }

    fn save(&self, identity: &str, credential: &Credential) -> Result<()> {
        let scopes = serde_json::to_string(&credential.scopes)?;
        let expiry = credential.expiry.map(|e| e.to_rfc3339());
        self.conn()?.execute(
            r#"
            INSERT INTO credentials
                (email, token, refresh_token, token_uri, client_id, client_secret, scopes, expiry, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(email) DO UPDATE SET
              token=excluded.token,
              refresh_token=excluded.refresh_token,
              token_uri=excluded.token_uri,
              client_id=excluded.client_id,
              client_secret=excluded.client_secret,
              scopes=excluded.scopes,
              expiry=excluded.expiry,
              updated_at=excluded.updated_at
            "#,
            params![
                identity,
                credential.token,
                credential.refresh_token,
                credential.token_uri,
                credential.client_id,
                credential.client_secret,
                scopes,
                expiry,
                Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    fn identities(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(r#"SELECT email FROM credentials ORDER BY email"#)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(r.get(0)?);
        }
        Ok(out)
    }
}
