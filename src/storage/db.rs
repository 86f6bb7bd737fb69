//! SQLite-backed storage
//!
//! Connection pooling and schema migration follow the same shape as the
//! rest of our services: a small r2d2 pool created at startup, with
//! `migrate_schema` bringing the schema up to date on the first connection.

use async_trait::async_trait;
use chrono::Local;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::core::error::{AppError, AppResult};
use crate::storage::directory::{
    AdminRecord, CommunicationType, ConsultationType, DateRange, Directory, Doctor, DoctorField, NewAppointment, NewCallback,
    NewDoctor, NewFeedback, PrivilegeLevel, SpecialityPrice, StatTable,
};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Timestamp format for `created_at` columns; lexicographic order matches
/// chronological order so range filters can compare strings
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations on the first connection.
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    migrate_schema(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Ensure all required tables exist
fn migrate_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            username    TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS admins (
            user_id    INTEGER PRIMARY KEY,
            full_name  TEXT NOT NULL,
            privilege  TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS specialities (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS doctors (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name      TEXT NOT NULL,
            photo          TEXT NOT NULL,
            description    TEXT NOT NULL,
            experience     INTEGER,
            science_degree TEXT,
            qual_category  TEXT
        );
        CREATE TABLE IF NOT EXISTS doctor_specialities (
            doctor_id     INTEGER NOT NULL REFERENCES doctors(id) ON DELETE CASCADE,
            speciality_id INTEGER NOT NULL REFERENCES specialities(id),
            price         INTEGER NOT NULL,
            PRIMARY KEY (doctor_id, speciality_id)
        );
        CREATE TABLE IF NOT EXISTS appointments (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id            INTEGER NOT NULL,
            username           TEXT,
            full_name          TEXT NOT NULL,
            phone              TEXT,
            consultation_type  TEXT NOT NULL,
            communication_type TEXT NOT NULL,
            request            TEXT NOT NULL,
            doctor_id          INTEGER,
            preferred_at       TEXT,
            created_at         TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS callbacks (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER NOT NULL,
            full_name  TEXT NOT NULL,
            phone      TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS feedbacks (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id    INTEGER NOT NULL,
            username   TEXT,
            full_name  TEXT NOT NULL,
            message    TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    )
}

fn now_string() -> String {
    Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string()
}

/// `Directory` implementation over the SQLite pool
pub struct SqliteDirectory {
    pool: DbPool,
}

impl SqliteDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<DbConnection> {
        self.pool.get().map_err(AppError::from)
    }

    fn speciality_id(conn: &rusqlite::Connection, title: &str) -> AppResult<Option<i64>> {
        let id = conn
            .query_row("SELECT id FROM specialities WHERE title = ?1", params![title], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    fn load_specialities(conn: &rusqlite::Connection, doctor_id: i64) -> AppResult<Vec<SpecialityPrice>> {
        let mut stmt = conn.prepare(
            "SELECT s.title, ds.price
             FROM doctor_specialities ds
             JOIN specialities s ON s.id = ds.speciality_id
             WHERE ds.doctor_id = ?1
             ORDER BY ds.rowid",
        )?;
        let rows = stmt.query_map(params![doctor_id], |row| {
            Ok(SpecialityPrice {
                title: row.get(0)?,
                price: row.get(1)?,
            })
        })?;
        let mut specialities = Vec::new();
        for row in rows {
            specialities.push(row?);
        }
        Ok(specialities)
    }

    fn load_doctor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Doctor> {
        Ok(Doctor {
            id: row.get(0)?,
            full_name: row.get(1)?,
            photo: row.get(2)?,
            description: row.get(3)?,
            experience: row.get(4)?,
            science_degree: row.get(5)?,
            qual_category: row.get(6)?,
            specialities: Vec::new(),
        })
    }
}

const DOCTOR_COLUMNS: &str = "id, full_name, photo, description, experience, science_degree, qual_category";

#[async_trait]
impl Directory for SqliteDirectory {
    async fn get_admin_ids(&self, privilege: Option<PrivilegeLevel>) -> AppResult<Vec<i64>> {
        let conn = self.conn()?;
        let mut ids = Vec::new();
        match privilege {
            Some(level) => {
                let mut stmt = conn.prepare("SELECT user_id FROM admins WHERE privilege = ?1 ORDER BY user_id")?;
                let rows = stmt.query_map(params![level.as_str()], |row| row.get(0))?;
                for row in rows {
                    ids.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT user_id FROM admins ORDER BY user_id")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                for row in rows {
                    ids.push(row?);
                }
            }
        }
        Ok(ids)
    }

    async fn get_admins(&self) -> AppResult<Vec<AdminRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT user_id, full_name, privilege FROM admins ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut admins = Vec::new();
        for row in rows {
            let (user_id, full_name, privilege) = row?;
            admins.push(AdminRecord {
                user_id,
                full_name,
                privilege: PrivilegeLevel::from_str(&privilege).unwrap_or(PrivilegeLevel::Low),
            });
        }
        Ok(admins)
    }

    async fn create_admin(&self, user_id: i64, full_name: &str, privilege: PrivilegeLevel) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO admins (user_id, full_name, privilege, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, full_name, privilege.as_str(), now_string()],
        )?;
        Ok(())
    }

    async fn delete_admin(&self, user_id: i64) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM admins WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    async fn get_specialities(&self) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT title FROM specialities ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut titles = Vec::new();
        for row in rows {
            titles.push(row?);
        }
        Ok(titles)
    }

    async fn create_speciality(&self, title: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("INSERT OR IGNORE INTO specialities (title) VALUES (?1)", params![title])?;
        Ok(())
    }

    async fn delete_speciality(&self, title: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM specialities WHERE title = ?1", params![title])?;
        Ok(())
    }

    async fn get_doctors(&self) -> AppResult<Vec<Doctor>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY id"))?;
        let rows = stmt.query_map([], Self::load_doctor_row)?;
        let mut doctors = Vec::new();
        for row in rows {
            let mut doctor = row?;
            doctor.specialities = Self::load_specialities(&conn, doctor.id)?;
            doctors.push(doctor);
        }
        Ok(doctors)
    }

    async fn get_doctor(&self, id: i64) -> AppResult<Option<Doctor>> {
        let conn = self.conn()?;
        let doctor = conn
            .query_row(
                &format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ?1"),
                params![id],
                Self::load_doctor_row,
            )
            .optional()?;
        match doctor {
            Some(mut doctor) => {
                doctor.specialities = Self::load_specialities(&conn, doctor.id)?;
                Ok(Some(doctor))
            }
            None => Ok(None),
        }
    }

    async fn get_doctors_by_speciality(&self, title: &str) -> AppResult<Vec<Doctor>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors
             WHERE id IN (
                 SELECT ds.doctor_id FROM doctor_specialities ds
                 JOIN specialities s ON s.id = ds.speciality_id
                 WHERE s.title = ?1
             )
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![title], Self::load_doctor_row)?;
        let mut doctors = Vec::new();
        for row in rows {
            let mut doctor = row?;
            doctor.specialities = Self::load_specialities(&conn, doctor.id)?;
            doctors.push(doctor);
        }
        Ok(doctors)
    }

    async fn create_doctor(&self, doctor: &NewDoctor) -> AppResult<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO doctors (full_name, photo, description, experience, science_degree, qual_category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doctor.full_name,
                doctor.photo,
                doctor.description,
                doctor.experience,
                doctor.science_degree,
                doctor.qual_category
            ],
        )?;
        let doctor_id = tx.last_insert_rowid();
        for sp in &doctor.specialities {
            tx.execute("INSERT OR IGNORE INTO specialities (title) VALUES (?1)", params![sp.title])?;
            tx.execute(
                "INSERT INTO doctor_specialities (doctor_id, speciality_id, price)
                 SELECT ?1, id, ?3 FROM specialities WHERE title = ?2",
                params![doctor_id, sp.title, sp.price],
            )?;
        }
        tx.commit()?;
        Ok(doctor_id)
    }

    async fn update_doctor_field(&self, id: i64, field: DoctorField, value: Option<&str>) -> AppResult<()> {
        let conn = self.conn()?;
        // experience is stored as an integer, everything else as text
        match field {
            DoctorField::Experience => {
                let experience: Option<i64> = value.map(|v| v.parse()).transpose().map_err(|_| {
                    AppError::Validation(format!("experience must be an integer, got {value:?}"))
                })?;
                conn.execute("UPDATE doctors SET experience = ?1 WHERE id = ?2", params![experience, id])?;
            }
            _ => {
                conn.execute(
                    &format!("UPDATE doctors SET {} = ?1 WHERE id = ?2", field.as_str()),
                    params![value, id],
                )?;
            }
        }
        Ok(())
    }

    async fn add_doctor_speciality(&self, id: i64, title: &str, price: i64) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("INSERT OR IGNORE INTO specialities (title) VALUES (?1)", params![title])?;
        conn.execute(
            "INSERT OR REPLACE INTO doctor_specialities (doctor_id, speciality_id, price)
             SELECT ?1, id, ?3 FROM specialities WHERE title = ?2",
            params![id, title, price],
        )?;
        Ok(())
    }

    async fn remove_doctor_speciality(&self, id: i64, title: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM doctor_specialities
             WHERE doctor_id = ?1
               AND speciality_id IN (SELECT id FROM specialities WHERE title = ?2)",
            params![id, title],
        )?;
        Ok(())
    }

    async fn set_doctor_price(&self, id: i64, title: &str, price: i64) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE doctor_specialities SET price = ?1
             WHERE doctor_id = ?2
               AND speciality_id IN (SELECT id FROM specialities WHERE title = ?3)",
            params![price, id, title],
        )?;
        Ok(())
    }

    async fn delete_doctor(&self, id: i64) -> AppResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM doctor_specialities WHERE doctor_id = ?1", params![id])?;
        tx.execute("DELETE FROM doctors WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: i64, username: Option<&str>) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (telegram_id, username, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, username, now_string()],
        )?;
        Ok(())
    }

    async fn create_appointment(&self, rec: &NewAppointment) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO appointments
             (user_id, username, full_name, phone, consultation_type, communication_type,
              request, doctor_id, preferred_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                rec.user_id,
                rec.username,
                rec.full_name,
                rec.phone,
                rec.consultation.as_str(),
                rec.communication.as_str(),
                rec.request,
                rec.doctor_id,
                rec.preferred_at,
                now_string()
            ],
        )?;
        Ok(())
    }

    async fn create_callback(&self, rec: &NewCallback) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO callbacks (user_id, full_name, phone, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![rec.user_id, rec.full_name, rec.phone, now_string()],
        )?;
        Ok(())
    }

    async fn create_feedback(&self, rec: &NewFeedback) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feedbacks (user_id, username, full_name, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rec.user_id, rec.username, rec.full_name, rec.message, now_string()],
        )?;
        Ok(())
    }

    async fn count_records(
        &self,
        table: StatTable,
        range: &DateRange,
        consultation: Option<ConsultationType>,
    ) -> AppResult<i64> {
        let conn = self.conn()?;
        let start = range.start.format(TIMESTAMP_FORMAT).to_string();
        let end = range.end.format(TIMESTAMP_FORMAT).to_string();
        let count = match (table, consultation) {
            (StatTable::Appointments, Some(kind)) => conn.query_row(
                "SELECT COUNT(*) FROM appointments
                 WHERE created_at >= ?1 AND created_at < ?2 AND consultation_type = ?3",
                params![start, end, kind.as_str()],
                |row| row.get(0),
            )?,
            (StatTable::Appointments, None) => conn.query_row(
                "SELECT COUNT(*) FROM appointments WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| row.get(0),
            )?,
            (StatTable::Callbacks, _) => conn.query_row(
                "SELECT COUNT(*) FROM callbacks WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| row.get(0),
            )?,
            (StatTable::Feedbacks, _) => conn.query_row(
                "SELECT COUNT(*) FROM feedbacks WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| row.get(0),
            )?,
            (StatTable::Users, _) => conn.query_row(
                "SELECT COUNT(*) FROM users WHERE created_at >= ?1 AND created_at < ?2",
                params![start, end],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn memory_directory() -> SqliteDirectory {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        migrate_schema(&pool.get().unwrap()).unwrap();
        SqliteDirectory::new(pool)
    }

    fn sample_doctor() -> NewDoctor {
        NewDoctor {
            full_name: "Иванов Иван Иванович".to_string(),
            photo: "file-1".to_string(),
            description: "Терапевт, гастроэнтеролог".to_string(),
            experience: Some(12),
            science_degree: None,
            qual_category: Some("Высшая".to_string()),
            specialities: vec![
                SpecialityPrice { title: "Терапевт".to_string(), price: 1500 },
                SpecialityPrice { title: "Гастроэнтеролог".to_string(), price: 2000 },
            ],
        }
    }

    #[tokio::test]
    async fn doctor_round_trip_keeps_speciality_pairing() {
        let dir = memory_directory();
        let id = dir.create_doctor(&sample_doctor()).await.unwrap();

        let doctor = dir.get_doctor(id).await.unwrap().unwrap();
        assert_eq!(doctor.specialities.len(), 2);
        assert_eq!(doctor.price_for("Терапевт"), Some(1500));
        assert_eq!(doctor.price_for("Гастроэнтеролог"), Some(2000));

        let titles = dir.get_specialities().await.unwrap();
        assert_eq!(titles, vec!["Терапевт", "Гастроэнтеролог"]);
    }

    #[tokio::test]
    async fn admin_ids_filter_by_privilege() {
        let dir = memory_directory();
        dir.create_admin(100, "Анна", PrivilegeLevel::High).await.unwrap();
        dir.create_admin(200, "Борис", PrivilegeLevel::Low).await.unwrap();

        assert_eq!(dir.get_admin_ids(None).await.unwrap(), vec![100, 200]);
        assert_eq!(dir.get_admin_ids(Some(PrivilegeLevel::High)).await.unwrap(), vec![100]);

        dir.delete_admin(100).await.unwrap();
        assert_eq!(dir.get_admin_ids(None).await.unwrap(), vec![200]);
    }

    #[tokio::test]
    async fn speciality_removal_and_price_update() {
        let dir = memory_directory();
        let id = dir.create_doctor(&sample_doctor()).await.unwrap();

        dir.set_doctor_price(id, "Терапевт", 1800).await.unwrap();
        dir.remove_doctor_speciality(id, "Гастроэнтеролог").await.unwrap();

        let doctor = dir.get_doctor(id).await.unwrap().unwrap();
        assert_eq!(
            doctor.specialities,
            vec![SpecialityPrice { title: "Терапевт".to_string(), price: 1800 }]
        );
    }

    #[tokio::test]
    async fn counts_respect_range_and_consultation_type() {
        let dir = memory_directory();
        dir.create_appointment(&NewAppointment {
            user_id: 1,
            username: None,
            full_name: "Клиент".to_string(),
            phone: Some("79990000000".to_string()),
            consultation: ConsultationType::Offline,
            communication: CommunicationType::Call,
            request: "Терапевт".to_string(),
            doctor_id: None,
            preferred_at: None,
        })
        .await
        .unwrap();

        let now = Local::now().naive_local();
        let range = DateRange {
            start: now - chrono::Duration::hours(1),
            end: now + chrono::Duration::hours(1),
        };
        let offline = dir
            .count_records(StatTable::Appointments, &range, Some(ConsultationType::Offline))
            .await
            .unwrap();
        let online = dir
            .count_records(StatTable::Appointments, &range, Some(ConsultationType::Online))
            .await
            .unwrap();
        assert_eq!((offline, online), (1, 0));
    }
}
