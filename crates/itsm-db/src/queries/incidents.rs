use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use super::catalog::service_from_row;
use crate::Database;
use crate::models::{IncidentChanges, IncidentRow, NewIncident, ServiceRow};

const INCIDENT_SELECT: &str = "SELECT i.id, i.title, i.description, i.status,
            i.owner_id, owner.username,
            i.responsible_user_id, responsible.username,
            i.created_at, i.updated_at
     FROM incidents i
     JOIN users owner ON owner.id = i.owner_id
     LEFT JOIN users responsible ON responsible.id = i.responsible_user_id";

/// Result of a guarded incident update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentWrite {
    Applied,
    Missing,
    /// The incident's status was not one of `allowed_from`; nothing written.
    Refused { current: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncidentCounts {
    pub total: usize,
    pub open: usize,
}

impl Database {
    // -- Incidents --

    /// Insert the incident and its service links in one transaction.
    pub fn insert_incident(&self, incident: &NewIncident<'_>, service_ids: &[String]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO incidents (id, owner_id, title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    incident.id,
                    incident.owner_id,
                    incident.title,
                    incident.description,
                    incident.status,
                    incident.created_at,
                ],
            )?;
            link_services(&tx, incident.id, service_ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_incident(&self, id: &str) -> Result<Option<IncidentRow>> {
        self.with_conn(|conn| {
            let sql = format!("{INCIDENT_SELECT} WHERE i.id = ?1");
            conn.query_row(&sql, [id], incident_from_row).optional()
        })
    }

    /// Newest first. `owner` restricts the list to one user's incidents.
    pub fn list_incidents(&self, owner: Option<&str>) -> Result<Vec<IncidentRow>> {
        self.with_conn(|conn| {
            let rows = match owner {
                Some(owner_id) => {
                    let sql = format!(
                        "{INCIDENT_SELECT} WHERE i.owner_id = ?1 ORDER BY i.created_at DESC, i.rowid DESC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([owner_id], incident_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
                None => {
                    let sql = format!("{INCIDENT_SELECT} ORDER BY i.created_at DESC, i.rowid DESC");
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([], incident_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                }
            };
            Ok(rows)
        })
    }

    pub fn count_incidents(&self, owner: Option<&str>, open_status: &str) -> Result<IncidentCounts> {
        self.with_conn(|conn| {
            let (total, open): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(status = ?2), 0)
                 FROM incidents
                 WHERE ?1 IS NULL OR owner_id = ?1",
                rusqlite::params![owner, open_status],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(IncidentCounts {
                total: total as usize,
                open: open as usize,
            })
        })
    }

    pub fn get_incident_services(&self, incident_id: &str) -> Result<Vec<ServiceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.name, s.description, s.is_business, s.is_technical,
                        s.service_line_id, s.created_at
                 FROM incident_services l
                 JOIN services s ON s.id = l.service_id
                 WHERE l.incident_id = ?1
                 ORDER BY s.name, s.id",
            )?;
            let rows = stmt
                .query_map([incident_id], service_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a staff edit. The current status is read and checked against
    /// `allowed_from` inside the same transaction as the write. The status
    /// and timestamp are always written; the responsible user only when
    /// given; the service links, when given, are deleted and reinserted
    /// wholesale.
    pub fn update_incident(&self, id: &str, changes: &IncidentChanges<'_>) -> Result<IncidentWrite> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current: Option<String> = tx
                .query_row("SELECT status FROM incidents WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            let Some(current) = current else {
                return Ok(IncidentWrite::Missing);
            };
            if !changes.allowed_from.contains(&current.as_str()) {
                return Ok(IncidentWrite::Refused { current });
            }

            tx.execute(
                "UPDATE incidents
                 SET status = ?2,
                     responsible_user_id = COALESCE(?3, responsible_user_id),
                     updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id, changes.status, changes.responsible_user_id, changes.updated_at],
            )?;

            if let Some(service_ids) = changes.service_ids {
                tx.execute("DELETE FROM incident_services WHERE incident_id = ?1", [id])?;
                link_services(&tx, id, service_ids)?;
            }

            tx.commit()?;
            Ok(IncidentWrite::Applied)
        })
    }
}

fn link_services(conn: &Connection, incident_id: &str, service_ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO incident_services (incident_id, service_id) VALUES (?1, ?2)",
    )?;
    for service_id in service_ids {
        stmt.execute((incident_id, service_id))?;
    }
    Ok(())
}

fn incident_from_row(row: &Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok(IncidentRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        owner_id: row.get(4)?,
        owner_username: row.get(5)?,
        responsible_user_id: row.get(6)?,
        responsible_username: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use super::IncidentWrite;
    use crate::models::{IncidentChanges, NewIncident, ServiceFields};
    use crate::queries::test_support::user;

    const T0: &str = "2024-01-01T00:00:00.000000Z";
    const T1: &str = "2024-01-01T00:00:01.000000Z";
    const ANY: &[&str] = &["Open", "In Progress", "Resolved", "Closed"];
    // Statuses from which "Resolved" may be reached.
    const TO_RESOLVED: &[&str] = &["Open", "In Progress", "Resolved"];

    fn service(db: &Database, id: &str) {
        let fields = ServiceFields {
            name: id,
            description: "",
            is_business: true,
            is_technical: false,
            service_line_id: None,
        };
        db.insert_service(id, &fields, T0).unwrap();
    }

    fn incident(db: &Database, id: &str, owner: &str, created_at: &str, services: &[&str]) {
        let links: Vec<String> = services.iter().map(|s| s.to_string()).collect();
        db.insert_incident(
            &NewIncident {
                id,
                owner_id: owner,
                title: id,
                description: "",
                status: "Open",
                created_at,
            },
            &links,
        )
        .unwrap();
    }

    fn linked(db: &Database, id: &str) -> Vec<String> {
        db.get_incident_services(id)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect()
    }

    #[test]
    fn insert_joins_owner_name_and_links() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));
        service(&db, "A");
        service(&db, "B");

        incident(&db, "i1", &owner, T0, &["A", "B", "A"]);

        let row = db.get_incident("i1").unwrap().unwrap();
        assert_eq!(row.owner_username, "alice");
        assert_eq!(row.status, "Open");
        assert!(row.responsible_user_id.is_none());
        assert_eq!(row.created_at, row.updated_at);
        assert_eq!(linked(&db, "i1"), vec!["A", "B"]);
    }

    #[test]
    fn failed_link_rolls_back_incident() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));

        let result = db.insert_incident(
            &NewIncident {
                id: "i1",
                owner_id: &owner,
                title: "t",
                description: "",
                status: "Open",
                created_at: T0,
            },
            &["ghost".to_string()],
        );
        assert!(result.is_err());
        assert!(db.get_incident("i1").unwrap().is_none());
    }

    #[test]
    fn list_scopes_by_owner_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice", (false, false, false));
        let bob = user(&db, "bob", (false, false, false));
        incident(&db, "a-old", &alice, T0, &[]);
        incident(&db, "b", &bob, T0, &[]);
        incident(&db, "a-new", &alice, T1, &[]);

        let ids = |rows: Vec<crate::models::IncidentRow>| {
            rows.into_iter().map(|r| r.id).collect::<Vec<_>>()
        };
        assert_eq!(ids(db.list_incidents(Some(alice.as_str())).unwrap()), vec!["a-new", "a-old"]);
        assert_eq!(db.list_incidents(None).unwrap().len(), 3);

        let counts = db.count_incidents(Some(alice.as_str()), "Open").unwrap();
        assert_eq!((counts.total, counts.open), (2, 2));
        let counts = db.count_incidents(None, "Resolved").unwrap();
        assert_eq!((counts.total, counts.open), (3, 0));
    }

    #[test]
    fn update_replaces_links_wholesale() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));
        let tech = user(&db, "tech", (false, true, false));
        for s in ["A", "B", "C"] {
            service(&db, s);
        }
        incident(&db, "i1", &owner, T0, &["A", "B"]);

        let replacement = vec!["C".to_string()];
        let updated = db
            .update_incident(
                "i1",
                &IncidentChanges {
                    status: "In Progress",
                    allowed_from: ANY,
                    responsible_user_id: Some(tech.as_str()),
                    service_ids: Some(&replacement),
                    updated_at: T1,
                },
            )
            .unwrap();
        assert_eq!(updated, IncidentWrite::Applied);

        let row = db.get_incident("i1").unwrap().unwrap();
        assert_eq!(row.status, "In Progress");
        assert_eq!(row.responsible_username.as_deref(), Some("tech"));
        assert_eq!(row.updated_at, T1);
        assert_eq!(linked(&db, "i1"), vec!["C"]);
    }

    #[test]
    fn update_without_optional_fields_keeps_them() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));
        let tech = user(&db, "tech", (false, true, false));
        service(&db, "A");
        incident(&db, "i1", &owner, T0, &["A"]);

        let assign = IncidentChanges {
            status: "Open",
            allowed_from: ANY,
            responsible_user_id: Some(tech.as_str()),
            service_ids: None,
            updated_at: T0,
        };
        db.update_incident("i1", &assign).unwrap();

        let keep = IncidentChanges {
            status: "Resolved",
            allowed_from: ANY,
            responsible_user_id: None,
            service_ids: None,
            updated_at: T1,
        };
        db.update_incident("i1", &keep).unwrap();

        let row = db.get_incident("i1").unwrap().unwrap();
        assert_eq!(row.status, "Resolved");
        assert_eq!(row.responsible_user_id.as_deref(), Some(tech.as_str()));
        assert_eq!(linked(&db, "i1"), vec!["A"]);

        assert_eq!(db.update_incident("missing", &keep).unwrap(), IncidentWrite::Missing);
    }

    #[test]
    fn update_is_refused_from_a_disallowed_status() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));
        let tech = user(&db, "tech", (false, true, false));
        service(&db, "A");
        incident(&db, "i1", &owner, T0, &["A"]);

        let close = IncidentChanges {
            status: "Closed",
            allowed_from: ANY,
            responsible_user_id: None,
            service_ids: None,
            updated_at: T0,
        };
        assert_eq!(db.update_incident("i1", &close).unwrap(), IncidentWrite::Applied);

        let no_links: Vec<String> = vec![];
        let resolve = IncidentChanges {
            status: "Resolved",
            allowed_from: TO_RESOLVED,
            responsible_user_id: Some(tech.as_str()),
            service_ids: Some(&no_links),
            updated_at: T1,
        };
        assert_eq!(
            db.update_incident("i1", &resolve).unwrap(),
            IncidentWrite::Refused {
                current: "Closed".to_string()
            }
        );

        let row = db.get_incident("i1").unwrap().unwrap();
        assert_eq!(row.status, "Closed");
        assert_eq!(row.updated_at, T0);
        assert!(row.responsible_user_id.is_none());
        assert_eq!(linked(&db, "i1"), vec!["A"]);
    }

    #[test]
    fn racing_updates_respect_the_status_guard() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        let db = Arc::new(Database::open_in_memory().unwrap());
        let owner = user(&db, "alice", (false, false, false));

        for n in 0..200 {
            let id = format!("i{n}");
            incident(&db, &id, &owner, T0, &[]);

            let barrier = Arc::new(Barrier::new(2));
            let racers: Vec<_> = [("Closed", ANY), ("Resolved", TO_RESOLVED)]
                .into_iter()
                .map(|(status, allowed_from)| {
                    let (db, barrier, id) = (db.clone(), barrier.clone(), id.clone());
                    thread::spawn(move || {
                        barrier.wait();
                        let changes = IncidentChanges {
                            status,
                            allowed_from,
                            responsible_user_id: None,
                            service_ids: None,
                            updated_at: T1,
                        };
                        db.update_incident(&id, &changes).unwrap()
                    })
                })
                .collect();
            for racer in racers {
                racer.join().unwrap();
            }

            // Whatever the interleaving, Closed never moves on to Resolved.
            assert_eq!(db.get_incident(&id).unwrap().unwrap().status, "Closed");
        }
    }

    #[test]
    fn deleting_a_service_drops_its_links() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "alice", (false, false, false));
        service(&db, "A");
        incident(&db, "i1", &owner, T0, &["A"]);

        db.delete_service("A").unwrap();
        assert!(linked(&db, "i1").is_empty());
    }
}
