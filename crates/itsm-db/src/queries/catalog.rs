use anyhow::Result;
use rusqlite::Row;

use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::{ServiceFields, ServiceLineRow, ServiceRow};

pub(crate) const SERVICE_COLUMNS: &str =
    "id, name, description, is_business, is_technical, service_line_id, created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFilter {
    All,
    Business,
    Technical,
}

impl Database {
    // -- Service lines --

    pub fn insert_service_line(
        &self,
        id: &str,
        name: &str,
        description: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO service_lines (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, name, description, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_service_line(&self, id: &str) -> Result<Option<ServiceLineRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, description, created_at FROM service_lines WHERE id = ?1",
                [id],
                service_line_from_row,
            )
            .optional()
        })
    }

    pub fn list_service_lines(&self) -> Result<Vec<ServiceLineRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, description, created_at FROM service_lines ORDER BY name")?;
            let rows = stmt
                .query_map([], service_line_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_service_line(&self, id: &str, name: &str, description: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE service_lines SET name = ?2, description = ?3 WHERE id = ?1",
                (id, name, description),
            )?;
            Ok(changed > 0)
        })
    }

    /// Services of the line are kept and simply lose their grouping.
    pub fn delete_service_line(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM service_lines WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    // -- Services --

    pub fn insert_service(&self, id: &str, fields: &ServiceFields<'_>, created_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO services (id, name, description, is_business, is_technical, service_line_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id,
                    fields.name,
                    fields.description,
                    fields.is_business,
                    fields.is_technical,
                    fields.service_line_id,
                    created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_service(&self, id: &str) -> Result<Option<ServiceRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ?1");
            conn.query_row(&sql, [id], service_from_row).optional()
        })
    }

    pub fn list_services(&self, filter: ServiceFilter) -> Result<Vec<ServiceRow>> {
        let condition = match filter {
            ServiceFilter::All => "1 = 1",
            ServiceFilter::Business => "is_business = 1",
            ServiceFilter::Technical => "is_technical = 1",
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SERVICE_COLUMNS} FROM services WHERE {condition} ORDER BY name, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], service_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_service(&self, id: &str, fields: &ServiceFields<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE services
                 SET name = ?2, description = ?3, is_business = ?4, is_technical = ?5, service_line_id = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    fields.name,
                    fields.description,
                    fields.is_business,
                    fields.is_technical,
                    fields.service_line_id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Incident links to the service go with it.
    pub fn delete_service(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM services WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Ids from `ids` that have no service row.
    pub fn missing_services(&self, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id FROM services WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let found = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(ids.iter().filter(|id| !found.contains(id)).cloned().collect())
        })
    }
}

fn service_line_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceLineRow> {
    Ok(ServiceLineRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn service_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceRow> {
    Ok(ServiceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_business: row.get(3)?,
        is_technical: row.get(4)?,
        service_line_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::ServiceFilter;
    use crate::Database;
    use crate::models::ServiceFields;
    use crate::queries::test_support::now;

    fn fields<'a>(name: &'a str, business: bool, technical: bool) -> ServiceFields<'a> {
        ServiceFields {
            name,
            description: "",
            is_business: business,
            is_technical: technical,
            service_line_id: None,
        }
    }

    #[test]
    fn filter_by_kind() {
        let db = Database::open_in_memory().unwrap();
        db.insert_service("1", &fields("Payroll", true, false), &now()).unwrap();
        db.insert_service("2", &fields("DNS", false, true), &now()).unwrap();
        db.insert_service("3", &fields("Email", true, true), &now()).unwrap();

        let names = |filter| {
            db.list_services(filter)
                .unwrap()
                .into_iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(names(ServiceFilter::All), vec!["DNS", "Email", "Payroll"]);
        assert_eq!(names(ServiceFilter::Business), vec!["Email", "Payroll"]);
        assert_eq!(names(ServiceFilter::Technical), vec!["DNS", "Email"]);
    }

    #[test]
    fn deleting_a_line_ungroups_its_services() {
        let db = Database::open_in_memory().unwrap();
        db.insert_service_line("line", "Workplace", "", &now()).unwrap();

        let mut grouped = fields("Laptops", false, true);
        grouped.service_line_id = Some("line");
        db.insert_service("svc", &grouped, &now()).unwrap();

        assert!(db.delete_service_line("line").unwrap());
        let svc = db.get_service("svc").unwrap().unwrap();
        assert!(svc.service_line_id.is_none());
    }

    #[test]
    fn unknown_line_is_rejected_by_foreign_key() {
        let db = Database::open_in_memory().unwrap();
        let mut orphan = fields("Printing", true, false);
        orphan.service_line_id = Some("nope");

        let err = db.insert_service("svc", &orphan, &now()).unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn missing_services_reports_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        db.insert_service("a", &fields("A", true, false), &now()).unwrap();

        let missing = db
            .missing_services(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(missing, vec!["b".to_string()]);
        assert!(db.missing_services(&[]).unwrap().is_empty());
    }

    #[test]
    fn update_and_delete_report_existence() {
        let db = Database::open_in_memory().unwrap();
        db.insert_service("a", &fields("A", true, false), &now()).unwrap();

        assert!(db.update_service("a", &fields("A2", false, true)).unwrap());
        assert!(!db.update_service("zz", &fields("Z", false, true)).unwrap());

        let row = db.get_service("a").unwrap().unwrap();
        assert_eq!(row.name, "A2");
        assert!(row.is_technical && !row.is_business);

        assert!(db.delete_service("a").unwrap());
        assert!(!db.delete_service("a").unwrap());
    }
}
