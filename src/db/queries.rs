use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Appointment, AppointmentStatus, Client, Service, ServiceDuration, Staff};

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, date, start_time, end_time, staff_id, client_id, service_id, status, \
     price_cents, duration_minutes, series_id, notes, created_at, updated_at";

// ── Appointments ──

pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            appointment.id,
            appointment.date.format(DATE_FMT).to_string(),
            appointment.start,
            appointment.end,
            appointment.staff_id,
            appointment.client_id,
            appointment.service_id,
            appointment.status.as_str(),
            appointment.price_cents,
            appointment.duration_minutes,
            appointment.series_id,
            appointment.notes,
            appointment.created_at.format(TIMESTAMP_FMT).to_string(),
            appointment.updated_at.format(TIMESTAMP_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn update_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET date = ?1, start_time = ?2, end_time = ?3, staff_id = ?4,
           client_id = ?5, service_id = ?6, status = ?7, price_cents = ?8, duration_minutes = ?9,
           series_id = ?10, notes = ?11, updated_at = ?12
         WHERE id = ?13",
        params![
            appointment.date.format(DATE_FMT).to_string(),
            appointment.start,
            appointment.end,
            appointment.staff_id,
            appointment.client_id,
            appointment.service_id,
            appointment.status.as_str(),
            appointment.price_cents,
            appointment.duration_minutes,
            appointment.series_id,
            appointment.notes,
            appointment.updated_at.format(TIMESTAMP_FMT).to_string(),
            appointment.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            |row| Ok(parse_appointment_row(row)),
        )
        .optional()?;
    row.transpose()
}

/// Every appointment (any status) dated within `[from, to]`, optionally for one staff member.
pub fn get_appointments_in_range(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    staff_id: Option<&str>,
) -> anyhow::Result<Vec<Appointment>> {
    let from = from.format(DATE_FMT).to_string();
    let to = to.format(DATE_FMT).to_string();

    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE date >= ?1 AND date <= ?2 AND (?3 IS NULL OR staff_id = ?3)
         ORDER BY date ASC, start_time ASC"
    ))?;
    let rows = stmt.query_map(params![from, to, staff_id], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Non-cancelled appointments for one staff member on one day.
pub fn get_live_appointments_for_day(
    conn: &Connection,
    staff_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE staff_id = ?1 AND date = ?2 AND status != 'cancelled'
         ORDER BY start_time ASC"
    ))?;
    let rows = stmt.query_map(params![staff_id, date.format(DATE_FMT).to_string()], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(1)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .map_err(|e| anyhow::anyhow!("invalid appointment date {date_str}: {e}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id: row.get(0)?,
        date,
        start: row.get(2)?,
        end: row.get(3)?,
        staff_id: row.get(4)?,
        client_id: row.get(5)?,
        service_id: row.get(6)?,
        status: AppointmentStatus::parse(&status_str),
        price_cents: row.get(8)?,
        duration_minutes: row.get(9)?,
        series_id: row.get(10)?,
        notes: row.get(11)?,
        created_at,
        updated_at,
    })
}

// ── Staff ──

pub fn upsert_staff(conn: &Connection, staff: &Staff) -> anyhow::Result<()> {
    let working_hours = serde_json::to_string(&staff.working_hours)?;
    conn.execute(
        "INSERT INTO staff (id, name, working_hours) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, working_hours = excluded.working_hours",
        params![staff.id, staff.name, working_hours],
    )?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &str) -> anyhow::Result<Option<Staff>> {
    let row = conn
        .query_row(
            "SELECT id, name, working_hours FROM staff WHERE id = ?1",
            params![id],
            |row| Ok(parse_staff_row(row)),
        )
        .optional()?;
    row.transpose()
}

pub fn list_staff(conn: &Connection) -> anyhow::Result<Vec<Staff>> {
    let mut stmt = conn.prepare("SELECT id, name, working_hours FROM staff ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| Ok(parse_staff_row(row)))?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row??);
    }
    Ok(staff)
}

fn parse_staff_row(row: &rusqlite::Row) -> anyhow::Result<Staff> {
    let working_hours_json: String = row.get(2)?;
    Ok(Staff {
        id: row.get(0)?,
        name: row.get(1)?,
        working_hours: serde_json::from_str(&working_hours_json)?,
    })
}

// ── Services ──

pub fn upsert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    let duration = serde_json::to_string(&service.duration)?;
    conn.execute(
        "INSERT INTO services (id, name, duration, price_cents) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, duration = excluded.duration,
           price_cents = excluded.price_cents",
        params![service.id, service.name, duration, service.price_cents],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let row = conn
        .query_row(
            "SELECT id, name, duration, price_cents FROM services WHERE id = ?1",
            params![id],
            |row| Ok(parse_service_row(row)),
        )
        .optional()?;
    row.transpose()
}

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt =
        conn.prepare("SELECT id, name, duration, price_cents FROM services ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let duration_json: String = row.get(2)?;
    let duration: ServiceDuration = serde_json::from_str(&duration_json)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        duration,
        price_cents: row.get(3)?,
    })
}

// ── Clients ──

pub fn create_client(conn: &Connection, client: &Client) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO clients (id, name, phone) VALUES (?1, ?2, ?3)",
        params![client.id, client.name, client.phone],
    )?;
    Ok(())
}

pub fn get_client(conn: &Connection, id: &str) -> anyhow::Result<Option<Client>> {
    let client = conn
        .query_row(
            "SELECT id, name, phone FROM clients WHERE id = ?1",
            params![id],
            |row| {
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    phone: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(client)
}

pub fn list_clients(conn: &Connection) -> anyhow::Result<Vec<Client>> {
    let mut stmt = conn.prepare("SELECT id, name, phone FROM clients ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Client {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
        })
    })?;

    let mut clients = vec![];
    for row in rows {
        clients.push(row?);
    }
    Ok(clients)
}
