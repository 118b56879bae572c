use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::service::demo_catalog;
use crate::models::{
    Appointment, AssignmentMode, BookingStatus, Business, BusinessSchedule, CalendarSettings,
    DayHours, Service, StaffOption,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, business_id, ref_number, customer_name, customer_email, customer_phone, service_id, staff_id, title, start_time, end_time, status, notes, idempotency_key, created_at";

// ── Businesses ──

pub fn create_business(conn: &Connection, subdomain: &str, name: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO businesses (subdomain, name) VALUES (?1, ?2)",
        params![subdomain, name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_business_by_subdomain(
    conn: &Connection,
    subdomain: &str,
) -> anyhow::Result<Option<Business>> {
    let result = conn.query_row(
        "SELECT id, subdomain, name FROM businesses WHERE subdomain = ?1",
        params![subdomain],
        parse_business_row,
    );

    match result {
        Ok(business) => Ok(Some(business)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_business(conn: &Connection, id: i64) -> anyhow::Result<Option<Business>> {
    let result = conn.query_row(
        "SELECT id, subdomain, name FROM businesses WHERE id = ?1",
        params![id],
        parse_business_row,
    );

    match result {
        Ok(business) => Ok(Some(business)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_business_row(row: &rusqlite::Row) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(0)?,
        subdomain: row.get(1)?,
        name: row.get(2)?,
    })
}

// ── Services ──

pub fn insert_service(conn: &Connection, business_id: i64, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, business_id, name, description, price_cents, duration_minutes, category, buffer_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            service.id,
            business_id,
            service.name,
            service.description,
            service.price_cents,
            service.duration_minutes,
            service.category,
            service.buffer_minutes,
        ],
    )?;
    Ok(())
}

pub fn list_services(conn: &Connection, business_id: i64) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, price_cents, duration_minutes, category, buffer_minutes
         FROM services WHERE business_id = ?1 AND is_active = 1 ORDER BY category ASC, name ASC",
    )?;

    let rows = stmt.query_map(params![business_id], parse_service_row)?;

    let mut services = vec![];
    for row in rows {
        services.push(row?);
    }
    Ok(services)
}

pub fn get_service(
    conn: &Connection,
    business_id: i64,
    service_id: &str,
) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, description, price_cents, duration_minutes, category, buffer_minutes
         FROM services WHERE business_id = ?1 AND id = ?2 AND is_active = 1",
        params![business_id, service_id],
        parse_service_row,
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_service_row(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
        duration_minutes: row.get(4)?,
        category: row.get(5)?,
        buffer_minutes: row.get(6)?,
    })
}

// ── Calendar Settings ──

/// Settings of a business, or the defaults when it never configured any.
pub fn get_calendar_settings(
    conn: &Connection,
    business_id: i64,
) -> anyhow::Result<CalendarSettings> {
    let result = conn.query_row(
        "SELECT business_hours, slot_duration_minutes, buffer_minutes, assignment_mode, last_assigned_index
         FROM calendar_settings WHERE business_id = ?1",
        params![business_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    );

    match result {
        Ok((hours_json, slot_duration_minutes, buffer_minutes, mode, last_assigned_index)) => {
            let schedule = BusinessSchedule::from_json(&hours_json).unwrap_or_else(|e| {
                tracing::warn!(business_id, error = %e, "invalid stored business hours, treating as unconfigured");
                BusinessSchedule::default()
            });
            Ok(CalendarSettings {
                schedule,
                slot_duration_minutes,
                buffer_minutes,
                assignment_mode: AssignmentMode::parse(&mode),
                last_assigned_index,
            })
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(CalendarSettings::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_calendar_settings(
    conn: &Connection,
    business_id: i64,
    settings: &CalendarSettings,
) -> anyhow::Result<()> {
    let hours_json = serde_json::to_string(&settings.schedule)?;
    conn.execute(
        "INSERT INTO calendar_settings (business_id, business_hours, slot_duration_minutes, buffer_minutes, assignment_mode, last_assigned_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(business_id) DO UPDATE SET
           business_hours = excluded.business_hours,
           slot_duration_minutes = excluded.slot_duration_minutes,
           buffer_minutes = excluded.buffer_minutes,
           assignment_mode = excluded.assignment_mode,
           last_assigned_index = excluded.last_assigned_index",
        params![
            business_id,
            hours_json,
            settings.slot_duration_minutes,
            settings.buffer_minutes,
            settings.assignment_mode.as_str(),
            settings.last_assigned_index,
        ],
    )?;
    Ok(())
}

pub fn set_last_assigned_index(conn: &Connection, business_id: i64, index: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE calendar_settings SET last_assigned_index = ?1 WHERE business_id = ?2",
        params![index, business_id],
    )?;
    Ok(())
}

// ── Staff ──

pub fn insert_staff(
    conn: &Connection,
    business_id: i64,
    staff: &StaffOption,
    sort_order: i64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff (id, business_id, name, sort_order) VALUES (?1, ?2, ?3, ?4)",
        params![staff.id, business_id, staff.name, sort_order],
    )?;
    Ok(())
}

/// Active staff in rotation order.
pub fn list_staff(conn: &Connection, business_id: i64) -> anyhow::Result<Vec<StaffOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, name FROM staff WHERE business_id = ?1 AND is_active = 1 ORDER BY sort_order ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![business_id], |row| {
        Ok(StaffOption {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut staff = vec![];
    for row in rows {
        staff.push(row?);
    }
    Ok(staff)
}

// ── Appointments ──

pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO appointments ({APPOINTMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            appointment.id,
            appointment.business_id,
            appointment.ref_number,
            appointment.customer_name,
            appointment.customer_email,
            appointment.customer_phone,
            appointment.service_id,
            appointment.staff_id,
            appointment.title,
            appointment.start_time.format(TIMESTAMP_FORMAT).to_string(),
            appointment.end_time.format(TIMESTAMP_FORMAT).to_string(),
            appointment.status.as_str(),
            appointment.notes,
            appointment.idempotency_key,
            appointment.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

/// Non-cancelled appointments of a business that overlap `[start, end)`.
pub fn get_appointments_in_range(
    conn: &Connection,
    business_id: i64,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let start_str = start.format(TIMESTAMP_FORMAT).to_string();
    let end_str = end.format(TIMESTAMP_FORMAT).to_string();

    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE business_id = ?1 AND status != 'cancelled' AND start_time < ?3 AND end_time > ?2
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![business_id, start_str, end_str], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_appointment_by_ref(
    conn: &Connection,
    ref_number: &str,
) -> anyhow::Result<Option<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE ref_number = ?1"
    ))?;

    let mut rows = stmt.query_map(params![ref_number], |row| Ok(parse_appointment_row(row)))?;

    match rows.next() {
        Some(row) => Ok(Some(row??)),
        None => Ok(None),
    }
}

pub fn find_by_idempotency_key(
    conn: &Connection,
    business_id: i64,
    key: &str,
) -> anyhow::Result<Option<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE business_id = ?1 AND idempotency_key = ?2"
    ))?;

    let mut rows = stmt.query_map(params![business_id, key], |row| {
        Ok(parse_appointment_row(row))
    })?;

    match rows.next() {
        Some(row) => Ok(Some(row??)),
        None => Ok(None),
    }
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let start_str: String = row.get(9)?;
    let end_str: String = row.get(10)?;
    let status_str: String = row.get(11)?;
    let created_at_str: String = row.get(14)?;

    let start_time = NaiveDateTime::parse_from_str(&start_str, TIMESTAMP_FORMAT)?;
    let end_time = NaiveDateTime::parse_from_str(&end_str, TIMESTAMP_FORMAT)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id: row.get(0)?,
        business_id: row.get(1)?,
        ref_number: row.get(2)?,
        customer_name: row.get(3)?,
        customer_email: row.get(4)?,
        customer_phone: row.get(5)?,
        service_id: row.get(6)?,
        staff_id: row.get(7)?,
        title: row.get(8)?,
        start_time,
        end_time,
        status: BookingStatus::parse(&status_str),
        notes: row.get(12)?,
        idempotency_key: row.get(13)?,
        created_at,
    })
}

// ── Demo Data ──

/// Creates a demo business with the demo catalog and weekday hours unless
/// the subdomain already exists. Returns the business id.
pub fn seed_demo_business(conn: &Connection, subdomain: &str) -> anyhow::Result<i64> {
    if let Some(existing) = get_business_by_subdomain(conn, subdomain)? {
        return Ok(existing.id);
    }

    let business_id = create_business(conn, subdomain, "Demo Studio")?;
    for service in demo_catalog() {
        insert_service(conn, business_id, &service)?;
    }

    let weekday = |day: &str| DayHours {
        day: day.to_string(),
        enabled: true,
        start: "09:00".to_string(),
        end: "17:00".to_string(),
    };
    let mut days: Vec<DayHours> = ["mon", "tue", "wed", "thu", "fri"].into_iter().map(weekday).collect();
    days.push(DayHours {
        day: "sat".to_string(),
        enabled: true,
        start: "10:00".to_string(),
        end: "14:00".to_string(),
    });
    days.push(DayHours {
        day: "sun".to_string(),
        enabled: false,
        start: "00:00".to_string(),
        end: "00:00".to_string(),
    });

    save_calendar_settings(
        conn,
        business_id,
        &CalendarSettings {
            schedule: BusinessSchedule { days },
            ..CalendarSettings::default()
        },
    )?;

    for (i, (id, name)) in [("st_alex", "Alex"), ("st_robin", "Robin")].into_iter().enumerate() {
        insert_staff(
            conn,
            business_id,
            &StaffOption {
                id: format!("{subdomain}_{id}"),
                name: name.to_string(),
            },
            i as i64,
        )?;
    }

    tracing::info!(subdomain, business_id, "seeded demo business");
    Ok(business_id)
}
