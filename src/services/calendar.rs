use crate::models::Appointment;

/// iCalendar document for one appointment.
pub fn generate_ics(appointment: &Appointment, business_name: &str) -> String {
    let dtstart = appointment.start_time.format("%Y%m%dT%H%M%S").to_string();
    let dtend = appointment.end_time.format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = appointment.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@bookwise", appointment.ref_number);

    let summary = escape_text(&format!("{} at {}", appointment.title, business_name));
    let description = match appointment.notes.as_deref() {
        Some(notes) => escape_text(&format!("Ref: {}\n{}", appointment.ref_number, notes)),
        None => format!("Ref: {}", appointment.ref_number),
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Bookwise//Online Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}
