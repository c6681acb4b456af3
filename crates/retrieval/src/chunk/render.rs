//! Renders an incident record into the labelled text that gets chunked.

use crate::record::IncidentRecord;

/// Labelled fields in rendering order. The id line always comes first.
pub const RENDERED_FIELDS: [(&str, &str); 17] = [
    ("Type", "incident_type"),
    ("Location", "location"),
    ("Taluk", "taluk"),
    ("Received Date/Time", "received_date_time"),
    ("Incident Reported At", "incident_reported_at"),
    ("Action Taken By", "action_taken_by"),
    ("Action Date/Time", "action_date_time"),
    ("Action Remarks", "action_remarks"),
    ("Time Taken to Take Action", "time_taken_to_take_action"),
    ("Closed By", "closed_by_officer"),
    ("Closed At", "closed_at"),
    ("Closed Remarks", "closed_remarks"),
    ("Time Taken to Close", "time_taken_to_close"),
    ("Information Source", "info_source"),
    ("Information Phone", "info_phone"),
    ("Action Time (hours)", "action_time_hours"),
    ("Resolution Time (hours)", "resolution_time_hours"),
];

/// One `Label: value` line per present field; absent fields are skipped.
pub fn render_record(record: &IncidentRecord) -> String {
    let mut text = format!("Incident ID: {}\n", record.id);

    for (label, field) in RENDERED_FIELDS {
        if let Some(value) = record.text(field) {
            text.push_str(label);
            text.push_str(": ");
            text.push_str(&value);
            text.push('\n');
        }
    }

    text
}
