use chrono::{DateTime, Local, SecondsFormat, Utc};

pub fn local_date_yyyy_mm_dd() -> String {
    let now: DateTime<Local> = Local::now();
    now.format("%Y-%m-%d").to_string()
}

pub fn rfc3339_micros(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
