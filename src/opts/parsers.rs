use crate::prelude::*;

pub fn non_zero_duration(value: &str) -> Result<StdDuration> {
    match humantime::parse_duration(value)? {
        duration if !duration.is_zero() => Ok(duration),
        _ => Err(anyhow!("expected a positive duration")),
    }
}
