// Decides whether a live event belongs in the visible buffer
use crate::domain::catalog::ResolvedSelection;
use crate::domain::measurement::LiveMeasurement;

/// Every selected name must match the event case-insensitively; unset
/// fields impose no constraint. Debug mode accepts everything.
pub fn accepts(selection: &ResolvedSelection, event: &LiveMeasurement, debug_mode: bool) -> bool {
    if debug_mode {
        return true;
    }

    field_matches(selection.work_center_name.as_deref(), &event.work_center)
        && field_matches(selection.area_name.as_deref(), &event.area)
        && field_matches(selection.sensor_code.as_deref(), &event.sensor_id)
}

fn field_matches(selected: Option<&str>, received: &str) -> bool {
    match selected {
        Some(expected) => expected.to_lowercase() == received.to_lowercase(),
        None => true,
    }
}
