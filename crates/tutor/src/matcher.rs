use crate::grid::Grid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotMatch {
    pub slot_index: usize,
    /// `server_time - slot_time`; negative is early.
    pub delta_ms: f64,
}

/// Find the slot nearest to a hit after shifting it onto the server clock.
///
/// Ties resolve to the lower index. Hits far outside the grid match the
/// nearest boundary slot.
pub fn nearest_slot(grid: &Grid, hit_time_ms: f64, client_offset_ms: f64) -> SlotMatch {
    let server_time = hit_time_ms + client_offset_ms;
    let slots = grid.slots();

    // first slot at or after the hit; the answer is it or its predecessor
    let upper = slots.partition_point(|&slot| slot < server_time);
    let slot_index = if upper == 0 {
        0
    } else if upper == slots.len() {
        slots.len() - 1
    } else {
        let before = server_time - slots[upper - 1];
        let after = slots[upper] - server_time;
        if before <= after {
            upper - 1
        } else {
            upper
        }
    };

    SlotMatch {
        slot_index,
        delta_ms: server_time - slots[slot_index],
    }
}
