//! Board identification

use anyhow::Result;
use pitimer::{BoardProbe, ProcfsProbe};

use crate::output;

/// Show what the host reports and whether the timer gate passes
pub fn execute(json: bool) -> Result<()> {
    let probe = ProcfsProbe::default();
    let info = probe.board_info();
    output::print_board(&info, probe.is_supported(), json);
    Ok(())
}
