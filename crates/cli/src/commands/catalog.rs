use pumpfit_core::PUMP_SPECS;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    CommandResult::json("catalog", &PUMP_SPECS)
}
