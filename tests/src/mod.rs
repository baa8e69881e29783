#[cfg(test)]
pub mod concurrency_tests;
#[cfg(test)]
pub mod ledger_scenario_tests;
#[cfg(test)]
pub mod utils;
