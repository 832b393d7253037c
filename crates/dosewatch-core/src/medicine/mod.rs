//! Schedule model: medicines, their dose times and their dose history.

mod model;
mod time_of_day;

pub use model::{DoseLogEntry, DoseStatus, Frequency, Medicine, MedicineUpdate, NewMedicine};
pub use time_of_day::TimeOfDay;

#[cfg(test)]
pub(crate) use model::tests::medicine as test_medicine;
