pub mod context;
pub mod engine;
pub mod ledger;
pub mod levels;
pub mod passes;
pub mod pool;
pub mod types;
pub mod work_share;

pub use context::{AllocationContext, Workload};
pub use engine::{Allocation, Allocator};
pub use ledger::{SlotAssignment, SlotAssignments, PANEL_SIZE};
pub use levels::{derive_conflict_levels, ConflictModel, ConflictTable};
pub use passes::{plan, Pass, Requirement};
pub use pool::PossibleAssignments;
pub use types::{Availability, Booking, ConflictLevel, Guests, Slot, SlotOutcome, SlotStart, UnfilledSlot};
pub use work_share::{normalised_work_share, work_share};
