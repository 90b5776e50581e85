pub mod record;
pub mod status;

pub use record::{JobApproval, JobRecord, ParentRef};
pub use status::{check_record, resolve, JobStatus, RunStatus, StepStatus};
