//! segforge: split uploaded videos into fixed-length parts and package them.
//!
//! The [`session::SessionManager`] owns every session and every file a session
//! produces. It probes inputs through a [`segforge_av::MediaEngine`], plans
//! windows with [`segforge_core::plan`], cuts them with the
//! [`executor::SegmentExecutor`] and bundles the results with
//! [`packager::pack`].

pub mod executor;
pub mod intake;
pub mod packager;
pub mod session;

pub use executor::{SegmentExecutor, SegmentJob};
pub use intake::store_upload;
pub use packager::pack;
pub use session::{start_cleanup_task, ReclaimReport, SessionManager, SessionRecord, SessionState};
