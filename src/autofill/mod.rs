//! Site profiles and the fill pipeline: resolve targets, apply values,
//! summarize, and optionally lock submission until a person has reviewed.

pub mod applicator;
pub mod lockdown;
pub mod notify;
pub mod orchestrator;
pub mod page;
pub mod profiles;
pub mod readiness;

pub use applicator::{apply, apply_typed, ApplyError, ApplyMode, ApplyOutcome, OptionMatch};
pub use lockdown::lock_submit_buttons;
pub use notify::{Notification, NotificationKind};
pub use orchestrator::{Autofill, Dialog, FieldResult, FieldStatus, FillOptions, FillReport};
pub use page::PageSession;
pub use profiles::{FieldSpec, ProfileError, ProfileRegistry, QueryTrigger, SiteProfile};
pub use readiness::{required_fields_present, wait_until, Readiness, ReadinessPolicy};
